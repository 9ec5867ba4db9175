//! Series helpers: the ideal motion reference and heart-rate zones.

use serde::{Deserialize, Serialize};

/// Reference trajectory the measured wrist angle is plotted against.
///
/// `ideal(t) = sin(t * frequency) * amplitude + offset`, with `t` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdealCurve {
    /// Angular frequency in radians per second
    pub frequency: f64,
    /// Peak deviation from the offset, in degrees
    pub amplitude: f64,
    /// Resting angle, in degrees
    pub offset: f64,
}

impl Default for IdealCurve {
    fn default() -> Self {
        Self {
            frequency: 0.5,
            amplitude: 10.0,
            offset: 20.0,
        }
    }
}

impl IdealCurve {
    /// Ideal angle at `t` seconds.
    pub fn at(&self, t: f64) -> f64 {
        (t * self.frequency).sin() * self.amplitude + self.offset
    }
}

/// Heart-rate band used to colour the gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartRateZone {
    /// <= 100 bpm
    Normal,
    /// 101..=120 bpm
    Elevated,
    /// > 120 bpm
    Critical,
}

/// Upper bound (inclusive) of the normal zone.
const NORMAL_MAX_BPM: f64 = 100.0;

/// Upper bound (inclusive) of the elevated zone.
const ELEVATED_MAX_BPM: f64 = 120.0;

impl HeartRateZone {
    pub fn classify(bpm: f64) -> Self {
        if bpm <= NORMAL_MAX_BPM {
            HeartRateZone::Normal
        } else if bpm <= ELEVATED_MAX_BPM {
            HeartRateZone::Elevated
        } else {
            HeartRateZone::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HeartRateZone::Normal => "Rest/Normal",
            HeartRateZone::Elevated => "Elevated",
            HeartRateZone::Critical => "Critical",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_curve_defaults() {
        let curve = IdealCurve::default();
        assert!((curve.at(0.0) - 20.0).abs() < 1e-9);

        // Peak at t = pi / (2 * frequency)
        let peak = std::f64::consts::PI / (2.0 * curve.frequency);
        assert!((curve.at(peak) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(HeartRateZone::classify(72.0), HeartRateZone::Normal);
        assert_eq!(HeartRateZone::classify(100.0), HeartRateZone::Normal);
        assert_eq!(HeartRateZone::classify(101.0), HeartRateZone::Elevated);
        assert_eq!(HeartRateZone::classify(120.0), HeartRateZone::Elevated);
        assert_eq!(HeartRateZone::classify(121.0), HeartRateZone::Critical);
        assert_eq!(HeartRateZone::Critical.label(), "Critical");
    }
}
