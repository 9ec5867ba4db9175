//! Connection health derived from poll outcomes.

use serde::{Deserialize, Serialize};

/// Tri-state connection status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No poll outcome has been recorded yet
    #[default]
    Connecting,
    /// The last poll succeeded
    Active,
    /// The last poll failed (non-2xx, network error, or timeout)
    Error,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Active => "LIVE",
            ConnectionStatus::Error => "OFFLINE",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies connection health from the most recent poll outcome.
///
/// There is no debounce: one failure flips the status to `Error` and one
/// success flips it back to `Active`. The status is advisory and never
/// gates polling.
#[derive(Debug, Clone, Default)]
pub struct ConnectionHealthMonitor {
    status: ConnectionStatus,
    successes: u64,
    failures: u64,
}

impl ConnectionHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one poll attempt and return the new status.
    pub fn record_outcome(&mut self, ok: bool) -> ConnectionStatus {
        let previous = self.status;

        if ok {
            self.successes += 1;
            self.status = ConnectionStatus::Active;
        } else {
            self.failures += 1;
            self.status = ConnectionStatus::Error;
        }

        if previous != self.status {
            tracing::info!("Connection status: {} -> {}", previous, self.status);
        }

        self.status
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether at least one poll has ever succeeded.
    pub fn has_connected(&self) -> bool {
        self.successes > 0
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connecting_before_any_outcome() {
        let monitor = ConnectionHealthMonitor::new();
        assert_eq!(monitor.status(), ConnectionStatus::Connecting);
        assert!(!monitor.has_connected());
    }

    #[test]
    fn test_single_sample_driven() {
        let mut monitor = ConnectionHealthMonitor::new();

        let statuses: Vec<ConnectionStatus> = [true, true, false, true]
            .into_iter()
            .map(|ok| monitor.record_outcome(ok))
            .collect();

        assert_eq!(
            statuses,
            vec![
                ConnectionStatus::Active,
                ConnectionStatus::Active,
                ConnectionStatus::Error,
                ConnectionStatus::Active,
            ]
        );
        assert_eq!(monitor.successes(), 3);
        assert_eq!(monitor.failures(), 1);
    }

    #[test]
    fn test_failure_before_first_success() {
        let mut monitor = ConnectionHealthMonitor::new();
        assert_eq!(monitor.record_outcome(false), ConnectionStatus::Error);
        assert!(!monitor.has_connected());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ConnectionStatus::Active.to_string(), "LIVE");
        assert_eq!(ConnectionStatus::Error.label(), "OFFLINE");
    }
}
