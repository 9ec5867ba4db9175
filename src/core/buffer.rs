//! Bounded sliding windows of timestamped samples.
//!
//! Each display series (wrist angle, heart rate) is backed by one
//! `SampleBuffer` created at startup. Samples arrive in poll order and the
//! oldest ones fall off the front once the window is full, so memory stays
//! bounded no matter how long the monitor runs.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// A single point in a series.
///
/// `timestamp` is only an ordering key: a tick index, an elapsed-time label,
/// or a wall-clock instant depending on the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample<T> {
    /// Ordering key for the point
    pub timestamp: T,
    /// Primary value (e.g. measured wrist angle, bpm)
    pub value: f64,
    /// Optional paired value (e.g. the ideal angle at the same instant)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<f64>,
}

impl<T> Sample<T> {
    /// Create a sample without a paired value.
    pub fn new(timestamp: T, value: f64) -> Self {
        Self {
            timestamp,
            value,
            secondary: None,
        }
    }

    /// Create a sample with a paired secondary value.
    pub fn paired(timestamp: T, value: f64, secondary: f64) -> Self {
        Self {
            timestamp,
            value,
            secondary: Some(secondary),
        }
    }
}

/// Summary statistics over the values currently in a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; zero with fewer than two samples
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Fixed-capacity FIFO window of samples for one series.
#[derive(Debug, Clone)]
pub struct SampleBuffer<T> {
    samples: VecDeque<Sample<T>>,
    capacity: usize,
}

impl<T: Clone> SampleBuffer<T> {
    /// Create an empty buffer holding at most `capacity` samples.
    ///
    /// A capacity of zero is bumped to one so the latest sample is always
    /// visible.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one if the window is full.
    pub fn append(&mut self, sample: Sample<T>) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Ordered copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<Sample<T>> {
        self.samples.iter().cloned().collect()
    }

    /// Iterate the window without copying.
    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }

    /// Most recently appended sample.
    pub fn latest(&self) -> Option<&Sample<T>> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Statistics over the primary values in the window.
    pub fn stats(&self) -> Option<SeriesStats> {
        if self.samples.is_empty() {
            return None;
        }

        let values: Vec<f64> = self.samples.iter().map(|s| s.value).collect();
        let std_dev = if values.len() > 1 {
            values.iter().std_dev()
        } else {
            0.0
        };

        Some(SeriesStats {
            count: values.len(),
            mean: values.iter().mean(),
            std_dev,
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(buffer: &SampleBuffer<u64>) -> Vec<f64> {
        buffer.snapshot().iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = SampleBuffer::new(3);
        for i in 1..=5u64 {
            buffer.append(Sample::new(i, i as f64));
        }

        assert_eq!(values(&buffer), vec![3.0, 4.0, 5.0]);
        assert_eq!(buffer.latest().map(|s| s.timestamp), Some(5));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut buffer = SampleBuffer::new(30);
        for i in 0..500u64 {
            buffer.append(Sample::new(i, (i % 7) as f64));
            assert!(buffer.len() <= 30);
        }

        // Window holds exactly the last 30 samples in arrival order
        let timestamps: Vec<u64> = buffer.iter().map(|s| s.timestamp).collect();
        let expected: Vec<u64> = (470..500).collect();
        assert_eq!(timestamps, expected);
    }

    #[test]
    fn test_partial_window_keeps_everything() {
        let mut buffer = SampleBuffer::new(40);
        buffer.append(Sample::new(0, 72.0));
        buffer.append(Sample::new(1, 74.0));

        assert_eq!(buffer.len(), 2);
        assert_eq!(values(&buffer), vec![72.0, 74.0]);
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut buffer = SampleBuffer::new(0);
        buffer.append(Sample::new(0, 1.0));
        buffer.append(Sample::new(1, 2.0));

        assert_eq!(buffer.capacity(), 1);
        assert_eq!(values(&buffer), vec![2.0]);
    }

    #[test]
    fn test_paired_samples_keep_secondary() {
        let mut buffer = SampleBuffer::new(2);
        buffer.append(Sample::paired(0, 18.5, 20.0));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot[0].secondary, Some(20.0));
    }

    #[test]
    fn test_stats() {
        let mut buffer = SampleBuffer::new(4);
        assert!(buffer.stats().is_none());

        buffer.append(Sample::new(0, 60.0));
        assert_eq!(buffer.stats().unwrap().std_dev, 0.0);

        for (i, v) in [60.0, 70.0, 80.0, 90.0, 100.0].into_iter().enumerate() {
            buffer.append(Sample::new(i as u64, v));
        }

        let stats = buffer.stats().unwrap();
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 85.0).abs() < 1e-9);
        assert_eq!(stats.min, 70.0);
        assert_eq!(stats.max, 100.0);
        assert!(stats.std_dev > 0.0);
    }

    #[test]
    fn test_single_sample_stats_compare_equal() {
        let mut buffer = SampleBuffer::new(4);
        buffer.append(Sample::new(0u64, 72.0));

        let stats = buffer.stats().unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, 72.0);
        assert_eq!(stats.std_dev, 0.0);
        // Views holding these stats must compare equal to themselves
        assert_eq!(buffer.stats(), Some(stats));
    }
}
