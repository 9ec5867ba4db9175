//! Core engine for the rehab monitor.
//!
//! Everything in here is synchronous and free of I/O apart from the
//! overview refresh helper:
//! - Sliding-window sample buffers
//! - Connection health classification
//! - The recording session state machine
//! - Historical session summary
//! - Series helpers (ideal curve, heart-rate zones)

pub mod buffer;
pub mod health;
pub mod overview;
pub mod series;
pub mod session;

// Re-export commonly used types
pub use buffer::{Sample, SampleBuffer, SeriesStats};
pub use health::{ConnectionHealthMonitor, ConnectionStatus};
pub use overview::{OverviewAggregator, SessionRecord, SessionSummary};
pub use series::{HeartRateZone, IdealCurve};
pub use session::{
    SessionCommand, SessionController, SessionEffect, SessionState, CONCLUSION_MARKER,
};
