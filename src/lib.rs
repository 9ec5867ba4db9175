//! Rehab Monitor - live client for a rehab biometric backend.
//!
//! The monitor polls the backend's live status once a second, keeps bounded
//! rolling windows of wrist angle and heart rate for display, tracks
//! connection health, and drives recording sessions while keeping local
//! state consistent with what the backend reports.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Monitor task                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  poll timer ─▶ Poller ──▶ ConnectionHealthMonitor            │
//! │                  │                                           │
//! │                  ├─────▶ SampleBuffer (angle / ideal, bpm)   │
//! │                  │                                           │
//! │                  └─────▶ SessionController ──▶ Overview      │
//! │  user actions ─────────────────▲                 Aggregator  │
//! │                                                              │
//! │                 ──▶ DashboardView (watch channel) ──▶ render  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rehab_monitor::{Config, HttpBackend, Monitor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let backend = Arc::new(HttpBackend::new(&config.backend_url, config.command_timeout)?);
//! let handle = Monitor::spawn(backend, config);
//!
//! handle.start().await;
//! println!("{:?}", handle.view().session);
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod monitor;
pub mod poller;

// Re-export key types at crate root for convenience
pub use backend::{
    Backend, BackendError, HistoryEntry, HttpBackend, OverviewResponse, RehabStatus,
    StopResponse, ANALYSIS_PLACEHOLDER,
};
pub use config::{Config, ConfigError};
pub use crate::core::{
    ConnectionHealthMonitor, ConnectionStatus, HeartRateZone, IdealCurve, OverviewAggregator,
    Sample, SampleBuffer, SeriesStats, SessionCommand, SessionController, SessionEffect,
    SessionRecord, SessionState, SessionSummary,
};
pub use monitor::{DashboardView, Monitor, MonitorHandle, UserAction};
pub use poller::{PollFailure, PollResult, PolledTick, Poller};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
