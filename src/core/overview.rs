//! Historical session summary, refreshed whenever a session ends.

use crate::backend::{Backend, BackendError, OverviewResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Narrative used when the backend has no sessions on record.
pub const NO_SESSIONS_TEXT: &str = "No sessions found.";

/// Narrative used when the overview could not be fetched.
pub const OVERVIEW_UNAVAILABLE_TEXT: &str = "Overview unavailable.";

/// One past session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Option<i64>,
    pub date: String,
    /// Stability/accuracy score, 0-100
    pub accuracy_score: f64,
    pub avg_heart_rate: Option<f64>,
    pub risk: Option<String>,
}

/// History plus the backend's trend narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub records: Vec<SessionRecord>,
    pub trend: String,
    /// When this summary was fetched; `None` until the first refresh.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            trend: NO_SESSIONS_TEXT.to_string(),
            fetched_at: None,
        }
    }
}

impl SessionSummary {
    /// Build a summary from a backend response.
    pub fn from_response(response: OverviewResponse, fetched_at: DateTime<Utc>) -> Self {
        let records = response
            .history
            .into_iter()
            .map(|entry| SessionRecord {
                id: entry.id,
                date: entry.date,
                accuracy_score: entry.accuracy.unwrap_or(0.0),
                avg_heart_rate: entry.hr,
                risk: entry.risk,
            })
            .collect();

        let trend = response
            .ai_overview
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_SESSIONS_TEXT.to_string());

        Self {
            records,
            trend,
            fetched_at: Some(fetched_at),
        }
    }

    /// Summary standing in for a failed fetch.
    pub fn unavailable(fetched_at: DateTime<Utc>) -> Self {
        Self {
            records: Vec::new(),
            trend: OVERVIEW_UNAVAILABLE_TEXT.to_string(),
            fetched_at: Some(fetched_at),
        }
    }

    /// Mean accuracy across the listed sessions.
    pub fn average_accuracy(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let total: f64 = self.records.iter().map(|r| r.accuracy_score).sum();
        Some(total / self.records.len() as f64)
    }
}

/// Owns the current [`SessionSummary`] and replaces it on each refresh.
#[derive(Debug, Clone, Default)]
pub struct OverviewAggregator {
    summary: SessionSummary,
    refreshes: u64,
}

impl OverviewAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Number of refreshes applied so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    /// Fetch the overview and replace the current summary.
    pub async fn refresh<B: Backend + ?Sized>(&mut self, backend: &B) -> &SessionSummary {
        let result = backend.exercise_overview().await;
        self.apply(result)
    }

    /// Replace the summary with the outcome of a fetch.
    ///
    /// A failed fetch yields an empty summary rather than an error.
    pub fn apply(&mut self, result: Result<OverviewResponse, BackendError>) -> &SessionSummary {
        let now = Utc::now();
        self.refreshes += 1;

        self.summary = match result {
            Ok(response) => {
                tracing::debug!("Overview refreshed: {} sessions", response.history.len());
                SessionSummary::from_response(response, now)
            }
            Err(e) => {
                tracing::warn!("Overview fetch failed: {}", e);
                SessionSummary::unavailable(now)
            }
        };

        &self.summary
    }
}
