//! Backend contract and HTTP client.
//!
//! The monitor talks to the rehab backend over four endpoints:
//!
//! ```text
//! GET  /get-rehab-status   live reading + backend recording flag
//! POST /start-session      begin recording
//! POST /stop-session       end recording, returns the analysis text
//! GET  /exercise-overview  recent session history + trend narrative
//! ```
//!
//! The [`Backend`] trait is the seam the rest of the crate is written
//! against; [`HttpBackend`] is the reqwest implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Analysis text shown when the stop response carries none of the known fields.
pub const ANALYSIS_PLACEHOLDER: &str = "Analysis complete.";

/// Backend client error types.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Client could not be configured
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Request did not complete within its deadline
    Timeout,
    /// Server returned a non-success status
    Server { status: u16, message: String },
    /// Response body could not be decoded
    Serialization(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Config(msg) => write!(f, "Backend config error: {msg}"),
            BackendError::Network(msg) => write!(f, "Backend network error: {msg}"),
            BackendError::Timeout => write!(f, "Backend request timed out"),
            BackendError::Server { status, message } => {
                write!(f, "Backend server error ({status}): {message}")
            }
            BackendError::Serialization(msg) => write!(f, "Backend response error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Serialization(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Live status returned by `GET /get-rehab-status`.
///
/// Every field is optional; a missing field simply contributes nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RehabStatus {
    #[serde(default)]
    pub heart_rate: Option<f64>,
    #[serde(default)]
    pub wrist_angle: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub is_recording: Option<bool>,
    #[serde(default)]
    pub ai_summary: Option<String>,
}

/// Response from `POST /stop-session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopResponse {
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub avg_hr: Option<f64>,
    #[serde(default)]
    pub avg_angle: Option<f64>,
    #[serde(default)]
    pub session_id: Option<i64>,
}

impl StopResponse {
    /// Candidate text fields, highest priority first.
    pub fn text_fields(&self) -> [Option<&str>; 2] {
        [self.analysis.as_deref(), self.message.as_deref()]
    }

    /// First non-blank text field, or [`ANALYSIS_PLACEHOLDER`].
    pub fn analysis_text(&self) -> String {
        self.text_fields()
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
            .unwrap_or(ANALYSIS_PLACEHOLDER)
            .to_string()
    }
}

/// One past session as reported by `GET /exercise-overview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: Option<i64>,
    pub date: String,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub hr: Option<f64>,
    #[serde(default)]
    pub risk: Option<String>,
}

/// Response from `GET /exercise-overview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub ai_overview: Option<String>,
}

/// The backend operations the monitor depends on.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Fetch the live status.
    async fn rehab_status(&self) -> Result<RehabStatus, BackendError>;

    /// Ask the backend to begin a recording session.
    async fn start_session(&self) -> Result<(), BackendError>;

    /// Ask the backend to end the current recording session.
    async fn stop_session(&self) -> Result<StopResponse, BackendError>;

    /// Fetch recent session history.
    async fn exercise_overview(&self) -> Result<OverviewResponse, BackendError>;
}

/// Run a backend request, giving up with [`BackendError::Timeout`] after `deadline`.
pub async fn with_deadline<T>(
    deadline: Duration,
    request: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    tokio::time::timeout(deadline, request)
        .await
        .unwrap_or(Err(BackendError::Timeout))
}

/// reqwest-backed [`Backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url`.
    ///
    /// `request_timeout` is an outer safety net; callers apply their own
    /// tighter deadlines per operation.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::Config("Backend URL is empty".to_string()));
        }

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(BackendError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn rehab_status(&self) -> Result<RehabStatus, BackendError> {
        let response = self.client.get(self.url("get-rehab-status")).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn start_session(&self) -> Result<(), BackendError> {
        let response = self.client.post(self.url("start-session")).send().await?;
        // Body is not part of the contract; any 2xx is an acknowledgement
        Self::check(response).await.map(|_| ())
    }

    async fn stop_session(&self) -> Result<StopResponse, BackendError> {
        let response = self.client.post(self.url("stop-session")).send().await?;
        let response = Self::check(response).await?;

        // An unparseable body still means the backend stopped the session
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            tracing::warn!("Unrecognised stop-session body: {}", e);
            StopResponse::default()
        }))
    }

    async fn exercise_overview(&self) -> Result<OverviewResponse, BackendError> {
        let response = self.client.get(self.url("exercise-overview")).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}
