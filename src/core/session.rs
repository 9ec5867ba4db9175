//! Recording session state machine.
//!
//! ```text
//!            user_start              ack ok
//!   Idle ─────────────▶ Starting ─────────────▶ Recording
//!    ▲                     │ ack err               │ user_stop
//!    │                     ▼                       ▼
//!    │                   Error ◀────────────── Stopping
//!    │                              ack err        │
//!    └─────────────────────────────────────────────┘ ack ok
//! ```
//!
//! The controller is synchronous: it decides what should happen and hands
//! back a [`SessionEffect`] for the runtime to carry out. While a user
//! command is in flight (`Starting` / `Stopping`) poll results are not
//! allowed to move the state. Otherwise the backend's recording flag wins.

use crate::backend::{BackendError, RehabStatus, StopResponse};
use serde::{Deserialize, Serialize};

/// Prefix the backend uses for a finished session's analysis.
pub const CONCLUSION_MARKER: &str = "Medical Conclusion:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Backend call the controller wants issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
}

/// Work the runtime must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    Send(SessionCommand),
    RefreshOverview,
}

#[derive(Debug, Clone, Default)]
pub struct SessionController {
    state: SessionState,
    recording_intent: bool,
    elapsed_secs: u64,
    analysis: Option<String>,
    last_error: Option<String>,
    /// Bumped on every state transition. Polls issued under an older
    /// generation raced a transition and must not reconcile.
    generation: u64,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the user currently intends to be recording.
    pub fn recording_intent(&self) -> bool {
        self.recording_intent
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// A start or stop request is awaiting its acknowledgement.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Starting | SessionState::Stopping)
    }

    /// User asked to start recording.
    ///
    /// Accepted from `Idle` and `Error`; a no-op anywhere else.
    pub fn user_start(&mut self) -> Option<SessionEffect> {
        match self.state {
            SessionState::Idle | SessionState::Error => {
                self.recording_intent = true;
                self.last_error = None;
                self.transition(SessionState::Starting);
                Some(SessionEffect::Send(SessionCommand::Start))
            }
            state => {
                tracing::debug!("Ignoring start request while {}", state);
                None
            }
        }
    }

    /// User asked to stop recording. Only meaningful while `Recording`.
    pub fn user_stop(&mut self) -> Option<SessionEffect> {
        if self.state != SessionState::Recording {
            tracing::debug!("Ignoring stop request while {}", self.state);
            return None;
        }

        self.recording_intent = false;
        self.transition(SessionState::Stopping);
        Some(SessionEffect::Send(SessionCommand::Stop))
    }

    /// Outcome of the start request.
    pub fn on_start_ack(&mut self, result: Result<(), BackendError>) {
        if self.state != SessionState::Starting {
            tracing::warn!("Start acknowledgement arrived while {}", self.state);
            return;
        }

        match result {
            Ok(()) => self.enter_recording(),
            Err(e) => {
                tracing::warn!("Start session failed: {}", e);
                self.recording_intent = false;
                self.last_error = Some(format!("Could not start session: {e}"));
                self.transition(SessionState::Error);
            }
        }
    }

    /// Outcome of the stop request.
    ///
    /// Both outcomes end in a refresh of the history, so it reflects
    /// whatever the backend managed to persist.
    pub fn on_stop_ack(&mut self, result: Result<StopResponse, BackendError>) -> Option<SessionEffect> {
        if self.state != SessionState::Stopping {
            tracing::warn!("Stop acknowledgement arrived while {}", self.state);
            return None;
        }

        self.recording_intent = false;
        match result {
            Ok(response) => {
                self.analysis = Some(response.analysis_text());
                self.last_error = None;
                self.transition(SessionState::Idle);
            }
            Err(e) => {
                tracing::warn!("Stop session failed: {}", e);
                self.last_error = Some(format!("Connection error while stopping session: {e}"));
                self.transition(SessionState::Error);
            }
        }

        Some(SessionEffect::RefreshOverview)
    }

    /// One second of recording elapsed.
    pub fn tick_elapsed(&mut self) {
        if self.state == SessionState::Recording {
            self.elapsed_secs += 1;
        }
    }

    /// Align local state with a successful poll.
    ///
    /// `issued_generation` is the controller generation at the time the poll
    /// was sent; a poll that raced a transition is ignored.
    pub fn reconcile(&mut self, status: &RehabStatus, issued_generation: u64) -> Option<SessionEffect> {
        if issued_generation != self.generation || self.is_busy() {
            return None;
        }

        let mut effect = None;
        match (status.is_recording, self.state) {
            (Some(true), SessionState::Recording) => {}
            (Some(true), _) => {
                tracing::info!("Backend reports an active session, adopting it");
                self.enter_recording();
            }
            (Some(false), SessionState::Recording) => {
                tracing::info!("Backend reports the session ended");
                self.recording_intent = false;
                self.transition(SessionState::Idle);
                effect = Some(SessionEffect::RefreshOverview);
            }
            _ => {}
        }

        // Recover the last session's analysis after a restart
        if !self.is_recording() && status.is_recording != Some(true) && self.analysis.is_none() {
            if let Some(summary) = status.ai_summary.as_deref() {
                if summary.contains(CONCLUSION_MARKER) {
                    tracing::info!("Recovered analysis of the last finished session");
                    self.analysis = Some(summary.to_string());
                }
            }
        }

        effect
    }

    fn enter_recording(&mut self) {
        self.recording_intent = true;
        self.analysis = None;
        self.last_error = None;
        self.elapsed_secs = 0;
        self.transition(SessionState::Recording);
    }

    fn transition(&mut self, to: SessionState) {
        tracing::info!("Session: {} -> {}", self.state, to);
        self.state = to;
        self.generation += 1;
    }
}
