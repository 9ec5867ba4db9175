//! Timeout-bounded polling of the live status endpoint.
//!
//! Ticks are not serialised: a slow request may still be in flight when the
//! next one is sent. Every tick carries an issue sequence number and
//! [`Poller::accept`] only lets through completions newer than the last one
//! applied, so a late, older response can never overwrite fresher state.

use crate::backend::{Backend, BackendError, RehabStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Why a poll produced no data.
#[derive(Debug, Clone, PartialEq)]
pub enum PollFailure {
    /// No response within the poll timeout
    Timeout,
    /// Connection-level failure
    Network(String),
    /// Non-2xx response
    Status(u16),
    /// Body could not be decoded
    Decode(String),
}

impl std::fmt::Display for PollFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollFailure::Timeout => write!(f, "timed out"),
            PollFailure::Network(msg) => write!(f, "network error: {msg}"),
            PollFailure::Status(code) => write!(f, "HTTP {code}"),
            PollFailure::Decode(msg) => write!(f, "bad payload: {msg}"),
        }
    }
}

impl From<BackendError> for PollFailure {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Timeout => PollFailure::Timeout,
            BackendError::Server { status, .. } => PollFailure::Status(status),
            BackendError::Serialization(msg) => PollFailure::Decode(msg),
            BackendError::Network(msg) | BackendError::Config(msg) => PollFailure::Network(msg),
        }
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Ok(RehabStatus),
    Failed(PollFailure),
}

impl PollResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, PollResult::Ok(_))
    }

    pub fn status(&self) -> Option<&RehabStatus> {
        match self {
            PollResult::Ok(status) => Some(status),
            PollResult::Failed(_) => None,
        }
    }
}

/// A completed poll tagged with the bookkeeping needed to apply it.
#[derive(Debug, Clone)]
pub struct PolledTick {
    /// Issue order of the request
    pub seq: u64,
    /// Session controller generation when the request was issued
    pub generation: u64,
    pub result: PollResult,
}

pub struct Poller<B: ?Sized> {
    backend: Arc<B>,
    timeout: Duration,
    issued: u64,
    applied: u64,
    discarded: u64,
}

impl<B: Backend + ?Sized> Poller<B> {
    pub fn new(backend: Arc<B>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            issued: 0,
            applied: 0,
            discarded: 0,
        }
    }

    /// Perform one status request, aborting it after `timeout`.
    pub async fn fetch(backend: &B, timeout: Duration) -> PollResult {
        match tokio::time::timeout(timeout, backend.rehab_status()).await {
            Ok(Ok(status)) => PollResult::Ok(status),
            Ok(Err(e)) => PollResult::Failed(e.into()),
            Err(_) => PollResult::Failed(PollFailure::Timeout),
        }
    }

    /// Issue the next poll.
    ///
    /// The returned future owns everything it needs so it can be spawned;
    /// dropping it aborts the request.
    pub fn tick(&mut self, generation: u64) -> impl Future<Output = PolledTick> + Send + 'static {
        self.issued += 1;
        let seq = self.issued;
        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;

        async move {
            let result = Self::fetch(&*backend, timeout).await;
            PolledTick {
                seq,
                generation,
                result,
            }
        }
    }

    /// Decide whether a completed tick may be applied.
    ///
    /// Returns false for completions older than one already applied.
    pub fn accept(&mut self, tick: &PolledTick) -> bool {
        if tick.seq <= self.applied {
            self.discarded += 1;
            tracing::debug!(
                "Discarding stale poll #{} (already applied #{})",
                tick.seq,
                self.applied
            );
            return false;
        }
        self.applied = tick.seq;
        true
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{OverviewResponse, StopResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend whose status calls follow a script of delays and outcomes.
    struct ScriptedBackend {
        script: Mutex<Vec<(Duration, Result<RehabStatus, BackendError>)>>,
    }

    impl ScriptedBackend {
        fn new(mut script: Vec<(Duration, Result<RehabStatus, BackendError>)>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn rehab_status(&self) -> Result<RehabStatus, BackendError> {
            let (delay, outcome) = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or((Duration::ZERO, Err(BackendError::Network("script empty".into()))));
            tokio::time::sleep(delay).await;
            outcome
        }

        async fn start_session(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn stop_session(&self) -> Result<StopResponse, BackendError> {
            Ok(StopResponse::default())
        }

        async fn exercise_overview(&self) -> Result<OverviewResponse, BackendError> {
            Ok(OverviewResponse::default())
        }
    }

    fn reading(bpm: f64) -> RehabStatus {
        RehabStatus {
            heart_rate: Some(bpm),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![(
            Duration::from_secs(5),
            Ok(reading(70.0)),
        )]));
        let mut poller = Poller::new(backend, Duration::from_secs(2));

        let tick = poller.tick(0).await;
        assert_eq!(tick.result, PollResult::Failed(PollFailure::Timeout));
        assert_eq!(tick.seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_maps_to_status_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![(
            Duration::ZERO,
            Err(BackendError::Server {
                status: 502,
                message: "bad gateway".into(),
            }),
        )]));
        let mut poller = Poller::new(backend, Duration::from_secs(2));

        let tick = poller.tick(0).await;
        assert_eq!(tick.result, PollResult::Failed(PollFailure::Status(502)));
        assert!(!tick.result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_completion_discards_older() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            (Duration::from_millis(1500), Ok(reading(70.0))),
            (Duration::from_millis(100), Ok(reading(90.0))),
        ]));
        let mut poller = Poller::new(backend, Duration::from_secs(2));

        let slow = tokio::spawn(poller.tick(0));
        let fast = tokio::spawn(poller.tick(0));

        let fast = fast.await.unwrap();
        let slow = slow.await.unwrap();
        assert_eq!(fast.seq, 2);
        assert_eq!(slow.seq, 1);

        assert!(poller.accept(&fast));
        assert!(!poller.accept(&slow));
        assert_eq!(poller.discarded(), 1);
        assert_eq!(poller.issued(), 2);
    }

    #[test]
    fn test_in_order_completions_all_accepted() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let mut poller = Poller::new(backend, Duration::from_secs(2));

        for seq in 1..=3 {
            let tick = PolledTick {
                seq,
                generation: 0,
                result: PollResult::Ok(reading(72.0)),
            };
            assert!(poller.accept(&tick));
        }
        assert_eq!(poller.discarded(), 0);
    }
}
