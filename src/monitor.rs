//! Runtime that drives the core engine.
//!
//! A single task owns every piece of mutable state (buffers, health,
//! session, overview) and reacts to four kinds of input:
//!
//! - the poll timer
//! - the elapsed-second timer, which only exists while recording
//! - user actions sent through [`MonitorHandle`]
//! - completions of backend requests spawned by the task itself
//!
//! Each input is applied in full before the new [`DashboardView`] is
//! published, so a renderer never observes a half-applied tick. Backend
//! requests run as child tasks of the monitor's cancellation token; dropping
//! the handle or calling [`MonitorHandle::shutdown`] aborts them, and their
//! late results have nowhere to land.

use crate::backend::{
    with_deadline, Backend, BackendError, OverviewResponse, RehabStatus, StopResponse,
};
use crate::config::Config;
use crate::core::{
    ConnectionHealthMonitor, ConnectionStatus, HeartRateZone, OverviewAggregator, Sample,
    SampleBuffer, SeriesStats, SessionCommand, SessionController, SessionEffect, SessionState,
    SessionSummary,
};
use crate::poller::{PollResult, PolledTick, Poller};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Something the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Start,
    Stop,
}

/// Everything a renderer needs, published after every applied input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    pub connection: ConnectionStatus,
    pub session: SessionState,
    pub elapsed_secs: u64,
    pub recording_intent: bool,
    /// Analysis of the last finished session
    pub analysis: Option<String>,
    /// User-visible error from the last failed start/stop
    pub error: Option<String>,
    /// Wrist angle (value) paired with the ideal angle (secondary),
    /// keyed by seconds since the monitor started
    pub motion: Vec<Sample<f64>>,
    pub heart_rate: Vec<Sample<DateTime<Utc>>>,
    pub heart_rate_stats: Option<SeriesStats>,
    pub heart_rate_zone: Option<HeartRateZone>,
    /// Last successful status, kept across failed polls
    pub latest: Option<RehabStatus>,
    pub summary: SessionSummary,
    /// Number of polls applied so far
    pub poll_count: u64,
}

/// Completions delivered back to the monitor task.
enum Event {
    Poll(PolledTick),
    StartAck(Result<(), BackendError>),
    StopAck(Result<StopResponse, BackendError>),
    Overview(Result<OverviewResponse, BackendError>),
}

/// Handle to a running monitor.
///
/// Dropping the handle stops the monitor.
pub struct MonitorHandle {
    actions: mpsc::Sender<UserAction>,
    view: watch::Receiver<DashboardView>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl MonitorHandle {
    /// Send a user action. Returns false if the monitor has stopped.
    pub async fn send(&self, action: UserAction) -> bool {
        self.actions.send(action).await.is_ok()
    }

    pub async fn start(&self) -> bool {
        self.send(UserAction::Start).await
    }

    pub async fn stop(&self) -> bool {
        self.send(UserAction::Stop).await
    }

    /// Latest published view.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// Receiver notified whenever the view changes.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    /// Cancellation token of the monitor; cancelling it stops the monitor.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the monitor and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Monitor task failed: {}", e);
        }
    }
}

pub struct Monitor<B: ?Sized> {
    backend: Arc<B>,
    config: Config,
    poller: Poller<B>,
    health: ConnectionHealthMonitor,
    session: SessionController,
    overview: OverviewAggregator,
    motion: SampleBuffer<f64>,
    heart_rate: SampleBuffer<DateTime<Utc>>,
    latest: Option<RehabStatus>,
    poll_count: u64,
    started: Instant,
    elapsed_timer: Option<Interval>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    actions: mpsc::Receiver<UserAction>,
    view_tx: watch::Sender<DashboardView>,
    cancel: CancellationToken,
}

impl<B: Backend + ?Sized> Monitor<B> {
    /// Start a monitor task against `backend`.
    pub fn spawn(backend: Arc<B>, config: Config) -> MonitorHandle {
        let (actions_tx, actions_rx) = mpsc::channel(8);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(DashboardView::default());
        let cancel = CancellationToken::new();

        let monitor = Self {
            poller: Poller::new(Arc::clone(&backend), config.poll_timeout),
            backend,
            health: ConnectionHealthMonitor::new(),
            session: SessionController::new(),
            overview: OverviewAggregator::new(),
            motion: SampleBuffer::new(config.motion_capacity),
            heart_rate: SampleBuffer::new(config.heart_rate_capacity),
            latest: None,
            poll_count: 0,
            started: Instant::now(),
            elapsed_timer: None,
            events_tx,
            events_rx,
            actions: actions_rx,
            view_tx,
            cancel: cancel.clone(),
            config,
        };

        let task = tokio::spawn(monitor.run());

        MonitorHandle {
            actions: actions_tx,
            view: view_rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        let mut poll_timer = tokio::time::interval(self.config.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Monitor started: polling every {:?} (timeout {:?})",
            self.config.poll_interval,
            self.config.poll_timeout
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = poll_timer.tick() => self.issue_poll(),
                _ = next_tick(&mut self.elapsed_timer) => self.session.tick_elapsed(),
                Some(action) = self.actions.recv() => self.handle_action(action),
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }

            self.sync_elapsed_timer();
            self.publish();
        }

        tracing::info!(
            "Monitor stopped after {} polls ({} stale)",
            self.poller.issued(),
            self.poller.discarded()
        );
    }

    fn issue_poll(&mut self) {
        let tick = self.poller.tick(self.session.generation());
        self.spawn_request(async move { Event::Poll(tick.await) });
    }

    fn handle_action(&mut self, action: UserAction) {
        tracing::debug!("User action: {:?}", action);
        let effect = match action {
            UserAction::Start => self.session.user_start(),
            UserAction::Stop => self.session.user_stop(),
        };
        if let Some(effect) = effect {
            self.run_effect(effect);
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Poll(tick) => self.apply_poll(tick),
            Event::StartAck(result) => self.session.on_start_ack(result),
            Event::StopAck(result) => {
                if let Some(effect) = self.session.on_stop_ack(result) {
                    self.run_effect(effect);
                }
            }
            Event::Overview(result) => {
                self.overview.apply(result);
            }
        }
    }

    fn apply_poll(&mut self, tick: PolledTick) {
        if !self.poller.accept(&tick) {
            return;
        }

        let previous = self.health.status();
        self.health.record_outcome(tick.result.is_ok());
        self.poll_count += 1;

        match tick.result {
            PollResult::Ok(status) => {
                self.append_samples(&status);
                if let Some(effect) = self.session.reconcile(&status, tick.generation) {
                    self.run_effect(effect);
                }
                self.latest = Some(status);
            }
            PollResult::Failed(failure) => {
                if previous == ConnectionStatus::Error {
                    tracing::debug!("Status poll #{} failed again: {}", tick.seq, failure);
                } else {
                    tracing::warn!("Status poll #{} failed: {}", tick.seq, failure);
                }
            }
        }
    }

    fn append_samples(&mut self, status: &RehabStatus) {
        // Elapsed-time label, one decimal
        let t = (self.started.elapsed().as_secs_f64() * 10.0).round() / 10.0;

        if let Some(angle) = status.wrist_angle {
            let ideal = self.config.ideal_curve.at(t);
            self.motion.append(Sample::paired(t, angle, ideal));
        }
        if let Some(bpm) = status.heart_rate {
            self.heart_rate.append(Sample::new(Utc::now(), bpm));
        }
    }

    fn run_effect(&mut self, effect: SessionEffect) {
        let backend = Arc::clone(&self.backend);
        let timeout = self.config.command_timeout;

        match effect {
            SessionEffect::Send(SessionCommand::Start) => self.spawn_request(async move {
                Event::StartAck(with_deadline(timeout, backend.start_session()).await)
            }),
            SessionEffect::Send(SessionCommand::Stop) => self.spawn_request(async move {
                Event::StopAck(with_deadline(timeout, backend.stop_session()).await)
            }),
            SessionEffect::RefreshOverview => self.spawn_request(async move {
                Event::Overview(with_deadline(timeout, backend.exercise_overview()).await)
            }),
        }
    }

    /// Run a backend request as a child of this monitor.
    fn spawn_request<F>(&self, request: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let token = self.cancel.child_token();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                event = request => {
                    let _ = events.send(event);
                }
            }
        });
    }

    /// Keep the elapsed-second timer alive exactly while recording.
    fn sync_elapsed_timer(&mut self) {
        match (self.session.is_recording(), self.elapsed_timer.is_some()) {
            (true, false) => {
                let period = Duration::from_secs(1);
                let mut timer = tokio::time::interval_at(Instant::now() + period, period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.elapsed_timer = Some(timer);
            }
            (false, true) => self.elapsed_timer = None,
            _ => {}
        }
    }

    fn publish(&self) {
        let view = DashboardView {
            connection: self.health.status(),
            session: self.session.state(),
            elapsed_secs: self.session.elapsed_secs(),
            recording_intent: self.session.recording_intent(),
            analysis: self.session.analysis().map(str::to_string),
            error: self.session.last_error().map(str::to_string),
            motion: self.motion.snapshot(),
            heart_rate: self.heart_rate.snapshot(),
            heart_rate_stats: self.heart_rate.stats(),
            heart_rate_zone: self
                .latest
                .as_ref()
                .and_then(|s| s.heart_rate)
                .map(HeartRateZone::classify),
            latest: self.latest.clone(),
            summary: self.overview.summary().clone(),
            poll_count: self.poll_count,
        };

        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
