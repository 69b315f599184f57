//! The cancellable poll loop driving one session.

use crate::aggregator::{Outcome, ResultAggregator};
use crate::error::{PollFailure, SessionError, TransportError};
use crate::machine::{Action, Transition, transition};
use crate::session::SessionState;
use crate::submission::MoveSubmissionProtocol;
use crate::transport::TournamentTransport;
use crate::types::{PlayerId, StatusSnapshot};
use derive_getters::Getters;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, info, instrument, warn};

/// Timing and failure limits for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct PollSettings {
    /// Pause between polls.
    interval: Duration,
    /// Upper bound on one status request.
    request_timeout: Duration,
    /// Consecutive failed polls tolerated before giving up.
    max_consecutive_failures: u32,
    /// Stop after this many polls. `None` polls until a terminal state.
    max_polls: Option<u64>,
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl PollSettings {
    /// Creates settings with the given interval and default limits. A zero
    /// interval is raised to one millisecond.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            ..Self::default()
        }
    }

    /// Sets the status request timeout.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Sets the consecutive failure cap. Zero is raised to one.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    /// Bounds the loop to `max_polls` status requests.
    pub fn with_max_polls(mut self, max_polls: Option<u64>) -> Self {
        self.max_polls = max_polls;
        self
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            max_consecutive_failures: 5,
            max_polls: None,
        }
    }
}

/// What a finished run hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Why the loop ended.
    pub outcome: Outcome,
    /// Final session state.
    pub state: SessionState,
}

/// Requests a running scheduler to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Signals the loop. Takes effect within one poll interval.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives status polls, state transitions, and actions for one session.
pub struct PollScheduler {
    transport: Arc<dyn TournamentTransport>,
    protocol: MoveSubmissionProtocol,
    settings: PollSettings,
    state_tx: watch::Sender<SessionState>,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("protocol", &self.protocol)
            .field("settings", &self.settings)
            .field("player_id", &self.state_tx.borrow().player_id())
            .finish()
    }
}

impl PollScheduler {
    /// Creates a scheduler owning `state`.
    pub fn new(
        transport: Arc<dyn TournamentTransport>,
        protocol: MoveSubmissionProtocol,
        settings: PollSettings,
        state: SessionState,
    ) -> Self {
        let (state_tx, _) = watch::channel(state);
        let (stop_tx, _) = watch::channel(false);
        Self {
            transport,
            protocol,
            settings,
            state_tx,
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// Receiver that always holds the latest committed state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Handle for cooperative cancellation.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Loop settings.
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Runs until the tournament ends, the player is eliminated, the loop is
    /// stopped, the poll bound is hit, or the connection is lost.
    #[instrument(skip(self), fields(player_id = ?self.state_tx.borrow().player_id()))]
    pub async fn run(self) -> Result<RunReport, SessionError> {
        let mut state = self.snapshot();
        let Some(player_id) = state.player_id() else {
            error!("Refusing to poll without a player id");
            return Err(SessionError::NotRegistered {
                name: state.identity().name().clone(),
            });
        };

        state.start();
        self.publish(&state);
        info!(
            strategy = self.protocol.strategy_name(),
            answers = self.protocol.answer_provider_name(),
            interval_ms = self.settings.interval.as_millis() as u64,
            "Starting tournament monitoring"
        );

        let mut stop_rx = self.stop_tx.subscribe();
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_rx.changed() => {}
            }

            if *stop_rx.borrow_and_update() {
                state.stop("stop requested");
                self.publish(&state);
                return Ok(self.report(Outcome::Cancelled, state));
            }
            if self.settings.max_polls.is_some_and(|max| polls >= max) {
                state.stop("poll limit reached");
                self.publish(&state);
                return Ok(self.report(Outcome::PollLimitReached, state));
            }
            polls += 1;

            let snapshot = match self.poll(player_id).await {
                Ok(snapshot) => {
                    failures = 0;
                    snapshot
                }
                Err(failure) => {
                    failures += 1;
                    warn!(
                        failures,
                        cap = self.settings.max_consecutive_failures,
                        error = %failure,
                        "Status poll failed"
                    );
                    if failures >= self.settings.max_consecutive_failures {
                        error!(failures, "Giving up, connection lost");
                        state.stop("connection lost");
                        self.publish(&state);
                        return Err(SessionError::ConnectionLost { failures });
                    }
                    continue;
                }
            };

            let Transition { next, actions } = transition(&state, &snapshot);
            state = next;
            for action in actions {
                // A stop abandons the action in flight, even a pending prompt.
                tokio::select! {
                    _ = self.execute(action, &mut state) => {}
                    _ = stop_rx.changed() => {}
                }
                if *stop_rx.borrow_and_update() {
                    warn!("Stop requested while an action was in flight");
                    state.stop("stop requested");
                    self.publish(&state);
                    return Ok(self.report(Outcome::Cancelled, state));
                }
            }
            self.publish(&state);

            if !state.running() {
                let outcome = ResultAggregator::outcome(&state).unwrap_or(Outcome::Cancelled);
                info!(%outcome, summary = %state.summary(), "Tournament monitoring stopped");
                return Ok(self.report(outcome, state));
            }
        }
    }

    async fn poll(&self, player_id: PlayerId) -> Result<StatusSnapshot, PollFailure> {
        let response = timeout(self.settings.request_timeout, self.transport.status(player_id))
            .await
            .map_err(|_| TransportError::network("status request timed out"))??;
        let snapshot = StatusSnapshot::try_from(response)?;
        debug!(
            tournament = %snapshot.tournament_phase,
            round = snapshot.round.round_number,
            phase = %snapshot.round.phase,
            can_submit = snapshot.round.can_submit,
            "Polled status"
        );
        Ok(snapshot)
    }

    async fn execute(&self, action: Action, state: &mut SessionState) {
        match action {
            Action::SubmitMove(round) => {
                let outcome = self
                    .protocol
                    .execute(self.transport.as_ref(), state, &round)
                    .await;
                debug!(round = round.round_number, ?outcome, "Submission finished");
            }
            Action::FetchResults => {
                if let Err(e) = ResultAggregator::refresh(self.transport.as_ref(), state).await {
                    warn!(error = %e, "Failed to refresh results");
                }
            }
            Action::FetchFinalResults => {
                if let Err(e) = ResultAggregator::finalize(self.transport.as_ref(), state).await {
                    warn!(error = %e, "Failed to fetch final results");
                }
            }
        }
    }

    fn publish(&self, state: &SessionState) {
        self.state_tx.send_replace(state.clone());
    }

    fn report(&self, outcome: Outcome, state: SessionState) -> RunReport {
        RunReport { outcome, state }
    }
}
