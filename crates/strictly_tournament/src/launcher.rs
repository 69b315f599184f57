//! Wiring a transport, strategies, and settings into ready-to-run sessions.

use crate::error::SessionError;
use crate::reconnect::reconnect;
use crate::scheduler::{PollScheduler, PollSettings};
use crate::session::SessionState;
use crate::strategy::{AnswerProvider, MoveStrategy, StrategyKind};
use crate::submission::MoveSubmissionProtocol;
use crate::transport::TournamentTransport;
use crate::types::{PlayerId, PlayerIdentity};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Builds sessions that share one transport and answer provider.
#[derive(Clone)]
pub struct Launcher {
    transport: Arc<dyn TournamentTransport>,
    settings: PollSettings,
    answers: Arc<dyn AnswerProvider>,
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("settings", &self.settings)
            .field("answers", &self.answers.name())
            .finish()
    }
}

impl Launcher {
    /// Creates a launcher.
    pub fn new(
        transport: Arc<dyn TournamentTransport>,
        settings: PollSettings,
        answers: Arc<dyn AnswerProvider>,
    ) -> Self {
        Self {
            transport,
            settings,
            answers,
        }
    }

    /// Shared transport.
    pub fn transport(&self) -> &Arc<dyn TournamentTransport> {
        &self.transport
    }

    /// Poll settings given to every scheduler.
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Registers `name` and returns a fresh session for the issued id.
    #[instrument(skip(self))]
    pub async fn register(&self, name: &str) -> Result<SessionState, SessionError> {
        let registered = self.transport.register(name).await.map_err(|e| {
            error!(error = %e, "Registration failed");
            SessionError::Registration {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        info!(
            player_id = registered.player_id,
            message = ?registered.message,
            "✅ Registered"
        );
        Ok(SessionState::new(PlayerIdentity::registered(
            name,
            registered.player_id,
        )))
    }

    /// Rebuilds the session for an existing player id.
    #[instrument(skip(self, name))]
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        name: Option<String>,
    ) -> Result<SessionState, SessionError> {
        reconnect(self.transport.as_ref(), player_id, name).await
    }

    /// Scheduler for `state` driven by `strategy`.
    pub fn scheduler(&self, state: SessionState, strategy: Arc<dyn MoveStrategy>) -> PollScheduler {
        let protocol = MoveSubmissionProtocol::new(strategy, Arc::clone(&self.answers));
        PollScheduler::new(Arc::clone(&self.transport), protocol, self.settings, state)
    }

    /// Scheduler for `state` using a built-in strategy.
    pub fn scheduler_for(&self, state: SessionState, kind: StrategyKind) -> PollScheduler {
        self.scheduler(state, Arc::from(kind.build()))
    }
}
