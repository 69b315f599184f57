//! Concurrent sessions keyed by an opaque token.

use crate::aggregator::Outcome;
use crate::error::SessionError;
use crate::scheduler::{PollScheduler, RunReport, StopHandle};
use crate::session::SessionState;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Opaque key for a registered session.
pub type SessionToken = String;

const TOKEN_LENGTH: usize = 16;

/// How long a finished session stays listed before it is evicted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

/// How a session's poll task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The run returned normally.
    Finished(Outcome),
    /// The run stopped on a terminal error such as a lost connection.
    Failed(String),
}

impl SessionEnd {
    /// Outcome of a normal finish.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Finished(outcome) => Some(*outcome),
            Self::Failed(_) => None,
        }
    }

    /// Error text of a failed run.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Finished(_) => None,
            Self::Failed(message) => Some(message),
        }
    }
}

impl From<&Result<RunReport, SessionError>> for SessionEnd {
    fn from(result: &Result<RunReport, SessionError>) -> Self {
        match result {
            Ok(report) => Self::Finished(report.outcome),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Latest state of a session plus how it ended, if it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Latest committed state.
    pub state: SessionState,
    /// `None` while the poll task is still running.
    pub end: Option<SessionEnd>,
}

#[derive(Debug, Clone)]
struct Ended {
    end: SessionEnd,
    at: Instant,
}

struct SessionEntry {
    state: watch::Receiver<SessionState>,
    ended: watch::Receiver<Option<Ended>>,
    stop: StopHandle,
    task: JoinHandle<Result<RunReport, SessionError>>,
}

impl SessionEntry {
    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state.borrow().clone(),
            end: self.ended.borrow().as_ref().map(|ended| ended.end.clone()),
        }
    }

    fn expired(&self, retention: Duration) -> bool {
        self.ended
            .borrow()
            .as_ref()
            .is_some_and(|ended| ended.at.elapsed() >= retention)
    }
}

/// Running sessions, each with its own state channel and poll task.
///
/// Sessions share nothing; the registry only hands out snapshots and stop
/// signals. Finished sessions are evicted once they have been over for the
/// retention period.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionToken, SessionEntry>>>,
    retention: Duration,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: Arc::default(),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps finished sessions for `retention` before evicting them.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Spawns `scheduler` on the runtime and returns its token.
    #[instrument(skip_all)]
    pub async fn insert(&self, scheduler: PollScheduler) -> SessionToken {
        self.evict_expired().await;
        let token = Alphanumeric.sample_string(&mut rand::rng(), TOKEN_LENGTH);
        let (ended_tx, ended) = watch::channel(None);
        let state = scheduler.subscribe();
        let stop = scheduler.stop_handle();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let result = scheduler.run().await;
            let end = SessionEnd::from(&result);
            match &end {
                SessionEnd::Finished(outcome) => {
                    info!(token = %task_token, %outcome, "Session finished")
                }
                SessionEnd::Failed(error) => {
                    warn!(token = %task_token, %error, "Session failed")
                }
            }
            ended_tx.send_replace(Some(Ended {
                end,
                at: Instant::now(),
            }));
            result
        });
        let entry = SessionEntry {
            state,
            ended,
            stop,
            task,
        };
        self.sessions.write().await.insert(token.clone(), entry);
        info!(token = %token, "Session registered");
        token
    }

    /// Latest state of a session.
    pub async fn snapshot(&self, token: &str) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|entry| entry.state.borrow().clone())
    }

    /// Latest state of a session and how it ended.
    pub async fn status(&self, token: &str) -> Option<SessionStatus> {
        self.sessions.read().await.get(token).map(SessionEntry::status)
    }

    /// Whether the session's poll task has ended.
    pub async fn is_finished(&self, token: &str) -> Option<bool> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|entry| entry.ended.borrow().is_some())
    }

    /// Tokens of all sessions, sorted. Expired sessions are evicted first.
    pub async fn tokens(&self) -> Vec<SessionToken> {
        self.evict_expired().await;
        let mut tokens: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    /// Drops sessions that finished more than the retention period ago.
    /// Returns how many were evicted.
    #[instrument(skip(self))]
    pub async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.expired(self.retention));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Evicted finished sessions");
        }
        evicted
    }

    /// Stops and forgets a session, returning its last state and ending.
    #[instrument(skip(self))]
    pub async fn remove(&self, token: &str) -> Option<SessionStatus> {
        let entry = self.sessions.write().await.remove(token)?;
        entry.stop.stop();
        let status = match entry.task.await {
            Ok(result) => {
                let end = SessionEnd::from(&result);
                let state = match result {
                    Ok(report) => report.state,
                    Err(_) => entry.state.borrow().clone(),
                };
                SessionStatus {
                    state,
                    end: Some(end),
                }
            }
            Err(e) => {
                warn!(error = %e, "Session task did not finish cleanly");
                SessionStatus {
                    state: entry.state.borrow().clone(),
                    end: Some(SessionEnd::Failed(format!("session task aborted: {}", e))),
                }
            }
        };
        info!(end = ?status.end, "Session removed");
        Some(status)
    }

    /// Stops every session.
    pub async fn stop_all(&self) {
        for entry in self.sessions.read().await.values() {
            entry.stop.stop();
        }
    }
}
