//! Error taxonomy for the tournament client.

use crate::types::PlayerId;
use derive_more::{Display, Error};
use tracing::instrument;

/// What went wrong on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum TransportErrorKind {
    /// Connection, IO, or timeout failure. Always transient.
    #[display("network error: {_0}")]
    Network(String),
    /// The server answered with a business-level rejection.
    #[display("server error {code}: {message}")]
    Server {
        /// HTTP status code.
        code: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// The response body did not match the expected schema.
    #[display("malformed response: {_0}")]
    MalformedResponse(String),
}

/// Transport failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Transport error: {} at {}:{}", kind, file, line)]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl TransportError {
    /// Creates a new transport error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: TransportErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for a [`TransportErrorKind::Network`] failure.
    #[track_caller]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network(message.into()))
    }

    /// Shorthand for a [`TransportErrorKind::Server`] rejection.
    #[track_caller]
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Server {
            code,
            message: message.into(),
        })
    }

    /// Shorthand for a [`TransportErrorKind::MalformedResponse`] failure.
    #[track_caller]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MalformedResponse(message.into()))
    }

    /// Returns true for transient network failures.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Network(_))
    }

    /// Returns true when the server rejected a submission because one
    /// already exists for the round.
    pub fn is_already_submitted(&self) -> bool {
        match &self.kind {
            TransportErrorKind::Server { code, message } => {
                *code == 409 || mentions_duplicate(message)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::malformed(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Returns true if a server message reports a duplicate submission.
pub(crate) fn mentions_duplicate(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already submitted")
        || lower.contains("already answered")
        || lower.contains("duplicate")
}

/// A phase value outside the known enum.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("unknown {domain} phase: {value}")]
pub struct UnknownPhase {
    /// Which phase enum failed to parse, "tournament" or "round".
    pub domain: &'static str,
    /// The raw value received.
    pub value: String,
}

/// A move strategy or answer provider failed to produce a usable value.
#[derive(Debug, Clone, Display, Error)]
#[display("Strategy error: {} at {}:{}", message, file, line)]
pub struct StrategyError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StrategyError {
    /// Creates a new strategy error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Terminal failures of a tournament run, surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// Too many consecutive polls failed.
    #[display("connection lost after {failures} consecutive failed polls")]
    ConnectionLost {
        /// Number of consecutive failures observed.
        failures: u32,
    },
    /// Reconnection could not confirm the player with the server.
    #[display("unknown player {player_id}: {reason}")]
    UnknownPlayer {
        /// The player id that was tried.
        player_id: PlayerId,
        /// Why the server lookup failed.
        reason: String,
    },
    /// The server refused or failed the registration.
    #[display("registration of {name} failed: {reason}")]
    Registration {
        /// Name that was submitted.
        name: String,
        /// Why registration failed.
        reason: String,
    },
    /// The session has no player id to poll with.
    #[display("session for {name} is not registered")]
    NotRegistered {
        /// Name carried by the unregistered identity.
        name: String,
    },
}

/// Why a single poll produced no usable snapshot.
#[derive(Debug, Clone, Display)]
pub enum PollFailure {
    /// The status call itself failed.
    #[display("{_0}")]
    Transport(TransportError),
    /// The status payload carried a phase we do not understand.
    #[display("{_0}")]
    Phase(UnknownPhase),
}

impl From<TransportError> for PollFailure {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

impl From<UnknownPhase> for PollFailure {
    fn from(err: UnknownPhase) -> Self {
        Self::Phase(err)
    }
}
