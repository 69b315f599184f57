//! Strictly Tournament - a client for elimination-bracket trivia tournaments
//!
//! Registers a player with a tournament server, polls its status, answers
//! each round's question with a Rock-Paper-Scissors move exactly once, and
//! accumulates the revealed results.
//!
//! # Architecture
//!
//! - **Transport**: typed calls against the tournament HTTP API
//! - **Machine**: pure status-to-actions decision logic
//! - **Scheduler**: cancellable poll loop publishing state snapshots
//! - **Submission**: one reconciled submission per round
//! - **Reconnect**: rebuilds a session from a bare player id
//! - **Aggregator**: append-only results and final standings
//! - **Registry / Web**: many sessions behind an HTTP front end
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use strictly_tournament::{
//!     ArithmeticAnswerProvider, HttpTournamentClient, Launcher, PollSettings, StrategyKind,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = Arc::new(HttpTournamentClient::new(
//!     "http://localhost:5289",
//!     Duration::from_secs(10),
//! )?);
//! let launcher = Launcher::new(
//!     transport,
//!     PollSettings::default(),
//!     Arc::new(ArithmeticAnswerProvider::new("unknown")),
//! );
//! let session = launcher.register("alice").await?;
//! let report = launcher.scheduler_for(session, StrategyKind::Cycle).run().await?;
//! println!("{}", report.state.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod aggregator;
mod config;
mod error;
mod launcher;
mod llm_client;
mod machine;
mod reconnect;
mod registry;
mod scheduler;
mod session;
mod strategy;
mod submission;
mod transport;
mod types;
mod web;
mod wire;

// Crate-level exports - Errors
pub use error::{
    PollFailure, SessionError, StrategyError, TransportError, TransportErrorKind, UnknownPhase,
};

// Crate-level exports - Domain types
pub use types::{
    Move, PhaseCode, PlayerId, PlayerIdentity, RoundNumber, RoundPhase, RoundResult,
    RoundSnapshot, StatusSnapshot, SubmissionRecord, TournamentPhase,
};

// Crate-level exports - Wire bodies
pub use wire::{
    RegisterRequest, RegisterResponse, ResultEntry, StatusResponse, SubmitRequest,
    SubmitResponse, results_from_wire,
};

// Crate-level exports - Transport
pub use transport::{HttpTournamentClient, TournamentTransport};

// Crate-level exports - Session core
pub use aggregator::{Outcome, ResultAggregator};
pub use machine::{Action, Transition, transition};
pub use reconnect::reconnect;
pub use scheduler::{PollScheduler, PollSettings, RunReport, StopHandle};
pub use session::SessionState;
pub use submission::{DEFAULT_MOVE, FALLBACK_ANSWER, MoveSubmissionProtocol, SubmissionOutcome};

// Crate-level exports - Strategies
pub use strategy::{
    AnswerProvider, ArithmeticAnswerProvider, CycleStrategy, FixedStrategy,
    InteractiveAnswerProvider, InteractiveStrategy, MoveContext, MoveStrategy, RandomStrategy,
    StaticAnswerProvider, StrategyKind, parse_move_choice, solve_arithmetic,
};

// Crate-level exports - LLM client
pub use llm_client::{LlmAnswerProvider, LlmClient, LlmConfig, LlmError, LlmProvider, clean_answer};

// Crate-level exports - Configuration
pub use config::{
    ClientConfig, ConfigError, ENV_MAX_FAILURES, ENV_POLL_INTERVAL_MS, ENV_REQUEST_TIMEOUT_MS,
    ENV_SERVER_URL, LlmSettings,
};

// Crate-level exports - Sessions and front end
pub use launcher::Launcher;
pub use registry::{DEFAULT_RETENTION, SessionEnd, SessionRegistry, SessionStatus, SessionToken};
pub use web::{AppState, ApiError, ErrorBody, ReconnectRequest, SessionView, StartRequest, router};
