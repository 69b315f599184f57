//! Answering a round and reconciling the server's reply.

use crate::error::{TransportErrorKind, mentions_duplicate};
use crate::session::SessionState;
use crate::strategy::{AnswerProvider, MoveContext, MoveStrategy};
use crate::transport::TournamentTransport;
use crate::types::{Move, RoundSnapshot, SubmissionRecord};
use crate::wire::SubmitRequest;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Move used when the strategy cannot produce one.
pub const DEFAULT_MOVE: Move = Move::Rock;

/// Answer used when the provider fails or returns nothing.
pub const FALLBACK_ANSWER: &str = "unknown";

/// What happened to one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The server took the submission.
    Accepted,
    /// The server already had a submission for the round.
    AlreadySubmitted,
    /// The server refused; the round will not be retried.
    Rejected {
        /// HTTP status, if the refusal came as one.
        code: Option<u16>,
        /// Server explanation.
        message: String,
    },
    /// The request did not get through; the next poll may try again.
    Deferred {
        /// Failure description.
        reason: String,
    },
    /// Nothing was sent because the round already has a record or no player id.
    Skipped,
}

/// Turns a `SubmitMove` action into at most one recorded submission.
#[derive(Clone)]
pub struct MoveSubmissionProtocol {
    strategy: Arc<dyn MoveStrategy>,
    answers: Arc<dyn AnswerProvider>,
}

impl std::fmt::Debug for MoveSubmissionProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveSubmissionProtocol")
            .field("strategy", &self.strategy.name())
            .field("answers", &self.answers.name())
            .finish()
    }
}

impl MoveSubmissionProtocol {
    /// Combines a move strategy with an answer provider.
    pub fn new(strategy: Arc<dyn MoveStrategy>, answers: Arc<dyn AnswerProvider>) -> Self {
        Self { strategy, answers }
    }

    /// Name of the move strategy.
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Name of the answer provider.
    pub fn answer_provider_name(&self) -> &str {
        self.answers.name()
    }

    /// Answers the round, submits, and records the result in `state`.
    #[instrument(skip_all, fields(round = round.round_number, strategy = self.strategy.name()))]
    pub async fn execute(
        &self,
        transport: &dyn TournamentTransport,
        state: &mut SessionState,
        round: &RoundSnapshot,
    ) -> SubmissionOutcome {
        let Some(player_id) = state.player_id() else {
            warn!("Cannot submit for an unregistered player");
            return SubmissionOutcome::Skipped;
        };
        if state.submission(round.round_number).is_some() {
            return SubmissionOutcome::Skipped;
        }

        let question = round.question.clone().unwrap_or_default();
        let answer = self.produce_answer(&question).await;
        let context = MoveContext::new(
            round.round_number,
            round.question.clone(),
            answer.clone(),
            state.results().to_vec(),
            state.submissions().values().cloned().collect(),
        );
        let chosen_move = self.produce_move(&context).await;
        info!(answer = %answer, chosen_move = %chosen_move, "Submitting round");

        let request = SubmitRequest::new(player_id, round.round_number, answer.clone(), chosen_move);
        let outcome = match transport.submit(&request).await {
            Ok(reply) if reply.success => SubmissionOutcome::Accepted,
            Ok(reply) => {
                let message = reply.message.unwrap_or_else(|| "submission refused".to_string());
                if mentions_duplicate(&message) {
                    SubmissionOutcome::AlreadySubmitted
                } else {
                    SubmissionOutcome::Rejected {
                        code: None,
                        message,
                    }
                }
            }
            Err(err) if err.is_already_submitted() => SubmissionOutcome::AlreadySubmitted,
            Err(err) => match err.kind {
                TransportErrorKind::Server { code, message } => SubmissionOutcome::Rejected {
                    code: Some(code),
                    message,
                },
                TransportErrorKind::Network(reason) | TransportErrorKind::MalformedResponse(reason) => {
                    SubmissionOutcome::Deferred { reason }
                }
            },
        };

        let acknowledged = match &outcome {
            SubmissionOutcome::Accepted => {
                info!("✅ Submission accepted");
                Some(true)
            }
            SubmissionOutcome::AlreadySubmitted => {
                info!("Server already holds a submission for this round");
                Some(true)
            }
            SubmissionOutcome::Rejected { code, message } => {
                warn!(?code, message = %message, "Submission rejected, not retrying this round");
                Some(false)
            }
            SubmissionOutcome::Deferred { reason } => {
                warn!(reason = %reason, "Submission did not reach the server, will retry next poll");
                None
            }
            SubmissionOutcome::Skipped => None,
        };

        if let Some(acknowledged) = acknowledged {
            state.record_submission(SubmissionRecord {
                round_number: round.round_number,
                answer,
                chosen_move,
                submitted_at: Utc::now(),
                acknowledged,
            });
        }
        outcome
    }

    async fn produce_answer(&self, question: &str) -> String {
        match self.answers.answer(question).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!(provider = self.answers.name(), "Answer provider returned an empty answer");
                FALLBACK_ANSWER.to_string()
            }
            Err(e) => {
                warn!(provider = self.answers.name(), error = %e, "Answer provider failed");
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    async fn produce_move(&self, context: &MoveContext) -> Move {
        match self.strategy.choose(context).await {
            Ok(chosen) => chosen,
            Err(e) => {
                warn!(
                    strategy = self.strategy.name(),
                    error = %e,
                    fallback = %DEFAULT_MOVE,
                    "InvalidMoveFromStrategy, using default move"
                );
                DEFAULT_MOVE
            }
        }
    }
}
