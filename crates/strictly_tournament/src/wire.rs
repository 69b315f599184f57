//! Fixed-schema request and response bodies for the tournament server API.
//!
//! Responses are parsed into these structs first and only then converted into
//! domain types, so a missing required field surfaces as a malformed response
//! instead of a silent default.

use crate::error::{TransportError, UnknownPhase};
use crate::types::{
    Move, PhaseCode, PlayerId, RoundNumber, RoundPhase, RoundResult, RoundSnapshot,
    StatusSnapshot, TournamentPhase,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/player/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest {
    /// Requested player name.
    pub name: String,
}

/// Successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Id assigned by the server.
    pub player_id: PlayerId,
    /// Informational message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `GET /api/player/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Tournament phase code.
    pub tournament_status: PhaseCode,
    /// Current round number.
    pub current_round: RoundNumber,
    /// Round phase code; absent or null before the first round opens.
    #[serde(default)]
    pub current_round_status: Option<PhaseCode>,
    /// Question for the current round.
    #[serde(default)]
    pub current_question: Option<String>,
    /// Whether this player may submit now.
    pub can_submit: bool,
    /// Whether this player is still in the bracket. Absent means active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl TryFrom<StatusResponse> for StatusSnapshot {
    type Error = UnknownPhase;

    fn try_from(response: StatusResponse) -> Result<Self, Self::Error> {
        let tournament_phase = TournamentPhase::from_wire(&response.tournament_status)?;
        let phase = RoundPhase::from_wire(response.current_round_status.as_ref())?;
        let question = response
            .current_question
            .filter(|question| !question.trim().is_empty());
        Ok(Self {
            tournament_phase,
            round: RoundSnapshot {
                round_number: response.current_round,
                phase,
                question,
                can_submit: response.can_submit,
            },
            eliminated: response.is_active == Some(false),
        })
    }
}

impl From<&StatusSnapshot> for StatusResponse {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            tournament_status: PhaseCode::Code(snapshot.tournament_phase.code()),
            current_round: snapshot.round.round_number,
            current_round_status: snapshot.round.phase.code().map(PhaseCode::Code),
            current_question: snapshot.round.question.clone(),
            can_submit: snapshot.round.can_submit,
            is_active: snapshot.eliminated.then_some(false),
        }
    }
}

/// Body of `POST /api/player/submit-answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitRequest {
    /// Submitting player.
    pub player_id: PlayerId,
    /// Round being answered.
    pub round_number: RoundNumber,
    /// Answer text.
    pub answer: String,
    /// Move code, see [`Move::code`].
    #[serde(rename = "Move")]
    pub move_code: u8,
}

impl SubmitRequest {
    /// Builds a request for a typed move.
    pub fn new(
        player_id: PlayerId,
        round_number: RoundNumber,
        answer: impl Into<String>,
        chosen_move: Move,
    ) -> Self {
        Self {
            player_id,
            round_number,
            answer: answer.into(),
            move_code: chosen_move.code(),
        }
    }
}

/// Reply to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Whether the server took the submission.
    pub success: bool,
    /// Explanation, mostly present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One element of `GET /api/player/{id}/results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    /// Round number.
    pub round_number: RoundNumber,
    /// Points earned.
    pub score: i64,
    /// Whether the answer was correct.
    pub answer_correct: bool,
    /// Move code the server recorded.
    #[serde(default, rename = "move")]
    pub move_code: Option<u8>,
}

impl TryFrom<ResultEntry> for RoundResult {
    type Error = TransportError;

    #[track_caller]
    fn try_from(entry: ResultEntry) -> Result<Self, Self::Error> {
        let move_used = match entry.move_code {
            None => None,
            Some(code) => Some(Move::from_code(code).ok_or_else(|| {
                TransportError::malformed(format!(
                    "round {} result has unknown move code {}",
                    entry.round_number, code
                ))
            })?),
        };
        Ok(RoundResult::new(
            entry.round_number,
            entry.score,
            entry.answer_correct,
            move_used,
        ))
    }
}

impl From<&RoundResult> for ResultEntry {
    fn from(result: &RoundResult) -> Self {
        Self {
            round_number: result.round_number,
            score: result.score,
            answer_correct: result.answer_correct,
            move_code: result.move_used.map(Move::code),
        }
    }
}

/// Validates a whole results payload.
pub fn results_from_wire(entries: Vec<ResultEntry>) -> Result<Vec<RoundResult>, TransportError> {
    entries.into_iter().map(RoundResult::try_from).collect()
}
