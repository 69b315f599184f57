//! Domain value types for tournament participation.

use crate::error::UnknownPhase;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::instrument;

/// Server-issued player identifier.
pub type PlayerId = i64;

/// One-based round number.
pub type RoundNumber = u32;

/// Who this client plays as.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Display name given at registration.
    name: String,
    /// Id issued by the server, unset until registration succeeds.
    player_id: Option<PlayerId>,
}

impl PlayerIdentity {
    /// Creates an identity that has not been registered yet.
    #[instrument(skip(name))]
    pub fn unregistered(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            player_id: None,
        }
    }

    /// Creates an identity for a server-issued id.
    #[instrument(skip(name))]
    pub fn registered(name: impl Into<String>, player_id: PlayerId) -> Self {
        Self {
            name: name.into(),
            player_id: Some(player_id),
        }
    }
}

/// A phase code as it appears on the wire: numeric or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseCode {
    /// Numeric enum value.
    Code(i64),
    /// Enum member name.
    Name(String),
}

impl std::fmt::Display for PhaseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Tournament-wide phase, as last observed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum TournamentPhase {
    /// Registration is open; not enough players yet.
    #[strum(to_string = "WaitingForPlayers", serialize = "Pending")]
    WaitingForPlayers,
    /// Rounds are being played.
    InProgress,
    /// The bracket is decided.
    Completed,
}

impl TournamentPhase {
    /// Parses the wire representation (`0`, `1`, `2` or a member name).
    pub fn from_wire(code: &PhaseCode) -> Result<Self, UnknownPhase> {
        let unknown = || UnknownPhase {
            domain: "tournament",
            value: code.to_string(),
        };
        match code {
            PhaseCode::Code(0) => Ok(Self::WaitingForPlayers),
            PhaseCode::Code(1) => Ok(Self::InProgress),
            PhaseCode::Code(2) => Ok(Self::Completed),
            PhaseCode::Code(_) => Err(unknown()),
            PhaseCode::Name(name) => name.parse().map_err(|_| unknown()),
        }
    }

    /// Wire code for this phase.
    pub fn code(self) -> i64 {
        match self {
            Self::WaitingForPlayers => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }
}

/// Phase of the current round.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum RoundPhase {
    /// No round has been opened yet.
    #[strum(to_string = "NotStarted", serialize = "Not Started")]
    NotStarted,
    /// The round exists but is not taking answers.
    Pending,
    /// Answers and moves are being collected.
    InProgress,
    /// Scores for the round have been published.
    ResultsAvailable,
    /// The round is closed.
    Completed,
}

impl RoundPhase {
    /// Parses the wire representation. An absent value means no round yet.
    ///
    /// Codes: `0` pending, `1` in progress, `2` completed, `3` results available.
    pub fn from_wire(code: Option<&PhaseCode>) -> Result<Self, UnknownPhase> {
        let Some(code) = code else {
            return Ok(Self::NotStarted);
        };
        let unknown = || UnknownPhase {
            domain: "round",
            value: code.to_string(),
        };
        match code {
            PhaseCode::Code(0) => Ok(Self::Pending),
            PhaseCode::Code(1) => Ok(Self::InProgress),
            PhaseCode::Code(2) => Ok(Self::Completed),
            PhaseCode::Code(3) => Ok(Self::ResultsAvailable),
            PhaseCode::Code(_) => Err(unknown()),
            PhaseCode::Name(name) => name.parse().map_err(|_| unknown()),
        }
    }

    /// Wire code for this phase, `None` for [`RoundPhase::NotStarted`].
    pub fn code(self) -> Option<i64> {
        match self {
            Self::NotStarted => None,
            Self::Pending => Some(0),
            Self::InProgress => Some(1),
            Self::Completed => Some(2),
            Self::ResultsAvailable => Some(3),
        }
    }
}

/// A Rock-Paper-Scissors move.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Move {
    /// Beats scissors.
    Rock,
    /// Beats rock.
    Paper,
    /// Beats paper.
    Scissors,
}

impl Move {
    /// Wire code: `0` rock, `1` paper, `2` scissors.
    pub fn code(self) -> u8 {
        match self {
            Self::Rock => 0,
            Self::Paper => 1,
            Self::Scissors => 2,
        }
    }

    /// Decodes a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Rock),
            1 => Some(Self::Paper),
            2 => Some(Self::Scissors),
            _ => None,
        }
    }

    /// The move that beats this one.
    pub fn beaten_by(self) -> Self {
        match self {
            Self::Rock => Self::Paper,
            Self::Paper => Self::Scissors,
            Self::Scissors => Self::Rock,
        }
    }
}

/// The round as seen in one poll. Replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Round number reported by the server.
    pub round_number: RoundNumber,
    /// Round phase.
    pub phase: RoundPhase,
    /// Question text, present while the round is open.
    pub question: Option<String>,
    /// Whether the server currently accepts a submission from this player.
    pub can_submit: bool,
}

/// One validated status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Tournament phase.
    pub tournament_phase: TournamentPhase,
    /// Current round.
    pub round: RoundSnapshot,
    /// Whether the server reports this player as knocked out.
    pub eliminated: bool,
}

/// A submission this client made for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Round the submission belongs to.
    pub round_number: RoundNumber,
    /// Answer text sent.
    pub answer: String,
    /// Move sent.
    pub chosen_move: Move,
    /// When the submission was sent.
    pub submitted_at: DateTime<Utc>,
    /// Whether the server accepted (or had already accepted) it.
    pub acknowledged: bool,
}

/// Server-revealed outcome of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct RoundResult {
    /// Round number.
    pub round_number: RoundNumber,
    /// Points earned in the round.
    pub score: i64,
    /// Whether the answer was judged correct.
    pub answer_correct: bool,
    /// Move the server recorded, if any.
    pub move_used: Option<Move>,
}
