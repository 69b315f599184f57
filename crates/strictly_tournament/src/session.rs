//! The client's local view of its tournament participation.

use crate::types::{
    PlayerId, PlayerIdentity, RoundNumber, RoundResult, RoundSnapshot, StatusSnapshot,
    SubmissionRecord, TournamentPhase,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Everything one client believes about its participation.
///
/// Only the state machine, the result aggregator, and submission
/// reconciliation change it. Readers get clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    identity: PlayerIdentity,
    last_tournament_phase: Option<TournamentPhase>,
    last_round: Option<RoundSnapshot>,
    last_completed_round: RoundNumber,
    submissions: BTreeMap<RoundNumber, SubmissionRecord>,
    results: Vec<RoundResult>,
    running: bool,
    eliminated: bool,
}

impl SessionState {
    /// Creates an empty session for a freshly registered identity.
    #[instrument(fields(name = %identity.name()))]
    pub fn new(identity: PlayerIdentity) -> Self {
        debug!("Creating session state");
        Self {
            identity,
            last_tournament_phase: None,
            last_round: None,
            last_completed_round: 0,
            submissions: BTreeMap::new(),
            results: Vec::new(),
            running: false,
            eliminated: false,
        }
    }

    /// Player identity.
    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Server-issued player id, if registered.
    pub fn player_id(&self) -> Option<PlayerId> {
        *self.identity.player_id()
    }

    /// Last observed tournament phase.
    pub fn last_tournament_phase(&self) -> Option<TournamentPhase> {
        self.last_tournament_phase
    }

    /// Last observed round.
    pub fn last_round(&self) -> Option<&RoundSnapshot> {
        self.last_round.as_ref()
    }

    /// Highest round with a revealed result.
    pub fn last_completed_round(&self) -> RoundNumber {
        self.last_completed_round
    }

    /// Submissions keyed by round.
    pub fn submissions(&self) -> &BTreeMap<RoundNumber, SubmissionRecord> {
        &self.submissions
    }

    /// Submission for a round, if one was recorded.
    pub fn submission(&self, round: RoundNumber) -> Option<&SubmissionRecord> {
        self.submissions.get(&round)
    }

    /// Revealed results ordered by round.
    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    /// Whether the poll loop should keep going.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Whether the server reported this player as knocked out.
    pub fn eliminated(&self) -> bool {
        self.eliminated
    }

    /// Sum of all revealed round scores.
    pub fn total_score(&self) -> i64 {
        self.results.iter().map(|result| result.score).sum()
    }

    /// Whether the last observed tournament phase is terminal.
    pub fn tournament_completed(&self) -> bool {
        self.last_tournament_phase == Some(TournamentPhase::Completed)
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let phase = self
            .last_tournament_phase
            .map(|phase| phase.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let round = self
            .last_round
            .as_ref()
            .map(|round| format!("round {} ({})", round.round_number, round.phase))
            .unwrap_or_else(|| "no round yet".to_string());
        format!(
            "{} [{}]: tournament {}, {}, completed {} round(s), total score {}{}",
            self.identity.name(),
            self.player_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unregistered".to_string()),
            phase,
            round,
            self.last_completed_round,
            self.total_score(),
            if self.eliminated { ", eliminated" } else { "" },
        )
    }

    /// Flips `running` on. Only the poll scheduler calls this.
    pub(crate) fn start(&mut self) {
        if !self.running {
            info!(player_id = ?self.player_id(), "Session started");
            self.running = true;
        }
    }

    /// Flips `running` off.
    pub(crate) fn stop(&mut self, reason: &str) {
        if self.running {
            info!(player_id = ?self.player_id(), reason, "Session stopped");
            self.running = false;
        }
    }

    /// Records the server's elimination verdict.
    pub(crate) fn mark_eliminated(&mut self) {
        if !self.eliminated {
            warn!(player_id = ?self.player_id(), "Player eliminated");
            self.eliminated = true;
        }
    }

    /// Replaces the last observed phase and round with a fresh poll.
    pub(crate) fn observe(&mut self, snapshot: &StatusSnapshot) {
        self.last_tournament_phase = Some(snapshot.tournament_phase);
        self.last_round = Some(snapshot.round.clone());
    }

    /// Stores a submission unless one already exists for its round.
    ///
    /// Returns false when the round already had a record.
    pub(crate) fn record_submission(&mut self, record: SubmissionRecord) -> bool {
        if self.submissions.contains_key(&record.round_number) {
            debug!(round = record.round_number, "Submission already recorded");
            return false;
        }
        debug!(
            round = record.round_number,
            acknowledged = record.acknowledged,
            "Recording submission"
        );
        self.submissions.insert(record.round_number, record);
        true
    }

    /// Merges server results into the log.
    ///
    /// Unseen rounds are inserted in round order; rounds already present are
    /// left untouched whatever the server now says about them. Returns the
    /// newly added results.
    pub(crate) fn absorb_results(&mut self, fetched: Vec<RoundResult>) -> Vec<RoundResult> {
        let mut added = Vec::new();
        for result in fetched {
            match self
                .results
                .binary_search_by_key(&result.round_number, |known| known.round_number)
            {
                Ok(index) => {
                    if self.results[index] != result {
                        warn!(
                            round = result.round_number,
                            "Server changed a revealed result, keeping the original"
                        );
                    }
                }
                Err(index) => {
                    self.results.insert(index, result.clone());
                    added.push(result);
                }
            }
        }
        if let Some(highest) = self.results.last().map(|result| result.round_number) {
            self.last_completed_round = self.last_completed_round.max(highest);
        }
        added
    }
}
