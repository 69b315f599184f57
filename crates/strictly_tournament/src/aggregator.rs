//! Absorbs revealed round results into the session.

use crate::error::TransportError;
use crate::session::SessionState;
use crate::transport::TournamentTransport;
use crate::wire::results_from_wire;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// How a run ended, as far as the results tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Outcome {
    /// The tournament finished with this player still in it.
    TournamentCompleted,
    /// The player was knocked out.
    Eliminated,
    /// The operator stopped the run.
    Cancelled,
    /// A bounded run used up its polls.
    PollLimitReached,
}

/// Merges server results into session state.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Fetches results and appends rounds not seen before.
    ///
    /// Returns how many new rounds were absorbed. A failed fetch leaves the
    /// state untouched.
    #[instrument(skip_all, fields(player_id = ?state.player_id()))]
    pub async fn refresh(
        transport: &dyn TournamentTransport,
        state: &mut SessionState,
    ) -> Result<usize, TransportError> {
        let Some(player_id) = state.player_id() else {
            warn!("Cannot fetch results for an unregistered player");
            return Ok(0);
        };
        let fetched = results_from_wire(transport.results(player_id).await?)?;
        if fetched.len() < state.results().len() {
            warn!(
                fetched = fetched.len(),
                known = state.results().len(),
                "Server returned fewer results than already absorbed"
            );
        }
        let added = state.absorb_results(fetched);
        for result in &added {
            info!(
                round = result.round_number,
                score = result.score,
                answer_correct = result.answer_correct,
                move_used = ?result.move_used,
                total_score = state.total_score(),
                "🎉 Round completed"
            );
        }
        Ok(added.len())
    }

    /// Fetches results one last time and logs the final standings.
    #[instrument(skip_all, fields(player_id = ?state.player_id()))]
    pub async fn finalize(
        transport: &dyn TournamentTransport,
        state: &mut SessionState,
    ) -> Result<usize, TransportError> {
        info!("Fetching final results");
        let added = Self::refresh(transport, state).await?;
        if state.results().is_empty() {
            info!("No results available");
        }
        for result in state.results() {
            info!(
                round = result.round_number,
                score = result.score,
                answer_correct = result.answer_correct,
                move_used = ?result.move_used,
                "Final result"
            );
        }
        info!(
            total_score = state.total_score(),
            rounds = state.results().len(),
            eliminated = state.eliminated(),
            "🏁 Final results"
        );
        Ok(added)
    }

    /// Classifies a state whose poll loop has stopped.
    ///
    /// Returns `None` while the session is still running or was stopped for
    /// a reason the state does not record.
    pub fn outcome(state: &SessionState) -> Option<Outcome> {
        if state.running() {
            None
        } else if state.eliminated() {
            Some(Outcome::Eliminated)
        } else if state.tournament_completed() {
            Some(Outcome::TournamentCompleted)
        } else {
            None
        }
    }
}
