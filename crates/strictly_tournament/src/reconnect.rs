//! Rebuilding a session from nothing but a player id.

use crate::error::SessionError;
use crate::session::SessionState;
use crate::transport::TournamentTransport;
use crate::types::{PlayerId, PlayerIdentity, StatusSnapshot};
use crate::wire::results_from_wire;
use tracing::{info, instrument, warn};

/// Reconstructs the session for `player_id` from the server's view.
///
/// The status call must succeed; it proves the player exists. A failing
/// results call only leaves the log empty for the first poll to fill. The
/// returned state is not running and carries no submissions.
#[instrument(skip(transport, name))]
pub async fn reconnect(
    transport: &dyn TournamentTransport,
    player_id: PlayerId,
    name: Option<String>,
) -> Result<SessionState, SessionError> {
    info!("Reconnecting to tournament");
    let unknown = |reason: String| SessionError::UnknownPlayer { player_id, reason };

    let response = transport
        .status(player_id)
        .await
        .map_err(|e| unknown(e.to_string()))?;
    let snapshot = StatusSnapshot::try_from(response).map_err(|e| unknown(e.to_string()))?;

    let name = name.unwrap_or_else(|| format!("Player {}", player_id));
    let mut state = SessionState::new(PlayerIdentity::registered(name, player_id));
    state.observe(&snapshot);

    match transport.results(player_id).await {
        Ok(entries) => match results_from_wire(entries) {
            Ok(results) => {
                state.absorb_results(results);
            }
            Err(e) => warn!(error = %e, "Ignoring malformed results during reconnection"),
        },
        Err(e) => warn!(error = %e, "Could not fetch results during reconnection"),
    }

    info!(
        tournament = %snapshot.tournament_phase,
        round = snapshot.round.round_number,
        results = state.results().len(),
        last_completed_round = state.last_completed_round(),
        "Reconnected"
    );
    Ok(state)
}
