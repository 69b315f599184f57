//! Pure decision logic for one poll cycle.

use crate::session::SessionState;
use crate::types::{RoundPhase, RoundSnapshot, StatusSnapshot, TournamentPhase};
use tracing::{debug, instrument};

/// Work the poll loop must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Answer the round's question and submit a move.
    SubmitMove(RoundSnapshot),
    /// Pull newly revealed round results.
    FetchResults,
    /// Pull and report the final standings.
    FetchFinalResults,
}

/// Result of feeding one snapshot to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the poll.
    pub next: SessionState,
    /// Actions to execute, in order.
    pub actions: Vec<Action>,
}

impl Transition {
    /// Whether the transition asks for a move submission.
    pub fn submits(&self) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, Action::SubmitMove(_)))
    }
}

/// Computes the next state and the actions for a freshly polled snapshot.
///
/// Rules, first match wins for the terminal ones:
/// 1. A round number below the last observed one is a stale poll and is
///    ignored entirely.
/// 2. A completed tournament stops the session and asks for final results.
/// 3. An eliminated player stops the session and asks for final results.
/// 4. An open round that accepts submissions and has a question, with
///    nothing recorded for it yet, asks for a submission.
/// 5. Every non-terminal poll asks for a results refresh.
#[instrument(skip(prev, snapshot), fields(
    round = snapshot.round.round_number,
    tournament = %snapshot.tournament_phase,
    phase = %snapshot.round.phase,
))]
pub fn transition(prev: &SessionState, snapshot: &StatusSnapshot) -> Transition {
    let terminal = snapshot.tournament_phase == TournamentPhase::Completed;

    // Completed is terminal and is honored even with a lower round number.
    if !terminal && is_stale(prev, snapshot) {
        debug!(
            last_round = prev.last_round().map(|r| r.round_number),
            "Ignoring stale status snapshot"
        );
        return Transition {
            next: prev.clone(),
            actions: Vec::new(),
        };
    }

    let mut next = prev.clone();
    next.observe(snapshot);

    if terminal {
        next.stop("tournament completed");
        return Transition {
            next,
            actions: vec![Action::FetchFinalResults],
        };
    }

    if snapshot.eliminated {
        next.mark_eliminated();
        next.stop("eliminated");
        return Transition {
            next,
            actions: vec![Action::FetchFinalResults],
        };
    }

    let mut actions = Vec::with_capacity(2);
    let round = &snapshot.round;
    if snapshot.tournament_phase == TournamentPhase::InProgress
        && round.phase == RoundPhase::InProgress
        && round.can_submit
        && round.question.is_some()
        && next.submission(round.round_number).is_none()
    {
        debug!("Round open for submission");
        actions.push(Action::SubmitMove(round.clone()));
    }
    actions.push(Action::FetchResults);

    Transition { next, actions }
}

fn is_stale(prev: &SessionState, snapshot: &StatusSnapshot) -> bool {
    prev.last_round()
        .is_some_and(|last| snapshot.round.round_number < last.round_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerIdentity, RoundResult};

    fn session() -> SessionState {
        let mut state = SessionState::new(PlayerIdentity::registered("alice", 42));
        state.start();
        state
    }

    fn open_round(round: u32, question: &str) -> StatusSnapshot {
        StatusSnapshot {
            tournament_phase: TournamentPhase::InProgress,
            round: RoundSnapshot {
                round_number: round,
                phase: RoundPhase::InProgress,
                question: Some(question.to_string()),
                can_submit: true,
            },
            eliminated: false,
        }
    }

    #[test]
    fn open_round_requests_submission_then_results() {
        let snapshot = open_round(1, "2+2?");
        let transition = transition(&session(), &snapshot);
        assert_eq!(
            transition.actions,
            vec![Action::SubmitMove(snapshot.round.clone()), Action::FetchResults]
        );
        assert_eq!(transition.next.last_round(), Some(&snapshot.round));
        assert!(transition.next.running());
    }

    #[test]
    fn waiting_for_players_only_refreshes_results() {
        let snapshot = StatusSnapshot {
            tournament_phase: TournamentPhase::WaitingForPlayers,
            round: RoundSnapshot {
                round_number: 1,
                phase: RoundPhase::NotStarted,
                question: None,
                can_submit: false,
            },
            eliminated: false,
        };
        let transition = transition(&session(), &snapshot);
        assert_eq!(transition.actions, vec![Action::FetchResults]);
    }

    #[test]
    fn round_without_question_is_not_submitted() {
        let mut snapshot = open_round(1, "ignored");
        snapshot.round.question = None;
        assert!(!transition(&session(), &snapshot).submits());
    }

    #[test]
    fn completed_tournament_stops_and_fetches_final_results() {
        let mut snapshot = open_round(3, "late");
        snapshot.tournament_phase = TournamentPhase::Completed;
        let transition = transition(&session(), &snapshot);
        assert_eq!(transition.actions, vec![Action::FetchFinalResults]);
        assert!(!transition.next.running());
        assert!(transition.next.tournament_completed());
    }

    #[test]
    fn elimination_stops_the_session() {
        let mut snapshot = open_round(2, "anything");
        snapshot.eliminated = true;
        let transition = transition(&session(), &snapshot);
        assert_eq!(transition.actions, vec![Action::FetchFinalResults]);
        assert!(!transition.next.running());
        assert!(transition.next.eliminated());
    }

    #[test]
    fn stale_round_number_is_ignored() {
        let mut state = session();
        state.absorb_results(vec![RoundResult::new(2, 1, true, None)]);
        let advanced = transition(&state, &open_round(3, "newer")).next;

        let stale = transition(&advanced, &open_round(2, "older"));
        assert!(stale.actions.is_empty());
        assert_eq!(stale.next, advanced);
        assert_eq!(stale.next.last_completed_round(), 2);
    }

    #[test]
    fn completed_tournament_with_lower_round_is_still_honored() {
        let state = transition(&session(), &open_round(3, "q")).next;
        let mut snapshot = open_round(1, "q");
        snapshot.tournament_phase = TournamentPhase::Completed;
        let transition = transition(&state, &snapshot);
        assert_eq!(transition.actions, vec![Action::FetchFinalResults]);
        assert!(!transition.next.running());
    }
}
