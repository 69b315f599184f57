//! Decision, submission, and aggregation steps driven by hand.

mod common;

use common::{ScriptedTransport, entry, open_status};
use std::sync::Arc;
use strictly_tournament::{
    Action, FixedStrategy, Move, MoveSubmissionProtocol, PlayerIdentity, ResultAggregator,
    SessionState, StaticAnswerProvider, StatusSnapshot, SubmissionOutcome, TransportError,
    transition,
};

fn protocol() -> MoveSubmissionProtocol {
    MoveSubmissionProtocol::new(
        Arc::new(FixedStrategy::new(Move::Rock)),
        Arc::new(StaticAnswerProvider::new("4")),
    )
}

#[tokio::test]
async fn test_open_round_is_submitted_exactly_once() {
    let transport = ScriptedTransport::new();
    let state = SessionState::new(PlayerIdentity::registered("alice", 1));
    let snapshot = StatusSnapshot::try_from(open_status(1, "2+2?")).expect("known phases");

    let first = transition(&state, &snapshot);
    let Some(Action::SubmitMove(round)) = first.actions.first().cloned() else {
        panic!("expected a submission, got {:?}", first.actions);
    };
    assert_eq!(round.round_number, 1);

    let mut state = first.next;
    let outcome = protocol().execute(&transport, &mut state, &round).await;
    assert_eq!(outcome, SubmissionOutcome::Accepted);

    let record = state.submission(1).expect("round 1 recorded");
    assert!(record.acknowledged);
    assert_eq!(record.answer, "4");
    assert_eq!(record.chosen_move, Move::Rock);

    let again = transition(&state, &snapshot);
    assert!(!again.submits());
    assert_eq!(again.actions, vec![Action::FetchResults]);

    let repeat = protocol().execute(&transport, &mut state, &round).await;
    assert_eq!(repeat, SubmissionOutcome::Skipped);
    assert_eq!(transport.submitted().len(), 1);
}

#[tokio::test]
async fn test_refused_submission_body_is_a_rejection() {
    let transport = ScriptedTransport::new();
    transport.push_submit_reply(Ok(strictly_tournament::SubmitResponse {
        success: false,
        message: Some("Round is not accepting answers".to_string()),
    }));
    let mut state = SessionState::new(PlayerIdentity::registered("alice", 1));
    let snapshot = StatusSnapshot::try_from(open_status(1, "2+2?")).expect("known phases");

    let outcome = protocol().execute(&transport, &mut state, &snapshot.round).await;
    assert!(matches!(outcome, SubmissionOutcome::Rejected { code: None, .. }));
    assert!(!state.submission(1).expect("recorded").acknowledged);
    assert!(!transition(&state, &snapshot).submits());
}

#[tokio::test]
async fn test_results_accumulate_by_round() {
    let transport = ScriptedTransport::new();
    let mut state = SessionState::new(PlayerIdentity::registered("alice", 1));

    transport.set_results(vec![entry(1, 2)]);
    let added = ResultAggregator::refresh(&transport, &mut state)
        .await
        .expect("results fetched");
    assert_eq!(added, 1);

    transport.set_results(vec![entry(1, 2), entry(2, 1)]);
    let added = ResultAggregator::refresh(&transport, &mut state)
        .await
        .expect("results fetched");
    assert_eq!(added, 1);

    assert_eq!(state.results().len(), 2);
    assert_eq!(state.total_score(), 3);
    assert_eq!(state.last_completed_round(), 2);
}

#[tokio::test]
async fn test_results_never_shrink() {
    let transport = ScriptedTransport::new();
    let mut state = SessionState::new(PlayerIdentity::registered("alice", 1));
    transport.set_results(vec![entry(1, 2), entry(2, 1)]);
    ResultAggregator::refresh(&transport, &mut state)
        .await
        .expect("results fetched");

    transport.set_results(vec![entry(2, 9)]);
    ResultAggregator::refresh(&transport, &mut state)
        .await
        .expect("results fetched");
    transport.set_results(Vec::new());
    ResultAggregator::finalize(&transport, &mut state)
        .await
        .expect("results fetched");

    assert_eq!(state.results().len(), 2);
    assert_eq!(state.results()[1].score, 1);
    assert_eq!(state.total_score(), 3);
    assert_eq!(state.last_completed_round(), 2);
}

#[tokio::test]
async fn test_failed_results_fetch_leaves_state_untouched() {
    let transport = ScriptedTransport::new();
    let mut state = SessionState::new(PlayerIdentity::registered("alice", 1));
    transport.set_results(vec![entry(1, 2)]);
    ResultAggregator::refresh(&transport, &mut state)
        .await
        .expect("results fetched");
    let before = state.clone();

    transport.fail_results(TransportError::network("connection reset"));
    assert!(ResultAggregator::refresh(&transport, &mut state).await.is_err());
    assert_eq!(state, before);
}

#[tokio::test]
async fn test_unknown_move_code_is_malformed() {
    let transport = ScriptedTransport::new();
    let mut state = SessionState::new(PlayerIdentity::registered("alice", 1));
    let mut bad = entry(1, 2);
    bad.move_code = Some(7);
    transport.set_results(vec![bad]);

    let err = ResultAggregator::refresh(&transport, &mut state)
        .await
        .expect_err("move 7 does not exist");
    assert!(matches!(
        err.kind,
        strictly_tournament::TransportErrorKind::MalformedResponse(_)
    ));
    assert!(state.results().is_empty());
}
