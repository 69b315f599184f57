//! Shared test transports: a scripted one and a small simulated tournament.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strictly_tournament::{
    MoveContext, MoveStrategy, PhaseCode, PlayerId, PollSettings, RegisterRequest,
    RegisterResponse, ResultEntry, RoundNumber, StatusResponse, StrategyError, SubmitRequest,
    SubmitResponse, TournamentTransport, TransportError, TransportErrorKind, Move,
};

/// Fast settings for tests that run against real time.
pub fn fast_settings() -> PollSettings {
    PollSettings::new(Duration::from_millis(5))
        .with_request_timeout(Duration::from_secs(2))
        .with_max_consecutive_failures(5)
}

/// An open round asking `question`.
pub fn open_status(round: RoundNumber, question: &str) -> StatusResponse {
    StatusResponse {
        tournament_status: PhaseCode::Code(1),
        current_round: round,
        current_round_status: Some(PhaseCode::Code(1)),
        current_question: Some(question.to_string()),
        can_submit: true,
        is_active: Some(true),
    }
}

/// A finished tournament.
pub fn completed_status(round: RoundNumber) -> StatusResponse {
    StatusResponse {
        tournament_status: PhaseCode::Code(2),
        current_round: round,
        current_round_status: Some(PhaseCode::Code(2)),
        current_question: None,
        can_submit: false,
        is_active: Some(true),
    }
}

/// A result entry.
pub fn entry(round: RoundNumber, score: i64) -> ResultEntry {
    ResultEntry {
        round_number: round,
        score,
        answer_correct: score > 0,
        move_code: Some(0),
    }
}

/// Replays queued responses and records what it was sent.
///
/// An exhausted status queue answers with network errors. Submissions succeed
/// unless a reply was queued. Results repeat whatever was last set.
#[derive(Default)]
pub struct ScriptedTransport {
    statuses: Mutex<VecDeque<Result<StatusResponse, TransportError>>>,
    submit_replies: Mutex<VecDeque<Result<SubmitResponse, TransportError>>>,
    results: Mutex<Option<Result<Vec<ResultEntry>, TransportError>>>,
    submitted: Mutex<Vec<SubmitRequest>>,
    status_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: StatusResponse) -> &Self {
        self.statuses.lock().unwrap().push_back(Ok(status));
        self
    }

    pub fn push_status_error(&self, error: TransportError) -> &Self {
        self.statuses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn push_submit_reply(&self, reply: Result<SubmitResponse, TransportError>) -> &Self {
        self.submit_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn set_results(&self, results: Vec<ResultEntry>) {
        *self.results.lock().unwrap() = Some(Ok(results));
    }

    pub fn fail_results(&self, error: TransportError) {
        *self.results.lock().unwrap() = Some(Err(error));
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TournamentTransport for ScriptedTransport {
    async fn register(&self, name: &str) -> Result<RegisterResponse, TransportError> {
        Ok(RegisterResponse {
            player_id: 1,
            message: Some(format!("Welcome {}", name)),
        })
    }

    async fn status(&self, _player_id: PlayerId) -> Result<StatusResponse, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("script exhausted")))
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        self.submitted.lock().unwrap().push(request.clone());
        self.submit_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SubmitResponse {
                success: true,
                message: None,
            }))
    }

    async fn results(&self, _player_id: PlayerId) -> Result<Vec<ResultEntry>, TransportError> {
        self.results.lock().unwrap().clone().unwrap_or(Ok(Vec::new()))
    }
}

/// A tournament whose clock advances with every status call of a player.
///
/// Each round spans three polls: two open for submission, one revealing the
/// round's result. After the last round the tournament reports completed.
/// A correct answer (`2n` for round `n`) scores 2, a wrong one 1, none 0.
pub struct SimulatedTournament {
    total_rounds: RoundNumber,
    eliminate_after: Option<RoundNumber>,
    inner: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    next_id: PlayerId,
    names: HashMap<PlayerId, String>,
    clock: HashMap<PlayerId, u32>,
    revealed: HashMap<PlayerId, RoundNumber>,
    submissions: HashMap<(PlayerId, RoundNumber), SubmitRequest>,
    duplicates: usize,
}

impl SimulatedTournament {
    pub fn new(total_rounds: RoundNumber) -> Self {
        Self {
            total_rounds,
            eliminate_after: None,
            inner: Mutex::new(SimState {
                next_id: 100,
                ..SimState::default()
            }),
        }
    }

    /// Knocks every player out once this round's result is revealed.
    pub fn with_elimination_after(mut self, round: RoundNumber) -> Self {
        self.eliminate_after = Some(round);
        self
    }

    /// Submissions the server accepted, ordered by round.
    pub fn accepted(&self, player_id: PlayerId) -> Vec<SubmitRequest> {
        let inner = self.inner.lock().unwrap();
        let mut accepted: Vec<_> = inner
            .submissions
            .iter()
            .filter(|((id, _), _)| *id == player_id)
            .map(|(_, request)| request.clone())
            .collect();
        accepted.sort_by_key(|request| request.round_number);
        accepted
    }

    /// Submissions refused as duplicates.
    pub fn duplicates(&self) -> usize {
        self.inner.lock().unwrap().duplicates
    }

    pub fn expected_answer(round: RoundNumber) -> String {
        (2 * round).to_string()
    }

    fn question(round: RoundNumber) -> String {
        format!("What is {} + {}?", round, round)
    }

    fn unknown(player_id: PlayerId) -> TransportError {
        TransportError::server(404, format!("Player {} not found", player_id))
    }
}

#[async_trait]
impl TournamentTransport for SimulatedTournament {
    async fn register(&self, name: &str) -> Result<RegisterResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let player_id = inner.next_id;
        inner.names.insert(player_id, name.to_string());
        inner.clock.insert(player_id, 0);
        Ok(RegisterResponse {
            player_id,
            message: Some("Registered".to_string()),
        })
    }

    async fn status(&self, player_id: PlayerId) -> Result<StatusResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let tick = *inner
            .clock
            .get(&player_id)
            .ok_or_else(|| Self::unknown(player_id))?;
        inner.clock.insert(player_id, tick + 1);

        let round = tick / 3 + 1;
        if round > self.total_rounds {
            inner.revealed.insert(player_id, self.total_rounds);
            return Ok(completed_status(self.total_rounds));
        }

        let revealed = inner.revealed.get(&player_id).copied().unwrap_or(0);
        let is_active = self.eliminate_after.is_none_or(|last| revealed < last);
        if tick % 3 == 2 {
            inner.revealed.insert(player_id, round);
            return Ok(StatusResponse {
                tournament_status: PhaseCode::Code(1),
                current_round: round,
                current_round_status: Some(PhaseCode::Code(3)),
                current_question: None,
                can_submit: false,
                is_active: Some(is_active),
            });
        }

        let submitted = inner.submissions.contains_key(&(player_id, round));
        Ok(StatusResponse {
            tournament_status: PhaseCode::Code(1),
            current_round: round,
            current_round_status: Some(PhaseCode::Code(1)),
            current_question: Some(Self::question(round)),
            can_submit: is_active && !submitted,
            is_active: Some(is_active),
        })
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.names.contains_key(&request.player_id) {
            return Err(Self::unknown(request.player_id));
        }
        let key = (request.player_id, request.round_number);
        if inner.submissions.contains_key(&key) {
            inner.duplicates += 1;
            return Ok(SubmitResponse {
                success: false,
                message: Some("Answer already submitted for this round".to_string()),
            });
        }
        inner.submissions.insert(key, request.clone());
        Ok(SubmitResponse {
            success: true,
            message: Some("Submitted".to_string()),
        })
    }

    async fn results(&self, player_id: PlayerId) -> Result<Vec<ResultEntry>, TransportError> {
        let inner = self.inner.lock().unwrap();
        if !inner.names.contains_key(&player_id) {
            return Err(Self::unknown(player_id));
        }
        let revealed = inner.revealed.get(&player_id).copied().unwrap_or(0);
        Ok((1..=revealed)
            .map(|round| match inner.submissions.get(&(player_id, round)) {
                Some(request) => {
                    let correct = request.answer == Self::expected_answer(round);
                    ResultEntry {
                        round_number: round,
                        score: if correct { 2 } else { 1 },
                        answer_correct: correct,
                        move_code: Some(request.move_code),
                    }
                }
                None => ResultEntry {
                    round_number: round,
                    score: 0,
                    answer_correct: false,
                    move_code: None,
                },
            })
            .collect())
    }
}

/// Strategy that waits forever, like an operator who never answers.
pub struct StallingStrategy;

#[async_trait]
impl MoveStrategy for StallingStrategy {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn choose(&self, _context: &MoveContext) -> Result<Move, StrategyError> {
        std::future::pending().await
    }
}

/// Strategy that never produces a move.
pub struct BrokenStrategy;

#[async_trait]
impl MoveStrategy for BrokenStrategy {
    fn name(&self) -> &str {
        "broken"
    }

    async fn choose(&self, _context: &MoveContext) -> Result<Move, StrategyError> {
        Err(StrategyError::new("no idea"))
    }
}

/// Serves `transport` over the tournament HTTP API on an ephemeral port.
///
/// Returns the base URL.
pub async fn serve_api(transport: Arc<dyn TournamentTransport>) -> String {
    let app = Router::new()
        .route("/api/player/register", post(register))
        .route("/api/player/submit-answer", post(submit))
        .route("/api/player/{id}/status", get(status))
        .route("/api/player/{id}/results", get(results))
        .with_state(transport);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server failed");
    });
    format!("http://{}", addr)
}

type Api = State<Arc<dyn TournamentTransport>>;

async fn register(State(api): Api, Json(request): Json<RegisterRequest>) -> Response {
    reply(api.register(&request.name).await)
}

async fn submit(State(api): Api, Json(request): Json<SubmitRequest>) -> Response {
    reply(api.submit(&request).await)
}

async fn status(State(api): Api, Path(id): Path<PlayerId>) -> Response {
    reply(api.status(id).await)
}

async fn results(State(api): Api, Path(id): Path<PlayerId>) -> Response {
    reply(api.results(id).await)
}

fn reply<T: serde::Serialize>(result: Result<T, TransportError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => match e.kind {
            TransportErrorKind::Server { code, message } => (
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(serde_json::json!({ "message": message })),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": other.to_string() })),
            )
                .into_response(),
        },
    }
}

/// Collects the distinct rounds of a submission list.
pub fn rounds(requests: &[SubmitRequest]) -> HashSet<RoundNumber> {
    requests.iter().map(|request| request.round_number).collect()
}
