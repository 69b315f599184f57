//! HTTP front end for starting, watching, and stopping sessions.

use crate::aggregator::Outcome;
use crate::error::SessionError;
use crate::launcher::Launcher;
use crate::registry::{SessionRegistry, SessionStatus, SessionToken};
use crate::session::SessionState;
use crate::strategy::StrategyKind;
use crate::types::PlayerId;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    launcher: Launcher,
    registry: SessionRegistry,
}

impl AppState {
    /// Combines a launcher with a registry.
    pub fn new(launcher: Launcher, registry: SessionRegistry) -> Self {
        Self { launcher, registry }
    }

    /// Session registry backing the routes.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    /// Player name to register.
    pub name: String,
    /// Built-in strategy, random if absent.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
}

/// Body of `POST /sessions/reconnect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectRequest {
    /// Existing player id.
    pub player_id: PlayerId,
    /// Display name, `Player {id}` if absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Built-in strategy, random if absent.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
}

/// A session as the front end reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Registry token.
    pub token: SessionToken,
    /// Latest committed state.
    pub state: SessionState,
    /// Sum of revealed scores.
    pub total_score: i64,
    /// Whether the poll task has ended.
    pub finished: bool,
    /// How a finished run ended.
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Terminal error of a failed run, such as a lost connection.
    #[serde(default)]
    pub error: Option<String>,
}

impl SessionView {
    fn new(token: SessionToken, status: SessionStatus) -> Self {
        let SessionStatus { state, end } = status;
        Self {
            token,
            total_score: state.total_score(),
            finished: end.is_some(),
            outcome: end.as_ref().and_then(|end| end.outcome()),
            error: end.as_ref().and_then(|end| end.error().map(str::to_string)),
            state,
        }
    }
}

/// Error body returned by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// What went wrong.
    pub error: String,
}

/// Route failure mapped to a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(token: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("no session {}", token),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::UnknownPlayer { .. } => StatusCode::NOT_FOUND,
            SessionError::Registration { .. } | SessionError::ConnectionLost { .. } => {
                StatusCode::BAD_GATEWAY
            }
            SessionError::NotRegistered { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions).post(start_session))
        .route("/sessions/reconnect", post(reconnect_session))
        .route("/sessions/{token}", get(get_session).delete(stop_session))
        .with_state(state)
}

#[instrument(skip(state))]
async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionToken>> {
    Json(state.registry.tokens().await)
}

#[instrument(skip(state, request), fields(name = %request.name))]
async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = state.launcher.register(&request.name).await?;
    let scheduler = state
        .launcher
        .scheduler_for(session, request.strategy.unwrap_or_default());
    let token = state.registry.insert(scheduler).await;
    info!(token = %token, "Started session");
    let view = view(&state.registry, &token).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, request), fields(player_id = request.player_id))]
async fn reconnect_session(
    State(state): State<AppState>,
    Json(request): Json<ReconnectRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = state
        .launcher
        .reconnect(request.player_id, request.name)
        .await?;
    let scheduler = state
        .launcher
        .scheduler_for(session, request.strategy.unwrap_or_default());
    let token = state.registry.insert(scheduler).await;
    info!(token = %token, "Resumed session");
    let view = view(&state.registry, &token).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(token): Path<SessionToken>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(view(&state.registry, &token).await?))
}

#[instrument(skip(state))]
async fn stop_session(
    State(state): State<AppState>,
    Path(token): Path<SessionToken>,
) -> Result<Json<SessionView>, ApiError> {
    let Some(last) = state.registry.remove(&token).await else {
        warn!("Stop requested for unknown session");
        return Err(ApiError::not_found(&token));
    };
    Ok(Json(SessionView::new(token, last)))
}

async fn view(registry: &SessionRegistry, token: &str) -> Result<SessionView, ApiError> {
    let status = registry
        .status(token)
        .await
        .ok_or_else(|| ApiError::not_found(token))?;
    Ok(SessionView::new(token.to_string(), status))
}
