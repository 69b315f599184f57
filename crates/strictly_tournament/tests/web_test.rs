//! Session front end routes exercised without a socket.

mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use common::{ScriptedTransport, SimulatedTournament, fast_settings, serve_api};
use std::sync::Arc;
use std::time::Duration;
use strictly_tournament::{
    AppState, ArithmeticAnswerProvider, ErrorBody, HttpTournamentClient, Launcher, Outcome,
    SessionRegistry, SessionToken, SessionView, TournamentTransport, router,
};
use tower::ServiceExt;

fn build_app(transport: Arc<dyn TournamentTransport>) -> (Router, SessionRegistry) {
    build_app_with(transport, SessionRegistry::new())
}

fn build_app_with(
    transport: Arc<dyn TournamentTransport>,
    registry: SessionRegistry,
) -> (Router, SessionRegistry) {
    let launcher = Launcher::new(
        transport,
        fast_settings(),
        Arc::new(ArithmeticAnswerProvider::new("unknown")),
    );
    (router(AppState::new(launcher, registry.clone())), registry)
}

async fn start(app: &Router, name: &str) -> SessionView {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/sessions",
            serde_json::json!({ "name": name }),
        ))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

async fn wait_until_finished(app: &Router, token: &str) -> SessionView {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(empty_request("GET", &format!("/sessions/{}", token)))
            .await
            .expect("request handled");
        assert_eq!(response.status(), StatusCode::OK);
        let view: SessionView = read_json(response).await;
        if view.finished {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {} never finished", token);
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not the expected JSON")
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (app, registry) = build_app(Arc::new(SimulatedTournament::new(1_000)));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/sessions",
            serde_json::json!({ "name": "alice", "strategy": "cycle" }),
        ))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: SessionView = read_json(response).await;
    assert_eq!(created.token.len(), 16);
    assert_eq!(created.state.identity().name(), "alice");
    assert!(created.state.player_id().is_some());

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/sessions"))
        .await
        .expect("request handled");
    let tokens: Vec<SessionToken> = read_json(response).await;
    assert_eq!(tokens, vec![created.token.clone()]);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/sessions/{}", created.token)))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::OK);
    let live: SessionView = read_json(response).await;
    assert!(live.state.running());
    assert!(!live.finished);
    assert!(live.state.last_round().is_some());

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/sessions/{}", created.token)))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::OK);
    let stopped: SessionView = read_json(response).await;
    assert!(stopped.finished);
    assert!(!stopped.state.running());

    let response = app
        .oneshot(empty_request("GET", &format!("/sessions/{}", created.token)))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(registry.tokens().await.is_empty());
}

#[tokio::test]
async fn test_reconnect_unknown_player_is_not_found() {
    let (app, registry) = build_app(Arc::new(SimulatedTournament::new(3)));

    let response = app
        .oneshot(json_request(
            "POST",
            "/sessions/reconnect",
            serde_json::json!({ "player_id": 9999 }),
        ))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = read_json(response).await;
    assert!(body.error.contains("9999"));
    assert!(registry.tokens().await.is_empty());
}

#[tokio::test]
async fn test_reconnect_known_player_resumes() {
    let sim = Arc::new(SimulatedTournament::new(1_000));
    let player_id = sim.register("bob").await.expect("registered").player_id;
    let (app, registry) = build_app(sim);

    let response = app
        .oneshot(json_request(
            "POST",
            "/sessions/reconnect",
            serde_json::json!({ "player_id": player_id, "name": "bob" }),
        ))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::CREATED);
    let resumed: SessionView = read_json(response).await;
    assert_eq!(resumed.state.player_id(), Some(player_id));
    assert_eq!(resumed.state.identity().name(), "bob");

    registry.stop_all().await;
}

#[tokio::test]
async fn test_unreachable_server_fails_registration() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    drop(listener);
    let client = HttpTournamentClient::new(format!("http://{}", addr), Duration::from_secs(1))
        .expect("Failed to build client");
    let (app, registry) = build_app(Arc::new(client));

    let response = app
        .oneshot(json_request(
            "POST",
            "/sessions",
            serde_json::json!({ "name": "carol" }),
        ))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(registry.tokens().await.is_empty());
}

#[tokio::test]
async fn test_connection_lost_is_reported_on_the_session() {
    // Every status call on this server answers 500.
    let base_url = serve_api(Arc::new(ScriptedTransport::new())).await;
    let client = HttpTournamentClient::new(base_url, Duration::from_secs(1))
        .expect("Failed to build client");
    let (app, registry) = build_app(Arc::new(client));

    let created = start(&app, "dave").await;
    let ended = wait_until_finished(&app, &created.token).await;
    assert!(!ended.state.running());
    assert_eq!(ended.outcome, None);
    let error = ended.error.expect("failure is reported");
    assert!(error.contains("connection lost"), "got {}", error);

    let response = app
        .oneshot(empty_request("DELETE", &format!("/sessions/{}", created.token)))
        .await
        .expect("request handled");
    let removed: SessionView = read_json(response).await;
    assert!(removed.error.is_some_and(|e| e.contains("connection lost")));
    assert!(registry.tokens().await.is_empty());
}

#[tokio::test]
async fn test_completed_session_reports_its_outcome() {
    let (app, registry) = build_app(Arc::new(SimulatedTournament::new(1)));

    let created = start(&app, "erin").await;
    let ended = wait_until_finished(&app, &created.token).await;
    assert_eq!(ended.outcome, Some(Outcome::TournamentCompleted));
    assert_eq!(ended.error, None);
    assert_eq!(registry.tokens().await, vec![created.token]);
}

#[tokio::test]
async fn test_finished_sessions_are_evicted_after_retention() {
    let (app, registry) = build_app_with(
        Arc::new(SimulatedTournament::new(1)),
        SessionRegistry::new().with_retention(Duration::ZERO),
    );

    let created = start(&app, "frank").await;
    for _ in 0..200 {
        if registry.is_finished(&created.token).await != Some(false) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/sessions"))
        .await
        .expect("request handled");
    let tokens: Vec<SessionToken> = read_json(response).await;
    assert!(tokens.is_empty());

    let response = app
        .oneshot(empty_request("GET", &format!("/sessions/{}", created.token)))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
