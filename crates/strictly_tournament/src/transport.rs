//! HTTP binding for the tournament server.

use crate::error::TransportError;
use crate::types::PlayerId;
use crate::wire::{
    RegisterRequest, RegisterResponse, ResultEntry, StatusResponse, SubmitRequest, SubmitResponse,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// The four remote operations the client relies on.
///
/// Implementations only move and deserialize bytes. They never retry and
/// never interpret business meaning.
#[async_trait::async_trait]
pub trait TournamentTransport: Send + Sync {
    /// Registers a player by name.
    async fn register(&self, name: &str) -> Result<RegisterResponse, TransportError>;

    /// Fetches tournament and round status for a player.
    async fn status(&self, player_id: PlayerId) -> Result<StatusResponse, TransportError>;

    /// Submits an answer and move. Not idempotent.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError>;

    /// Fetches every revealed round result for a player.
    async fn results(&self, player_id: PlayerId) -> Result<Vec<ResultEntry>, TransportError>;
}

#[async_trait::async_trait]
impl<T: TournamentTransport + ?Sized> TournamentTransport for Arc<T> {
    async fn register(&self, name: &str) -> Result<RegisterResponse, TransportError> {
        (**self).register(name).await
    }

    async fn status(&self, player_id: PlayerId) -> Result<StatusResponse, TransportError> {
        (**self).status(player_id).await
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        (**self).submit(request).await
    }

    async fn results(&self, player_id: PlayerId) -> Result<Vec<ResultEntry>, TransportError> {
        (**self).results(player_id).await
    }
}

/// reqwest-backed tournament client.
#[derive(Debug, Clone)]
pub struct HttpTournamentClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTournamentClient {
    /// Creates a client whose every request is bounded by `timeout`.
    #[instrument(skip(base_url), fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to build HTTP client");
                TransportError::network(format!("Failed to build HTTP client: {}", e))
            })?;
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Tournament client ready");
        Ok(Self { base_url, client })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/player/{}", self.base_url, path)
    }

    /// Reads a response, mapping non-2xx to a server error and schema
    /// violations to a malformed response.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read response body");
            TransportError::network(format!("Failed to read response: {}", e))
        })?;
        debug!(status = %status, body_len = body.len(), "Received response");

        if !status.is_success() {
            let message = server_message(&body);
            warn!(status = %status, message = %message, "Server rejected request");
            return Err(TransportError::server(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, body = %body, "Response did not match schema");
            TransportError::malformed(format!("{}: {}", e, body))
        })
    }
}

#[async_trait::async_trait]
impl TournamentTransport for HttpTournamentClient {
    #[instrument(skip(self))]
    async fn register(&self, name: &str) -> Result<RegisterResponse, TransportError> {
        info!("Registering player");
        let request = RegisterRequest {
            name: name.to_string(),
        };
        let response = self
            .client
            .post(self.url("register"))
            .json(&request)
            .send()
            .await?;
        let registered: RegisterResponse = Self::decode(response).await?;
        info!(player_id = registered.player_id, "Registered");
        Ok(registered)
    }

    #[instrument(skip(self))]
    async fn status(&self, player_id: PlayerId) -> Result<StatusResponse, TransportError> {
        let response = self
            .client
            .get(self.url(&format!("{}/status", player_id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, request), fields(
        player_id = request.player_id,
        round = request.round_number,
        move_code = request.move_code,
    ))]
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        info!("Submitting answer and move");
        let response = self
            .client
            .post(self.url("submit-answer"))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn results(&self, player_id: PlayerId) -> Result<Vec<ResultEntry>, TransportError> {
        let response = self
            .client
            .get(self.url(&format!("{}/results", player_id)))
            .send()
            .await?;
        Self::decode(response).await
    }
}

/// Pulls a human-readable message out of an error body.
fn server_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "title", "detail"] {
            if let Some(text) = json.get(key).and_then(|value| value.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}
