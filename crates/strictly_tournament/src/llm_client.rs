//! Remote-model-backed answer provider for OpenAI and Anthropic.

use crate::error::StrategyError;
use crate::strategy::AnswerProvider;
use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

const SYSTEM_PROMPT: &str = "You answer trivia questions in a tournament. \
Reply with the answer only, as a short phrase, no explanation.";

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI (GPT models).
    OpenAI,
    /// Anthropic (Claude models).
    Anthropic,
}

impl LlmProvider {
    /// Environment variable holding the API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Configuration for LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    provider: LlmProvider,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl LlmConfig {
    /// Creates a new LLM configuration.
    #[instrument(skip(api_key), fields(provider = ?provider, model = %model))]
    pub fn new(provider: LlmProvider, api_key: String, model: String, max_tokens: u32) -> Self {
        debug!("Creating LLM config");
        Self {
            provider,
            api_key,
            model,
            max_tokens,
        }
    }

    /// Gets the provider.
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Gets the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Gets the max tokens.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// LLM client that abstracts over multiple providers.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
    openai: OpenAIClient<OpenAIConfig>,
    timeout: Duration,
}

impl LlmClient {
    /// Creates a new LLM client whose requests give up after `timeout`.
    #[instrument(skip(config), fields(provider = ?config.provider()))]
    pub fn new(config: LlmConfig, timeout: Duration) -> Result<Self, LlmError> {
        info!("Creating LLM client");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::new(format!("Failed to build HTTP client: {}", e)))?;
        let openai =
            OpenAIClient::with_config(OpenAIConfig::new().with_api_key(config.api_key.clone()));
        Ok(Self {
            config,
            client,
            openai,
            timeout,
        })
    }

    /// Generates a completion from a system prompt and user message.
    #[instrument(skip(self, system_prompt, user_message), fields(provider = ?self.config.provider, model = %self.config.model))]
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        debug!("Generating completion");
        match self.config.provider {
            LlmProvider::OpenAI => self.generate_openai(system_prompt, user_message).await,
            LlmProvider::Anthropic => self.generate_anthropic(system_prompt, user_message).await,
        }
    }

    /// Generates a completion using Anthropic Claude.
    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_anthropic(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": [
                {
                    "role": "user",
                    "content": user_message
                }
            ]
        });

        debug!("Sending request to Anthropic");
        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", self.config.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Anthropic API request failed");
                LlmError::new(format!("Anthropic API request failed: {}", e))
            })?;

        let response_json = Self::read_json(response, "Anthropic").await?;
        let content = response_json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                error!(response = %response_json, "No text content in Anthropic response");
                LlmError::new("No text content in Anthropic response".to_string())
            })?
            .to_string();

        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }

    /// Generates a completion using OpenAI.
    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_openai(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let request = openai_request(&self.config, system_prompt, user_message)?;

        debug!("Sending request to OpenAI");
        let response = tokio::time::timeout(self.timeout, self.openai.chat().create(request))
            .await
            .map_err(|_| {
                error!(timeout_ms = self.timeout.as_millis() as u64, "OpenAI request timed out");
                LlmError::new(format!("OpenAI request timed out after {:?}", self.timeout))
            })?
            .map_err(|e| {
                error!(error = ?e, "OpenAI API error");
                LlmError::new(format!("OpenAI API error: {}", e))
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                error!("No content in OpenAI response");
                LlmError::new("No content in OpenAI response".to_string())
            })?;

        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }

    async fn read_json(
        response: reqwest::Response,
        provider: &str,
    ) -> Result<serde_json::Value, LlmError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            error!(error = ?e, provider, "Failed to read response");
            LlmError::new(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            error!(status = %status, response = %response_text, provider, "API error");
            return Err(LlmError::new(format!(
                "{} API error {}: {}",
                provider, status, response_text
            )));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!(error = ?e, response = %response_text, provider, "Failed to parse response");
            LlmError::new(format!("Failed to parse response: {}", e))
        })
    }
}

fn openai_request(
    config: &LlmConfig,
    system_prompt: &str,
    user_message: &str,
) -> Result<async_openai::types::chat::CreateChatCompletionRequest, LlmError> {
    let messages = vec![
        ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| LlmError::new(format!("Failed to build system message: {}", e)))?,
        ),
        ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| LlmError::new(format!("Failed to build user message: {}", e)))?,
        ),
    ];

    CreateChatCompletionRequestArgs::default()
        .model(&config.model)
        .messages(messages)
        .max_tokens(config.max_tokens)
        .build()
        .map_err(|e| LlmError::new(format!("Failed to build request: {}", e)))
}

/// Answers trivia questions with an LLM.
#[derive(Debug, Clone)]
pub struct LlmAnswerProvider {
    client: LlmClient,
}

impl LlmAnswerProvider {
    /// Wraps a configured client.
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl AnswerProvider for LlmAnswerProvider {
    fn name(&self) -> &str {
        "llm"
    }

    #[instrument(skip(self))]
    async fn answer(&self, question: &str) -> Result<String, StrategyError> {
        let raw = self
            .client
            .generate(SYSTEM_PROMPT, question)
            .await
            .map_err(|e| StrategyError::new(e.to_string()))?;
        Ok(clean_answer(question, &raw))
    }
}

const MAX_ANSWER_CHARS: usize = 50;

/// Reduces a model reply to a short answer.
///
/// Keeps the first non-empty line, drops wrapping quotes and a leading
/// "the answer is" style prefix, and for arithmetic questions keeps only the
/// first number in the reply.
pub fn clean_answer(question: &str, raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();

    let lower = line.to_lowercase();
    let line = ["the answer is", "answer:", "result:"]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .and_then(|prefix| line.get(prefix.len()..))
        .map(|rest| rest.trim_start_matches(':').trim())
        .unwrap_or(line);

    if question.contains(['+', '-', '*', '/', '='])
        && let Some(number) = first_number(line)
    {
        return number;
    }
    line.chars().take(MAX_ANSWER_CHARS).collect()
}

fn first_number(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .map(|token| token.trim_matches('.'))
        .find(|token| token.parse::<f64>().is_ok())
        .map(str::to_string)
}

/// LLM client error.
#[derive(Debug, Clone, Display, Error)]
#[display("LLM error: {} at {}:{}", message, file, line)]
pub struct LlmError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LlmError {
    /// Creates a new LLM error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_message = %message, "LLM error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
