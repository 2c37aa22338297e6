//! Core [`ChatBackend`] trait and the OpenAI-compatible [`ApiBackend`].
//!
//! `ApiBackend` calls `/v1/chat/completions` and `/v1/embeddings` on any
//! OpenAI-compatible server (Ollama, OpenAI, Groq, LM Studio, vLLM, ...).
//! Every call races the caller's [`CancellationToken`]; when the token fires
//! first the in-flight HTTP request is dropped and
//! [`LlmError::Cancelled`] is returned.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::LlmConfig;

use super::turn::{Role, Turn};

/// Prefix of the system message that carries retrieved context.
pub const RETRIEVED_CONTEXT_PREFIX: &str = "Retrieved context:";

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the generation backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The response carried no message content.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// The caller's cancellation token fired first.  Not a failure.
    #[error("LLM request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatBackend trait
// ---------------------------------------------------------------------------

/// Generation and embedding backend.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ChatBackend>` with spawned generation tasks, and must return
/// promptly with [`LlmError::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce the assistant's next turn for `history`.
    async fn complete_chat(
        &self,
        history: &[Turn],
        cancel: &CancellationToken,
    ) -> Result<Turn, LlmError>;

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>, LlmError>;

    /// Issue a trivial request so the first real turn is not slowed down by
    /// model loading.
    async fn warm_up(&self, cancel: &CancellationToken) -> Result<(), LlmError>;
}

// ---------------------------------------------------------------------------
// ApiBackend
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible REST API.
///
/// All connection details come from the [`LlmConfig`] passed to
/// [`ApiBackend::from_config`].
pub struct ApiBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiBackend {
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// POST `body` to `path` and parse the JSON answer, unless `cancel`
    /// fires first.
    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, LlmError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut req = self.client.post(&url).json(&body);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let exchange = async {
            let response = req.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = exchange => result,
        }
    }
}

/// Map history to chat-completions `messages`.
pub fn to_wire_messages(history: &[Turn]) -> Vec<serde_json::Value> {
    history
        .iter()
        .map(|turn| {
            let content = match turn.role {
                Role::RetrievedContext => format!("{RETRIEVED_CONTEXT_PREFIX}\n{}", turn.text),
                _ => turn.text.clone(),
            };
            serde_json::json!({ "role": turn.role.wire_name(), "content": content })
        })
        .collect()
}

/// Pull the assistant text out of a chat-completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String, LlmError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or(LlmError::EmptyResponse)
}

fn parse_embedding(json: &serde_json::Value) -> Result<Vec<f32>, LlmError> {
    let values = json["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("missing data[0].embedding".into()))?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| LlmError::Parse(format!("non-numeric embedding value {v}")))
        })
        .collect()
}

#[async_trait]
impl ChatBackend for ApiBackend {
    async fn complete_chat(
        &self,
        history: &[Turn],
        cancel: &CancellationToken,
    ) -> Result<Turn, LlmError> {
        let body = serde_json::json!({
            "model":       self.config.chat_model,
            "messages":    to_wire_messages(history),
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let json = self.post_json("/v1/chat/completions", body, cancel).await?;
        if let Some(usage) = json.get("usage") {
            log::debug!(
                "llm: model {} prompt tokens {}, completion tokens {}",
                self.config.chat_model,
                usage["prompt_tokens"],
                usage["completion_tokens"]
            );
        }
        Ok(Turn::assistant(parse_completion(&json)?))
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>, LlmError> {
        let body = serde_json::json!({
            "model": self.config.embedding_model,
            "input": [text]
        });
        let json = self.post_json("/v1/embeddings", body, cancel).await?;
        parse_embedding(&json)
    }

    async fn warm_up(&self, cancel: &CancellationToken) -> Result<(), LlmError> {
        let history = [Turn::system("Respond with warm"), Turn::user("warm?")];
        self.complete_chat(&history, cancel).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
