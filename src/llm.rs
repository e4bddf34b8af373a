//! Groq/OpenAI-compatible HTTP client for completions and embeddings.
//!
//! One [`GroqClient`] implements both [`Embedder`] and [`ChatCompletion`]
//! against an OpenAI-compatible API base (`/chat/completions` and
//! `/embeddings`).
//!
//! # Configuration
//!
//! - `GROQ_API_KEY` — bearer token, required at construction.
//! - `GROQ_MODEL` — chat model identifier, required at construction.
//! - `[llm] base_url`, `embedding_model`, `timeout_secs`, `max_retries`
//!   come from the TOML config.
//!
//! # Retry Strategy
//!
//! Transient errors are retried with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::traits::{ChatCompletion, ChatMessage, ChatParams, Embedder};

/// Client for an OpenAI-compatible completion and embedding API.
pub struct GroqClient {
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl GroqClient {
    /// Create a client from configuration and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `GROQ_API_KEY` or `GROQ_MODEL` is not set, or if
    /// the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key =
            std::env::var("GROQ_API_KEY").map_err(|_| anyhow::anyhow!("GROQ_API_KEY not set"))?;
        let chat_model =
            std::env::var("GROQ_MODEL").map_err(|_| anyhow::anyhow!("GROQ_MODEL not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model,
            embedding_model: config.embedding_model.clone(),
            max_retries: config.max_retries,
            client,
        })
    }

    /// POST a JSON body with retry/backoff and return the parsed response.
    async fn post_with_retry(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("API error {} at {}: {}", status, path, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("API error {} at {}: {}", status, path, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed after retries")))
    }
}

#[async_trait]
impl ChatCompletion for GroqClient {
    async fn complete(&self, messages: &[ChatMessage], params: ChatParams) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.chat_model,
            "messages": messages,
            "temperature": params.temperature,
        });
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let json = self.post_with_retry("/chat/completions", &body).await?;
        parse_completion_response(&json)
    }
}

#[async_trait]
impl Embedder for GroqClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": texts,
        });

        let json = self.post_with_retry("/embeddings", &body).await?;
        parse_embedding_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completion response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("invalid completion response: missing choices[0].message.content"))
}

/// Extract the `data[].embedding` arrays from an embeddings response,
/// in input order.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}
