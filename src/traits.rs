//! Capability seams for the external encoder and completion services.
//!
//! The pipeline never talks to a concrete LLM vendor directly. Every stage
//! takes an [`Embedder`] or [`ChatCompletion`] trait object, so production
//! code can inject the Groq-backed client from [`crate::llm`] while tests
//! substitute deterministic doubles.
//!
//! Both traits are object-safe and `Send + Sync`; implementations are
//! expected to be stateless per call (idempotent retries are the client's
//! concern, not the caller's).

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Message role for a chat-completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, Copy)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Text encoder producing embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }
}

/// Chat-style text completion over role-tagged messages.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Run one completion and return the generated text.
    async fn complete(&self, messages: &[ChatMessage], params: ChatParams) -> Result<String>;
}
