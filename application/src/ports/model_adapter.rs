//! Model Adapter port (C1, §4.1).
//!
//! Generalizes the teacher's [`crate::ports::llm_gateway::LlmGateway`] /
//! `quorum_domain::session::repository::LlmSessionRepository` single-turn
//! session abstraction into a request/response contract that carries token
//! usage, latency, and structured-output mode — what the pipeline (C6) and
//! meta-planner (C5) need to account for budgets and parse strict JSON plans.

use async_trait::async_trait;
use quorum_domain::council::{Message, ModelConfig, TokenUsage};
use std::time::Duration;
use thiserror::Error;

/// `opts` to a `Complete` call (§4.1). Reasoning models MUST have
/// `temperature`/`top_p`/`stop` omitted by the adapter regardless of what's
/// requested here — that's the adapter's responsibility, not the caller's.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Vec<String>,
    pub seed: Option<i64>,
    pub response_format: ResponseFormat,
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: None,
            top_p: None,
            stop: Vec::new(),
            seed: None,
            response_format: ResponseFormat::Text,
            reasoning_effort: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { name: String, strict: bool, schema: serde_json::Value },
}

/// A completed `Complete` call (§4.1): text plus the usage/latency/finish
/// reason the pipeline needs for budget accounting and trace events.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub latency: Duration,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

/// Typed adapter failure kinds (§4.1, §7 `AdapterError`).
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited{}", .retry_after.map(|d| format!(" (retry after {d:?})")).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("timed out")]
    Timeout,
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Abstracts one backing language model (C1, §4.1).
///
/// Implementations register themselves under a provider-kind string
/// (`ModelConfig::provider_kind`); `CreateAdapter` selection-by-kind lives in
/// the infrastructure registry that owns concrete adapters.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn model(&self) -> &ModelConfig;

    async fn complete(
        &self,
        messages: &[Message],
        opts: &CompletionOptions,
    ) -> Result<CompletionResponse, AdapterError>;

    async fn health_check(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_text_mode_with_no_sampling_overrides() {
        let opts = CompletionOptions::default();
        assert_eq!(opts.response_format, ResponseFormat::Text);
        assert!(opts.temperature.is_none());
        assert!(opts.stop.is_empty());
    }

    #[test]
    fn builder_sets_requested_fields() {
        let opts = CompletionOptions::default().with_max_tokens(2000).with_temperature(0.3);
        assert_eq!(opts.max_tokens, 2000);
        assert_eq!(opts.temperature, Some(0.3));
    }
}
