//! `azure-chat` adapter (C1, §4.1): Azure OpenAI-style deployment endpoint.
//!
//! Differs from [`super::openai_compatible`] only in transport shape: the
//! deployment name is part of the URL path rather than the `model` field,
//! auth is an `api-key` header rather than a bearer token, and the API
//! version is a query parameter. The request/response JSON bodies and the
//! reasoning-model sampling-omission rule are identical, so both adapters
//! share [`super::model_error::map_http_error`].

use crate::council::model_error::map_http_error;
use async_trait::async_trait;
use quorum_application::ports::model_adapter::{
    AdapterError, CompletionOptions, CompletionResponse, FinishReason, ModelAdapter, ResponseFormat,
};
use quorum_domain::council::{Message, MessageRole, ModelConfig, TokenUsage};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct AzureChatConfig {
    pub resource_endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub request_timeout: Duration,
}

impl AzureChatConfig {
    pub fn new(resource_endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            resource_endpoint: resource_endpoint.into(),
            api_key: api_key.into(),
            api_version: "2024-10-21".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}

pub struct AzureChatAdapter {
    client: Client,
    config: AzureChatConfig,
    model: ModelConfig,
}

impl AzureChatAdapter {
    pub fn new(model: ModelConfig, config: AzureChatConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdapterError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config, model })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.resource_endpoint.trim_end_matches('/'),
            self.model.deployment,
            self.config.api_version,
        )
    }

    fn map_messages(messages: &[Message]) -> Vec<JsonValue> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                };
                json!({"role": role, "content": m.content})
            })
            .collect()
    }

    /// Reasoning deployments (o-series style) take `max_completion_tokens`
    /// instead of `max_tokens` and reject temperature/top_p/stop entirely.
    fn build_payload(&self, messages: &[Message], opts: &CompletionOptions) -> JsonValue {
        let mut payload = json!({ "messages": Self::map_messages(messages) });
        let obj = payload.as_object_mut().expect("object literal");

        if self.model.reasoning {
            obj.insert("max_completion_tokens".into(), json!(opts.max_tokens));
        } else {
            obj.insert("max_tokens".into(), json!(opts.max_tokens));
            obj.insert("temperature".into(), json!(opts.temperature.unwrap_or(self.model.default_temperature)));
            if let Some(top_p) = opts.top_p {
                obj.insert("top_p".into(), json!(top_p));
            }
            if !opts.stop.is_empty() {
                obj.insert("stop".into(), json!(opts.stop));
            }
        }
        match &opts.response_format {
            ResponseFormat::Text => {}
            ResponseFormat::JsonObject => {
                obj.insert("response_format".into(), json!({"type": "json_object"}));
            }
            ResponseFormat::JsonSchema { name, strict, schema } => {
                if self.model.supports_schema_json {
                    obj.insert(
                        "response_format".into(),
                        json!({
                            "type": "json_schema",
                            "json_schema": { "name": name, "strict": strict, "schema": schema }
                        }),
                    );
                } else {
                    obj.insert("response_format".into(), json!({"type": "json_object"}));
                }
            }
        }
        payload
    }

    fn parse_usage(v: &JsonValue) -> TokenUsage {
        let prompt = v.get("usage").and_then(|u| u.get("prompt_tokens")).and_then(JsonValue::as_u64).unwrap_or(0);
        let completion =
            v.get("usage").and_then(|u| u.get("completion_tokens")).and_then(JsonValue::as_u64).unwrap_or(0);
        TokenUsage::new(prompt as u32, completion as u32)
    }

    fn parse_finish_reason(v: &JsonValue) -> FinishReason {
        match v.get("choices").and_then(|c| c.get(0)).and_then(|c| c.get("finish_reason")).and_then(JsonValue::as_str)
        {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some("tool_calls") => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }
}

#[async_trait]
impl ModelAdapter for AzureChatAdapter {
    fn model(&self) -> &ModelConfig {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        opts: &CompletionOptions,
    ) -> Result<CompletionResponse, AdapterError> {
        let payload = self.build_payload(messages, opts);
        let started = Instant::now();

        let resp = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { AdapterError::Timeout } else { AdapterError::Transport(e.to_string()) })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| AdapterError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(map_http_error(status.as_u16(), &text));
        }

        let body: JsonValue = serde_json::from_str(&text)
            .map_err(|e| AdapterError::SchemaViolation(format!("invalid JSON response: {e}")))?;
        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(JsonValue::as_str)
            .ok_or_else(|| AdapterError::SchemaViolation("missing choices[0].message.content".into()))?
            .to_string();

        Ok(CompletionResponse {
            content,
            usage: Self::parse_usage(&body),
            latency: started.elapsed(),
            finish_reason: Self::parse_finish_reason(&body),
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!(
            "{}/openai/deployments/{}?api-version={}",
            self.config.resource_endpoint.trim_end_matches('/'),
            self.model.deployment,
            self.config.api_version,
        );
        self.client
            .get(url)
            .header("api-key", &self.config.api_key)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::council::ProviderKind;

    fn model() -> ModelConfig {
        ModelConfig::new("claude-sonnet-4.5", ProviderKind::AZURE_CHAT, "claude-sonnet-4-5-deployment")
    }

    #[test]
    fn reasoning_models_use_max_completion_tokens_and_omit_sampling() {
        let adapter =
            AzureChatAdapter::new(model().reasoning(true), AzureChatConfig::new("https://x.openai.azure.com", "k"))
                .unwrap();
        let payload = adapter.build_payload(&[Message::user("hi")], &CompletionOptions::default().with_temperature(0.9));
        assert!(payload.get("max_completion_tokens").is_some());
        assert!(payload.get("max_tokens").is_none());
        assert!(payload.get("temperature").is_none());
    }

    #[test]
    fn non_reasoning_models_use_max_tokens_and_temperature() {
        let adapter = AzureChatAdapter::new(model(), AzureChatConfig::new("https://x.openai.azure.com", "k")).unwrap();
        let payload = adapter.build_payload(&[Message::user("hi")], &CompletionOptions::default().with_temperature(0.4));
        assert_eq!(payload.get("max_tokens").and_then(JsonValue::as_u64), Some(1024));
        assert_eq!(payload.get("temperature").and_then(JsonValue::as_f64), Some(0.4));
    }

    #[test]
    fn url_embeds_deployment_and_api_version() {
        let adapter = AzureChatAdapter::new(
            model(),
            AzureChatConfig::new("https://x.openai.azure.com", "k").with_api_version("2025-01-01"),
        )
        .unwrap();
        assert_eq!(
            adapter.url(),
            "https://x.openai.azure.com/openai/deployments/claude-sonnet-4-5-deployment/chat/completions?api-version=2025-01-01"
        );
    }
}
