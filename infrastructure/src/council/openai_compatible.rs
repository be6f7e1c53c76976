//! `openai-compatible` adapter (C1, §4.1): OpenAI-shaped `/chat/completions`
//! over any compatible endpoint (OpenAI itself, or a self-hosted gateway).
//!
//! Grounded on the teacher pack's OpenRouter provider: a `reqwest::Client`
//! built once, bearer auth, JSON payload construction, and HTTP-status to
//! typed-error mapping.

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
pub struct OpenAiCompatibleConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub extra_headers: Vec<(String, String)>,
}

impl OpenAiCompatibleConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(120),
            extra_headers: Vec::new(),
        }
    }
}

pub struct OpenAiCompatibleAdapter {
    client: Client,
    config: OpenAiCompatibleConfig,
    model: ModelConfig,
}

impl OpenAiCompatibleAdapter {
    pub fn new(model: ModelConfig, config: OpenAiCompatibleConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdapterError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config, model })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
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
                match &m.name {
                    Some(name) => json!({"role": role, "content": m.content, "name": name}),
                    None => json!({"role": role, "content": m.content}),
                }
            })
            .collect()
    }

    fn build_payload(&self, messages: &[Message], opts: &CompletionOptions) -> JsonValue {
        let mut payload = json!({
            "model": self.model.deployment,
            "messages": Self::map_messages(messages),
            "max_tokens": opts.max_tokens,
        });
        let obj = payload.as_object_mut().expect("object literal");

        if !self.model.reasoning {
            obj.insert("temperature".into(), json!(opts.temperature.unwrap_or(self.model.default_temperature)));
            if let Some(top_p) = opts.top_p {
                obj.insert("top_p".into(), json!(top_p));
            }
            if !opts.stop.is_empty() {
                obj.insert("stop".into(), json!(opts.stop));
            }
        }
        if let Some(seed) = opts.seed {
            obj.insert("seed".into(), json!(seed));
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
                            "json_schema": {
                                "name": name,
                                "strict": strict,
                                "schema": schema,
                            }
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
impl ModelAdapter for OpenAiCompatibleAdapter {
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

        let mut rb = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");
        for (k, v) in &self.config.extra_headers {
            rb = rb.header(k, v);
        }

        let resp = rb.json(&payload).send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Transport(e.to_string())
            }
        })?;

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
        self.client
            .get(format!("{}/models", self.config.api_base.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
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
        ModelConfig::new("gpt-5.2-codex", ProviderKind::OPENAI_COMPATIBLE, "gpt-5.2-codex")
    }

    #[test]
    fn payload_omits_sampling_params_for_reasoning_models() {
        let adapter =
            OpenAiCompatibleAdapter::new(model().reasoning(true), OpenAiCompatibleConfig::new("https://x", "k"))
                .unwrap();
        let payload = adapter.build_payload(&[Message::user("hi")], &CompletionOptions::default().with_temperature(0.9));
        assert!(payload.get("temperature").is_none());
        assert!(payload.get("top_p").is_none());
        assert!(payload.get("stop").is_none());
    }

    #[test]
    fn payload_includes_temperature_for_non_reasoning_models() {
        let adapter = OpenAiCompatibleAdapter::new(model(), OpenAiCompatibleConfig::new("https://x", "k")).unwrap();
        let payload = adapter.build_payload(&[Message::user("hi")], &CompletionOptions::default().with_temperature(0.4));
        assert_eq!(payload.get("temperature").and_then(JsonValue::as_f64), Some(0.4));
    }

    #[test]
    fn json_schema_response_format_downgrades_when_unsupported() {
        let adapter = OpenAiCompatibleAdapter::new(model(), OpenAiCompatibleConfig::new("https://x", "k")).unwrap();
        let opts = CompletionOptions::default().with_response_format(ResponseFormat::JsonSchema {
            name: "plan".into(),
            strict: true,
            schema: json!({"type": "object"}),
        });
        let payload = adapter.build_payload(&[Message::user("hi")], &opts);
        assert_eq!(payload["response_format"]["type"], json!("json_object"));
    }

    #[test]
    fn json_schema_response_format_passes_through_when_supported() {
        let adapter =
            OpenAiCompatibleAdapter::new(model().supports_schema_json(true), OpenAiCompatibleConfig::new("https://x", "k"))
                .unwrap();
        let opts = CompletionOptions::default().with_response_format(ResponseFormat::JsonSchema {
            name: "plan".into(),
            strict: true,
            schema: json!({"type": "object"}),
        });
        let payload = adapter.build_payload(&[Message::user("hi")], &opts);
        assert_eq!(payload["response_format"]["type"], json!("json_schema"));
        assert_eq!(payload["response_format"]["json_schema"]["name"], json!("plan"));
    }

    #[test]
    fn parse_usage_reads_prompt_and_completion_tokens() {
        let body = json!({"usage": {"prompt_tokens": 12, "completion_tokens": 8}});
        let usage = OpenAiCompatibleAdapter::parse_usage(&body);
        assert_eq!(usage.prompt, 12);
        assert_eq!(usage.completion, 8);
        assert_eq!(usage.total, 20);
    }

    #[test]
    fn parse_finish_reason_defaults_to_stop() {
        let body = json!({"choices": [{"finish_reason": "length"}]});
        assert_eq!(OpenAiCompatibleAdapter::parse_finish_reason(&body), FinishReason::Length);
        assert_eq!(OpenAiCompatibleAdapter::parse_finish_reason(&json!({})), FinishReason::Stop);
    }
}
