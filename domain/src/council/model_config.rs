//! Model configuration value object.
//!
//! [`ModelConfig`] identifies one backing LLM deployment a [`Member`](super::member::Member)
//! is bound to: who serves it (provider kind), what it's called there (deployment name),
//! what it can do (capability flags), and its token/temperature defaults.

use serde::{Deserialize, Serialize};

/// Provider-kind string under which a [`ModelAdapter`](crate::council::ModelConfig)
/// is registered and selected (`CreateAdapter`, §4.1).
///
/// Kept as a newtype over `String` rather than a closed enum: provider kinds are
/// registered by infrastructure adapters at runtime, not fixed by the domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderKind(pub String);

impl ProviderKind {
    pub const AZURE_CHAT: &'static str = "azure-chat";
    pub const OPENAI_COMPATIBLE: &'static str = "openai-compatible";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderKind {
    fn from(s: &str) -> Self {
        ProviderKind::new(s)
    }
}

/// Identity and capability record for one backing LLM deployment.
///
/// Pricing is informational only and is not interpreted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Stable identifier used throughout trace events and vote records (e.g. "gpt-5.2-codex").
    pub id: String,
    /// Which adapter implementation serves this model.
    pub provider_kind: ProviderKind,
    /// Deployment / model name as understood by the provider's API.
    pub deployment: String,
    /// True for "reasoning" models: temperature/top_p/stop MUST be omitted from requests.
    pub reasoning: bool,
    /// True if the provider supports strict `json_schema` structured output.
    pub supports_schema_json: bool,
    /// Hard ceiling on completion tokens the adapter will request.
    pub max_tokens: u32,
    /// Default sampling temperature (ignored for reasoning models).
    pub default_temperature: f32,
    /// Informational cost per 1K prompt/completion tokens; not interpreted by the core.
    pub price_per_1k_prompt: Option<f64>,
    pub price_per_1k_completion: Option<f64>,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>, provider_kind: impl Into<ProviderKind>, deployment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_kind: provider_kind.into(),
            deployment: deployment.into(),
            reasoning: false,
            supports_schema_json: false,
            max_tokens: 4096,
            default_temperature: 0.7,
            price_per_1k_prompt: None,
            price_per_1k_completion: None,
        }
    }

    pub fn reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn supports_schema_json(mut self, supported: bool) -> Self {
        self.supports_schema_json = supported;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let cfg = ModelConfig::new("gpt-5.2-codex", ProviderKind::OPENAI_COMPATIBLE, "gpt-5.2-codex")
            .reasoning(true)
            .supports_schema_json(true)
            .with_max_tokens(8192)
            .with_temperature(0.2);

        assert_eq!(cfg.id, "gpt-5.2-codex");
        assert!(cfg.reasoning);
        assert!(cfg.supports_schema_json);
        assert_eq!(cfg.max_tokens, 8192);
    }

    #[test]
    fn provider_kind_display() {
        let kind = ProviderKind::from(ProviderKind::AZURE_CHAT);
        assert_eq!(kind.to_string(), "azure-chat");
    }
}
