//! Adapter registry: builds the `{ model id -> Arc<dyn ModelAdapter> }` map
//! the pipeline (C6) is constructed with, by dispatching each configured
//! model to a concrete adapter by its `provider_kind` string (§4.1
//! `CreateAdapter`). Modeled on the teacher's
//! `infrastructure::providers::routing::RoutingGateway`, simplified because
//! each [`ModelConfig`] already carries its own provider kind rather than
//! needing model-family inference.

use crate::council::azure_chat::{AzureChatAdapter, AzureChatConfig};
use crate::council::openai_compatible::{OpenAiCompatibleAdapter, OpenAiCompatibleConfig};
use quorum_application::ports::model_adapter::ModelAdapter;
use quorum_domain::council::{ModelConfig, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown provider kind '{0}' for model '{1}'")]
    UnknownProviderKind(String, String),
    #[error("missing {field} for model '{model}'")]
    MissingField { model: String, field: &'static str },
    #[error("environment variable '{0}' is not set")]
    MissingApiKey(String),
    #[error("failed to construct adapter for model '{model}': {source}")]
    AdapterConstruction { model: String, source: quorum_application::ports::model_adapter::AdapterError },
}

/// One entry in the model registry config (§10.4): the model's identity plus
/// the connection details its provider kind needs to build a concrete
/// adapter. Shaped for deserialization from the figment-layered config file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelEndpoint {
    #[serde(flatten)]
    pub config: ModelConfig,
    /// `openai-compatible`: base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: Option<String>,
    /// `azure-chat`: resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub resource_endpoint: Option<String>,
    /// `azure-chat`: API version query parameter; defaults inside the adapter if absent.
    pub api_version: Option<String>,
    /// Name of the environment variable holding this model's API key.
    pub api_key_env: String,
}

pub struct AdapterRegistry;

impl AdapterRegistry {
    /// Builds one adapter per endpoint and returns them keyed by
    /// `ModelConfig::id`, ready to hand to `CouncilPipeline::new`.
    pub fn build(endpoints: &[ModelEndpoint]) -> Result<HashMap<String, Arc<dyn ModelAdapter>>, RegistryError> {
        let mut out = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let adapter = Self::build_one(endpoint)?;
            out.insert(endpoint.config.id.clone(), adapter);
        }
        Ok(out)
    }

    fn build_one(endpoint: &ModelEndpoint) -> Result<Arc<dyn ModelAdapter>, RegistryError> {
        let api_key = std::env::var(&endpoint.api_key_env)
            .map_err(|_| RegistryError::MissingApiKey(endpoint.api_key_env.clone()))?;

        match endpoint.config.provider_kind.as_str() {
            kind if kind == ProviderKind::AZURE_CHAT => {
                let resource_endpoint = endpoint.resource_endpoint.clone().ok_or_else(|| RegistryError::MissingField {
                    model: endpoint.config.id.clone(),
                    field: "resource_endpoint",
                })?;
                let mut config = AzureChatConfig::new(resource_endpoint, api_key);
                if let Some(version) = &endpoint.api_version {
                    config = config.with_api_version(version.clone());
                }
                let adapter = AzureChatAdapter::new(endpoint.config.clone(), config).map_err(|source| {
                    RegistryError::AdapterConstruction { model: endpoint.config.id.clone(), source }
                })?;
                Ok(Arc::new(adapter))
            }
            kind if kind == ProviderKind::OPENAI_COMPATIBLE => {
                let api_base = endpoint.api_base.clone().ok_or_else(|| RegistryError::MissingField {
                    model: endpoint.config.id.clone(),
                    field: "api_base",
                })?;
                let config = OpenAiCompatibleConfig::new(api_base, api_key);
                let adapter = OpenAiCompatibleAdapter::new(endpoint.config.clone(), config).map_err(|source| {
                    RegistryError::AdapterConstruction { model: endpoint.config.id.clone(), source }
                })?;
                Ok(Arc::new(adapter))
            }
            other => Err(RegistryError::UnknownProviderKind(other.to_string(), endpoint.config.id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str, kind: &str) -> ModelEndpoint {
        ModelEndpoint {
            config: ModelConfig::new(id, kind, format!("{id}-deployment")),
            api_base: Some("https://api.example.com/v1".into()),
            resource_endpoint: Some("https://example.openai.azure.com".into()),
            api_version: None,
            api_key_env: "COUNCIL_TEST_API_KEY_DOES_NOT_EXIST".into(),
        }
    }

    #[test]
    fn missing_api_key_env_var_is_reported() {
        let err = AdapterRegistry::build(&[endpoint("m1", ProviderKind::OPENAI_COMPATIBLE)]).unwrap_err();
        assert!(matches!(err, RegistryError::MissingApiKey(_)));
    }

    #[test]
    fn unknown_provider_kind_is_rejected() {
        std::env::set_var("COUNCIL_TEST_API_KEY_PRESENT", "secret");
        let mut ep = endpoint("m1", "carrier-pigeon");
        ep.api_key_env = "COUNCIL_TEST_API_KEY_PRESENT".into();
        let err = AdapterRegistry::build(&[ep]).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownProviderKind(_, _)));
        std::env::remove_var("COUNCIL_TEST_API_KEY_PRESENT");
    }

    #[test]
    fn missing_resource_endpoint_for_azure_chat_is_reported() {
        std::env::set_var("COUNCIL_TEST_API_KEY_PRESENT2", "secret");
        let mut ep = endpoint("m1", ProviderKind::AZURE_CHAT);
        ep.resource_endpoint = None;
        ep.api_key_env = "COUNCIL_TEST_API_KEY_PRESENT2".into();
        let err = AdapterRegistry::build(&[ep]).unwrap_err();
        assert!(matches!(err, RegistryError::MissingField { field: "resource_endpoint", .. }));
        std::env::remove_var("COUNCIL_TEST_API_KEY_PRESENT2");
    }
}
