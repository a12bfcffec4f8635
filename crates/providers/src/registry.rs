//! Provider registry.
//!
//! Constructs and holds one adapter per configured model. At startup the
//! registry reads the [`LlmConfig`]'s model list, resolves each model's API
//! key from its environment variable, and instantiates the adapter matching
//! its [`ApiType`].

use crate::anthropic::AnthropicProvider;
use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use ac_domain::config::{ApiType, LlmConfig};
use ac_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Holds all instantiated LLM provider adapters, keyed by model id.
///
/// A model that fails to initialize (typically a missing API key) is
/// logged and skipped rather than aborting startup — the gateway boots and
/// that model simply errors on first use, surfaced through the session's
/// `llm_fatal` error path.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    init_errors: Vec<ProviderInitError>,
}

#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub model_id: String,
    pub error: String,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut init_errors = Vec::new();

        for model in &config.models {
            let result: Result<Arc<dyn LlmProvider>> = match model.api_type {
                ApiType::Anthropic => AnthropicProvider::from_config(model).map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                ApiType::Openai => OpenAiCompatProvider::from_config(model).map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                ApiType::Gemini => GoogleProvider::from_config(model).map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(model_id = %model.id, api_type = ?model.api_type, "registered LLM model");
                    providers.insert(model.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(model_id = %model.id, api_type = ?model.api_type, error = %e, "failed to initialize LLM model, skipping");
                    init_errors.push(ProviderInitError { model_id: model.id.clone(), error: e.to_string() });
                }
            }
        }

        Self { providers, init_errors }
    }

    /// Look up a model's provider adapter, or a descriptive error if it was
    /// never configured or failed to initialize.
    pub fn get(&self, model_id: &str) -> Result<Arc<dyn LlmProvider>> {
        self.providers
            .get(model_id)
            .cloned()
            .ok_or_else(|| Error::Config(format!("model '{model_id}' is not a registered LLM model (check init errors)")))
    }

    pub fn list_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Initialization errors (empty if every configured model started up).
    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::config::ModelConfig;

    fn model(id: &str, env: &str) -> ModelConfig {
        ModelConfig {
            id: id.into(),
            api_type: ApiType::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            api_key_env: env.into(),
            thinking_budget_tokens: None,
            max_retries: None,
        }
    }

    #[test]
    fn missing_env_var_records_init_error_and_skips_model() {
        let cfg = LlmConfig { models: vec![model("claude-main", "AC_TEST_REGISTRY_MISSING_KEY_9999")], ..LlmConfig::default() };
        let registry = ProviderRegistry::from_config(&cfg);
        assert!(registry.is_empty());
        assert_eq!(registry.init_errors().len(), 1);
        assert_eq!(registry.init_errors()[0].model_id, "claude-main");
    }

    #[test]
    fn configured_model_with_present_env_var_registers() {
        std::env::set_var("AC_TEST_REGISTRY_PRESENT_KEY", "sk-test");
        let cfg = LlmConfig { models: vec![model("claude-main", "AC_TEST_REGISTRY_PRESENT_KEY")], ..LlmConfig::default() };
        let registry = ProviderRegistry::from_config(&cfg);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("claude-main").is_ok());
        std::env::remove_var("AC_TEST_REGISTRY_PRESENT_KEY");
    }

    #[test]
    fn unknown_model_id_returns_config_error() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        let err = registry.get("nonexistent").unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }
}
