//! Shared utility functions for provider adapters.

use ac_domain::config::ModelConfig;
use ac_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve a model's API key from its configured environment variable.
///
/// Secrets are environment-only; there is no keychain or plaintext-config
/// fallback.
pub fn resolve_api_key(model: &ModelConfig) -> Result<String> {
    std::env::var(&model.api_key_env).map_err(|_| {
        Error::Auth(format!(
            "environment variable '{}' not set or not valid UTF-8 (required by model '{}')",
            model.api_key_env, model.id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::config::ApiType;

    fn model(api_key_env: &str) -> ModelConfig {
        ModelConfig {
            id: "test-model".into(),
            api_type: ApiType::Anthropic,
            base_url: "https://example.invalid".into(),
            api_key_env: api_key_env.into(),
            thinking_budget_tokens: None,
            max_retries: None,
        }
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "AC_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let result = resolve_api_key(&model(var_name)).unwrap();
        assert_eq!(result, "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_var_names_model_and_var_in_error() {
        let err = resolve_api_key(&model("AC_TEST_NONEXISTENT_VAR_8888")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("AC_TEST_NONEXISTENT_VAR_8888"));
        assert!(msg.contains("test-model"));
    }
}
