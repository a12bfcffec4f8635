mod context;
mod llm;
mod observability;
mod sandbox;
mod server;
mod sessions;
mod tools;
mod workspace;

pub use context::*;
pub use llm::*;
pub use observability::*;
pub use sandbox::*;
pub use server::*;
pub use sessions::*;
pub use tools::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token for the proxy's
    /// `/api/register` and debug endpoints. If unset at startup, admin
    /// endpoints are disabled rather than left unauthenticated.
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "AGENTCORE_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.llm.models.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.models".into(),
                message: "no models configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, model) in self.llm.models.iter().enumerate() {
            if model.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.models[{i}].id"),
                    message: "model id must not be empty".into(),
                });
            }
            if model.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.models[{i}].base_url"),
                    message: "base_url must not be empty".into(),
                });
            } else if !model.base_url.starts_with("http://") && !model.base_url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.models[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        model.base_url
                    ),
                });
            }
            if model.api_key_env.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.models[{i}].api_key_env"),
                    message: "api_key_env must not be empty".into(),
                });
            }
            if !model.id.is_empty() && !seen_ids.insert(&model.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.models[{i}].id"),
                    message: format!(
                        "duplicate model id \"{}\" — later entry will shadow earlier one",
                        model.id
                    ),
                });
            }
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        for (i, pattern) in self.tools.exec_security.denied_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("tools.exec_security.denied_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }

        if self.sandbox.mode == SandboxMode::RemoteVm && self.sandbox.remote_vm.api_base_url.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sandbox.remote_vm.api_base_url".into(),
                message: "remote_vm sandbox mode selected but no api_base_url configured".into(),
            });
        }

        if self.sandbox.service_port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sandbox.service_port".into(),
                message: "service_port must be greater than 0".into(),
            });
        }

        if self.context.token_budget == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.token_budget".into(),
                message: "token_budget must be greater than 0".into(),
            });
        }
        if self.context.max_size == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.max_size".into(),
                message: "max_size must be greater than 0".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                port: 8787,
                host: "127.0.0.1".into(),
                ..ServerConfig::default()
            },
            llm: LlmConfig {
                models: vec![ModelConfig {
                    id: "claude-main".into(),
                    api_type: ApiType::Anthropic,
                    base_url: "https://api.anthropic.com".into(),
                    api_key_env: "ANTHROPIC_API_KEY".into(),
                    thinking_budget_tokens: None,
                    max_retries: None,
                }],
                ..LlmConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected server.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn model_base_url_invalid_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.llm.models[0].base_url = "ws://localhost:1234".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.models[0].base_url").expect("expected base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn model_missing_api_key_env_is_error() {
        let mut cfg = valid_config();
        cfg.llm.models[0].api_key_env = String::new();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.models[0].api_key_env").is_some());
    }

    #[test]
    fn duplicate_model_ids_is_warning() {
        let mut cfg = valid_config();
        let mut second = cfg.llm.models[0].clone();
        second.base_url = "https://api.anthropic.com/v2".into();
        cfg.llm.models.push(second);
        let issues = cfg.validate();
        let dup = issues.iter().find(|e| e.message.contains("duplicate model id")).unwrap();
        assert_eq!(dup.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn no_models_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.models.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.models").expect("expected no-models warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.cors.allowed_origins").expect("expected CORS wildcard warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn remote_vm_mode_without_base_url_is_error() {
        let mut cfg = valid_config();
        cfg.sandbox.mode = SandboxMode::RemoteVm;
        cfg.sandbox.remote_vm.api_base_url = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "sandbox.remote_vm.api_base_url").is_some());
    }

    #[test]
    fn remote_vm_mode_with_base_url_is_ok() {
        let mut cfg = valid_config();
        cfg.sandbox.mode = SandboxMode::RemoteVm;
        cfg.sandbox.remote_vm.api_base_url = Some("https://vendor.example.com".into());
        let issues = cfg.validate();
        assert!(find_issue(&issues, "sandbox.remote_vm").is_none());
    }

    #[test]
    fn invalid_denied_pattern_is_error() {
        let mut cfg = valid_config();
        cfg.tools.exec_security.denied_patterns = vec![r"[invalid".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "tools.exec_security.denied_patterns[0]")
            .expect("expected regex error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn zero_token_budget_is_error() {
        let mut cfg = valid_config();
        cfg.context.token_budget = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "context.token_budget").is_some());
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] server.port: port must be greater than 0");
    }
}
