use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Which backend the registry resolves `mode` to at session creation.
    #[serde(default)]
    pub mode: SandboxMode,
    /// Fixed port the in-sandbox tool server listens on.
    #[serde(default = "d_service_port")]
    pub service_port: u16,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub remote_vm: RemoteVmConfig,
    /// Base domain the reverse proxy synthesizes container URLs under, e.g.
    /// `<container>-<port>.<base_domain>`.
    #[serde(default = "d_base_domain")]
    pub base_domain: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::default(),
            service_port: d_service_port(),
            container: ContainerConfig::default(),
            remote_vm: RemoteVmConfig::default(),
            base_domain: d_base_domain(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Tool server runs directly on the gateway host.
    #[default]
    Local,
    /// Tool server runs inside a per-session container.
    Container,
    /// Tool server runs on a vendor-provisioned remote VM.
    RemoteVm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "d_container_image")]
    pub image: String,
    #[serde(default = "d_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "d_cpu_quota")]
    pub cpu_quota: f64,
    #[serde(default = "d_network_name")]
    pub network_name: String,
    /// Container-side path the host's per-session workspace is bind-mounted to.
    #[serde(default = "d_container_workspace")]
    pub workspace_path: PathBuf,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: d_container_image(),
            memory_limit_mb: d_memory_limit_mb(),
            cpu_quota: d_cpu_quota(),
            network_name: d_network_name(),
            workspace_path: d_container_workspace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteVmConfig {
    /// Vendor API base URL; `None` disables the remote-VM backend at startup.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_service_port() -> u16 {
    8080
}
fn d_container_image() -> String {
    "agentcore/sandbox:latest".into()
}
fn d_memory_limit_mb() -> u64 {
    2048
}
fn d_cpu_quota() -> f64 {
    1.0
}
fn d_network_name() -> String {
    "agentcore-sandboxes".into()
}
fn d_container_workspace() -> PathBuf {
    PathBuf::from("/workspace")
}
fn d_base_domain() -> String {
    "sandbox.localhost".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_local() {
        assert_eq!(SandboxConfig::default().mode, SandboxMode::Local);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: SandboxConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.service_port, 8080);
        assert_eq!(cfg.container.memory_limit_mb, 2048);
    }
}
