pub mod backend;
pub mod container;
pub mod local;
pub mod registry;
pub mod remote_vm;

pub use backend::SandboxBackend;
pub use container::ContainerBackend;
pub use local::LocalBackend;
pub use registry::SandboxRegistry;
pub use remote_vm::RemoteVmBackend;

use ac_domain::config::SandboxConfig;
use ac_domain::{Error, SandboxMode};

/// Build a registry holding just the backend for the configured mode. The
/// gateway only ever needs the one mode a deployment is running, but the
/// registry shape leaves room for a gateway that serves mixed-mode fleets.
pub fn registry_for_config(cfg: &SandboxConfig, workspace_root: std::path::PathBuf) -> Result<SandboxRegistry, Error> {
    let mut registry = SandboxRegistry::new();
    match cfg.mode {
        ac_domain::config::SandboxMode::Local => {
            registry.register(SandboxMode::Local, Box::new(LocalBackend::new(cfg.service_port)));
        }
        ac_domain::config::SandboxMode::Container => {
            registry.register(
                SandboxMode::Container,
                Box::new(ContainerBackend::new(
                    cfg.container.clone(),
                    cfg.service_port,
                    cfg.base_domain.clone(),
                    workspace_root,
                )),
            );
        }
        ac_domain::config::SandboxMode::RemoteVm => {
            let api_base_url = cfg
                .remote_vm
                .api_base_url
                .clone()
                .ok_or_else(|| Error::Config("remote_vm mode requires sandbox.remote_vm.api_base_url".into()))?;
            let api_key_env = cfg.remote_vm.api_key_env.clone().unwrap_or_default();
            let api_key = std::env::var(&api_key_env).unwrap_or_default();
            registry.register(SandboxMode::RemoteVm, Box::new(RemoteVmBackend::new(api_base_url, api_key)));
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mode_builds_a_registry_with_a_local_backend() {
        let cfg = SandboxConfig::default();
        let registry = registry_for_config(&cfg, std::path::PathBuf::from("/tmp/agentcore-workspaces")).unwrap();
        assert!(registry.backend(SandboxMode::Local).is_ok());
    }

    #[test]
    fn remote_vm_mode_without_base_url_errors() {
        let cfg = SandboxConfig {
            mode: ac_domain::config::SandboxMode::RemoteVm,
            ..SandboxConfig::default()
        };
        let err = registry_for_config(&cfg, std::path::PathBuf::from("/tmp/x")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
