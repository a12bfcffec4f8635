use async_trait::async_trait;
use tokio::process::Command;

use ac_domain::config::ContainerConfig;
use ac_domain::{Error, Sandbox, SandboxMode};

use crate::backend::SandboxBackend;

/// Runs the tool server inside a per-session Docker container on a shared
/// bridge network, shelling out to the `docker` CLI rather than linking a
/// Docker API client.
pub struct ContainerBackend {
    config: ContainerConfig,
    service_port: u16,
    base_domain: String,
    workspace_root: std::path::PathBuf,
}

impl ContainerBackend {
    pub fn new(config: ContainerConfig, service_port: u16, base_domain: String, workspace_root: std::path::PathBuf) -> Self {
        Self {
            config,
            service_port,
            base_domain,
            workspace_root,
        }
    }

    async fn run_docker(&self, args: &[&str]) -> Result<std::process::Output, Error> {
        Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("docker command failed: {e}")))
    }
}

#[async_trait]
impl SandboxBackend for ContainerBackend {
    async fn create(&self, session_id: &str) -> Result<Sandbox, Error> {
        let host_path = self.workspace_root.join(session_id);
        tokio::fs::create_dir_all(&host_path)
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("failed to create workspace dir: {e}")))?;

        let memory = format!("{}m", self.config.memory_limit_mb);
        let cpus = self.config.cpu_quota.to_string();
        let bind = format!("{}:{}", host_path.display(), self.config.workspace_path.display());

        let output = self
            .run_docker(&[
                "run",
                "-d",
                "--name",
                session_id,
                "--network",
                &self.config.network_name,
                "--memory",
                &memory,
                "--cpus",
                &cpus,
                "-v",
                &bind,
                &self.config.image,
            ])
            .await?;

        if !output.status.success() {
            return Err(Error::SandboxUnavailable(format!(
                "docker run failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let mut sandbox = Sandbox::new(
            container_id,
            SandboxMode::Container,
            format!("http://{session_id}:{}", self.service_port),
        );
        sandbox.expose_port(self.service_port, self.expose_port(&sandbox, self.service_port));
        Ok(sandbox)
    }

    async fn connect(&self, sandbox: &Sandbox) -> Result<String, Error> {
        Ok(sandbox.base_url.clone())
    }

    fn expose_port(&self, sandbox: &Sandbox, port: u16) -> String {
        format!("http://{}-{port}.{}", sandbox.id, self.base_domain)
    }

    async fn start(&self, sandbox: &Sandbox) -> Result<(), Error> {
        let output = self.run_docker(&["start", &sandbox.id]).await?;
        if !output.status.success() {
            return Err(Error::SandboxUnavailable(format!(
                "docker start failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn stop(&self, sandbox: &Sandbox) -> Result<(), Error> {
        let output = self.run_docker(&["stop", "-t", "5", &sandbox.id]).await?;
        if !output.status.success() {
            return Err(Error::SandboxUnavailable(format!(
                "docker stop failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn cleanup(&self, sandbox: &Sandbox) -> Result<(), Error> {
        let _ = self.run_docker(&["stop", "-t", "5", &sandbox.id]).await;
        let output = self.run_docker(&["rm", "-f", &sandbox.id]).await?;
        if !output.status.success() {
            tracing::warn!(
                sandbox_id = %sandbox.id,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "docker rm reported a non-zero exit during cleanup"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_port_joins_container_name_port_and_domain() {
        let backend = ContainerBackend::new(
            ContainerConfig::default(),
            8080,
            "sandbox.localhost".into(),
            std::path::PathBuf::from("/tmp/workspaces"),
        );
        let sandbox = Sandbox::new("abc123", SandboxMode::Container, "http://abc123:8080");
        assert_eq!(
            backend.expose_port(&sandbox, 3000),
            "http://abc123-3000.sandbox.localhost"
        );
    }
}
