use async_trait::async_trait;

use ac_domain::{Error, Sandbox, SandboxMode};

use crate::backend::SandboxBackend;

/// Runs the tool server as a plain process on the gateway host. No
/// isolation beyond the OS; used for local development and single-tenant
/// deployments.
pub struct LocalBackend {
    service_port: u16,
}

impl LocalBackend {
    pub fn new(service_port: u16) -> Self {
        Self { service_port }
    }
}

#[async_trait]
impl SandboxBackend for LocalBackend {
    async fn create(&self, session_id: &str) -> Result<Sandbox, Error> {
        let base_url = format!("http://localhost:{}", self.service_port);
        Ok(Sandbox::new(session_id, SandboxMode::Local, base_url))
    }

    async fn connect(&self, _sandbox: &Sandbox) -> Result<String, Error> {
        Ok(format!("http://localhost:{}", self.service_port))
    }

    fn expose_port(&self, _sandbox: &Sandbox, port: u16) -> String {
        format!("http://localhost:{port}")
    }

    async fn start(&self, _sandbox: &Sandbox) -> Result<(), Error> {
        Ok(())
    }

    async fn stop(&self, _sandbox: &Sandbox) -> Result<(), Error> {
        Ok(())
    }

    async fn cleanup(&self, _sandbox: &Sandbox) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_localhost_url() {
        let backend = LocalBackend::new(8080);
        let sandbox = backend.create("sess-1").await.unwrap();
        assert_eq!(sandbox.base_url, "http://localhost:8080");
        assert_eq!(sandbox.mode, SandboxMode::Local);
    }

    #[tokio::test]
    async fn expose_port_returns_localhost_url_for_port() {
        let backend = LocalBackend::new(8080);
        let sandbox = backend.create("sess-1").await.unwrap();
        assert_eq!(backend.expose_port(&sandbox, 3000), "http://localhost:3000");
    }

    #[tokio::test]
    async fn lifecycle_no_ops_succeed() {
        let backend = LocalBackend::new(8080);
        let sandbox = backend.create("sess-1").await.unwrap();
        backend.start(&sandbox).await.unwrap();
        backend.stop(&sandbox).await.unwrap();
        backend.cleanup(&sandbox).await.unwrap();
    }
}
