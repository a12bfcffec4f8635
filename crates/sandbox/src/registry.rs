use std::collections::HashMap;

use ac_domain::{Error, Sandbox, SandboxMode};

use crate::backend::SandboxBackend;

/// Maps a configured `SandboxMode` to the backend that implements it. Built
/// once at startup from `SandboxConfig` and shared across sessions.
pub struct SandboxRegistry {
    backends: HashMap<SandboxMode, Box<dyn SandboxBackend>>,
}

impl SandboxRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn register(&mut self, mode: SandboxMode, backend: Box<dyn SandboxBackend>) -> &mut Self {
        self.backends.insert(mode, backend);
        self
    }

    pub fn backend(&self, mode: SandboxMode) -> Result<&dyn SandboxBackend, Error> {
        self.backends
            .get(&mode)
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::SandboxUnavailable(format!("no backend registered for {mode:?}")))
    }

    pub async fn create(&self, mode: SandboxMode, session_id: &str) -> Result<Sandbox, Error> {
        self.backend(mode)?.create(session_id).await
    }
}

impl Default for SandboxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubBackend;

    #[async_trait]
    impl SandboxBackend for StubBackend {
        async fn create(&self, session_id: &str) -> Result<Sandbox, Error> {
            Ok(Sandbox::new(session_id, SandboxMode::Local, "http://localhost:8080"))
        }
        async fn connect(&self, sandbox: &Sandbox) -> Result<String, Error> {
            Ok(sandbox.base_url.clone())
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

    #[tokio::test]
    async fn create_dispatches_to_registered_backend() {
        let mut registry = SandboxRegistry::new();
        registry.register(SandboxMode::Local, Box::new(StubBackend));
        let sandbox = registry.create(SandboxMode::Local, "sess-1").await.unwrap();
        assert_eq!(sandbox.id, "sess-1");
    }

    #[tokio::test]
    async fn missing_backend_is_sandbox_unavailable() {
        let registry = SandboxRegistry::new();
        let err = registry.create(SandboxMode::Container, "sess-1").await.unwrap_err();
        assert!(matches!(err, Error::SandboxUnavailable(_)));
    }
}
