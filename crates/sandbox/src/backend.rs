use async_trait::async_trait;

use ac_domain::{Error, Sandbox};

/// Lifecycle contract every sandbox backend implements: provision, expose
/// ports, start/stop, and tear down. One instance per `SandboxMode`, built
/// once at startup and held behind the registry.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Provision a fresh sandbox for `session_id` and return it with
    /// `base_url` already set to the in-sandbox tool server's address.
    async fn create(&self, session_id: &str) -> Result<Sandbox, Error>;

    /// Re-derive the tool server's base URL for a sandbox that already
    /// exists (used on gateway restart to reattach to a running session).
    async fn connect(&self, sandbox: &Sandbox) -> Result<String, Error>;

    /// Synthesize the externally-routable URL for `port`. Pure and
    /// synchronous: backends that need network calls to expose a port do
    /// so during `create`, not here.
    fn expose_port(&self, sandbox: &Sandbox, port: u16) -> String;

    async fn start(&self, sandbox: &Sandbox) -> Result<(), Error>;
    async fn stop(&self, sandbox: &Sandbox) -> Result<(), Error>;

    /// Release all resources held by `sandbox`. Must be safe to call on a
    /// sandbox that failed partway through `create`.
    async fn cleanup(&self, sandbox: &Sandbox) -> Result<(), Error>;
}
