use async_trait::async_trait;
use serde::Deserialize;

use ac_domain::{Error, Sandbox, SandboxMode};

use crate::backend::SandboxBackend;

/// Provisions sandboxes on a vendor-hosted remote VM fleet via a thin REST
/// API. The vendor assigns both the sandbox id and its host URL; this
/// backend just persists what the vendor hands back.
pub struct RemoteVmBackend {
    client: reqwest::Client,
    api_base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ProvisionResponse {
    id: String,
    host_url: String,
}

impl RemoteVmBackend {
    pub fn new(api_base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url,
            api_key,
        }
    }
}

#[async_trait]
impl SandboxBackend for RemoteVmBackend {
    async fn create(&self, session_id: &str) -> Result<Sandbox, Error> {
        let response = self
            .client
            .post(format!("{}/v1/sandboxes", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "session_id": session_id }))
            .send()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("vendor provision request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SandboxUnavailable(format!(
                "vendor provision returned {}",
                response.status()
            )));
        }

        let body: ProvisionResponse = response
            .json()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("vendor response malformed: {e}")))?;

        Ok(Sandbox::new(body.id, SandboxMode::RemoteVm, body.host_url))
    }

    async fn connect(&self, sandbox: &Sandbox) -> Result<String, Error> {
        let response = self
            .client
            .get(format!("{}/v1/sandboxes/{}", self.api_base_url, sandbox.id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("vendor lookup request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SandboxUnavailable(format!(
                "vendor lookup returned {}",
                response.status()
            )));
        }

        let body: ProvisionResponse = response
            .json()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("vendor response malformed: {e}")))?;
        Ok(body.host_url)
    }

    fn expose_port(&self, sandbox: &Sandbox, port: u16) -> String {
        format!("{}/ports/{port}", sandbox.base_url.trim_end_matches('/'))
    }

    async fn start(&self, sandbox: &Sandbox) -> Result<(), Error> {
        self.post_action(&sandbox.id, "start").await
    }

    async fn stop(&self, sandbox: &Sandbox) -> Result<(), Error> {
        self.post_action(&sandbox.id, "stop").await
    }

    async fn cleanup(&self, sandbox: &Sandbox) -> Result<(), Error> {
        let response = self
            .client
            .delete(format!("{}/v1/sandboxes/{}", self.api_base_url, sandbox.id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("vendor delete request failed: {e}")))?;
        if !response.status().is_success() {
            tracing::warn!(sandbox_id = %sandbox.id, status = %response.status(), "vendor delete returned non-success");
        }
        Ok(())
    }
}

impl RemoteVmBackend {
    async fn post_action(&self, sandbox_id: &str, action: &str) -> Result<(), Error> {
        let response = self
            .client
            .post(format!("{}/v1/sandboxes/{sandbox_id}/{action}", self.api_base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("vendor {action} request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::SandboxUnavailable(format!(
                "vendor {action} returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_port_appends_ports_path() {
        let backend = RemoteVmBackend::new("https://vendor.example".into(), "key".into());
        let sandbox = Sandbox::new("vm-1", SandboxMode::RemoteVm, "https://vm-1.vendor.example/");
        assert_eq!(
            backend.expose_port(&sandbox, 3000),
            "https://vm-1.vendor.example/ports/3000"
        );
    }
}
