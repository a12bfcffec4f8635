use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An isolated execution environment backing one session: local process,
/// container, or remote VM. Owns the workspace and runs the tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sandbox {
    pub id: String,
    pub mode: SandboxMode,
    /// RPC base URL for the in-sandbox tool server (`ToolOpClient::Remote`).
    pub base_url: String,
    /// `internal_port -> public_url`, populated as services expose themselves.
    pub port_map: HashMap<u16, String>,
}

/// Mirrors `ac_domain::config::SandboxMode` but lives on the runtime value
/// rather than the config so a `Sandbox` can be serialized/logged without
/// pulling in the config crate's defaulting machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    Local,
    Container,
    RemoteVm,
}

impl Sandbox {
    pub fn new(id: impl Into<String>, mode: SandboxMode, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode,
            base_url: base_url.into(),
            port_map: HashMap::new(),
        }
    }

    /// Record that `port` is now reachable at `public_url`, as happens when
    /// a container-mode service binds a port and the reverse proxy (C5)
    /// synthesizes its externally-routable address.
    pub fn expose_port(&mut self, port: u16, public_url: impl Into<String>) {
        self.port_map.insert(port, public_url.into());
    }

    pub fn public_url(&self, port: u16) -> Option<&str> {
        self.port_map.get(&port).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_port_then_lookup() {
        let mut sandbox = Sandbox::new("abc-def", SandboxMode::Container, "http://abc-def:8080");
        sandbox.expose_port(8080, "http://abc-def-8080.sandbox.localhost");
        assert_eq!(
            sandbox.public_url(8080),
            Some("http://abc-def-8080.sandbox.localhost")
        );
        assert_eq!(sandbox.public_url(9999), None);
    }
}
