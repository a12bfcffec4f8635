use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// A service a sandbox-internal process announced via `POST /api/register`.
/// Informational only — routing never consults this, it's derived from the
/// `Host` header on every request — but it lets an operator confirm a
/// service came up.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredService {
    pub registered_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, HashMap<u16, RegisteredService>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, container_name: &str, port: u16) -> RegisteredService {
        let entry = RegisteredService { registered_at: Utc::now() };
        self.services
            .write()
            .entry(container_name.to_string())
            .or_default()
            .insert(port, entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_overwrite_same_port() {
        let registry = ServiceRegistry::new();
        let first = registry.register("abc123", 8080);
        let second = registry.register("abc123", 8080);
        assert!(second.registered_at >= first.registered_at);
    }
}
