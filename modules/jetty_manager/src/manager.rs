use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contract::{JettyError, JettyManagerService, normalize_context_path};
use crate::server::JettyServer;

/// Servers of this process, deduplicated by `host:port`.
#[derive(Default)]
pub struct JettyManager {
    servers: Mutex<BTreeMap<String, Arc<JettyServer>>>,
}

impl JettyManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every server created so far, ordered by address.
    #[must_use]
    pub fn servers(&self) -> Vec<Arc<JettyServer>> {
        self.servers.lock().values().cloned().collect()
    }
}

impl JettyManagerService for JettyManager {
    fn get_or_create_if_absent(
        &self,
        host: &str,
        port: u16,
        context_path: &str,
    ) -> Result<Arc<JettyServer>, JettyError> {
        let context_path = normalize_context_path(context_path);
        let address = format!("{host}:{port}");
        let mut servers = self.servers.lock();

        if let Some(existing) = servers.get(&address) {
            if existing.context_path() != context_path {
                return Err(JettyError::ContextPathConflict {
                    address,
                    existing: existing.context_path().to_owned(),
                    requested: context_path,
                });
            }
            return Ok(Arc::clone(existing));
        }

        tracing::info!(server = %address, context_path = %context_path, "Creating HTTP server");
        let server = Arc::new(JettyServer::new(host, port, context_path));
        servers.insert(address, Arc::clone(&server));
        Ok(server)
    }
}
