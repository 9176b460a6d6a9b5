//! Naming handler registry and its HTTP discovery routes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use collector_cluster::{EndpointSet, NamingKey};
use collector_jetty_manager::{HandlerError, JettyError, JettyHandler, JettyRequest, JettyServer};
use http::Method;
use parking_lot::Mutex;
use serde_json::Value;

use crate::contract::{DuplicateNamingHandlerError, NamingHandler, NamingHandlerRegisterService};

#[derive(Default)]
struct State {
    handlers: BTreeMap<NamingKey, Arc<dyn NamingHandler>>,
    server: Option<Arc<JettyServer>>,
}

/// Registered naming handlers, exposed as `GET /{module}/{provider}` once a
/// server is attached.
#[derive(Default)]
pub struct NamingHandlerRegistry {
    state: Mutex<State>,
}

impl NamingHandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount every registered handler on `server`; later registrations are
    /// mounted as they arrive.
    ///
    /// # Errors
    /// Returns the first route conflict on `server`.
    pub fn attach(&self, server: Arc<JettyServer>) -> Result<(), JettyError> {
        let mut state = self.state.lock();
        for handler in state.handlers.values() {
            server.add_handler(Arc::new(NamingRoute::new(Arc::clone(handler))))?;
        }
        tracing::info!(
            server = %server.address(),
            handlers = state.handlers.len(),
            "Naming handlers mounted"
        );
        state.server = Some(server);
        Ok(())
    }
}

impl NamingHandlerRegisterService for NamingHandlerRegistry {
    fn register(&self, handler: Arc<dyn NamingHandler>) -> Result<(), DuplicateNamingHandlerError> {
        let key = handler.key().clone();
        let mut state = self.state.lock();
        if state.handlers.contains_key(&key) {
            return Err(DuplicateNamingHandlerError(key));
        }
        if let Some(server) = &state.server
            && let Err(e) = server.add_handler(Arc::new(NamingRoute::new(Arc::clone(&handler))))
        {
            tracing::warn!(key = %key, error = %e, "Naming handler not exposed over HTTP");
        }
        tracing::debug!(key = %key, "Naming handler registered");
        state.handlers.insert(key, handler);
        Ok(())
    }

    fn resolve(&self, module: &str, provider: &str) -> Arc<EndpointSet> {
        let key = NamingKey::new(module, provider);
        let handler = self.state.lock().handlers.get(&key).cloned();
        handler.map_or_else(|| Arc::new(EndpointSet::empty()), |h| h.endpoints())
    }

    fn keys(&self) -> Vec<NamingKey> {
        self.state.lock().handlers.keys().cloned().collect()
    }
}

/// HTTP adapter: answers with the endpoint addresses as a JSON array.
struct NamingRoute {
    path: String,
    handler: Arc<dyn NamingHandler>,
}

impl NamingRoute {
    fn new(handler: Arc<dyn NamingHandler>) -> Self {
        let key = handler.key();
        Self {
            path: format!("/{}/{}", key.module, key.provider),
            handler,
        }
    }
}

#[async_trait]
impl JettyHandler for NamingRoute {
    fn path(&self) -> &str {
        &self.path
    }

    async fn handle(&self, request: JettyRequest) -> Result<Value, HandlerError> {
        if request.method != Method::GET {
            return Err(HandlerError::MethodNotAllowed(request.method));
        }
        let endpoints = self.handler.endpoints();
        Ok(Value::Array(
            endpoints
                .iter()
                .map(|e| Value::String(e.address()))
                .collect(),
        ))
    }
}
