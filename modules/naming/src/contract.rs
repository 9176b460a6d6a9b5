use std::sync::Arc;

use collector_cluster::{CachingNamingListener, EndpointSet, NamingKey};

/// Answers "where does this (module, provider) live" from locally observed state.
///
/// Implementations must not block or perform I/O; "not known yet" is an empty set.
pub trait NamingHandler: Send + Sync + 'static {
    fn key(&self) -> &NamingKey;

    /// Most recently observed endpoints of [`key`](Self::key).
    fn endpoints(&self) -> Arc<EndpointSet>;
}

/// A naming handler reading the last value seen by a caching naming listener.
pub struct ListenerNamingHandler {
    listener: Arc<CachingNamingListener>,
}

impl ListenerNamingHandler {
    #[must_use]
    pub fn new(listener: Arc<CachingNamingListener>) -> Self {
        Self { listener }
    }
}

impl NamingHandler for ListenerNamingHandler {
    fn key(&self) -> &NamingKey {
        self.listener.key()
    }

    fn endpoints(&self) -> Arc<EndpointSet> {
        self.listener.latest()
    }
}

/// Two handlers were registered for one key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("a naming handler for '{0}' is already registered")]
pub struct DuplicateNamingHandlerError(pub NamingKey);

/// Collects the naming handlers that modules want exposed for discovery.
pub trait NamingHandlerRegisterService: Send + Sync {
    /// # Errors
    /// Returns `DuplicateNamingHandlerError` if the handler's key is taken.
    fn register(&self, handler: Arc<dyn NamingHandler>) -> Result<(), DuplicateNamingHandlerError>;

    /// Endpoints reported by the handler of the key; empty when there is no
    /// handler or nothing was observed yet.
    fn resolve(&self, module: &str, provider: &str) -> Arc<EndpointSet>;

    /// Keys with a registered handler, sorted.
    fn keys(&self) -> Vec<NamingKey>;
}
