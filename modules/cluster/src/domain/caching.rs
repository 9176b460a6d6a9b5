use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::contract::{EndpointSet, NamingKey, NamingListener};

/// Naming listener that keeps the last endpoint set it was handed.
///
/// Readers get the cached value without blocking; until the first delivery it is
/// the empty set.
pub struct CachingNamingListener {
    key: NamingKey,
    latest: ArcSwap<EndpointSet>,
}

impl CachingNamingListener {
    #[must_use]
    pub fn new(module: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            key: NamingKey::new(module, provider),
            latest: ArcSwap::from_pointee(EndpointSet::empty()),
        }
    }

    /// The key this listener is meant to be attached to.
    #[must_use]
    pub fn key(&self) -> &NamingKey {
        &self.key
    }

    #[must_use]
    pub fn latest(&self) -> Arc<EndpointSet> {
        self.latest.load_full()
    }
}

#[async_trait]
impl NamingListener for CachingNamingListener {
    async fn on_change(&self, endpoints: Arc<EndpointSet>) -> anyhow::Result<()> {
        // Deliveries are ordered per listener, so a plain store is enough.
        tracing::debug!(key = %self.key, revision = endpoints.revision(), "Endpoint cache updated");
        self.latest.store(endpoints);
        Ok(())
    }
}
