//! Providers compiled into the collector binary.
//!
//! Add new providers here; selection between candidates of one module happens
//! through the `provider` key of the module's config section.

use collector_core::ProviderSet;

#[must_use]
pub fn all() -> ProviderSet {
    ProviderSet::new()
        .with(collector_cluster::StandaloneClusterProvider::new())
        .with(collector_storage::MemoryStorageProvider::new())
        .with(collector_jetty_manager::JettyManagerProvider::new())
        .with(collector_naming::NamingJettyProvider::new())
        .with(collector_ui::JettyUiProvider::new())
}
