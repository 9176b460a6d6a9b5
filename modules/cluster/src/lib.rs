//! Cluster module
//!
//! Publishes this process's module endpoints cluster-wide and notifies naming
//! listeners when the known endpoints of a (module, provider) key change.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === MODULE DEFINITION ===
pub mod module;
pub use module::{MODULE_NAME, StandaloneClusterProvider};

// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::{
    Endpoint, EndpointSet, MembershipEvent, ModuleListenerService, ModuleRegisterService,
    NamingKey, NamingListener,
};

// === DOMAIN ===
pub mod domain;
pub use domain::caching::CachingNamingListener;
pub use domain::registry::{ClusterRegistry, FeedClosedError, MembershipFeed};
