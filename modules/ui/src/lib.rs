//! UI module
//!
//! Registers the UI endpoint with the cluster, publishes a naming handler for it
//! and serves storage queries on a shared jetty server.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === MODULE DEFINITION ===
pub mod module;
pub use module::{JettyUiProvider, MODULE_NAME};

// === HANDLERS ===
pub mod handlers;
pub use handlers::{
    AllInstanceLastTimeGetHandler, ApplicationsGetHandler, InstanceOsInfoGetHandler,
    OneInstanceLastTimeGetHandler,
};
