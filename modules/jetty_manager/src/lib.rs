//! Jetty manager module
//!
//! Hands out HTTP servers shared by the modules of a process, deduplicated by
//! `host:port`. Modules add handlers; the provider serves the servers with axum
//! once bootstrap completes.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === MODULE DEFINITION ===
pub mod module;
pub use module::{JettyManagerConfig, JettyManagerProvider, MODULE_NAME};

// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::{
    HandlerError, JettyEndpointConfig, JettyError, JettyHandler, JettyManagerService,
    JettyRequest, normalize_context_path,
};

// === INTERNAL MODULES ===
mod manager;
pub mod server;

pub use manager::JettyManager;
pub use server::JettyServer;
