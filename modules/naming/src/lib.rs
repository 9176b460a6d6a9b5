//! Naming module
//!
//! Lets modules publish naming handlers that report where a (module, provider)
//! pair lives, and exposes them to external callers over HTTP.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === MODULE DEFINITION ===
pub mod module;
pub use module::{MODULE_NAME, NamingJettyProvider};

// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::{
    DuplicateNamingHandlerError, ListenerNamingHandler, NamingHandler,
    NamingHandlerRegisterService,
};

// === DOMAIN ===
pub mod registry;
pub use registry::NamingHandlerRegistry;
