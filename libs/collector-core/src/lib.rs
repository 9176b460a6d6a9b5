//! Module bootstrap core for the APM collector.
//!
//! A process is assembled from [`ModuleProvider`]s: each implements one named module,
//! declares the modules it requires and registers typed services once started. The
//! [`ModuleManager`] selects one provider per module, orders them by dependency and
//! drives them through `prepare → start → notify_after_completed`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod context;
pub mod contracts;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod manager;
pub mod runtime;
pub mod service_registry;

#[cfg(feature = "bootstrap")]
pub mod bootstrap;

pub use config::{ConfigProvider, EmptyConfig, ProviderConfig};
pub use context::ModuleCtx;
pub use contracts::ModuleProvider;
pub use error::{
    BootstrapError, ConfigurationError, CyclicDependencyError, DuplicateServiceError,
    ModuleError, ModuleNotFoundError, Phase, ServiceNotProvidedError,
};
pub use lifecycle::LifecycleState;
pub use manager::{Module, ModuleManager, ProviderSet};
pub use service_registry::{ServiceRegistry, ServiceTag};

pub use async_trait::async_trait;
