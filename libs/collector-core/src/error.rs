//! Error taxonomy for module assembly and bootstrap.
//!
//! Every bootstrap-phase error is fatal: the runtime aborts process start and
//! never retries. After bootstrap, callers on a request path should map
//! [`ServiceNotProvidedError`] to an "unavailable" response instead of failing hard.

use std::fmt;

use crate::service_registry::ServiceTag;

/// A required module name has no bound provider in this process.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("module '{module}' not found{}", required_by_suffix(.required_by.as_deref()))]
pub struct ModuleNotFoundError {
    pub module: String,
    /// Module whose declared requirements named the missing module, if known.
    pub required_by: Option<String>,
}

fn required_by_suffix(required_by: Option<&str>) -> String {
    required_by
        .map(|m| format!(" (required by '{m}')"))
        .unwrap_or_default()
}

/// The dependency graph contains a cycle.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cyclic module dependency detected at '{module}': {}", .cycle.join(" -> "))]
pub struct CyclicDependencyError {
    /// One member of the cycle.
    pub module: String,
    /// The cycle as a path, first element repeated at the end.
    pub cycle: Vec<String>,
}

/// A lookup found the target module but not the requested service tag.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("service '{service}' is not provided by module '{module}'")]
pub struct ServiceNotProvidedError {
    pub module: String,
    pub service: ServiceTag,
}

/// The same service tag was registered twice in one registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("service '{service}' is already registered in module '{module}'")]
pub struct DuplicateServiceError {
    pub module: String,
    pub service: ServiceTag,
}

/// A required configuration option is missing or malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid configuration for module '{module}': {reason}")]
pub struct ConfigurationError {
    pub module: String,
    pub reason: String,
}

impl ConfigurationError {
    pub fn new(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Errors a provider may return from its lifecycle hooks.
#[derive(thiserror::Error, Debug)]
pub enum ModuleError {
    #[error(transparent)]
    ModuleNotFound(#[from] ModuleNotFoundError),
    #[error(transparent)]
    ServiceNotProvided(#[from] ServiceNotProvidedError),
    #[error(transparent)]
    DuplicateService(#[from] DuplicateServiceError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Lifecycle phase in which a bootstrap error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Start,
    Notify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Prepare => "prepare",
            Phase::Start => "start",
            Phase::Notify => "notify_after_completed",
        })
    }
}

/// Fatal errors produced while assembling or booting the module set.
#[derive(thiserror::Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    ModuleNotFound(#[from] ModuleNotFoundError),

    #[error(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("provider '{provider}' for module '{module}' is registered more than once")]
    DuplicateProvider { module: String, provider: String },

    #[error("{phase} failed for module '{module}' (provider '{provider}')")]
    Lifecycle {
        module: String,
        provider: String,
        phase: Phase,
        #[source]
        source: ModuleError,
    },

    #[error("module '{module}' cannot move from {from} to {to}")]
    InvalidTransition {
        module: String,
        from: crate::lifecycle::LifecycleState,
        to: crate::lifecycle::LifecycleState,
    },
}

impl BootstrapError {
    /// The module that a missing-module failure names, whether it was found during
    /// assembly or by a provider's lookup during `start()`.
    #[must_use]
    pub fn missing_module(&self) -> Option<&str> {
        match self {
            BootstrapError::ModuleNotFound(e)
            | BootstrapError::Lifecycle {
                source: ModuleError::ModuleNotFound(e),
                ..
            } => Some(&e.module),
            _ => None,
        }
    }
}
