use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::context::ModuleCtx;
use crate::error::ModuleError;

/// One concrete implementation of a named module.
///
/// The manager only ever talks to providers through this trait. Lifecycle hooks run
/// sequentially in dependency order:
///
/// 1. [`prepare`](ModuleProvider::prepare) for every provider (configuration validation only).
/// 2. [`start`](ModuleProvider::start) for every provider; dependencies are already started.
/// 3. [`notify_after_completed`](ModuleProvider::notify_after_completed) for every provider,
///    once *all* providers have started.
///
/// [`stop`](ModuleProvider::stop) runs in reverse order on shutdown and is best-effort.
#[async_trait]
pub trait ModuleProvider: Send + Sync + 'static {
    /// Name of the module this provider implements.
    fn module(&self) -> &str;

    /// Provider name, unique within its module.
    fn name(&self) -> &str;

    /// Modules that must be started before this provider's `start()` runs.
    fn required_modules(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Validate configuration. Must not touch any other module.
    ///
    /// # Errors
    /// Returns `ModuleError::Configuration` when an option is missing or malformed.
    fn prepare(&self, config: &ProviderConfig) -> Result<(), ModuleError> {
        let _ = config;
        Ok(())
    }

    /// Populate the module's service registry and wire into required modules.
    ///
    /// # Errors
    /// Any error aborts the whole bootstrap.
    async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError>;

    /// Wiring that needs every module to be started (e.g. sibling modules without a
    /// dependency edge).
    ///
    /// # Errors
    /// Any error aborts the whole bootstrap.
    async fn notify_after_completed(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let _ = ctx;
        Ok(())
    }

    /// Best-effort cleanup on shutdown (e.g. deregistering endpoints).
    ///
    /// # Errors
    /// Errors are logged by the manager and never abort shutdown.
    async fn stop(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let _ = ctx;
        Ok(())
    }
}
