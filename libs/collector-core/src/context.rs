use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::error::{DuplicateServiceError, ModuleError, ModuleNotFoundError};
use crate::manager::{Module, ModuleManager};
use crate::service_registry::ServiceRegistry;

/// Module execution context handed to every provider lifecycle hook.
///
/// It gives a provider access to:
/// - **Configuration**: its own typed options via [`config()`](Self::config)
/// - **Its registry**: [`register()`](Self::register) binds the services it exposes
/// - **Other modules**: [`find()`](Self::find) and [`service()`](Self::service)
/// - **Lifecycle**: a cancellation token that fires on process shutdown
///
/// ```ignore
/// async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
///     let cfg: JettyConfig = ctx.config().required()?;
///     let register = ctx.service::<dyn ModuleRegisterService>("cluster")?;
///     register.register("ui", "jetty", Endpoint::new(&cfg.host, cfg.port));
///     ctx.register::<dyn UiQueryService>(Arc::new(UiQueries::new()))?;
///     Ok(())
/// }
/// ```
pub struct ModuleCtx<'a> {
    manager: &'a ModuleManager,
    module: &'a Module,
    cancellation_token: CancellationToken,
}

impl<'a> ModuleCtx<'a> {
    pub(crate) fn new(manager: &'a ModuleManager, module: &'a Module) -> Self {
        Self {
            manager,
            module,
            cancellation_token: manager.cancellation_token().child_token(),
        }
    }

    #[inline]
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    #[inline]
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.module.provider_name()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        self.module.config()
    }

    /// Process-level instance id, shared by every module in this process.
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.manager.instance_id()
    }

    /// Fires when the process starts shutting down.
    #[inline]
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// This module's own service registry.
    #[inline]
    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        self.module.services()
    }

    /// Bind a service of this module under the interface type `T`.
    ///
    /// # Errors
    /// Returns `DuplicateServiceError` if `T` is already bound.
    pub fn register<T>(&self, service: Arc<T>) -> Result<(), DuplicateServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.module.services().register::<T>(service)
    }

    /// Look up another module by name.
    ///
    /// Modules outside the declared requirements are still resolved, but nothing
    /// guarantees they have started; their services may not be bound yet.
    ///
    /// # Errors
    /// Returns `ModuleNotFoundError` if no provider for `name` was assembled.
    pub fn find(&self, name: &str) -> Result<&'a Module, ModuleNotFoundError> {
        if name != self.module.name() && !self.module.requires(name) {
            tracing::warn!(
                module = self.module.name(),
                target = name,
                "Lookup of a module outside the declared requirements"
            );
        }
        self.manager.find(name)
    }

    /// Shorthand for `find(module)?.get_service::<T>()`.
    ///
    /// # Errors
    /// Returns `ModuleError::ModuleNotFound` or `ModuleError::ServiceNotProvided`.
    pub fn service<T>(&self, module: &str) -> Result<Arc<T>, ModuleError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Ok(self.find(module)?.get_service::<T>()?)
    }
}
