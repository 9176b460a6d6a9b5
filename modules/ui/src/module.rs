//! `jetty` provider of the UI module.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use collector_cluster::{
    CachingNamingListener, Endpoint, ModuleListenerService, ModuleRegisterService,
};
use collector_core::{ModuleCtx, ModuleError, ModuleProvider, ProviderConfig};
use collector_jetty_manager::{JettyEndpointConfig, JettyManagerService};
use collector_naming::{ListenerNamingHandler, NamingHandlerRegisterService};
use collector_storage::DaoService;

use crate::handlers;

pub const MODULE_NAME: &str = "ui";
const PROVIDER_NAME: &str = "jetty";

/// UI module serving storage queries over a shared jetty server.
///
/// Looks up the storage module without declaring it: a process assembled
/// without storage fails in `start` with a module-not-found error.
#[derive(Default)]
pub struct JettyUiProvider {
    config: OnceLock<JettyEndpointConfig>,
    cluster: OnceLock<Arc<dyn ModuleRegisterService>>,
    listener: OnceLock<Arc<CachingNamingListener>>,
}

impl JettyUiProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The naming listener attached during `start`, if started.
    #[must_use]
    pub fn naming_listener(&self) -> Option<Arc<CachingNamingListener>> {
        self.listener.get().cloned()
    }
}

#[async_trait]
impl ModuleProvider for JettyUiProvider {
    fn module(&self) -> &str {
        MODULE_NAME
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn required_modules(&self) -> Vec<&str> {
        vec![
            collector_cluster::MODULE_NAME,
            collector_jetty_manager::MODULE_NAME,
            collector_naming::MODULE_NAME,
        ]
    }

    fn prepare(&self, config: &ProviderConfig) -> Result<(), ModuleError> {
        let cfg: JettyEndpointConfig = config.required()?;
        self.config
            .set(cfg)
            .map_err(|_| anyhow::anyhow!("ui provider prepared twice"))?;
        Ok(())
    }

    async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let cfg = self
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("ui provider started before prepare"))?;

        let register =
            ctx.service::<dyn ModuleRegisterService>(collector_cluster::MODULE_NAME)?;
        register.register(
            MODULE_NAME,
            PROVIDER_NAME,
            Endpoint::new(&cfg.host, cfg.port).with_context_path(&cfg.context_path),
        );
        self.cluster.set(register).ok();

        let listener = Arc::new(CachingNamingListener::new(MODULE_NAME, PROVIDER_NAME));
        let listeners =
            ctx.service::<dyn ModuleListenerService>(collector_cluster::MODULE_NAME)?;
        listeners.add_listener(MODULE_NAME, PROVIDER_NAME, listener.clone());

        let naming =
            ctx.service::<dyn NamingHandlerRegisterService>(collector_naming::MODULE_NAME)?;
        naming
            .register(Arc::new(ListenerNamingHandler::new(Arc::clone(&listener))))
            .map_err(anyhow::Error::from)?;
        self.listener.set(listener).ok();

        let dao = ctx.service::<dyn DaoService>(collector_storage::MODULE_NAME)?;

        let jetty =
            ctx.service::<dyn JettyManagerService>(collector_jetty_manager::MODULE_NAME)?;
        let server = jetty
            .get_or_create_if_absent(&cfg.host, cfg.port, &cfg.context_path)
            .map_err(anyhow::Error::from)?;
        for handler in handlers::all(&dao) {
            server.add_handler(handler).map_err(anyhow::Error::from)?;
        }

        tracing::info!(
            server = %server.address(),
            routes = server.routes().len(),
            "UI handlers mounted"
        );
        Ok(())
    }

    async fn stop(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        if let Some(cluster) = self.cluster.get() {
            cluster.deregister(MODULE_NAME, PROVIDER_NAME);
        }
        Ok(())
    }
}
