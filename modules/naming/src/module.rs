//! `jetty` provider of the naming module.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use collector_cluster::{Endpoint, ModuleRegisterService};
use collector_core::{ModuleCtx, ModuleError, ModuleProvider, ProviderConfig};
use collector_jetty_manager::{JettyEndpointConfig, JettyManagerService, JettyServer};

use crate::contract::NamingHandlerRegisterService;
use crate::registry::NamingHandlerRegistry;

pub const MODULE_NAME: &str = "naming";
const PROVIDER_NAME: &str = "jetty";

/// Naming module exposing discovery handlers over HTTP.
///
/// Handlers registered by other modules during their `start` are mounted on the
/// naming server in `notify_after_completed`, once every module has started.
#[derive(Default)]
pub struct NamingJettyProvider {
    config: OnceLock<JettyEndpointConfig>,
    registry: Arc<NamingHandlerRegistry>,
    server: OnceLock<Arc<JettyServer>>,
    cluster: OnceLock<Arc<dyn ModuleRegisterService>>,
}

impl NamingJettyProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleProvider for NamingJettyProvider {
    fn module(&self) -> &str {
        MODULE_NAME
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn required_modules(&self) -> Vec<&str> {
        vec![collector_cluster::MODULE_NAME, collector_jetty_manager::MODULE_NAME]
    }

    fn prepare(&self, config: &ProviderConfig) -> Result<(), ModuleError> {
        let cfg: JettyEndpointConfig = config.required()?;
        self.config
            .set(cfg)
            .map_err(|_| anyhow::anyhow!("naming provider prepared twice"))?;
        Ok(())
    }

    async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let cfg = self
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("naming provider started before prepare"))?;

        ctx.register::<dyn NamingHandlerRegisterService>(self.registry.clone())?;

        let jetty =
            ctx.service::<dyn JettyManagerService>(collector_jetty_manager::MODULE_NAME)?;
        let server = jetty
            .get_or_create_if_absent(&cfg.host, cfg.port, &cfg.context_path)
            .map_err(anyhow::Error::from)?;

        let cluster = ctx.service::<dyn ModuleRegisterService>(collector_cluster::MODULE_NAME)?;
        cluster.register(
            MODULE_NAME,
            PROVIDER_NAME,
            Endpoint::new(&cfg.host, cfg.port).with_context_path(&cfg.context_path),
        );

        self.server
            .set(server)
            .map_err(|_| anyhow::anyhow!("naming provider started twice"))?;
        self.cluster.set(cluster).ok();
        Ok(())
    }

    async fn notify_after_completed(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let server = self
            .server
            .get()
            .ok_or_else(|| anyhow::anyhow!("naming provider not started"))?;
        self.registry
            .attach(Arc::clone(server))
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn stop(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        if let Some(cluster) = self.cluster.get() {
            cluster.deregister(MODULE_NAME, PROVIDER_NAME);
        }
        Ok(())
    }
}
