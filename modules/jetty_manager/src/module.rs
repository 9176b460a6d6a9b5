//! `jetty` provider of the jetty manager module.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use collector_core::{ModuleCtx, ModuleError, ModuleProvider, ProviderConfig};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::contract::JettyManagerService;
use crate::manager::JettyManager;

pub const MODULE_NAME: &str = "jetty_manager";

/// Configuration for the jetty manager
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JettyManagerConfig {
    /// Bind and serve the created servers once bootstrap completes.
    #[serde(default = "default_serve")]
    pub serve: bool,
}

fn default_serve() -> bool {
    true
}

impl Default for JettyManagerConfig {
    fn default() -> Self {
        Self {
            serve: default_serve(),
        }
    }
}

/// Owns the process's HTTP servers.
///
/// Servers must be requested during `start`; they are bound in
/// `notify_after_completed` and shut down gracefully on `stop`.
#[derive(Default)]
pub struct JettyManagerProvider {
    config: OnceLock<JettyManagerConfig>,
    manager: OnceLock<Arc<JettyManager>>,
    shutdown: OnceLock<CancellationToken>,
}

impl JettyManagerProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleProvider for JettyManagerProvider {
    fn module(&self) -> &str {
        MODULE_NAME
    }

    fn name(&self) -> &str {
        "jetty"
    }

    fn prepare(&self, config: &ProviderConfig) -> Result<(), ModuleError> {
        let cfg: JettyManagerConfig = config.or_default()?;
        self.config
            .set(cfg)
            .map_err(|_| anyhow::anyhow!("jetty manager prepared twice"))?;
        Ok(())
    }

    async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let manager = Arc::new(JettyManager::new());
        ctx.register::<dyn JettyManagerService>(manager.clone())?;
        self.manager
            .set(manager)
            .map_err(|_| anyhow::anyhow!("jetty manager started twice"))?;
        self.shutdown
            .set(ctx.cancellation_token().child_token())
            .map_err(|_| anyhow::anyhow!("jetty manager started twice"))?;
        Ok(())
    }

    async fn notify_after_completed(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        let serve = self.config.get().is_none_or(|c| c.serve);
        let (Some(manager), Some(shutdown)) = (self.manager.get(), self.shutdown.get()) else {
            return Err(anyhow::anyhow!("jetty manager not started").into());
        };

        if !serve {
            tracing::info!(servers = manager.servers().len(), "Serving disabled by configuration");
            return Ok(());
        }
        for server in manager.servers() {
            server.serve(shutdown.clone()).await?;
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        if let Some(shutdown) = self.shutdown.get() {
            shutdown.cancel();
        }
        Ok(())
    }
}
