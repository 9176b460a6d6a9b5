//! `standalone` provider of the cluster module.

use std::sync::Arc;

use async_trait::async_trait;
use collector_core::{ModuleCtx, ModuleError, ModuleProvider};

use crate::contract::{ModuleListenerService, ModuleRegisterService};
use crate::domain::registry::{ClusterRegistry, MembershipFeed};

pub const MODULE_NAME: &str = "cluster";

/// Single-process cluster: membership is this process plus whatever an external
/// transport pushes through the [`MembershipFeed`].
///
/// Exposes:
/// - `dyn ModuleRegisterService`
/// - `dyn ModuleListenerService`
/// - `MembershipFeed`
#[derive(Default)]
pub struct StandaloneClusterProvider {
    registry: arc_swap::ArcSwapOption<ClusterRegistry>,
}

impl StandaloneClusterProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleProvider for StandaloneClusterProvider {
    fn module(&self) -> &str {
        MODULE_NAME
    }

    fn name(&self) -> &str {
        "standalone"
    }

    async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        if self.registry.load().is_some() {
            return Err(anyhow::anyhow!("cluster registry already started").into());
        }
        let registry = Arc::new(ClusterRegistry::start(ctx.instance_id())?);

        ctx.register::<dyn ModuleRegisterService>(registry.clone())?;
        ctx.register::<dyn ModuleListenerService>(registry.clone())?;
        ctx.register::<MembershipFeed>(Arc::new(registry.membership_feed()))?;

        self.registry.store(Some(registry));
        tracing::info!("Standalone cluster module started");
        Ok(())
    }

    async fn stop(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        if let Some(registry) = self.registry.swap(None) {
            registry.shutdown().await;
        }
        Ok(())
    }
}
