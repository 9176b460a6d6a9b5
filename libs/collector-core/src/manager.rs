//! Module manager: provider selection, dependency ordering and lifecycle driving.
//!
//! High-level phase order:
//! - assemble: select one provider per module, build the dependency graph, sort it
//! - `prepare` (all modules, topological order; configuration validation only)
//! - `start` (all modules, topological order; services get registered here)
//! - `notify_after_completed` (all modules, topological order; runs after *all* starts)
//! - `stop` (reverse order, best-effort, on shutdown)
//!
//! Bootstrap is strictly sequential. A failure in any phase aborts it; nothing that
//! was already started is rolled back.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{selected_provider, ConfigProvider, ProviderConfig};
use crate::context::ModuleCtx;
use crate::contracts::ModuleProvider;
use crate::error::{
    BootstrapError, ConfigurationError, ModuleError, ModuleNotFoundError, Phase,
    ServiceNotProvidedError,
};
use crate::graph::DependencyGraph;
use crate::lifecycle::{LifecycleCell, LifecycleState};
use crate::service_registry::ServiceRegistry;

/// Candidate providers gathered at process start, possibly several per module.
#[derive(Default, Clone)]
pub struct ProviderSet {
    providers: Vec<Arc<dyn ModuleProvider>>,
}

impl ProviderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, provider: impl ModuleProvider) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn push(&mut self, provider: Arc<dyn ModuleProvider>) {
        self.providers.push(provider);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl FromIterator<Arc<dyn ModuleProvider>> for ProviderSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn ModuleProvider>>>(iter: I) -> Self {
        Self {
            providers: iter.into_iter().collect(),
        }
    }
}

/// A named capability slot bound to exactly one provider.
pub struct Module {
    name: String,
    provider_name: String,
    requires: Vec<String>,
    provider: Arc<dyn ModuleProvider>,
    config: ProviderConfig,
    services: ServiceRegistry,
    state: LifecycleCell,
}

impl Module {
    fn new(provider: Arc<dyn ModuleProvider>, config: ProviderConfig) -> Self {
        let name = provider.module().to_owned();
        Self {
            provider_name: provider.name().to_owned(),
            requires: provider
                .required_modules()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            services: ServiceRegistry::new(name.as_str()),
            name,
            provider,
            config,
            state: LifecycleCell::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Declared requirements of the bound provider.
    #[must_use]
    pub fn required_modules(&self) -> &[String] {
        &self.requires
    }

    #[must_use]
    pub fn requires(&self, module: &str) -> bool {
        self.requires.iter().any(|r| r == module)
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Resolve a service this module exposes.
    ///
    /// # Errors
    /// Returns `ServiceNotProvidedError` if the provider did not register `T`
    /// (or has not started yet).
    pub fn get_service<T>(&self) -> Result<Arc<T>, ServiceNotProvidedError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.get::<T>()
    }

    fn enter(&self, to: LifecycleState) -> Result<(), BootstrapError> {
        let from = self.state.load();
        if from.next() == Some(to) {
            Ok(())
        } else {
            Err(self.invalid_transition(from, to))
        }
    }

    fn complete(&self, to: LifecycleState) -> Result<(), BootstrapError> {
        self.state
            .advance(to)
            .map_err(|from| self.invalid_transition(from, to))
    }

    fn invalid_transition(&self, from: LifecycleState, to: LifecycleState) -> BootstrapError {
        BootstrapError::InvalidTransition {
            module: self.name.clone(),
            from,
            to,
        }
    }

    fn lifecycle_error(&self, phase: Phase) -> impl FnOnce(ModuleError) -> BootstrapError + '_ {
        move |source| BootstrapError::Lifecycle {
            module: self.name.clone(),
            provider: self.provider_name.clone(),
            phase,
            source,
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("provider", &self.provider_name)
            .field("requires", &self.requires)
            .field("state", &self.state())
            .field("services", &self.services)
            .finish()
    }
}

/// Owns every module of the process and drives them through their lifecycle.
pub struct ModuleManager {
    modules: HashMap<String, Module>,
    /// Module names in start order.
    order: Vec<String>,
    instance_id: Uuid,
    cancel: CancellationToken,
}

impl ModuleManager {
    /// Select one provider per module, then build and sort the dependency graph.
    ///
    /// Only modules with at least one candidate provider exist. When a module has
    /// several candidates, its config section's `provider` key picks one.
    ///
    /// # Errors
    /// - `DuplicateProvider` if two candidates share a (module, provider) identity
    /// - `Configuration` if the selection is ambiguous, names an unknown provider,
    ///   or a module section is malformed
    /// - `ModuleNotFound` if a selected provider requires an absent module
    /// - `CyclicDependency` if the requirement graph has a cycle
    pub fn assemble(
        providers: ProviderSet,
        config: &dyn ConfigProvider,
    ) -> Result<Self, BootstrapError> {
        let selected = select_providers(providers, config)?;

        let graph = DependencyGraph::build(
            selected
                .iter()
                .map(|p| (p.module(), p.required_modules())),
        )?;
        let order: Vec<String> = graph
            .topological_order()?
            .into_iter()
            .map(str::to_owned)
            .collect();

        let mut modules = HashMap::with_capacity(selected.len());
        for provider in selected {
            let module_name = provider.module().to_owned();
            let cfg = ProviderConfig::from_provider(config, &module_name)?;
            modules.insert(module_name, Module::new(provider, cfg));
        }

        tracing::info!(order = ?order, "Module start order resolved");

        Ok(Self {
            modules,
            order,
            instance_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn with_instance_id(mut self, instance_id: Uuid) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Use an externally owned token as the root of every module's cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Look up a module by name.
    ///
    /// # Errors
    /// Returns `ModuleNotFoundError` if no provider for `name` was assembled.
    pub fn find(&self, name: &str) -> Result<&Module, ModuleNotFoundError> {
        self.modules.get(name).ok_or_else(|| ModuleNotFoundError {
            module: name.to_owned(),
            required_by: None,
        })
    }

    /// Module names in start order.
    #[must_use]
    pub fn start_order(&self) -> &[String] {
        &self.order
    }

    /// Modules in start order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> + '_ {
        self.order.iter().filter_map(|name| self.modules.get(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Drive every module through `prepare`, `start` and `notify_after_completed`.
    ///
    /// # Errors
    /// Returns the first `BootstrapError`; later modules are not touched.
    pub async fn bootstrap(&self) -> Result<(), BootstrapError> {
        self.run_prepare_phase()?;
        self.run_start_phase().await?;
        self.run_notify_phase().await?;
        tracing::info!(modules = self.order.len(), "Bootstrap completed");
        Ok(())
    }

    fn run_prepare_phase(&self) -> Result<(), BootstrapError> {
        tracing::info!("Phase: prepare");
        for module in self.modules() {
            module.enter(LifecycleState::Prepared)?;
            tracing::debug!(module = module.name(), provider = module.provider_name(), "prepare");
            module
                .provider
                .prepare(&module.config)
                .map_err(module.lifecycle_error(Phase::Prepare))?;
            module.complete(LifecycleState::Prepared)?;
        }
        Ok(())
    }

    async fn run_start_phase(&self) -> Result<(), BootstrapError> {
        tracing::info!("Phase: start");
        for module in self.modules() {
            module.enter(LifecycleState::Started)?;
            tracing::debug!(module = module.name(), provider = module.provider_name(), "start");
            let ctx = ModuleCtx::new(self, module);
            module
                .provider
                .start(&ctx)
                .await
                .map_err(module.lifecycle_error(Phase::Start))?;
            module.complete(LifecycleState::Started)?;
            tracing::info!(
                module = module.name(),
                provider = module.provider_name(),
                services = module.services.len(),
                "Module started"
            );
        }
        Ok(())
    }

    async fn run_notify_phase(&self) -> Result<(), BootstrapError> {
        tracing::info!("Phase: notify");
        for module in self.modules() {
            module.enter(LifecycleState::Notified)?;
            let ctx = ModuleCtx::new(self, module);
            module
                .provider
                .notify_after_completed(&ctx)
                .await
                .map_err(module.lifecycle_error(Phase::Notify))?;
            module.complete(LifecycleState::Notified)?;
        }
        Ok(())
    }

    /// Stop started modules in reverse start order. Failures are logged only.
    pub async fn stop(&self) {
        tracing::info!("Phase: stop");
        for name in self.order.iter().rev() {
            let Some(module) = self.modules.get(name) else {
                continue;
            };
            if module.state() < LifecycleState::Started {
                continue;
            }
            let ctx = ModuleCtx::new(self, module);
            if let Err(e) = module.provider.stop(&ctx).await {
                tracing::warn!(
                    module = module.name(),
                    provider = module.provider_name(),
                    error = %e,
                    "Module stop failed"
                );
            }
        }
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("instance_id", &self.instance_id)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// Pick one provider per module, keeping first-seen module order.
fn select_providers(
    providers: ProviderSet,
    config: &dyn ConfigProvider,
) -> Result<Vec<Arc<dyn ModuleProvider>>, BootstrapError> {
    let mut by_module: Vec<(String, Vec<Arc<dyn ModuleProvider>>)> = Vec::new();
    for provider in providers.providers {
        let module = provider.module();
        match by_module.iter_mut().find(|(m, _)| m.as_str() == module) {
            Some((_, candidates)) => {
                if candidates.iter().any(|c| c.name() == provider.name()) {
                    return Err(BootstrapError::DuplicateProvider {
                        module: module.to_owned(),
                        provider: provider.name().to_owned(),
                    });
                }
                candidates.push(provider);
            }
            None => by_module.push((module.to_owned(), vec![provider])),
        }
    }

    let mut selected = Vec::with_capacity(by_module.len());
    for (module, mut candidates) in by_module {
        let chosen = match selected_provider(config, &module)? {
            Some(wanted) => {
                let pos = candidates
                    .iter()
                    .position(|c| c.name() == wanted)
                    .ok_or_else(|| {
                        ConfigurationError::new(
                            &module,
                            format!("unknown provider '{wanted}'"),
                        )
                    })?;
                candidates.swap_remove(pos)
            }
            None if candidates.len() == 1 => candidates.swap_remove(0),
            None => {
                let names: Vec<&str> = candidates.iter().map(|c| c.name()).collect();
                return Err(ConfigurationError::new(
                    &module,
                    format!(
                        "several providers available ({}); select one with 'provider'",
                        names.join(", ")
                    ),
                )
                .into());
            }
        };
        tracing::debug!(module = %module, provider = chosen.name(), "Provider selected");
        selected.push(chosen);
    }
    Ok(selected)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Named {
        module: &'static str,
        name: &'static str,
        requires: Vec<&'static str>,
    }

    impl Named {
        fn new(module: &'static str, name: &'static str, requires: &[&'static str]) -> Self {
            Self {
                module,
                name,
                requires: requires.to_vec(),
            }
        }
    }

    #[async_trait]
    impl ModuleProvider for Named {
        fn module(&self) -> &str {
            self.module
        }
        fn name(&self) -> &str {
            self.name
        }
        fn required_modules(&self) -> Vec<&str> {
            self.requires.clone()
        }
        async fn start(&self, _ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    #[test]
    fn single_candidate_is_selected_without_config() {
        let set = ProviderSet::new().with(Named::new("cluster", "standalone", &[]));
        let mgr = ModuleManager::assemble(set, &crate::config::EmptyConfig).unwrap();
        assert_eq!(mgr.find("cluster").unwrap().provider_name(), "standalone");
        assert_eq!(mgr.find("cluster").unwrap().state(), LifecycleState::Created);
    }

    #[test]
    fn configured_provider_wins_among_candidates() {
        let set = ProviderSet::new()
            .with(Named::new("cluster", "standalone", &[]))
            .with(Named::new("cluster", "zookeeper", &[]));
        let mut cfg = HashMap::new();
        cfg.insert("cluster".to_owned(), json!({ "provider": "zookeeper" }));

        let mgr = ModuleManager::assemble(set, &cfg).unwrap();
        assert_eq!(mgr.find("cluster").unwrap().provider_name(), "zookeeper");
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn ambiguous_candidates_are_a_configuration_error() {
        let set = ProviderSet::new()
            .with(Named::new("cluster", "standalone", &[]))
            .with(Named::new("cluster", "zookeeper", &[]));

        let err = ModuleManager::assemble(set, &crate::config::EmptyConfig).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(ref e) if e.module == "cluster"));
    }

    #[test]
    fn unknown_configured_provider_is_a_configuration_error() {
        let set = ProviderSet::new().with(Named::new("cluster", "standalone", &[]));
        let mut cfg = HashMap::new();
        cfg.insert("cluster".to_owned(), json!({ "provider": "etcd" }));

        let err = ModuleManager::assemble(set, &cfg).unwrap_err();
        assert!(err.to_string().contains("cluster"));
        assert!(matches!(err, BootstrapError::Configuration(ref e) if e.reason.contains("etcd")));
    }

    #[test]
    fn duplicate_provider_identity_is_rejected() {
        let set = ProviderSet::new()
            .with(Named::new("cluster", "standalone", &[]))
            .with(Named::new("cluster", "standalone", &[]));

        let err = ModuleManager::assemble(set, &crate::config::EmptyConfig).unwrap_err();
        assert!(matches!(err, BootstrapError::DuplicateProvider { .. }));
    }

    #[test]
    fn find_unknown_module_fails() {
        let mgr = ModuleManager::assemble(ProviderSet::new(), &crate::config::EmptyConfig).unwrap();
        let err = mgr.find("storage").unwrap_err();
        assert_eq!(err.module, "storage");
        assert!(mgr.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_runs_only_once() {
        let set = ProviderSet::new().with(Named::new("cluster", "standalone", &[]));
        let mgr = ModuleManager::assemble(set, &crate::config::EmptyConfig).unwrap();

        mgr.bootstrap().await.unwrap();
        assert_eq!(mgr.find("cluster").unwrap().state(), LifecycleState::Notified);

        let err = mgr.bootstrap().await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::InvalidTransition {
                from: LifecycleState::Notified,
                to: LifecycleState::Prepared,
                ..
            }
        ));
    }
}
