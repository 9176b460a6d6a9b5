//! Per-module, type-safe service registry.
//!
//! Design goals:
//! - A provider binds each of its services exactly once, during `start()`.
//! - Consumers fetch by *interface type* (usually a trait object such as
//!   `dyn ModuleRegisterService`) without knowing the concrete implementation.
//! - After the owning provider has started the registry is append-only, so
//!   repeated lookups always return the same `Arc`.
//!
//! Implementation details:
//! - Key = `TypeId::of::<T>()`, which works for `T = dyn Trait`. The type name is kept
//!   next to the value for error messages only.
//! - Value = `Arc<T>` stored as `Box<dyn Any + Send + Sync>` (downcast on read).
//! - Sync hot path: `get()` is non-async and takes a shared read lock only.

use parking_lot::RwLock;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::error::{DuplicateServiceError, ServiceNotProvidedError};

/// Stable identity of a service tag: the interface type it is registered under.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct ServiceTag {
    id: TypeId,
    name: &'static str,
}

impl ServiceTag {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type Boxed = Box<dyn Any + Send + Sync>;

/// Services exposed by one module, keyed by interface type.
pub struct ServiceRegistry {
    module: Arc<str>,
    map: RwLock<HashMap<ServiceTag, Boxed>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new(module: impl Into<Arc<str>>) -> Self {
        Self {
            module: module.into(),
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `service` under the interface type `T`.
    ///
    /// `T` can be a trait object like `dyn collector_cluster::ModuleRegisterService`.
    ///
    /// # Errors
    /// Returns `DuplicateServiceError` if `T` is already bound in this registry.
    pub fn register<T>(&self, service: Arc<T>) -> Result<(), DuplicateServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let tag = ServiceTag::of::<T>();
        let mut w = self.map.write();
        if w.contains_key(&tag) {
            return Err(DuplicateServiceError {
                module: self.module.to_string(),
                service: tag,
            });
        }
        w.insert(tag, Box::new(service));
        tracing::debug!(module = %self.module, service = tag.name(), "Service registered");
        Ok(())
    }

    /// Fetch the service bound under the interface type `T`.
    ///
    /// # Errors
    /// Returns `ServiceNotProvidedError` if nothing is bound under `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ServiceNotProvidedError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let tag = ServiceTag::of::<T>();
        let r = self.map.read();

        // Stored value is exactly `Arc<T>` because the key is `TypeId::of::<T>()`.
        r.get(&tag)
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or_else(|| ServiceNotProvidedError {
                module: self.module.to_string(),
                service: tag,
            })
    }

    #[must_use]
    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.map.read().contains_key(&ServiceTag::of::<T>())
    }

    /// Introspection: tags currently bound, sorted by name.
    #[must_use]
    pub fn tags(&self) -> Vec<ServiceTag> {
        let mut tags: Vec<ServiceTag> = self.map.read().keys().copied().collect();
        tags.sort_by_key(ServiceTag::name);
        tags
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("module", &self.module)
            .field("services", &self.tags())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    trait TestApi: Send + Sync + std::fmt::Debug {
        fn id(&self) -> usize;
    }

    #[derive(Debug)]
    struct ImplA(usize);
    impl TestApi for ImplA {
        fn id(&self) -> usize {
            self.0
        }
    }

    trait AnotherApi: Send + Sync {
        fn name(&self) -> &str;
    }

    struct ImplB(&'static str);
    impl AnotherApi for ImplB {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn register_and_get_dyn_trait() {
        let registry = ServiceRegistry::new("test");
        let api: Arc<dyn TestApi> = Arc::new(ImplA(7));
        registry.register::<dyn TestApi>(api.clone()).unwrap();

        let got = registry.get::<dyn TestApi>().unwrap();
        assert_eq!(got.id(), 7);
        assert!(Arc::ptr_eq(&api, &got));
    }

    #[test]
    fn repeated_lookups_return_identical_instance() {
        let registry = ServiceRegistry::new("test");
        registry
            .register::<dyn TestApi>(Arc::new(ImplA(1)))
            .unwrap();

        let first = registry.get::<dyn TestApi>().unwrap();
        let second = registry.get::<dyn TestApi>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn registering_same_tag_twice_is_rejected() {
        let registry = ServiceRegistry::new("cluster");
        registry
            .register::<dyn TestApi>(Arc::new(ImplA(10)))
            .unwrap();

        let err = registry
            .register::<dyn TestApi>(Arc::new(ImplA(20)))
            .unwrap_err();
        assert_eq!(err.module, "cluster");
        assert!(err.service.name().contains("TestApi"));

        // First binding is kept
        assert_eq!(registry.get::<dyn TestApi>().unwrap().id(), 10);
    }

    #[test]
    fn get_unregistered_tag_fails_with_service_not_provided() {
        let registry = ServiceRegistry::new("naming");

        let err = registry.get::<dyn TestApi>().unwrap_err();
        assert_eq!(err.module, "naming");
        assert!(
            format!("{err}").contains("TestApi"),
            "Error should reference the trait type"
        );
    }

    #[test]
    fn distinct_trait_types_coexist() {
        let registry = ServiceRegistry::new("test");
        registry
            .register::<dyn TestApi>(Arc::new(ImplA(99)))
            .unwrap();
        registry
            .register::<dyn AnotherApi>(Arc::new(ImplB("service-x")))
            .unwrap();

        assert_eq!(registry.get::<dyn TestApi>().unwrap().id(), 99);
        assert_eq!(registry.get::<dyn AnotherApi>().unwrap().name(), "service-x");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains::<dyn AnotherApi>());
    }

    #[test]
    fn concrete_and_trait_object_tags_are_distinct() {
        let registry = ServiceRegistry::new("test");
        registry.register::<ImplA>(Arc::new(ImplA(1))).unwrap();

        assert!(registry.get::<ImplA>().is_ok());
        assert!(registry.get::<dyn TestApi>().is_err());
    }

    #[test]
    fn concurrent_reads_after_registration() {
        let registry = Arc::new(ServiceRegistry::new("test"));
        registry
            .register::<dyn TestApi>(Arc::new(ImplA(5)))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&registry);
                std::thread::spawn(move || r.get::<dyn TestApi>().unwrap().id())
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), 5);
        }
    }
}
