use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::contract::{Endpoint, MembershipEvent, NamingKey};

/// Committed cluster membership: endpoints per key, per process instance.
///
/// Owned by the dispatcher task only, so it needs no locking.
#[derive(Debug, Default)]
pub struct MembershipStore {
    entries: HashMap<NamingKey, BTreeMap<Uuid, Endpoint>>,
}

impl MembershipStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit an event and return the keys whose endpoint set changed.
    ///
    /// Re-registering an identical endpoint is not a change.
    pub fn apply(&mut self, event: MembershipEvent) -> Vec<NamingKey> {
        match event {
            MembershipEvent::Registered {
                key,
                instance,
                endpoint,
            } => {
                let instances = self.entries.entry(key.clone()).or_default();
                if instances.get(&instance) == Some(&endpoint) {
                    return Vec::new();
                }
                instances.insert(instance, endpoint);
                vec![key]
            }
            MembershipEvent::Deregistered { key, instance } => {
                let Some(instances) = self.entries.get_mut(&key) else {
                    return Vec::new();
                };
                if instances.remove(&instance).is_none() {
                    return Vec::new();
                }
                if instances.is_empty() {
                    self.entries.remove(&key);
                }
                vec![key]
            }
            MembershipEvent::InstanceLost { instance } => {
                let mut changed: Vec<NamingKey> = self
                    .entries
                    .iter_mut()
                    .filter_map(|(key, instances)| {
                        instances.remove(&instance).map(|_| key.clone())
                    })
                    .collect();
                self.entries.retain(|_, instances| !instances.is_empty());
                changed.sort();
                changed
            }
        }
    }

    /// Union of the endpoints of every instance serving `key`, ordered by instance.
    #[must_use]
    pub fn endpoints(&self, key: &NamingKey) -> Vec<Endpoint> {
        self.entries
            .get(key)
            .map(|instances| instances.values().cloned().collect())
            .unwrap_or_default()
    }
}
