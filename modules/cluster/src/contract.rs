//! Public contract of the cluster module: naming types and the services it exposes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Network location of one provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_path: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            context_path: None,
        }
    }

    /// Attach a path prefix; an empty or `/` path means "no prefix".
    #[must_use]
    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim_matches('/');
        self.context_path = if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{trimmed}"))
        };
        self
    }

    /// `host:port/context_path`, the form peers use to reach the endpoint.
    #[must_use]
    pub fn address(&self) -> String {
        match &self.context_path {
            Some(path) => format!("{}:{}{path}", self.host, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

/// Naming key: a (module, provider) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamingKey {
    pub module: String,
    pub provider: String,
}

impl NamingKey {
    #[must_use]
    pub fn new(module: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            provider: provider.into(),
        }
    }
}

impl fmt::Display for NamingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.provider)
    }
}

/// Known endpoints of a key at one point of the committed membership history.
///
/// `revision` grows by one per observed change of the key; revision 0 is the empty
/// "nothing registered yet" state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointSet {
    revision: u64,
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(revision: u64, endpoints: Vec<Endpoint>) -> Self {
        Self {
            revision,
            endpoints,
        }
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }
}

impl<'a> IntoIterator for &'a EndpointSet {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

/// A change reported by the cluster membership transport.
///
/// Local registrations are published through the same feed, so every change is
/// committed by one dispatcher in one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// `instance` serves `key` at `endpoint`. Replaces a previous endpoint of the
    /// same instance.
    Registered {
        key: NamingKey,
        instance: Uuid,
        endpoint: Endpoint,
    },
    /// `instance` no longer serves `key`.
    Deregistered { key: NamingKey, instance: Uuid },
    /// The process `instance` left the cluster; all its entries are dropped.
    InstanceLost { instance: Uuid },
}

/// Receives the endpoint set of one key, once initially and then on every change.
///
/// Each listener is driven by its own task: a slow or failing listener delays
/// only itself. Errors and panics are logged and the listener keeps receiving
/// later changes.
#[async_trait]
pub trait NamingListener: Send + Sync + 'static {
    /// Called with the full endpoint set, in commit order.
    ///
    /// # Errors
    /// Any error is logged by the registry and otherwise ignored.
    async fn on_change(&self, endpoints: Arc<EndpointSet>) -> anyhow::Result<()>;
}

/// Publishes this process's endpoints cluster-wide.
///
/// Registration is fire-and-forget: it returns once the change is queued for the
/// membership dispatcher.
pub trait ModuleRegisterService: Send + Sync {
    /// Publish (or overwrite) the endpoint of `module`/`provider` for this process.
    fn register(&self, module: &str, provider: &str, endpoint: Endpoint);

    /// Withdraw this process's endpoint of `module`/`provider`. Best effort.
    fn deregister(&self, module: &str, provider: &str);
}

/// Subscribes naming listeners to (module, provider) keys.
pub trait ModuleListenerService: Send + Sync {
    /// Attach `listener` to the key. It first receives the current endpoint set,
    /// possibly empty, then every later change.
    fn add_listener(&self, module: &str, provider: &str, listener: Arc<dyn NamingListener>);

    /// Latest committed endpoint set of the key; empty when never registered.
    fn current(&self, module: &str, provider: &str) -> Arc<EndpointSet>;
}
