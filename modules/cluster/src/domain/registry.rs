//! Cluster registration service backed by a single membership dispatcher.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::contract::{
    Endpoint, EndpointSet, MembershipEvent, ModuleListenerService, ModuleRegisterService,
    NamingKey, NamingListener,
};
use crate::domain::listeners::ListenerRegistry;
use crate::domain::store::MembershipStore;

enum Command {
    Apply(MembershipEvent),
    Sync(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// The dispatcher has shut down; the event was not committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("membership dispatcher is not running")]
pub struct FeedClosedError;

/// Sender side of the membership feed.
///
/// A cluster membership transport pushes peer changes here; they are committed
/// in the same order as this process's own registrations.
#[derive(Clone)]
pub struct MembershipFeed {
    tx: mpsc::UnboundedSender<Command>,
}

impl MembershipFeed {
    /// Queue `event` for the dispatcher.
    ///
    /// # Errors
    /// Returns `FeedClosedError` after the registry has shut down.
    pub fn publish(&self, event: MembershipEvent) -> Result<(), FeedClosedError> {
        self.tx
            .send(Command::Apply(event))
            .map_err(|_| FeedClosedError)
    }
}

impl fmt::Debug for MembershipFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipFeed")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Cluster registration and naming listener service of one process.
pub struct ClusterRegistry {
    instance_id: Uuid,
    feed: MembershipFeed,
    listeners: Arc<ListenerRegistry>,
}

impl ClusterRegistry {
    /// Spawn the membership dispatcher on the current Tokio runtime.
    ///
    /// # Errors
    /// Fails when called outside a Tokio runtime.
    pub fn start(instance_id: Uuid) -> anyhow::Result<Self> {
        let handle = Handle::try_current()?;
        let listeners = Arc::new(ListenerRegistry::new(handle.clone()));
        let (tx, rx) = mpsc::unbounded_channel();

        handle.spawn(dispatch(rx, Arc::clone(&listeners)));
        tracing::info!(instance_id = %instance_id, "Membership dispatcher started");

        Ok(Self {
            instance_id,
            feed: MembershipFeed { tx },
            listeners,
        })
    }

    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// A feed for an external membership transport.
    #[must_use]
    pub fn membership_feed(&self) -> MembershipFeed {
        self.feed.clone()
    }

    /// Wait until every change queued before this call is committed to the
    /// snapshots and queued to listeners. Returns at once after shutdown.
    pub async fn sync(&self) {
        let (ack, done) = oneshot::channel();
        if self.feed.tx.send(Command::Sync(ack)).is_ok() {
            // An Err here means the dispatcher is gone, which also ends the wait.
            done.await.ok();
        }
    }

    /// Commit every queued change, then stop the dispatcher and detach listeners.
    ///
    /// Returns once the dispatcher has stopped; later feed pushes fail.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.feed.tx.send(Command::Shutdown(ack)).is_err() {
            tracing::debug!("Membership dispatcher already stopped");
            return;
        }
        done.await.ok();
    }

    fn publish(&self, event: MembershipEvent) {
        if let Err(e) = self.feed.publish(event) {
            tracing::warn!(error = %e, "Registration change dropped");
        }
    }
}

impl ModuleRegisterService for ClusterRegistry {
    fn register(&self, module: &str, provider: &str, endpoint: Endpoint) {
        tracing::info!(
            module,
            provider,
            endpoint = %endpoint,
            instance_id = %self.instance_id,
            "Registering endpoint"
        );
        self.publish(MembershipEvent::Registered {
            key: NamingKey::new(module, provider),
            instance: self.instance_id,
            endpoint,
        });
    }

    fn deregister(&self, module: &str, provider: &str) {
        tracing::info!(module, provider, instance_id = %self.instance_id, "Deregistering endpoint");
        self.publish(MembershipEvent::Deregistered {
            key: NamingKey::new(module, provider),
            instance: self.instance_id,
        });
    }
}

impl ModuleListenerService for ClusterRegistry {
    fn add_listener(&self, module: &str, provider: &str, listener: Arc<dyn NamingListener>) {
        self.listeners
            .subscribe(&NamingKey::new(module, provider), listener);
    }

    fn current(&self, module: &str, provider: &str) -> Arc<EndpointSet> {
        self.listeners.current(&NamingKey::new(module, provider))
    }
}

impl fmt::Debug for ClusterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterRegistry")
            .field("instance_id", &self.instance_id)
            .field("feed", &self.feed)
            .finish_non_exhaustive()
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Command>, listeners: Arc<ListenerRegistry>) {
    let mut store = MembershipStore::new();
    let mut stopped = None;
    while let Some(command) = rx.recv().await {
        match command {
            Command::Apply(event) => {
                for key in store.apply(event) {
                    listeners.publish(&key, store.endpoints(&key));
                }
            }
            Command::Sync(ack) => {
                if ack.send(()).is_err() {
                    tracing::trace!("Sync waiter went away");
                }
            }
            Command::Shutdown(ack) => {
                stopped = Some(ack);
                break;
            }
        }
    }
    rx.close();
    listeners.close();
    tracing::info!("Membership dispatcher stopped");
    if let Some(ack) = stopped {
        ack.send(()).ok();
    }
}
