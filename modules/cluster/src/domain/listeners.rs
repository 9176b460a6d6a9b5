//! Per-key endpoint snapshots and naming listener fan-out.
//!
//! Each key owns an atomically swapped snapshot cell and a list of subscriber
//! queues. The dispatcher swaps the cell and enqueues the new snapshot to every
//! subscriber while holding the key's subscriber lock; `subscribe` reads the
//! cell under the same lock, so a new listener sees every revision after its
//! initial one exactly once and in commit order.
//!
//! A key is forgotten once its set is empty and nobody listens to it. Removal
//! and `subscribe` both run under the map entry, so a listener never lands on a
//! forgotten key.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::contract::{Endpoint, EndpointSet, NamingKey, NamingListener};

type SubscriberTx = mpsc::UnboundedSender<Arc<EndpointSet>>;

struct KeyState {
    current: ArcSwap<EndpointSet>,
    subscribers: Mutex<Vec<SubscriberTx>>,
}

impl KeyState {
    fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(EndpointSet::empty()),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

pub struct ListenerRegistry {
    keys: DashMap<NamingKey, Arc<KeyState>>,
    handle: Handle,
    closed: AtomicBool,
}

impl ListenerRegistry {
    /// Subscriber tasks are spawned on `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            keys: DashMap::new(),
            handle,
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self, key: &NamingKey) -> Arc<KeyState> {
        Arc::clone(
            self.keys
                .entry(key.clone())
                .or_insert_with(|| Arc::new(KeyState::new()))
                .value(),
        )
    }

    /// Latest snapshot of `key`, without locking.
    #[must_use]
    pub fn current(&self, key: &NamingKey) -> Arc<EndpointSet> {
        self.keys.get(key).map_or_else(
            || Arc::new(EndpointSet::empty()),
            |state| state.current.load_full(),
        )
    }

    /// Commit a new endpoint set for `key` and queue it to every subscriber.
    pub fn publish(&self, key: &NamingKey, endpoints: Vec<Endpoint>) {
        let state = self.state(key);
        let mut subscribers = state.subscribers.lock();

        let next = Arc::new(EndpointSet::new(
            state.current.load().revision() + 1,
            endpoints,
        ));
        state.current.store(Arc::clone(&next));

        subscribers.retain(|tx| tx.send(Arc::clone(&next)).is_ok());
        tracing::debug!(
            key = %key,
            revision = next.revision(),
            endpoints = next.len(),
            subscribers = subscribers.len(),
            "Naming snapshot published"
        );

        let unused = next.is_empty() && subscribers.is_empty();
        drop(subscribers);
        if unused
            && self
                .keys
                .remove_if(key, |_, state| {
                    state.current.load().is_empty() && state.subscribers.lock().is_empty()
                })
                .is_some()
        {
            tracing::trace!(key = %key, "Naming key forgotten");
        }
    }

    /// Attach `listener` to `key` on its own delivery task.
    pub fn subscribe(&self, key: &NamingKey, listener: Arc<dyn NamingListener>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let initial = {
            let state = self
                .keys
                .entry(key.clone())
                .or_insert_with(|| Arc::new(KeyState::new()));
            let mut subscribers = state.subscribers.lock();
            if !self.closed.load(Ordering::SeqCst) {
                subscribers.push(tx);
            }
            state.current.load_full()
        };

        tracing::debug!(key = %key, revision = initial.revision(), "Naming listener attached");
        self.handle
            .spawn(run_subscriber(key.clone(), listener, initial, rx));
    }

    /// Drop every subscriber queue. Delivery tasks finish once their queue drains.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for entry in &self.keys {
            entry.value().subscribers.lock().clear();
        }
    }
}

async fn run_subscriber(
    key: NamingKey,
    listener: Arc<dyn NamingListener>,
    initial: Arc<EndpointSet>,
    mut rx: mpsc::UnboundedReceiver<Arc<EndpointSet>>,
) {
    deliver(&key, listener.as_ref(), initial).await;
    while let Some(endpoints) = rx.recv().await {
        deliver(&key, listener.as_ref(), endpoints).await;
    }
    tracing::trace!(key = %key, "Naming listener detached");
}

async fn deliver(key: &NamingKey, listener: &dyn NamingListener, endpoints: Arc<EndpointSet>) {
    let revision = endpoints.revision();
    match AssertUnwindSafe(listener.on_change(endpoints))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(key = %key, revision, error = %e, "Naming listener failed");
        }
        Err(_) => {
            tracing::warn!(key = %key, revision, "Naming listener panicked");
        }
    }
}
