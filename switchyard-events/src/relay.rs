//! Realtime relay: fans bus events out to live subscribers of a resource.
//!
//! Each resource id is either inactive (no entry) or active: an entry holding
//! the subscriber set and exactly one relay task bound to the bus on that id.
//! The first attach activates the resource, the last detach tears it down.
//!
//! ```text
//!   bus ──bind(id)──► relay task ──mpsc──► subscriber 1 (socket task)
//!                                 ├──mpsc──► subscriber 2
//!                                 └──mpsc──► subscriber n
//! ```
//!
//! The registry lock is a plain mutex and is never held across an await.
//! Relay tasks only touch their own subscriber set, under its `RwLock`.
//! A subscriber is welcomed only after the relay task has bound the bus, so
//! the welcome line marks the point from which every event reaches it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use switchyard_core::event;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bus::EventBus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Relay for '{resource_id}' unavailable: registry lock poisoned")]
    Poisoned { resource_id: String },
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Messages buffered per subscriber before new ones are dropped for it.
    pub channel_capacity: usize,
    /// First delay before re-binding after the bus binding fails or ends.
    pub rebind_initial: Duration,
    /// Upper bound for the re-bind delay.
    pub rebind_max: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            rebind_initial: Duration::from_millis(100),
            rebind_max: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Delay before the `attempt`-th consecutive re-bind (1-based).
    fn rebind_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.rebind_initial.saturating_mul(factor).min(self.rebind_max)
    }
}

// ============================================================================
// SUBSCRIBERS
// ============================================================================

/// Identity of one attached subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscribers of one resource. Newcomers wait in `pending` until the relay
/// task holds a bus binding; the welcome line is queued as they move to
/// `active`, so any event published after a subscriber saw its welcome is
/// relayed to it.
#[derive(Default)]
struct Members {
    bound: bool,
    active: HashMap<SubscriberId, mpsc::Sender<String>>,
    pending: HashMap<SubscriberId, mpsc::Sender<String>>,
}

impl Members {
    fn welcome(&mut self, resource_id: &str, id: SubscriberId, tx: mpsc::Sender<String>) {
        // Nothing else has been queued on a pending subscriber.
        match tx.try_send(event::welcome(resource_id)) {
            Ok(()) => {
                self.active.insert(id, tx);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(resource_id, subscriber = %id, "Subscriber queue full before welcome");
                self.active.insert(id, tx);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(resource_id, subscriber = %id, "Subscriber closed before welcome");
            }
        }
    }
}

struct Subscription {
    members: RwLock<Members>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    fn new() -> Self {
        Self {
            members: RwLock::new(Members::default()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    fn len(&self) -> usize {
        self.members
            .read()
            .map(|m| m.active.len() + m.pending.len())
            .unwrap_or(0)
    }

    fn add(&self, resource_id: &str, id: SubscriberId, tx: mpsc::Sender<String>) -> Result<(), RelayError> {
        let mut members = self.members.write().map_err(|_| RelayError::Poisoned {
            resource_id: resource_id.to_string(),
        })?;
        if members.bound {
            members.welcome(resource_id, id, tx);
        } else {
            members.pending.insert(id, tx);
        }
        Ok(())
    }

    fn remove(&self, id: &SubscriberId) {
        if let Ok(mut members) = self.members.write() {
            members.active.remove(id);
            members.pending.remove(id);
        }
    }

    /// The relay task now holds a binding: welcome everyone still waiting.
    fn mark_bound(&self, resource_id: &str) -> usize {
        let Ok(mut members) = self.members.write() else {
            return 0;
        };
        members.bound = true;
        let pending: Vec<_> = members.pending.drain().collect();
        let welcomed = pending.len();
        for (id, tx) in pending {
            members.welcome(resource_id, id, tx);
        }
        welcomed
    }

    fn mark_unbound(&self) {
        if let Ok(mut members) = self.members.write() {
            members.bound = false;
        }
    }

    /// Hand `text` to every welcomed subscriber except `skip`. Returns how
    /// many took it.
    fn fan_out(&self, resource_id: &str, text: &str, skip: Option<SubscriberId>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        if let Ok(members) = self.members.read() {
            for (id, tx) in members.active.iter() {
                if Some(*id) == skip {
                    continue;
                }
                match tx.try_send(text.to_string()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(resource_id, subscriber = %id, "Subscriber queue full, message dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            if let Ok(mut members) = self.members.write() {
                for id in &closed {
                    members.active.remove(id);
                    tracing::debug!(resource_id, subscriber = %id, "Dropped closed subscriber");
                }
            }
        }
        delivered
    }
}

/// One attached subscriber: its id and the receiving end of its queue.
///
/// Dropping the handle detaches it.
pub struct SubscriberHandle {
    resource_id: String,
    id: SubscriberId,
    rx: mpsc::Receiver<String>,
    hub: RelayHub,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Next message for this subscriber. `None` once the hub dropped it.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Send `text` to every other subscriber of the same resource.
    pub fn relay_to_peers(&self, text: &str) -> usize {
        self.hub.relay_direct(&self.resource_id, self.id, text)
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.hub.detach(&self.resource_id, self.id);
    }
}

// ============================================================================
// HUB
// ============================================================================

struct HubInner {
    bus: Arc<dyn EventBus>,
    config: RelayConfig,
    subscriptions: Mutex<HashMap<String, Arc<Subscription>>>,
    relays_started: AtomicU64,
}

/// Registry of active resources. Cheap to clone.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

impl RelayHub {
    pub fn new(bus: Arc<dyn EventBus>, config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                bus,
                config,
                subscriptions: Mutex::new(HashMap::new()),
                relays_started: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a new subscriber to `resource_id`, activating the resource if
    /// needed. The welcome line is the first message in the returned queue and
    /// is only queued once the relay for the resource is bound to the bus.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, resource_id: &str) -> Result<SubscriberHandle, RelayError> {
        let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity);
        let id = SubscriberId::now_v7();

        {
            let mut subscriptions = self.inner.subscriptions.lock().map_err(|_| {
                tracing::error!(resource_id, "Relay registry lock poisoned, subscriber not attached");
                RelayError::Poisoned {
                    resource_id: resource_id.to_string(),
                }
            })?;
            let subscription = subscriptions
                .entry(resource_id.to_string())
                .or_insert_with(|| self.activate(resource_id));
            if let Err(e) = subscription.add(resource_id, id, tx) {
                tracing::error!(resource_id, error = %e, "Subscriber not attached");
                if subscription.len() == 0 {
                    if let Some(subscription) = subscriptions.remove(resource_id) {
                        subscription.cancel.cancel();
                    }
                }
                return Err(e);
            }
        }

        tracing::info!(resource_id, subscriber = %id, "Subscriber attached");
        Ok(SubscriberHandle {
            resource_id: resource_id.to_string(),
            id,
            rx,
            hub: self.clone(),
        })
    }

    /// Spawn the relay task for a resource going active. Called under the
    /// registry lock, so at most one task exists per resource id.
    fn activate(&self, resource_id: &str) -> Arc<Subscription> {
        let subscription = Arc::new(Subscription::new());
        let handle = tokio::spawn(run_relay(
            resource_id.to_string(),
            Arc::clone(&self.inner.bus),
            Arc::clone(&subscription),
            self.inner.config.clone(),
        ));
        if let Ok(mut task) = subscription.task.lock() {
            *task = Some(handle);
        }
        self.inner.relays_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(resource_id, "Relay activated");
        subscription
    }

    /// Remove a subscriber. Returns `true` if that was the last one and the
    /// resource went inactive.
    pub fn detach(&self, resource_id: &str, id: SubscriberId) -> bool {
        let Ok(mut subscriptions) = self.inner.subscriptions.lock() else {
            return false;
        };
        let Some(subscription) = subscriptions.get(resource_id) else {
            return false;
        };

        subscription.remove(&id);
        tracing::info!(resource_id, subscriber = %id, "Subscriber detached");

        if subscription.len() > 0 {
            return false;
        }

        if let Some(subscription) = subscriptions.remove(resource_id) {
            subscription.cancel.cancel();
            tracing::info!(resource_id, "Relay deactivated");
        }
        true
    }

    /// Send `text` to every subscriber of `resource_id` except `from`,
    /// bypassing the bus. Returns the number of subscribers reached.
    pub fn relay_direct(&self, resource_id: &str, from: SubscriberId, text: &str) -> usize {
        let subscription = match self.inner.subscriptions.lock() {
            Ok(subscriptions) => subscriptions.get(resource_id).cloned(),
            Err(_) => None,
        };
        subscription
            .map(|s| s.fan_out(resource_id, text, Some(from)))
            .unwrap_or(0)
    }

    /// Number of active resources, equal to the number of relay tasks.
    pub fn active_relays(&self) -> usize {
        self.inner.subscriptions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn subscriber_count(&self, resource_id: &str) -> usize {
        self.inner
            .subscriptions
            .lock()
            .ok()
            .and_then(|s| s.get(resource_id).map(|sub| sub.len()))
            .unwrap_or(0)
    }

    pub fn total_subscribers(&self) -> usize {
        self.inner
            .subscriptions
            .lock()
            .map(|s| s.values().map(|sub| sub.len()).sum())
            .unwrap_or(0)
    }

    /// Relay tasks spawned since the hub was created.
    pub fn relays_started(&self) -> u64 {
        self.inner.relays_started.load(Ordering::Relaxed)
    }

    /// Cancel every relay task and forget all subscribers.
    pub fn shutdown(&self) {
        if let Ok(mut subscriptions) = self.inner.subscriptions.lock() {
            for (resource_id, subscription) in subscriptions.drain() {
                subscription.cancel.cancel();
                if let Ok(mut task) = subscription.task.lock() {
                    if let Some(handle) = task.take() {
                        handle.abort();
                    }
                }
                tracing::debug!(resource_id, "Relay stopped on shutdown");
            }
        }
    }
}

// ============================================================================
// RELAY TASK
// ============================================================================

async fn run_relay(
    resource_id: String,
    bus: Arc<dyn EventBus>,
    subscription: Arc<Subscription>,
    config: RelayConfig,
) {
    let cancel = subscription.cancel.clone();
    let mut attempt: u32 = 0;

    loop {
        let binding = tokio::select! {
            _ = cancel.cancelled() => break,
            binding = bus.bind(&resource_id) => binding,
        };

        match binding {
            Ok(mut stream) => {
                let welcomed = subscription.mark_bound(&resource_id);
                tracing::debug!(resource_id, exchange = bus.exchange(), welcomed, "Relay bound");
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::debug!(resource_id, "Relay task shutting down");
                            return;
                        }
                        next = stream.next() => match next {
                            Some(event) => {
                                attempt = 0;
                                let delivered = subscription.fan_out(&resource_id, &event.payload, None);
                                tracing::debug!(resource_id, delivered, "Relayed event");
                            }
                            None => {
                                subscription.mark_unbound();
                                tracing::warn!(resource_id, "Bus binding ended, re-binding");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(resource_id, error = %e, "Relay bind failed");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = config.rebind_delay(attempt);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    tracing::debug!(resource_id, "Relay task shutting down");
}
