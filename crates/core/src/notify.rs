//! Change Notifier: fan-out of "this budget changed" events per (client, year).
//!
//! The registry is owned by the query service. Each key gets a broadcast
//! channel on first subscription; the channel is removed when its last
//! subscription is dropped. Publishing never waits on subscribers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use carebudget_shared::types::{ClientId, TransactionId};

use crate::ledger::BudgetKey;

/// What kind of write produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A purchase or refund was recorded.
    TransactionRecorded,
    /// A transaction was voided.
    TransactionVoided,
    /// The budget allocation changed.
    AllocationUpdated,
    /// The subscriber fell behind and missed events.
    Resync,
}

/// Opaque change payload. Receivers refetch rather than apply it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Client whose budget changed.
    pub client_id: ClientId,
    /// Budget year that changed.
    pub year: i32,
    /// Kind of write.
    pub kind: ChangeKind,
    /// Transaction involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    /// When the change was published.
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event stamped now.
    #[must_use]
    pub fn new(key: &BudgetKey, kind: ChangeKind, transaction_id: Option<TransactionId>) -> Self {
        Self {
            client_id: key.client_id.clone(),
            year: key.year,
            kind,
            transaction_id,
            at: Utc::now(),
        }
    }

    /// Scope key of the event.
    #[must_use]
    pub fn key(&self) -> BudgetKey {
        BudgetKey::new(self.client_id.clone(), self.year)
    }
}

/// Item yielded by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// A write committed for the subscribed key.
    Change(ChangeEvent),
    /// Nothing happened within the keep-alive interval.
    KeepAlive,
}

type Channels = DashMap<BudgetKey, broadcast::Sender<ChangeEvent>>;

/// Registry of change channels keyed by (client, year).
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    channels: Arc<Channels>,
    capacity: usize,
}

impl ChangeNotifier {
    /// Creates a registry whose channels buffer `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to changes of one key.
    #[must_use]
    pub fn subscribe(&self, key: BudgetKey) -> Subscription {
        let receiver = self
            .channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        debug!(client_id = %key.client_id, year = key.year, "change subscription added");
        Subscription {
            key,
            receiver: Some(receiver),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Publishes an event to every current subscriber of its key.
    ///
    /// A key with no subscribers is a no-op.
    pub fn publish(&self, event: ChangeEvent) {
        let key = event.key();
        if let Some(sender) = self.channels.get(&key) {
            let delivered = sender.send(event).unwrap_or(0);
            debug!(client_id = %key.client_id, year = key.year, delivered, "change published");
        }
    }

    /// Number of live subscriptions for a key.
    #[must_use]
    pub fn subscriber_count(&self, key: &BudgetKey) -> usize {
        self.channels
            .get(key)
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Number of keys with at least one subscription.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// A live subscription to one key. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    key: BudgetKey,
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    channels: Arc<Channels>,
}

impl Subscription {
    /// Key this subscription listens to.
    #[must_use]
    pub const fn key(&self) -> &BudgetKey {
        &self.key
    }

    /// Waits for the next change, or a keep-alive after `keep_alive` idle time.
    ///
    /// A subscriber that lagged behind gets a `Resync` change, since any
    /// change means refetch. Returns `None` once the subscription is closed.
    pub async fn next_event(&mut self, keep_alive: Duration) -> Option<SubscriptionEvent> {
        let receiver = self.receiver.as_mut()?;

        match tokio::time::timeout(keep_alive, receiver.recv()).await {
            Err(_) => Some(SubscriptionEvent::KeepAlive),
            Ok(Ok(event)) => Some(SubscriptionEvent::Change(event)),
            Ok(Err(RecvError::Lagged(missed))) => {
                warn!(
                    client_id = %self.key.client_id,
                    year = self.key.year,
                    missed,
                    "change subscriber lagged"
                );
                Some(SubscriptionEvent::Change(ChangeEvent::new(
                    &self.key,
                    ChangeKind::Resync,
                    None,
                )))
            }
            Ok(Err(RecvError::Closed)) => None,
        }
    }

    /// Removes the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The receiver must be gone before the count is checked.
        drop(self.receiver.take());
        let removed = self
            .channels
            .remove_if(&self.key, |_, sender| sender.receiver_count() == 0)
            .is_some();
        debug!(
            client_id = %self.key.client_id,
            year = self.key.year,
            channel_removed = removed,
            "change subscription removed"
        );
    }
}
