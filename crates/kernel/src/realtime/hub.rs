//! Committed-change fan-out.
//!
//! The hub owns the registry of live subscriber connections. Delivery is
//! fire-and-forget and at-most-once: a client that is not connected when
//! an event is published never sees it and must resynchronize through a
//! list/find call. One subscriber's failure never affects another, and
//! never the write that produced the event.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::ContentItem;

/// A named event with a JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub name: String,
    pub payload: Value,
}

impl ChangeEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Event announcing a newly committed content record.
    pub fn content_created(item: &ContentItem) -> Self {
        Self::new(
            "content.created",
            serde_json::to_value(item).unwrap_or(Value::Null),
        )
    }

    /// Event announcing a committed update (including restores).
    pub fn content_updated(item: &ContentItem) -> Self {
        Self::new(
            "content.updated",
            serde_json::to_value(item).unwrap_or(Value::Null),
        )
    }

    /// Event announcing a committed soft-delete. Carries only the id and
    /// the deletion marker so subscribers can react without re-fetching.
    pub fn content_deleted(id: Uuid) -> Self {
        Self::new("content.deleted", json!({ "id": id, "deleted": true }))
    }
}

/// Registry of live subscriber connections.
///
/// Owned by application state and injected where needed; drained at
/// shutdown. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    subscribers: DashMap<Uuid, mpsc::UnboundedSender<ChangeEvent>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber connection.
    ///
    /// The returned subscription deregisters itself when dropped.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::now_v7();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscribers.insert(id, sender);

        info!(
            subscriber_id = %id,
            subscribers = self.inner.subscribers.len(),
            "subscriber connected"
        );

        Subscription {
            id,
            hub: self.inner.clone(),
            receiver,
        }
    }

    /// Fan an event out to every live subscriber.
    ///
    /// Subscribers whose connection is gone are evicted; their failure is
    /// isolated and never surfaces to the caller. Returns the number of
    /// subscribers the event was handed to.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.inner.subscribers.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        for id in dead {
            self.inner.subscribers.remove(&id);
            warn!(subscriber_id = %id, "evicting disconnected subscriber");
        }

        debug!(event = %event.name, delivered, "change event published");
        delivered
    }

    /// Number of live subscriber connections.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Close every connection. Called at shutdown.
    pub fn drain(&self) {
        let count = self.inner.subscribers.len();
        self.inner.subscribers.clear();
        info!(subscribers = count, "change hub drained");
    }
}

/// One subscriber's live connection to the hub.
pub struct Subscription {
    id: Uuid,
    hub: Arc<HubInner>,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event; `None` once the hub is drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }
}

impl futures_core::Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.subscribers.remove(&self.id);
        info!(subscriber_id = %self.id, "subscriber disconnected");
    }
}
