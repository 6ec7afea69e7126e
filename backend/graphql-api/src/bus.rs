//! In-process notification bus
//!
//! Topic-keyed publish/subscribe over `tokio::sync::broadcast`. Delivery is
//! at-most-once: events published while a topic has no subscribers are
//! dropped, and a new subscriber never sees events published before it
//! subscribed. Within a topic, events reach each subscriber in publish
//! order.
//!
//! The bus is constructed once in `main` and injected into the schema; there
//! is no process-global instance.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::schema::user::User;

/// Named channels subscribers register on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    UserCreated,
    UserUpdated,
    UserDeleted,
}

/// Payload delivered to subscribers. Created/Updated carry the full entity,
/// Deleted only the identifier.
#[derive(Debug, Clone)]
pub enum UserEvent {
    Created(User),
    Updated(User),
    Deleted(Uuid),
}

pub struct NotificationBus {
    capacity: usize,
    channels: RwLock<HashMap<Topic, broadcast::Sender<UserEvent>>>,
}

impl NotificationBus {
    /// `capacity` bounds how far a slow subscriber may lag behind before it
    /// starts losing events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Deliver `event` to every current subscriber of `topic`. Non-blocking;
    /// returns how many subscribers the event reached.
    pub async fn publish(&self, topic: Topic, event: UserEvent) -> usize {
        let channels = self.channels.read().await;
        let reached = match channels.get(&topic) {
            // send only fails when there are no live receivers, in which
            // case the event is dropped per the at-most-once contract
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };
        tracing::debug!(?topic, reached, "published notification event");
        reached
    }

    /// Open a live stream of events on `topic`. The stream starts empty and
    /// stays open until it is dropped; dropping it deregisters the
    /// subscriber.
    pub async fn subscribe(&self, topic: Topic) -> BroadcastStream<UserEvent> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        BroadcastStream::new(sender.subscribe())
    }

    /// Current number of live subscribers on `topic`.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
