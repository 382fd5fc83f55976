//! Real-time broadcast hub.
//!
//! Every state change is encoded once and pushed into a bounded
//! [`tokio::sync::broadcast`] channel. Each observer connection owns a
//! [`Subscription`] and drains it from its own task, so publishing never
//! waits on any observer. The hub keeps no backlog beyond the channel
//! buffer: an observer that falls behind is told it lagged and is expected
//! to resynchronise from a fresh snapshot.

use crate::messaging::ServerMessage;
use loot_core::{LootRecord, PriorityEntry, SessionSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error};

/// An encoded server message, shared by every observer.
pub type Frame = Arc<str>;

/// Incremental events pushed to observers after a mutation.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A raid started, ended or changed boss
    RaidStatus(SessionSnapshot),
    /// An item was awarded during the active raid
    LootAssignment(LootRecord),
    /// The unfiltered ranking after a change to its inputs
    Priorities(Vec<PriorityEntry>),
}

impl ServerEvent {
    /// The `type` field this event carries on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::RaidStatus(_) => "raid_status",
            ServerEvent::LootAssignment(_) => "loot_assignment",
            ServerEvent::Priorities(_) => "priorities",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            ServerEvent::RaidStatus(snapshot) => encode(self.kind(), snapshot),
            ServerEvent::LootAssignment(record) => encode(self.kind(), record),
            ServerEvent::Priorities(entries) => encode(self.kind(), entries),
        }
    }
}

fn encode<T: Serialize>(kind: &str, data: &T) -> Result<String, serde_json::Error> {
    ServerMessage::new(kind, data).to_json()
}

/// What an observer gets when it polls its subscription.
#[derive(Debug)]
pub enum Delivery {
    Frame(Frame),
    /// The observer missed this many events and must be resynchronised
    Lagged(u64),
    Closed,
}

/// Receiving end held by one observer.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<Frame>,
}

impl Subscription {
    /// Waits for the next published frame, in publish order.
    pub async fn next(&mut self) -> Delivery {
        match self.receiver.recv().await {
            Ok(frame) => Delivery::Frame(frame),
            Err(broadcast::error::RecvError::Lagged(missed)) => Delivery::Lagged(missed),
            Err(broadcast::error::RecvError::Closed) => Delivery::Closed,
        }
    }

    /// Drops everything still queued and continues from the newest event.
    ///
    /// Used after a lag: frames already buffered describe changes that the
    /// replacement snapshot includes.
    pub fn resync(&mut self) {
        self.receiver = self.receiver.resubscribe();
    }
}

/// Fan-out point for state-change events.
#[derive(Debug)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Frame>,
    published: AtomicU64,
}

impl BroadcastHub {
    /// Creates a hub that buffers up to `capacity` events per observer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Publishes an event to every current observer.
    ///
    /// Fire-and-forget: having no observers is not an error, and a slow
    /// observer only affects itself.
    pub fn publish(&self, event: &ServerEvent) {
        let frame: Frame = match event.encode() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to encode {} event: {}", event.kind(), e);
                return;
            }
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        let receivers = self.sender.send(frame).unwrap_or(0);
        debug!("📡 Published {} to {} observer(s)", event.kind(), receivers);
    }

    /// Registers a new observer. Only events published after this call are
    /// delivered to it.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since the hub was created.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(256)
    }
}
