//! Change notifications for the directory store.
//!
//! Events are emitted only after the commit that caused them succeeded and
//! before the store releases the collection lock, so they arrive in commit
//! order.
//!
//! ```rust,ignore
//! let events = store.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = events.recv() {
//!         println!("change: {:?}", event);
//!     }
//! });
//! ```

use docstore_codec::Document;
use docstore_core::EntityId;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// A committed change to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A record was added or replaced.
    Added {
        /// Entity ID.
        id: EntityId,
        /// Index document as committed.
        index: Document,
    },
    /// A record was removed.
    Removed {
        /// Entity ID.
        id: EntityId,
    },
}

impl StoreEvent {
    /// The entity the event is about.
    pub fn id(&self) -> EntityId {
        match self {
            Self::Added { id, .. } | Self::Removed { id } => *id,
        }
    }
}

/// Distributes committed changes to subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next emit.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<StoreEvent>>>,
}

impl ChangeFeed {
    /// Creates a feed without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for every future event.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends an event to every live subscriber.
    pub fn emit(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Sends events in order.
    pub fn emit_batch(&self, events: impl IntoIterator<Item = StoreEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
