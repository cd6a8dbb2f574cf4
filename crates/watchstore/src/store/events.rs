//! Change notifications published by a [`UserStore`](super::user_store::UserStore).
//!
//! UI collaborators subscribe to refresh badges and counters when a list
//! changes, and to warn the user when a value no longer fits the remote quota.

use crate::model::{ListType, MediaId};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ListChanged {
        list: ListType,
        action: ListAction,
        item: MediaId,
    },
    QuotaExceeded {
        error: String,
        user_id: String,
    },
}

/// Broadcast channel for store events. Publishing with no subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}
