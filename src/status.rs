//! Index state notifications
//!
//! Hosts subscribe to a channel of [`IndexState`] snapshots; the indexer
//! fans one out on enable, per list completion, and when a backfill
//! finishes (terminal `progress: 0`).

use std::collections::HashMap;

use async_std::channel::{bounded, Receiver, Sender};
use async_std::sync::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::types::NOTHING_INDEXED;

/// Snapshot of the indexer's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexState {
    pub indexing_supported: bool,
    pub mail_index_enabled: bool,
    /// 0-100; 1 marks a backfill starting, 0 an idle indexer.
    pub progress: u32,
    pub current_mail_index_timestamp: i64,
}

impl Default for IndexState {
    fn default() -> Self {
        Self {
            indexing_supported: true,
            mail_index_enabled: false,
            progress: 0,
            current_mail_index_timestamp: NOTHING_INDEXED,
        }
    }
}

/// Subscription handle that can be used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Fan-out of index state snapshots to subscribed hosts.
#[derive(Default)]
pub struct StatusBus {
    subscribers: RwLock<HashMap<SubscriptionId, Sender<IndexState>>>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self) -> (SubscriptionId, Receiver<IndexState>) {
        let (tx, rx) = bounded(64);
        let id = SubscriptionId::new();
        self.subscribers.write().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().await.remove(&id);
    }

    /// Deliver a state snapshot to every subscriber. Slow subscribers drop
    /// snapshots rather than stall the indexer.
    pub async fn send(&self, state: IndexState) {
        let subscribers = self.subscribers.read().await;
        for tx in subscribers.values() {
            let _ = tx.try_send(state);
        }
    }
}
