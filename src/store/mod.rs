//! Transactional object store seam
//!
//! The index persists through a small multi-store ACID key/value facade:
//! four named object stores, single-key reads, and write transactions that
//! apply a batch of puts/deletes atomically across stores.

use async_trait::async_trait;

use crate::error::Result;

pub mod meta;
pub mod r#impl;

/// The named object stores the indexer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectStoreName {
    /// Indexer-wide flags: enabled state, excluded lists.
    MetaData,
    /// Per-group progress records.
    GroupData,
    /// Per-instance bookkeeping, keyed by encrypted instance id.
    ElementData,
    /// Encrypted posting rows, keyed by encrypted token.
    SearchIndex,
}

impl ObjectStoreName {
    pub fn table(&self) -> &'static str {
        match self {
            ObjectStoreName::MetaData => "meta_data",
            ObjectStoreName::GroupData => "group_data",
            ObjectStoreName::ElementData => "element_data",
            ObjectStoreName::SearchIndex => "search_index",
        }
    }

    pub fn all() -> [ObjectStoreName; 4] {
        [
            ObjectStoreName::MetaData,
            ObjectStoreName::GroupData,
            ObjectStoreName::ElementData,
            ObjectStoreName::SearchIndex,
        ]
    }
}

/// One write in a transaction.
#[derive(Debug, Clone)]
pub enum StoreOp {
    Put {
        store: ObjectStoreName,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        store: ObjectStoreName,
        key: String,
    },
}

/// Trait for the transactional object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a single value.
    async fn get(&self, store: ObjectStoreName, key: &str) -> Result<Option<Vec<u8>>>;

    /// Apply all ops atomically, in order.
    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<()>;

    /// Drop every record in every store (the disable path).
    async fn clear_all(&self) -> Result<()>;
}
