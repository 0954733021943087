//! In-memory object store
//!
//! All four stores live in one map behind a single lock; a transaction
//! applies its ops under one write guard, which makes it atomic with
//! respect to every other call.

use std::collections::{BTreeMap, HashMap};

use async_std::sync::RwLock;
use async_trait::async_trait;

use crate::error::Result;
use crate::store::{ObjectStore, ObjectStoreName, StoreOp};

/// In-memory implementation of [`ObjectStore`]
#[derive(Default)]
pub struct MemoryObjectStore {
    stores: RwLock<HashMap<ObjectStoreName, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in one store.
    pub async fn count(&self, store: ObjectStoreName) -> usize {
        self.stores
            .read()
            .await
            .get(&store)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Keys of one store, in key order.
    pub async fn keys(&self, store: ObjectStoreName) -> Vec<String> {
        self.stores
            .read()
            .await
            .get(&store)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, store: ObjectStoreName, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .stores
            .read()
            .await
            .get(&store)
            .and_then(|s| s.get(key))
            .cloned())
    }

    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<()> {
        let mut stores = self.stores.write().await;
        for op in ops {
            match op {
                StoreOp::Put { store, key, value } => {
                    stores.entry(store).or_default().insert(key, value);
                }
                StoreOp::Delete { store, key } => {
                    if let Some(s) = stores.get_mut(&store) {
                        s.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.stores.write().await.clear();
        Ok(())
    }
}
