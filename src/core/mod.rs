//! Indexer core
//!
//! Owns everything below the mail-specific logic: tokenization into
//! postings, encryption of keys and payloads, staging of pending writes in
//! an [`IndexUpdate`], and the atomic commit of one update into the object
//! store. The core also carries the single-permit write gate that keeps
//! backfill and event-driven commits from interleaving, and the timing
//! counters reported by `log_status`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::GeneratedId;
use crate::store::{meta, ObjectStore, ObjectStoreName, StoreOp};
use crate::types::{ElementData, GroupId, IdTuple, ListId};

pub mod crypto;
pub mod gate;
pub mod tokenize;

pub use crypto::IndexCrypto;
pub use gate::WriteGate;
pub use tokenize::{tokenize, AttributeText};

/// One posting: where a token occurred within one mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub id: GeneratedId,
    pub attribute: u8,
    pub positions: Vec<u32>,
}

/// An encrypted posting as stored in a token row. `id_key` is the
/// deterministic encrypted instance id, so deletes can match entries
/// without decrypting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedIndexEntry {
    pub id_key: String,
    pub data: Vec<u8>,
}

/// A staged folder move: postings stay, only the list pointer updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMove {
    pub enc_instance_id: String,
    pub new_list_id: ListId,
}

/// A staged removal of one instance's postings and element data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDelete {
    pub enc_instance_id: String,
}

/// In-memory accumulator of pending index writes, scoped to one commit.
#[derive(Debug, Default)]
pub struct IndexUpdate {
    pub group_id: GroupId,
    /// Encrypted token row key -> encrypted postings to append.
    pub new_entries: HashMap<String, Vec<EncryptedIndexEntry>>,
    /// Encrypted instance id -> element data to write.
    pub new_element_data: HashMap<String, ElementData>,
    pub moves: Vec<IndexMove>,
    pub deletes: Vec<IndexDelete>,
}

impl IndexUpdate {
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_entries.is_empty()
            && self.new_element_data.is_empty()
            && self.moves.is_empty()
            && self.deletes.is_empty()
    }
}

/// Timing and throughput counters.
#[derive(Default)]
pub struct CoreStats {
    indexing_ms: AtomicU64,
    downloading_ms: AtomicU64,
    mail_count: AtomicU64,
    index_writes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub indexing_ms: u64,
    pub downloading_ms: u64,
    pub mail_count: u64,
    pub index_writes: u64,
}

impl CoreStats {
    pub fn add_indexing(&self, elapsed: Duration) {
        self.indexing_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn add_downloading(&self, elapsed: Duration) {
        self.downloading_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn add_mails(&self, count: usize) {
        self.mail_count.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            indexing_ms: self.indexing_ms.load(Ordering::Relaxed),
            downloading_ms: self.downloading_ms.load(Ordering::Relaxed),
            mail_count: self.mail_count.load(Ordering::Relaxed),
            index_writes: self.index_writes.load(Ordering::Relaxed),
        }
    }
}

/// The indexer core: crypto, staging, commit, gate, counters.
pub struct IndexerCore {
    store: Arc<dyn ObjectStore>,
    crypto: IndexCrypto,
    pub gate: WriteGate,
    stats: CoreStats,
    indexing_supported: AtomicBool,
}

impl IndexerCore {
    pub fn new(store: Arc<dyn ObjectStore>, db_key: [u8; 32]) -> Result<Self> {
        Ok(Self {
            store,
            crypto: IndexCrypto::new(db_key)?,
            gate: WriteGate::new(),
            stats: CoreStats::default(),
            indexing_supported: AtomicBool::new(true),
        })
    }

    pub fn crypto(&self) -> &IndexCrypto {
        &self.crypto
    }

    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }

    pub fn indexing_supported(&self) -> bool {
        self.indexing_supported.load(Ordering::SeqCst)
    }

    pub fn set_indexing_supported(&self, supported: bool) {
        self.indexing_supported.store(supported, Ordering::SeqCst);
    }

    /// Deterministic store key for an instance element id.
    pub fn encrypted_instance_id(&self, element_id: &GeneratedId) -> String {
        self.crypto.index_key_b64(element_id.to_string().as_bytes())
    }

    /// Tokenize attribute texts into postings for one instance.
    pub fn create_index_entries(
        &self,
        element_id: GeneratedId,
        attributes: Vec<AttributeText>,
    ) -> HashMap<String, Vec<SearchIndexEntry>> {
        let started = Instant::now();
        let mut entries: HashMap<String, Vec<SearchIndexEntry>> = HashMap::new();
        for attr in attributes {
            let text = (attr.producer)();
            let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
            for (position, token) in tokenize(&text).into_iter().enumerate() {
                positions.entry(token).or_default().push(position as u32);
            }
            for (token, positions) in positions {
                entries.entry(token).or_default().push(SearchIndexEntry {
                    id: element_id,
                    attribute: attr.attribute,
                    positions,
                });
            }
        }
        self.stats.add_indexing(started.elapsed());
        entries
    }

    /// Encrypt one instance's postings and stage them on the update,
    /// along with its element-data row.
    pub fn encrypt_search_index_entries(
        &self,
        id: &IdTuple,
        owner_group: &GroupId,
        entries: HashMap<String, Vec<SearchIndexEntry>>,
        update: &mut IndexUpdate,
    ) -> Result<()> {
        let enc_instance_id = self.encrypted_instance_id(&id.element_id);
        let mut token_keys = Vec::with_capacity(entries.len());
        for (token, token_entries) in entries {
            let token_key = self.crypto.index_key_b64(token.as_bytes());
            let row = update.new_entries.entry(token_key.clone()).or_default();
            for entry in token_entries {
                let plain = serde_json::to_vec(&entry)?;
                row.push(EncryptedIndexEntry {
                    id_key: enc_instance_id.clone(),
                    data: self.crypto.encrypt(&plain)?,
                });
            }
            token_keys.push(token_key);
        }
        token_keys.sort();
        update.new_element_data.insert(
            enc_instance_id,
            ElementData {
                list_id: id.list_id,
                owner_group: *owner_group,
                token_keys,
            },
        );
        Ok(())
    }

    /// Stage removal of an instance's postings and element data. The
    /// affected token rows are resolved from element data at commit time.
    pub fn process_deleted(&self, element_id: &GeneratedId, update: &mut IndexUpdate) {
        let enc_instance_id = self.encrypted_instance_id(element_id);
        update.deletes.push(IndexDelete { enc_instance_id });
    }

    async fn read_token_row(&self, token_key: &str) -> Result<Vec<EncryptedIndexEntry>> {
        match self
            .store
            .get(ObjectStoreName::SearchIndex, token_key)
            .await?
        {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Atomically persist one update: deletes, then moves, then creates,
    /// merged into the affected token rows in a single store transaction.
    ///
    /// Instances whose element data already exists are skipped unless this
    /// update also deletes them, so re-walking a range after an interrupted
    /// backfill does not duplicate postings.
    pub async fn write_index_update(&self, update: IndexUpdate) -> Result<()> {
        self.stats.index_writes.fetch_add(1, Ordering::Relaxed);

        let mut rows: HashMap<String, Vec<EncryptedIndexEntry>> = HashMap::new();
        // enc instance id -> Some(write) or None (delete)
        let mut elements: HashMap<String, Option<ElementData>> = HashMap::new();

        for del in &update.deletes {
            let element =
                match meta::read_element_data(self.store.as_ref(), &del.enc_instance_id).await? {
                    Some(element) => element,
                    None => {
                        log::debug!("Delete for never-indexed instance, skipping");
                        continue;
                    }
                };
            for token_key in &element.token_keys {
                if !rows.contains_key(token_key) {
                    let loaded = self.read_token_row(token_key).await?;
                    rows.insert(token_key.clone(), loaded);
                }
                if let Some(row) = rows.get_mut(token_key) {
                    row.retain(|entry| entry.id_key != del.enc_instance_id);
                }
            }
            elements.insert(del.enc_instance_id.clone(), None);
        }

        for mv in &update.moves {
            match meta::read_element_data(self.store.as_ref(), &mv.enc_instance_id).await? {
                Some(mut element) => {
                    element.list_id = mv.new_list_id;
                    elements.insert(mv.enc_instance_id.clone(), Some(element));
                }
                None => log::warn!("Move for never-indexed instance, dropping"),
            }
        }

        let mut already_indexed: HashSet<String> = HashSet::new();
        for (enc_id, element) in &update.new_element_data {
            let deleted_here = update
                .deletes
                .iter()
                .any(|d| d.enc_instance_id == *enc_id);
            if !deleted_here
                && meta::read_element_data(self.store.as_ref(), enc_id)
                    .await?
                    .is_some()
            {
                already_indexed.insert(enc_id.clone());
                continue;
            }
            elements.insert(enc_id.clone(), Some(element.clone()));
        }

        for (token_key, entries) in &update.new_entries {
            let fresh: Vec<EncryptedIndexEntry> = entries
                .iter()
                .filter(|e| !already_indexed.contains(&e.id_key))
                .cloned()
                .collect();
            if fresh.is_empty() {
                continue;
            }
            if !rows.contains_key(token_key) {
                let loaded = self.read_token_row(token_key).await?;
                rows.insert(token_key.clone(), loaded);
            }
            if let Some(row) = rows.get_mut(token_key) {
                row.extend(fresh);
            }
        }

        let mut ops = Vec::with_capacity(rows.len() + elements.len());
        for (key, row) in rows {
            if row.is_empty() {
                ops.push(StoreOp::Delete {
                    store: ObjectStoreName::SearchIndex,
                    key,
                });
            } else {
                ops.push(StoreOp::Put {
                    store: ObjectStoreName::SearchIndex,
                    key,
                    value: serde_json::to_vec(&row)?,
                });
            }
        }
        for (key, element) in elements {
            match element {
                Some(element) => ops.push(StoreOp::Put {
                    store: ObjectStoreName::ElementData,
                    key,
                    value: serde_json::to_vec(&element)?,
                }),
                None => ops.push(StoreOp::Delete {
                    store: ObjectStoreName::ElementData,
                    key,
                }),
            }
        }

        if ops.is_empty() {
            return Ok(());
        }
        self.store.transaction(ops).await
    }

    pub fn log_status(&self) {
        let stats = self.snapshot_stats();
        log::info!(
            "Index status: {} mails, {} index writes, indexing {} ms, downloading {} ms",
            stats.mail_count,
            stats.index_writes,
            stats.indexing_ms,
            stats.downloading_ms
        );
    }

    fn snapshot_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
