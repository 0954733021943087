//! The mail indexer
//!
//! `MailIndexer` owns the indexing lifecycle for one user's mail: the
//! enabled flag and excluded lists, the cooperative cancellation flag, the
//! visible `current_index_timestamp`, and the in-flight backfill handle.
//! Backfill and event application live in the `backfill` and `events`
//! submodules; both stage postings through the shared [`IndexerCore`].

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_std::sync::{Mutex, RwLock};
use async_std::task::{self, JoinHandle};
use chrono::Utc;

use crate::core::IndexerCore;
use crate::entity::EntityClient;
use crate::error::Result;
use crate::folders;
use crate::ids::start_of_day_shifted;
use crate::status::{IndexState, StatusBus, SubscriptionId};
use crate::store::{meta, ObjectStore};
use crate::types::*;

pub mod attributes;
mod backfill;
mod events;

/// Default backfill horizon on first enable.
pub const INITIAL_MAIL_INDEX_INTERVAL_DAYS: i64 = 28;
/// Mails loaded per range query.
pub const MAIL_INDEX_BATCH_SIZE: usize = 500;
/// Outstanding body/attachment fetches per page.
pub const MAIL_FETCH_CONCURRENCY: usize = 5;

/// Incremental, resumable indexer over one user's mail groups.
pub struct MailIndexer {
    core: Arc<IndexerCore>,
    entity: Arc<dyn EntityClient>,
    store: Arc<dyn ObjectStore>,
    status: StatusBus,
    enabled: AtomicBool,
    cancelled: AtomicBool,
    indexing_in_flight: AtomicBool,
    excluded_list_ids: RwLock<Vec<ListId>>,
    current_index_timestamp: AtomicI64,
    indexing_task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl MailIndexer {
    pub fn new(
        entity: Arc<dyn EntityClient>,
        store: Arc<dyn ObjectStore>,
        db_key: [u8; 32],
    ) -> Result<Self> {
        let core = Arc::new(IndexerCore::new(Arc::clone(&store), db_key)?);
        Ok(Self {
            core,
            entity,
            store,
            status: StatusBus::new(),
            enabled: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            indexing_in_flight: AtomicBool::new(false),
            excluded_list_ids: RwLock::new(Vec::new()),
            current_index_timestamp: AtomicI64::new(NOTHING_INDEXED),
            indexing_task: Mutex::new(None),
        })
    }

    pub fn core(&self) -> &Arc<IndexerCore> {
        &self.core
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing_in_flight.load(Ordering::SeqCst)
    }

    pub fn current_index_timestamp(&self) -> i64 {
        self.current_index_timestamp.load(Ordering::SeqCst)
    }

    /// Subscribe to index state snapshots.
    pub async fn subscribe(&self) -> (SubscriptionId, async_std::channel::Receiver<IndexState>) {
        self.status.subscribe().await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.status.unsubscribe(id).await;
    }

    /// Restore durable indexer state at startup.
    pub async fn init(&self, user: &User) -> Result<()> {
        let (enabled, excluded) = meta::read_enabled(self.store.as_ref()).await?;
        self.enabled.store(enabled, Ordering::SeqCst);
        *self.excluded_list_ids.write().await = excluded;
        if enabled {
            self.update_current_index_timestamp(user).await?;
        }
        self.emit_state(0).await;
        Ok(())
    }

    /// Turn indexing on. The first enable records the user's spam lists as
    /// excluded and kicks off a backfill over the initial interval without
    /// awaiting it; a re-enable only reloads the excluded set.
    pub async fn enable_mail_indexing(self: Arc<Self>, user: &User) -> Result<()> {
        let (was_enabled, excluded) = meta::read_enabled(self.store.as_ref()).await?;
        if was_enabled {
            self.enabled.store(true, Ordering::SeqCst);
            *self.excluded_list_ids.write().await = excluded;
            self.emit_state(0).await;
            return Ok(());
        }

        let mut spam_lists = Vec::new();
        for membership in user.mail_memberships() {
            let spam = folders::spam_folder(self.entity.as_ref(), &membership.group).await?;
            spam_lists.push(spam.mails);
        }
        meta::write_enabled(self.store.as_ref(), true, &spam_lists).await?;
        *self.excluded_list_ids.write().await = spam_lists;
        self.enabled.store(true, Ordering::SeqCst);

        let end_timestamp = start_of_day_shifted(
            Utc::now().timestamp_millis(),
            -INITIAL_MAIL_INDEX_INTERVAL_DAYS,
        );
        let this = Arc::clone(&self);
        let user = user.clone();
        let handle = task::spawn(async move {
            let result = this.index_mailboxes(&user, end_timestamp).await;
            if let Err(ref e) = result {
                log::error!("Initial mail indexing failed: {}", e);
            }
            result
        });
        *self.indexing_task.lock().await = Some(handle);
        Ok(())
    }

    /// Turn indexing off and delete the entire database. The next enable
    /// rebuilds from scratch.
    pub async fn disable_mail_indexing(&self) -> Result<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        self.enabled.store(false, Ordering::SeqCst);
        self.excluded_list_ids.write().await.clear();
        self.current_index_timestamp
            .store(NOTHING_INDEXED, Ordering::SeqCst);
        self.store.clear_all().await?;
        self.emit_state(0).await;
        Ok(())
    }

    /// Request cancellation; the backfill observes it at its checkpoints.
    pub fn cancel_mail_indexing(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Await the in-flight backfill, if any. Consumes the handle: the first
    /// caller observes the run's result, later callers see an idle indexer.
    pub async fn wait_for_indexing(&self) -> Result<()> {
        let handle = self.indexing_task.lock().await.take();
        match handle {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    }

    /// Backfill further into the past when the requested horizon predates
    /// what is indexed so far.
    pub async fn extend_index_if_needed(&self, user: &User, oldest_timestamp: i64) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let current = self.current_index_timestamp();
        if current == FULL_INDEXED {
            return Ok(());
        }
        if current == NOTHING_INDEXED || oldest_timestamp < current {
            self.index_mailboxes(user, start_of_day_shifted(oldest_timestamp, 0))
                .await?;
        }
        Ok(())
    }

    /// Recompute the visible horizon: the maximum over per-group
    /// `index_timestamp`s, i.e. the most-lagging group bounds it.
    pub async fn update_current_index_timestamp(&self, user: &User) -> Result<()> {
        let mut newest = NOTHING_INDEXED;
        for membership in user.mail_memberships() {
            let timestamp = meta::read_group_data(self.store.as_ref(), &membership.group)
                .await?
                .map(|data| data.index_timestamp)
                .unwrap_or(NOTHING_INDEXED);
            newest = newest.max(timestamp);
        }
        self.current_index_timestamp.store(newest, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) async fn is_excluded(&self, list: &ListId) -> bool {
        self.excluded_list_ids.read().await.contains(list)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) async fn emit_state(&self, progress: u32) {
        self.status
            .send(IndexState {
                indexing_supported: self.core.indexing_supported(),
                mail_index_enabled: self.is_enabled(),
                progress,
                current_mail_index_timestamp: self.current_index_timestamp(),
            })
            .await;
    }

    /// Load a mail's body and attachment names, at most
    /// [`MAIL_FETCH_CONCURRENCY`] of these in flight per page.
    pub(crate) async fn fetch_mail_parts(
        &self,
        mail: Mail,
    ) -> Result<(Mail, MailBody, Vec<MailFile>)> {
        let body_fut = self.entity.load_body(&mail.body);
        let files_fut = async {
            let mut files = Vec::with_capacity(mail.attachments.len());
            for file_id in &mail.attachments {
                files.push(self.entity.load_file(file_id).await?);
            }
            Ok::<Vec<MailFile>, crate::error::Error>(files)
        };
        let (body, files) = futures::try_join!(body_fut, files_fut)?;
        Ok((mail, body, files))
    }
}
