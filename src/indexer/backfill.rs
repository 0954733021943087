//! Historical backfill
//!
//! Walks every mail group from its recorded progress down to a cutoff
//! timestamp, page by page, committing one index update per page. Groups
//! and lists are processed sequentially; only the body/attachment fetches
//! inside one page overlap. The whole run holds the core's write gate so
//! event-driven commits cannot interleave.

use std::sync::atomic::Ordering;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::core::IndexUpdate;
use crate::error::{Error, Result};
use crate::folders;
use crate::ids::{timestamp_to_id, GeneratedId, GENERATED_MAX_ID};
use crate::indexer::attributes::mail_attributes;
use crate::indexer::{MailIndexer, MAIL_FETCH_CONCURRENCY, MAIL_INDEX_BATCH_SIZE};
use crate::store::meta;
use crate::types::*;

pub(crate) struct ListIndexOutcome {
    /// True iff the list ran out of mail before reaching the cutoff.
    pub fully_drained: bool,
    pub mails_indexed: usize,
}

impl MailIndexer {
    /// Bring every mail group's `index_timestamp` at least as old as
    /// `end_timestamp`. Cancellation stops the run cleanly; committed pages
    /// stay durable but the group timestamp is not advanced.
    pub async fn index_mailboxes(&self, user: &User, end_timestamp: i64) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.cancelled.store(false, Ordering::SeqCst);
        self.indexing_in_flight.store(true, Ordering::SeqCst);
        self.emit_state(1).await;
        self.core.gate.acquire().await?;

        let outcome = self.index_mail_groups(user, end_timestamp).await;

        self.core.gate.release().await;
        self.indexing_in_flight.store(false, Ordering::SeqCst);
        if let Err(e) = self.update_current_index_timestamp(user).await {
            log::warn!("Failed to refresh current index timestamp: {}", e);
        }
        self.emit_state(0).await;

        match outcome {
            Ok(()) => {
                self.core.log_status();
                Ok(())
            }
            Err(Error::Cancelled) => {
                log::info!("Mail indexing cancelled");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn index_mail_groups(&self, user: &User, end_timestamp: i64) -> Result<()> {
        let end_id = timestamp_to_id(end_timestamp);
        for membership in user.mail_memberships() {
            let mailbox = folders::resolve_mailbox(self.entity.as_ref(), &membership.group).await?;
            let excluded = self.excluded_list_ids.read().await.clone();
            let list_ids =
                folders::load_mail_list_ids(self.entity.as_ref(), &mailbox, &excluded).await?;

            let group_data = meta::read_group_data(self.store.as_ref(), &membership.group)
                .await?
                .unwrap_or(GroupData::new(NOTHING_INDEXED));
            let start_id = if group_data.index_timestamp == NOTHING_INDEXED {
                GENERATED_MAX_ID
            } else {
                timestamp_to_id(group_data.index_timestamp)
            };

            let mut all_drained = true;
            let total_lists = list_ids.len();
            for (done, list_id) in list_ids.iter().enumerate() {
                let outcome = self
                    .index_mail_list(&membership.group, list_id, start_id, end_id)
                    .await?;
                all_drained &= outcome.fully_drained;
                if outcome.mails_indexed > 0 {
                    let progress = ((done + 1) * 100 / total_lists.max(1)).clamp(1, 99) as u32;
                    self.emit_state(progress).await;
                }
            }

            let new_timestamp = if all_drained {
                FULL_INDEXED
            } else {
                end_timestamp
            };
            meta::write_group_data(
                self.store.as_ref(),
                &membership.group,
                &GroupData::new(new_timestamp),
            )
            .await?;
        }
        Ok(())
    }

    /// Index one mail list from `start_id` (exclusive) down to `end_id`,
    /// one 500-mail page at a time.
    async fn index_mail_list(
        &self,
        group: &GroupId,
        list: &ListId,
        start_id: GeneratedId,
        end_id: GeneratedId,
    ) -> Result<ListIndexOutcome> {
        let mut start_id = start_id;
        let mut mails_indexed = 0usize;
        loop {
            if self.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let download_started = Instant::now();
            let raw = self
                .entity
                .load_mail_range(list, &start_id, MAIL_INDEX_BATCH_SIZE)
                .await?;
            let filtered: Vec<Mail> = raw
                .iter()
                .filter(|m| m.id.element_id > end_id)
                .cloned()
                .collect();
            let filtered_count = filtered.len();

            let fetches = filtered.into_iter().map(|mail| self.fetch_page_mail(mail));
            let results: Vec<Result<(Mail, MailBody, Vec<MailFile>)>> = stream::iter(fetches)
                .buffered(MAIL_FETCH_CONCURRENCY)
                .collect()
                .await;
            let mut triples = Vec::with_capacity(results.len());
            for result in results {
                match result {
                    Ok(triple) => triples.push(triple),
                    Err(e) if e.is_skippable() => {
                        log::warn!("Skipping mail during backfill: {}", e)
                    }
                    Err(e) => return Err(e),
                }
            }
            self.core.stats().add_downloading(download_started.elapsed());
            self.core.stats().add_mails(triples.len());
            mails_indexed += triples.len();

            let mut update = IndexUpdate::new(*group);
            for (mail, body, files) in triples {
                let entries = self
                    .core
                    .create_index_entries(mail.id.element_id, mail_attributes(&mail, body, files));
                self.core
                    .encrypt_search_index_entries(&mail.id, &mail.owner_group, entries, &mut update)?;
            }
            self.core.write_index_update(update).await?;

            if raw.len() == MAIL_INDEX_BATCH_SIZE {
                // Continue from the last raw id, not the last filtered one,
                // so a fully filtered page still advances the walk.
                if let Some(last) = raw.last() {
                    start_id = last.id.element_id;
                }
                continue;
            }
            return Ok(ListIndexOutcome {
                fully_drained: filtered_count == raw.len(),
                mails_indexed,
            });
        }
    }

    async fn fetch_page_mail(&self, mail: Mail) -> Result<(Mail, MailBody, Vec<MailFile>)> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.fetch_mail_parts(mail).await
    }
}
