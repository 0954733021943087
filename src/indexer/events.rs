//! Entity event application
//!
//! Translates one ordered event batch into staged index mutations.
//! A CREATE+DELETE pair on the same instance id within a batch is a folder
//! move: postings stay, only the element-data list pointer changes, unless
//! the target list is excluded (then the postings are removed).

use crate::core::{IndexMove, IndexUpdate};
use crate::error::Result;
use crate::ids::GeneratedId;
use crate::indexer::attributes::mail_attributes;
use crate::indexer::MailIndexer;
use crate::store::meta;
use crate::types::*;

fn batch_contains(events: &[EntityEvent], operation: EventOperation, instance_id: &GeneratedId) -> bool {
    events
        .iter()
        .any(|e| e.operation == operation && e.instance_id == *instance_id)
}

impl MailIndexer {
    /// Apply one ordered event batch onto `update`. A no-op while indexing
    /// is disabled. Events whose mail vanished or became unreadable are
    /// skipped with a log line; everything else fails the batch.
    pub async fn process_entity_events(
        &self,
        events: &[EntityEvent],
        group_id: &GroupId,
        batch_id: &GeneratedId,
        update: &mut IndexUpdate,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        for event in events {
            match event.operation {
                EventOperation::Create => {
                    if batch_contains(events, EventOperation::Delete, &event.instance_id) {
                        self.process_moved_mail(event, update).await?;
                    } else {
                        self.process_new_mail(event, update).await?;
                    }
                }
                EventOperation::Update => self.process_updated_mail(event, update).await?,
                EventOperation::Delete => {
                    // The create half of a move handles the move instead.
                    if !batch_contains(events, EventOperation::Create, &event.instance_id) {
                        self.core.process_deleted(&event.instance_id, update);
                    }
                }
            }
        }
        log::debug!("Applied entity batch {} for group {}", batch_id, group_id);
        Ok(())
    }

    /// Build, commit and release: the host's drain path for one batch.
    pub async fn process_event_batch(&self, batch: &EventBatch) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let mut update = IndexUpdate::new(batch.group_id);
        self.process_entity_events(&batch.events, &batch.group_id, &batch.batch_id, &mut update)
            .await?;
        self.core.gate.acquire().await?;
        let result = self.core.write_index_update(update).await;
        self.core.gate.release().await;
        result
    }

    async fn process_new_mail(&self, event: &EntityEvent, update: &mut IndexUpdate) -> Result<()> {
        if self.is_excluded(&event.instance_list).await {
            return Ok(());
        }
        let id = IdTuple::new(event.instance_list, event.instance_id);
        let mail = match self.entity.load_mail(&id).await {
            Ok(mail) => mail,
            Err(e) if e.is_skippable() => {
                log::warn!("Mail {}/{} skipped: {}", id.list_id, id.element_id, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        match self.fetch_mail_parts(mail).await {
            Ok((mail, body, files)) => {
                let entries = self
                    .core
                    .create_index_entries(mail.id.element_id, mail_attributes(&mail, body, files));
                self.core
                    .encrypt_search_index_entries(&mail.id, &mail.owner_group, entries, update)
            }
            Err(e) if e.is_skippable() => {
                log::warn!("Mail {}/{} parts skipped: {}", id.list_id, id.element_id, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn process_updated_mail(
        &self,
        event: &EntityEvent,
        update: &mut IndexUpdate,
    ) -> Result<()> {
        let id = IdTuple::new(event.instance_list, event.instance_id);
        match self.entity.load_mail(&id).await {
            // Only drafts mutate indexed content; everything else is
            // immutable once sent or received.
            Ok(mail) if mail.state == MailState::Draft => {
                self.core.process_deleted(&event.instance_id, update);
                self.process_new_mail(event, update).await
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_skippable() => {
                log::warn!("Updated mail {}/{} skipped: {}", id.list_id, id.element_id, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn process_moved_mail(
        &self,
        event: &EntityEvent,
        update: &mut IndexUpdate,
    ) -> Result<()> {
        let enc_instance_id = self.core.encrypted_instance_id(&event.instance_id);
        match meta::read_element_data(self.store.as_ref(), &enc_instance_id).await? {
            Some(_) => {
                if self.is_excluded(&event.instance_list).await {
                    // Moved into an excluded list: the postings go away.
                    self.core.process_deleted(&event.instance_id, update);
                } else {
                    update.moves.push(IndexMove {
                        enc_instance_id,
                        new_list_id: event.instance_list,
                    });
                }
                Ok(())
            }
            // Moved before it was ever indexed: index it fresh.
            None => self.process_new_mail(event, update).await,
        }
    }
}
