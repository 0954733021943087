//! Entity fetch seam
//!
//! The EntityClient is the indexer's view of the remote mail store: typed
//! single-record loads plus the descending range load the backfill pages
//! with. Network timeouts are the client's concern and surface as
//! `Error::Connection`.

use async_trait::async_trait;

use crate::error::Result;
use crate::ids::GeneratedId;
use crate::types::*;

pub mod r#impl;

/// Trait for loading mail entities from the remote store
#[async_trait]
pub trait EntityClient: Send + Sync {
    /// Load a single mail. Fails `NotFound` / `NotAuthorized`.
    async fn load_mail(&self, id: &IdTuple) -> Result<Mail>;

    /// Load a mail body.
    async fn load_body(&self, id: &GeneratedId) -> Result<MailBody>;

    /// Load a file record (attachment).
    async fn load_file(&self, id: &IdTuple) -> Result<MailFile>;

    /// Load the group root of a mail group.
    async fn load_group_root(&self, group: &GroupId) -> Result<MailboxGroupRoot>;

    /// Load a mailbox by element id.
    async fn load_mailbox(&self, id: &GeneratedId) -> Result<MailBox>;

    /// Load all folders in a folder list.
    async fn load_folders(&self, list: &ListId) -> Result<Vec<MailFolder>>;

    /// Load up to `count` mails from `list` whose element ids are strictly
    /// older than `start`, newest first.
    async fn load_mail_range(
        &self,
        list: &ListId,
        start: &GeneratedId,
        count: usize,
    ) -> Result<Vec<Mail>>;
}
