//! In-memory entity client
//!
//! Fixture-backed implementation of [`EntityClient`] used by the test suite
//! and by hosts embedding canned data. Records are inserted through the
//! helper methods; `deny` marks ids that fail `NotAuthorized`.

use std::collections::{HashMap, HashSet};

use async_std::sync::RwLock;
use async_trait::async_trait;

use crate::entity::EntityClient;
use crate::error::{Error, Result};
use crate::ids::GeneratedId;
use crate::types::*;

#[derive(Default)]
struct EntityState {
    mails: HashMap<IdTuple, Mail>,
    bodies: HashMap<GeneratedId, MailBody>,
    files: HashMap<IdTuple, MailFile>,
    group_roots: HashMap<GroupId, MailboxGroupRoot>,
    mailboxes: HashMap<GeneratedId, MailBox>,
    folders: HashMap<ListId, Vec<MailFolder>>,
    denied: HashSet<IdTuple>,
}

/// In-memory entity client over fixture records
#[derive(Default)]
pub struct MemoryEntityClient {
    state: RwLock<EntityState>,
}

impl MemoryEntityClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_mail(&self, mail: Mail) {
        self.state.write().await.mails.insert(mail.id, mail);
    }

    pub async fn insert_body(&self, body: MailBody) {
        self.state.write().await.bodies.insert(body.id, body);
    }

    pub async fn insert_file(&self, file: MailFile) {
        self.state.write().await.files.insert(file.id, file);
    }

    pub async fn insert_group_root(&self, root: MailboxGroupRoot) {
        self.state.write().await.group_roots.insert(root.group, root);
    }

    pub async fn insert_mailbox(&self, mailbox: MailBox) {
        self.state.write().await.mailboxes.insert(mailbox.id, mailbox);
    }

    pub async fn insert_folder(&self, list: ListId, folder: MailFolder) {
        self.state
            .write()
            .await
            .folders
            .entry(list)
            .or_default()
            .push(folder);
    }

    pub async fn remove_mail(&self, id: &IdTuple) {
        self.state.write().await.mails.remove(id);
    }

    /// Make subsequent loads of `id` fail with `NotAuthorized`.
    pub async fn deny(&self, id: IdTuple) {
        self.state.write().await.denied.insert(id);
    }
}

#[async_trait]
impl EntityClient for MemoryEntityClient {
    async fn load_mail(&self, id: &IdTuple) -> Result<Mail> {
        let state = self.state.read().await;
        if state.denied.contains(id) {
            return Err(Error::NotAuthorized(format!("mail {:?}", id)));
        }
        state
            .mails
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("mail {}/{}", id.list_id, id.element_id)))
    }

    async fn load_body(&self, id: &GeneratedId) -> Result<MailBody> {
        self.state
            .read()
            .await
            .bodies
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("mail body {}", id)))
    }

    async fn load_file(&self, id: &IdTuple) -> Result<MailFile> {
        self.state
            .read()
            .await
            .files
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("file {}/{}", id.list_id, id.element_id)))
    }

    async fn load_group_root(&self, group: &GroupId) -> Result<MailboxGroupRoot> {
        self.state
            .read()
            .await
            .group_roots
            .get(group)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("group root {}", group)))
    }

    async fn load_mailbox(&self, id: &GeneratedId) -> Result<MailBox> {
        self.state
            .read()
            .await
            .mailboxes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("mailbox {}", id)))
    }

    async fn load_folders(&self, list: &ListId) -> Result<Vec<MailFolder>> {
        Ok(self
            .state
            .read()
            .await
            .folders
            .get(list)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_mail_range(
        &self,
        list: &ListId,
        start: &GeneratedId,
        count: usize,
    ) -> Result<Vec<Mail>> {
        let state = self.state.read().await;
        let mut page: Vec<Mail> = state
            .mails
            .values()
            .filter(|m| m.id.list_id == *list && m.id.element_id < *start)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.element_id.cmp(&a.id.element_id));
        page.truncate(count);
        Ok(page)
    }
}
