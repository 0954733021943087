//! Core types used throughout the mail indexer

use serde::{Deserialize, Serialize};

use crate::ids::GeneratedId;

/// Id of a mail group.
pub type GroupId = GeneratedId;

/// Id of a mail list (one folder's contents).
pub type ListId = GeneratedId;

/// Identity of a list element: the list it lives in plus its element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdTuple {
    pub list_id: ListId,
    pub element_id: GeneratedId,
}

impl IdTuple {
    pub fn new(list_id: ListId, element_id: GeneratedId) -> Self {
        Self {
            list_id,
            element_id,
        }
    }
}

/// A mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    pub name: String,
    pub address: String,
}

impl MailAddress {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }

    /// `"name <address>"`, the form recipients are indexed in.
    pub fn display(&self) -> String {
        format!("{} <{}>", self.name, self.address)
    }
}

/// Lifecycle state of a mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailState {
    Draft,
    Sending,
    Sent,
    Received,
}

/// A mail record as served by the entity fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mail {
    pub id: IdTuple,
    pub subject: String,
    pub sender: Option<MailAddress>,
    pub to_recipients: Vec<MailAddress>,
    pub cc_recipients: Vec<MailAddress>,
    pub bcc_recipients: Vec<MailAddress>,
    pub state: MailState,
    /// Element id of the [`MailBody`] holding the full text.
    pub body: GeneratedId,
    /// Ids of the attached [`MailFile`] records.
    pub attachments: Vec<IdTuple>,
    pub owner_group: GroupId,
}

/// The full mail text, stored separately from the mail record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailBody {
    pub id: GeneratedId,
    /// HTML or plain text; stripped to plain text before tokenization.
    pub text: String,
}

/// An attachment; only the name is indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailFile {
    pub id: IdTuple,
    pub name: String,
}

/// Kind of a mail folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderType {
    Custom,
    Inbox,
    Sent,
    Trash,
    Archive,
    Spam,
    Draft,
}

/// A mail folder: points at the list holding its mail and at its subfolders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailFolder {
    pub id: IdTuple,
    pub folder_type: FolderType,
    /// The mail list containing this folder's mail.
    pub mails: ListId,
    /// List holding this folder's subfolders.
    pub sub_folders: ListId,
}

/// Aggregation root of one mail group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxGroupRoot {
    pub group: GroupId,
    /// Element id of the group's [`MailBox`].
    pub mailbox: GeneratedId,
}

/// A mailbox: owns the list of system folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailBox {
    pub id: GeneratedId,
    pub system_folders: ListId,
}

/// Kinds of groups a user can be a member of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    Mail,
    Contact,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group: GroupId,
    pub group_type: GroupType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: GeneratedId,
    pub memberships: Vec<GroupMembership>,
}

impl User {
    /// The user's mail group memberships, in membership order.
    pub fn mail_memberships(&self) -> impl Iterator<Item = &GroupMembership> {
        self.memberships
            .iter()
            .filter(|m| m.group_type == GroupType::Mail)
    }
}

/// Mutation operations delivered by the entity event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOperation {
    Create,
    Update,
    Delete,
}

/// One entity mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEvent {
    pub operation: EventOperation,
    pub instance_list: ListId,
    pub instance_id: GeneratedId,
}

impl EntityEvent {
    pub fn new(operation: EventOperation, instance_list: ListId, instance_id: GeneratedId) -> Self {
        Self {
            operation,
            instance_list,
            instance_id,
        }
    }
}

/// An ordered batch of entity events for one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatch {
    pub batch_id: GeneratedId,
    pub group_id: GroupId,
    pub events: Vec<EntityEvent>,
}

/// Sentinel `index_timestamp`: nothing has been indexed for the group yet.
pub const NOTHING_INDEXED: i64 = 0;
/// Sentinel `index_timestamp`: the group is indexed back to its origin.
pub const FULL_INDEXED: i64 = 1;

/// Per-group indexing progress, persisted in `GroupDataOS`.
///
/// `index_timestamp` is either a sentinel or an epoch-ms value meaning
/// "all mail newer than this is indexed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupData {
    pub index_timestamp: i64,
}

impl GroupData {
    pub fn new(index_timestamp: i64) -> Self {
        Self { index_timestamp }
    }
}

/// Per-instance index bookkeeping, persisted in `ElementDataOS` under the
/// encrypted instance id. `token_keys` names the encrypted token rows that
/// hold this instance's postings, so deletes can find them later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    pub list_id: ListId,
    pub owner_group: GroupId,
    pub token_keys: Vec<String>,
}
