//! Folder resolution
//!
//! Walks a mail group's folder tree: group root -> mailbox -> system
//! folders -> nested subfolders. Excluded lists (spam) are dropped at the
//! system-folder level; subfolders of a kept folder are always included.

use crate::entity::EntityClient;
use crate::error::{Error, Result};
use crate::types::*;

/// Resolve a group's mailbox via its group root.
pub async fn resolve_mailbox(entity: &dyn EntityClient, group: &GroupId) -> Result<MailBox> {
    let root = entity.load_group_root(group).await?;
    entity.load_mailbox(&root.mailbox).await
}

/// All non-excluded mail-list ids of a mailbox, in traversal order:
/// each kept system folder's list, then the lists of its subfolders
/// (recursively).
pub async fn load_mail_list_ids(
    entity: &dyn EntityClient,
    mailbox: &MailBox,
    excluded: &[ListId],
) -> Result<Vec<ListId>> {
    let system = entity.load_folders(&mailbox.system_folders).await?;
    let mut lists = Vec::new();
    for folder in system {
        if excluded.contains(&folder.mails) {
            continue;
        }
        lists.push(folder.mails);
        let mut pending = vec![folder.sub_folders];
        while let Some(sub_list) = pending.pop() {
            for sub in entity.load_folders(&sub_list).await? {
                lists.push(sub.mails);
                pending.push(sub.sub_folders);
            }
        }
    }
    Ok(lists)
}

/// The group's spam folder. A mailbox without one violates the indexer's
/// preconditions.
pub async fn spam_folder(entity: &dyn EntityClient, group: &GroupId) -> Result<MailFolder> {
    let mailbox = resolve_mailbox(entity, group).await?;
    let system = entity.load_folders(&mailbox.system_folders).await?;
    system
        .into_iter()
        .find(|f| f.folder_type == FolderType::Spam)
        .ok_or_else(|| Error::InvalidState(format!("group {} has no spam folder", group)))
}
