//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fathom::entity::r#impl::MemoryEntityClient;
use fathom::ids::GeneratedId;
use fathom::store::meta;
use fathom::store::r#impl::MemoryObjectStore;
use fathom::types::*;
use fathom::{EntityClient, MailIndexer, ObjectStore};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub struct Fixture {
    pub entity: Arc<MemoryEntityClient>,
    pub store: Arc<MemoryObjectStore>,
    pub indexer: Arc<MailIndexer>,
    pub user: User,
    pub group: GroupId,
    pub inbox_list: ListId,
    pub spam_list: ListId,
}

/// One user, one mail group, a mailbox with an inbox and a spam folder.
pub async fn setup() -> Fixture {
    let entity = Arc::new(MemoryEntityClient::new());
    let store = Arc::new(MemoryObjectStore::new());

    let group = GeneratedId::new(1, 0);
    let inbox_list = GeneratedId::new(10, 0);
    let spam_list = GeneratedId::new(11, 0);
    seed_mailbox(&entity, group, inbox_list, spam_list).await;

    let indexer = Arc::new(
        MailIndexer::new(
            entity.clone() as Arc<dyn EntityClient>,
            store.clone() as Arc<dyn ObjectStore>,
            [9u8; 32],
        )
        .unwrap(),
    );
    let user = user_for_groups(&[group]);

    Fixture {
        entity,
        store,
        indexer,
        user,
        group,
        inbox_list,
        spam_list,
    }
}

/// Insert group root, mailbox, inbox and spam folders for one group.
pub async fn seed_mailbox(
    entity: &MemoryEntityClient,
    group: GroupId,
    inbox_list: ListId,
    spam_list: ListId,
) {
    let mailbox_id = GeneratedId::new(group.timestamp_ms() + 1, 0);
    let system_folders = GeneratedId::new(group.timestamp_ms() + 1, 1);
    let inbox_subs = GeneratedId::new(group.timestamp_ms() + 1, 2);
    let spam_subs = GeneratedId::new(group.timestamp_ms() + 1, 3);

    entity
        .insert_group_root(MailboxGroupRoot {
            group,
            mailbox: mailbox_id,
        })
        .await;
    entity
        .insert_mailbox(MailBox {
            id: mailbox_id,
            system_folders,
        })
        .await;
    entity
        .insert_folder(
            system_folders,
            MailFolder {
                id: IdTuple::new(system_folders, GeneratedId::new(100, 0)),
                folder_type: FolderType::Inbox,
                mails: inbox_list,
                sub_folders: inbox_subs,
            },
        )
        .await;
    entity
        .insert_folder(
            system_folders,
            MailFolder {
                id: IdTuple::new(system_folders, GeneratedId::new(100, 1)),
                folder_type: FolderType::Spam,
                mails: spam_list,
                sub_folders: spam_subs,
            },
        )
        .await;
}

pub fn user_for_groups(groups: &[GroupId]) -> User {
    User {
        id: GeneratedId::new(0, 1),
        memberships: groups
            .iter()
            .map(|g| GroupMembership {
                group: *g,
                group_type: GroupType::Mail,
            })
            .collect(),
    }
}

/// Persist the enabled flag + spam exclusion and restore it into the
/// indexer, without kicking off the initial backfill.
pub async fn enable_without_backfill(fx: &Fixture) {
    meta::write_enabled(fx.store.as_ref(), true, &[fx.spam_list])
        .await
        .unwrap();
    fx.indexer.init(&fx.user).await.unwrap();
}

pub fn make_mail(group: GroupId, list: ListId, element: GeneratedId, subject: &str) -> (Mail, MailBody) {
    let mail = Mail {
        id: IdTuple::new(list, element),
        subject: subject.to_string(),
        sender: Some(MailAddress::new("Sender", "sender@example.com")),
        to_recipients: vec![MailAddress::new("Recipient", "recipient@example.com")],
        cc_recipients: vec![],
        bcc_recipients: vec![],
        state: MailState::Received,
        body: element,
        attachments: vec![],
        owner_group: group,
    };
    let body = MailBody {
        id: element,
        text: format!("<p>body of {}</p>", subject),
    };
    (mail, body)
}

pub async fn add_mail(fx: &Fixture, list: ListId, element: GeneratedId, subject: &str) {
    let (mail, body) = make_mail(fx.group, list, element, subject);
    fx.entity.insert_mail(mail).await;
    fx.entity.insert_body(body).await;
}

pub async fn add_draft(fx: &Fixture, list: ListId, element: GeneratedId, subject: &str) {
    let (mut mail, body) = make_mail(fx.group, list, element, subject);
    mail.state = MailState::Draft;
    fx.entity.insert_mail(mail).await;
    fx.entity.insert_body(body).await;
}

/// The encrypted token row key for a plaintext token.
pub fn token_key(fx: &Fixture, token: &str) -> String {
    fx.indexer.core().crypto().index_key_b64(token.as_bytes())
}

pub async fn token_row_exists(fx: &Fixture, token: &str) -> bool {
    fx.store
        .get(
            fathom::store::ObjectStoreName::SearchIndex,
            &token_key(fx, token),
        )
        .await
        .unwrap()
        .is_some()
}
