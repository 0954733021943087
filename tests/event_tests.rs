//! Event applier scenarios: create, draft update, delete, moves

mod common;

use fathom::core::{EncryptedIndexEntry, IndexUpdate};
use fathom::ids::GeneratedId;
use fathom::store::{meta, ObjectStoreName};
use fathom::types::*;

use common::{
    add_draft, add_mail, enable_without_backfill, now_ms, setup, token_key, token_row_exists,
    Fixture,
};

fn batch(fx: &Fixture, events: Vec<EntityEvent>) -> EventBatch {
    EventBatch {
        batch_id: GeneratedId::new(now_ms(), 77),
        group_id: fx.group,
        events,
    }
}

fn create(list: ListId, element: GeneratedId) -> EntityEvent {
    EntityEvent::new(EventOperation::Create, list, element)
}

fn update(list: ListId, element: GeneratedId) -> EntityEvent {
    EntityEvent::new(EventOperation::Update, list, element)
}

fn delete(list: ListId, element: GeneratedId) -> EntityEvent {
    EntityEvent::new(EventOperation::Delete, list, element)
}

async fn element_data_of(fx: &Fixture, element: &GeneratedId) -> Option<ElementData> {
    let enc_id = fx.indexer.core().encrypted_instance_id(element);
    meta::read_element_data(fx.store.as_ref(), &enc_id)
        .await
        .unwrap()
}

#[async_std::test]
async fn test_create_event_indexes_mail() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "project update").await;

    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    assert!(token_row_exists(&fx, "project").await);
    let data = element_data_of(&fx, &element).await.unwrap();
    assert_eq!(data.list_id, fx.inbox_list);
    assert_eq!(data.owner_group, fx.group);
}

#[async_std::test]
async fn test_create_in_excluded_list_is_dropped() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.spam_list, element, "cheap watches").await;

    // The staged update stays empty and nothing is persisted.
    let mut staged = IndexUpdate::new(fx.group);
    fx.indexer
        .process_entity_events(
            &[create(fx.spam_list, element)],
            &fx.group,
            &GeneratedId::new(now_ms(), 1),
            &mut staged,
        )
        .await
        .unwrap();
    assert!(staged.is_empty());

    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.spam_list, element)]))
        .await
        .unwrap();
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 0);
    assert_eq!(fx.store.count(ObjectStoreName::SearchIndex).await, 0);
}

#[async_std::test]
async fn test_draft_update_rewrites_postings() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_draft(&fx, fx.inbox_list, element, "penultimate wording").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();
    assert!(token_row_exists(&fx, "penultimate").await);

    // The draft is edited: same instance, new subject.
    add_draft(&fx, fx.inbox_list, element, "final wording").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![update(fx.inbox_list, element)]))
        .await
        .unwrap();

    assert!(!token_row_exists(&fx, "penultimate").await);
    assert!(token_row_exists(&fx, "final").await);
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 1);
}

#[async_std::test]
async fn test_non_draft_update_is_ignored() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "original subject").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    add_mail(&fx, fx.inbox_list, element, "tampered subject").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![update(fx.inbox_list, element)]))
        .await
        .unwrap();

    assert!(token_row_exists(&fx, "original").await);
    assert!(!token_row_exists(&fx, "tampered").await);
}

#[async_std::test]
async fn test_delete_event_removes_postings() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "ephemeral note").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    fx.entity.remove_mail(&IdTuple::new(fx.inbox_list, element)).await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![delete(fx.inbox_list, element)]))
        .await
        .unwrap();

    assert!(!token_row_exists(&fx, "ephemeral").await);
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 0);
}

#[async_std::test]
async fn test_move_keeps_postings_and_updates_list() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "travel itinerary").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    let archive_list = GeneratedId::new(12, 0);
    let move_events = vec![
        delete(fx.inbox_list, element),
        create(archive_list, element),
    ];

    // The staged update holds exactly one move: no postings, no deletes.
    let mut staged = IndexUpdate::new(fx.group);
    fx.indexer
        .process_entity_events(
            &move_events,
            &fx.group,
            &GeneratedId::new(now_ms(), 1),
            &mut staged,
        )
        .await
        .unwrap();
    assert_eq!(staged.moves.len(), 1);
    assert!(staged.new_entries.is_empty());
    assert!(staged.deletes.is_empty());

    fx.indexer
        .process_event_batch(&batch(&fx, move_events))
        .await
        .unwrap();

    assert!(token_row_exists(&fx, "itinerary").await);
    let data = element_data_of(&fx, &element).await.unwrap();
    assert_eq!(data.list_id, archive_list);
}

#[async_std::test]
async fn test_move_to_spam_removes_postings() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "suspicious deal").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    fx.indexer
        .process_event_batch(&batch(
            &fx,
            vec![delete(fx.inbox_list, element), create(fx.spam_list, element)],
        ))
        .await
        .unwrap();

    assert!(!token_row_exists(&fx, "suspicious").await);
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 0);
}

#[async_std::test]
async fn test_move_of_unindexed_mail_indexes_it() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    // Never indexed: moved out of spam into the inbox.
    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "rescued mail").await;

    fx.indexer
        .process_event_batch(&batch(
            &fx,
            vec![delete(fx.spam_list, element), create(fx.inbox_list, element)],
        ))
        .await
        .unwrap();

    assert!(token_row_exists(&fx, "rescued").await);
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 1);
}

#[async_std::test]
async fn test_event_application_is_idempotent() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "same thing twice").await;
    let events = vec![create(fx.inbox_list, element)];
    let batch_id = GeneratedId::new(now_ms(), 1);

    let mut first = IndexUpdate::new(fx.group);
    fx.indexer
        .process_entity_events(&events, &fx.group, &batch_id, &mut first)
        .await
        .unwrap();
    let mut second = IndexUpdate::new(fx.group);
    fx.indexer
        .process_entity_events(&events, &fx.group, &batch_id, &mut second)
        .await
        .unwrap();

    assert_eq!(first.new_element_data, second.new_element_data);
    assert_eq!(first.moves, second.moves);
    assert_eq!(first.deletes, second.deletes);

    // Same token rows with the same postings; ciphertexts differ by nonce,
    // so compare the decrypted payloads.
    let crypto = fx.indexer.core().crypto();
    let decrypt_rows = |update: &IndexUpdate| {
        let mut rows: Vec<(String, Vec<(String, Vec<u8>)>)> = update
            .new_entries
            .iter()
            .map(|(key, entries): (&String, &Vec<EncryptedIndexEntry>)| {
                let mut decrypted: Vec<(String, Vec<u8>)> = entries
                    .iter()
                    .map(|e| (e.id_key.clone(), crypto.decrypt(&e.data).unwrap()))
                    .collect();
                decrypted.sort();
                (key.clone(), decrypted)
            })
            .collect();
        rows.sort();
        rows
    };
    assert_eq!(decrypt_rows(&first), decrypt_rows(&second));
}

#[async_std::test]
async fn test_vanished_mail_is_skipped() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    // No such mail: the create is logged and skipped, the batch succeeds.
    let element = GeneratedId::new(now_ms(), 0);
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 0);
}

#[async_std::test]
async fn test_unreadable_mail_is_skipped() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "private").await;
    fx.entity.deny(IdTuple::new(fx.inbox_list, element)).await;

    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();
    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 0);
}

#[async_std::test]
async fn test_applier_is_noop_while_disabled() {
    let fx = setup().await;

    let element = GeneratedId::new(now_ms(), 0);
    add_mail(&fx, fx.inbox_list, element, "not yet").await;
    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    assert_eq!(fx.store.count(ObjectStoreName::ElementData).await, 0);
    assert_eq!(fx.store.count(ObjectStoreName::SearchIndex).await, 0);
}

#[async_std::test]
async fn test_all_attributes_are_searchable() {
    let fx = setup().await;
    enable_without_backfill(&fx).await;

    let element = GeneratedId::new(now_ms(), 0);
    let (mut mail, body) = common::make_mail(fx.group, fx.inbox_list, element, "kickoff agenda");
    let file_id = IdTuple::new(GeneratedId::new(30, 0), GeneratedId::new(now_ms(), 1));
    mail.attachments = vec![file_id];
    fx.entity.insert_mail(mail).await;
    fx.entity.insert_body(body).await;
    fx.entity
        .insert_file(MailFile {
            id: file_id,
            name: "roadmap.pdf".to_string(),
        })
        .await;

    fx.indexer
        .process_event_batch(&batch(&fx, vec![create(fx.inbox_list, element)]))
        .await
        .unwrap();

    for token in ["kickoff", "sender", "recipient", "body", "roadmap"] {
        assert!(
            token_row_exists(&fx, token).await,
            "expected a posting row for {:?} (key {})",
            token,
            token_key(&fx, token)
        );
    }
}
