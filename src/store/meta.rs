//! Progress store
//!
//! Typed accessors over the object store for the indexer's durable state:
//! the enabled flag + excluded lists in `MetaDataOS`, per-group
//! `index_timestamp` records in `GroupDataOS`, and the read-only element
//! data lookup move handling relies on.

use crate::error::Result;
use crate::store::{ObjectStore, ObjectStoreName, StoreOp};
use crate::types::{ElementData, GroupData, GroupId, ListId};

pub const META_MAIL_INDEXING_ENABLED: &str = "mailIndexingEnabled";
pub const META_EXCLUDED_LIST_IDS: &str = "excludedListIds";

/// Read the enabled flag and the excluded-list set.
pub async fn read_enabled(store: &dyn ObjectStore) -> Result<(bool, Vec<ListId>)> {
    let enabled = match store
        .get(ObjectStoreName::MetaData, META_MAIL_INDEXING_ENABLED)
        .await?
    {
        Some(raw) => serde_json::from_slice(&raw)?,
        None => false,
    };
    let excluded = match store
        .get(ObjectStoreName::MetaData, META_EXCLUDED_LIST_IDS)
        .await?
    {
        Some(raw) => serde_json::from_slice(&raw)?,
        None => Vec::new(),
    };
    Ok((enabled, excluded))
}

/// Write the enabled flag and the excluded-list set in one transaction.
pub async fn write_enabled(
    store: &dyn ObjectStore,
    enabled: bool,
    excluded: &[ListId],
) -> Result<()> {
    store
        .transaction(vec![
            StoreOp::Put {
                store: ObjectStoreName::MetaData,
                key: META_MAIL_INDEXING_ENABLED.to_string(),
                value: serde_json::to_vec(&enabled)?,
            },
            StoreOp::Put {
                store: ObjectStoreName::MetaData,
                key: META_EXCLUDED_LIST_IDS.to_string(),
                value: serde_json::to_vec(excluded)?,
            },
        ])
        .await
}

pub async fn read_group_data(
    store: &dyn ObjectStore,
    group: &GroupId,
) -> Result<Option<GroupData>> {
    match store
        .get(ObjectStoreName::GroupData, &group.to_string())
        .await?
    {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

pub async fn write_group_data(
    store: &dyn ObjectStore,
    group: &GroupId,
    data: &GroupData,
) -> Result<()> {
    store
        .transaction(vec![StoreOp::Put {
            store: ObjectStoreName::GroupData,
            key: group.to_string(),
            value: serde_json::to_vec(data)?,
        }])
        .await
}

pub async fn read_element_data(
    store: &dyn ObjectStore,
    enc_instance_id: &str,
) -> Result<Option<ElementData>> {
    match store
        .get(ObjectStoreName::ElementData, enc_instance_id)
        .await?
    {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}
