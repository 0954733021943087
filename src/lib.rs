//! Fathom - incremental encrypted full-text indexing for mail stores
//!
//! This library builds and maintains a per-user search index over a remote
//! mail store: a historical backfill down to a configurable cutoff day, a
//! live event applier that keeps the index in sync with entity mutations,
//! durable per-group progress so indexing is resumable, and cooperative
//! cancellation that never corrupts on-disk state. Every key and posting
//! is encrypted with the database key before it reaches storage.

pub mod core;
pub mod entity;
pub mod error;
pub mod folders;
pub mod ids;
pub mod indexer;
pub mod status;
pub mod store;
pub mod types;

pub use crate::core::{IndexUpdate, IndexerCore};
pub use entity::EntityClient;
pub use error::{Error, Result};
pub use ids::{GeneratedId, GENERATED_MAX_ID, GENERATED_MIN_ID};
pub use indexer::MailIndexer;
pub use status::IndexState;
pub use store::ObjectStore;
pub use types::*;
