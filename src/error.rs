//! Error types for the mail indexer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl Error {
    /// Whether a failed per-mail load should skip the mail instead of
    /// failing the whole batch (the record vanished or permissions changed).
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::NotAuthorized(_))
    }
}
