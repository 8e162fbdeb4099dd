use roster_shared::{RecipientId, RosterError};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings read or write named an id that has no row. Ids are only
    /// handed out by the allocator, so this indicates a caller bug.
    #[error("Recipient not found: {0}")]
    RecipientNotFound(RecipientId),

    /// Rejected input, e.g. an address that is empty after normalization.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<RosterError> for StoreError {
    fn from(e: RosterError) -> Self {
        StoreError::InvalidInput(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
