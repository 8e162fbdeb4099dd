use roster_shared::RosterError;
use roster_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the registry and the directory.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying store failed (includes unknown recipient ids).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Caller supplied an unusable address or argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A newer directory request replaced this one before it finished.
    #[error("directory request superseded")]
    Superseded,

    /// A blocking worker task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<RosterError> for ClientError {
    fn from(e: RosterError) -> Self {
        ClientError::InvalidInput(e.to_string())
    }
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Store(StoreError::RecipientNotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
