use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown color: {0}")]
    UnknownColor(String),

    #[error("Invalid recipient id: {0}")]
    InvalidRecipientId(String),

    #[error("Unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i64 },
}
