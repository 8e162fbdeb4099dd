//! # roster-store
//!
//! Local SQLite storage for recipients and the directory sources built on
//! them.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides the identifier allocator, the
//! per-recipient settings store, the bulk system-contact batch and the
//! directory source queries.

pub mod batch;
pub mod database;
pub mod groups;
pub mod migrations;
pub mod models;
pub mod patch;
pub mod recipients;
pub mod search;
pub mod threads;

mod error;

pub use batch::SystemContactBatch;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use patch::RecipientField;
