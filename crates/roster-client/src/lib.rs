//! # roster-client
//!
//! The recipient registry and the contact directory built on top of
//! `roster-store`.
//!
//! - [`Registry`] resolves addresses to stable ids, serves settings
//!   snapshots from a live cache and announces every change on a broadcast
//!   channel.
//! - [`Registry::search`] and [`DirectoryWorker`] compose directory results
//!   from the store's source queries.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod directory;
pub mod logging;
pub mod registry;

mod error;

pub use cache::LiveCache;
pub use collaborators::{AlwaysGranted, DefaultLabels, DirectoryLabels, NameResolver, PermissionGate};
pub use config::RosterConfig;
pub use directory::{DirectoryRequest, DirectoryWorker, DisplayMode};
pub use error::{ClientError, Result};
pub use registry::{BulkOperationsHandle, LiveRecipient, Registry, RegistryBuilder};
