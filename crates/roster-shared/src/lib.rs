//! # roster-shared
//!
//! Types shared by the store and the registry: recipient identifiers,
//! address kinds, per-recipient attribute enums, the colour palette and the
//! address plausibility checks used by the directory.

pub mod address;
pub mod color;
pub mod constants;
pub mod error;
pub mod types;

pub use address::{Address, AddressKind};
pub use color::MaterialColor;
pub use error::RosterError;
pub use types::{RecipientId, RegisteredState, UnidentifiedAccessMode, VibrateState};
