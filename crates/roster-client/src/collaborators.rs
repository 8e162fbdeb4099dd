//! Services the registry consumes but does not implement.
//!
//! The host application plugs in its address book, permission model and
//! localised strings through these traits.

use futures::future::BoxFuture;

/// Best-effort lookup of a display name for a phone number, used when a
/// phone recipient is created. Returning `None` means "no name known".
pub trait NameResolver: Send + Sync {
    fn lookup_name(&self, phone: &str) -> BoxFuture<'static, Option<String>>;
}

/// Whether the user allowed access to the device address book. When denied,
/// the directory shows no contact rows.
pub trait PermissionGate: Send + Sync {
    fn can_read_contacts(&self) -> bool;
}

/// Permission gate for hosts without an address-book permission model.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn can_read_contacts(&self) -> bool {
        true
    }
}

/// Localised labels for directory headers and the new-number row.
pub trait DirectoryLabels: Send + Sync {
    fn recent_chats(&self) -> String;
    fn contacts(&self) -> String;
    fn groups(&self) -> String;
    fn new_number(&self) -> String;
}

/// English labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLabels;

impl DirectoryLabels for DefaultLabels {
    fn recent_chats(&self) -> String {
        "Recent chats".into()
    }

    fn contacts(&self) -> String {
        "Contacts".into()
    }

    fn groups(&self) -> String {
        "Groups".into()
    }

    fn new_number(&self) -> String {
        "New message to\u{2026}".into()
    }
}
