//! Domain model structs read from the local database.
//!
//! Every struct derives `Serialize` so it can be handed directly to a UI
//! layer or printed by the CLI.

use roster_shared::constants::{NO_PHONE_TYPE, NO_SUBSCRIPTION_ID};
use roster_shared::{
    Address, MaterialColor, RecipientId, RegisteredState, UnidentifiedAccessMode, VibrateState,
};
use serde::{Deserialize, Serialize};

use crate::patch::RecipientField;

// ---------------------------------------------------------------------------
// Recipient settings
// ---------------------------------------------------------------------------

/// Immutable snapshot of one `recipient` row.
///
/// Snapshots are never patched in place: a change to the row produces a new
/// snapshot that replaces the old one wholesale.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecipientSettings {
    pub id: RecipientId,
    pub address: Address,
    pub blocked: bool,
    /// Epoch millis until which notifications are muted.
    pub mute_until: i64,
    pub message_vibrate: VibrateState,
    pub call_vibrate: VibrateState,
    pub message_ringtone: Option<String>,
    pub call_ringtone: Option<String>,
    pub color: Option<MaterialColor>,
    pub seen_invite_reminder: bool,
    pub default_subscription_id: Option<i32>,
    /// Disappearing-message timer in seconds, 0 when off.
    pub expire_messages: i32,
    pub registered: RegisteredState,
    #[serde(skip)]
    pub profile_key: Option<Vec<u8>>,
    pub system_display_name: Option<String>,
    pub system_photo_uri: Option<String>,
    pub system_phone_label: Option<String>,
    pub system_phone_type: Option<i32>,
    pub system_contact_uri: Option<String>,
    pub profile_name: Option<String>,
    pub profile_avatar: Option<String>,
    pub profile_sharing: bool,
    pub notification_channel: Option<String>,
    pub unidentified_access_mode: UnidentifiedAccessMode,
    pub force_sms_selection: bool,
}

impl RecipientSettings {
    /// Best human-readable name: address-book name, then profile name.
    pub fn display_name(&self) -> Option<&str> {
        self.system_display_name
            .as_deref()
            .or(self.profile_name.as_deref())
    }

    pub fn is_registered(&self) -> bool {
        self.registered == RegisteredState::Registered
    }

    pub fn is_muted_at(&self, now_millis: i64) -> bool {
        self.mute_until > now_millis
    }
}

pub(crate) fn optional_subscription(raw: i32) -> Option<i32> {
    (raw != NO_SUBSCRIPTION_ID).then_some(raw)
}

pub(crate) fn optional_phone_type(raw: i32) -> Option<i32> {
    (raw != NO_PHONE_TYPE).then_some(raw)
}

// ---------------------------------------------------------------------------
// System contact info
// ---------------------------------------------------------------------------

/// Locally cached address-book fields for one recipient. Written in bulk
/// during an address-book re-sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemContactInfo {
    pub display_name: Option<String>,
    pub photo_uri: Option<String>,
    pub phone_label: Option<String>,
    pub phone_type: i32,
    pub contact_uri: Option<String>,
}

impl SystemContactInfo {
    pub fn fields(&self) -> Vec<RecipientField> {
        vec![
            RecipientField::SystemDisplayName(self.display_name.clone()),
            RecipientField::SystemPhotoUri(self.photo_uri.clone()),
            RecipientField::SystemPhoneLabel(self.phone_label.clone()),
            RecipientField::SystemPhoneType(self.phone_type),
            RecipientField::SystemContactUri(self.contact_uri.clone()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub recipient_id: RecipientId,
    /// Encoded group token, also the recipient's `group_id` address.
    pub group_id: String,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Directory rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Section header; not selectable.
    Divider,
    Recent,
    Normal,
    /// Synthetic entry for an address that matches no recipient.
    NewNumber,
}

/// One renderable entry of a directory search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRow {
    /// `None` for headers and the new-number entry.
    pub id: Option<RecipientId>,
    pub name: String,
    pub number: String,
    pub number_type: i32,
    pub label: String,
    pub kind: RowKind,
}
