//! Partial updates of a recipient row.
//!
//! A patch is a list of [`RecipientField`] values; only the columns named in
//! the list are written and the rest of the row is left untouched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use roster_shared::constants::NO_SUBSCRIPTION_ID;
use roster_shared::{MaterialColor, RegisteredState, UnidentifiedAccessMode, VibrateState};
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientField {
    Blocked(bool),
    MessageRingtone(Option<String>),
    MessageVibrate(VibrateState),
    CallRingtone(Option<String>),
    CallVibrate(VibrateState),
    NotificationChannel(Option<String>),
    MuteUntil(i64),
    Color(Option<MaterialColor>),
    SeenInviteReminder(bool),
    DefaultSubscriptionId(Option<i32>),
    ExpireMessages(i32),
    Registered(RegisteredState),
    SystemDisplayName(Option<String>),
    SystemPhotoUri(Option<String>),
    SystemPhoneLabel(Option<String>),
    SystemPhoneType(i32),
    SystemContactUri(Option<String>),
    ProfileKey(Option<Vec<u8>>),
    ProfileName(Option<String>),
    ProfileAvatar(Option<String>),
    ProfileSharing(bool),
    UnidentifiedAccessMode(UnidentifiedAccessMode),
    ForceSmsSelection(bool),
}

impl RecipientField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "blocked",
            Self::MessageRingtone(_) => "message_ringtone",
            Self::MessageVibrate(_) => "message_vibrate",
            Self::CallRingtone(_) => "call_ringtone",
            Self::CallVibrate(_) => "call_vibrate",
            Self::NotificationChannel(_) => "notification_channel",
            Self::MuteUntil(_) => "mute_until",
            Self::Color(_) => "color",
            Self::SeenInviteReminder(_) => "seen_invite_reminder",
            Self::DefaultSubscriptionId(_) => "default_subscription_id",
            Self::ExpireMessages(_) => "message_expiration_time",
            Self::Registered(_) => "registered",
            Self::SystemDisplayName(_) => "system_display_name",
            Self::SystemPhotoUri(_) => "system_photo_uri",
            Self::SystemPhoneLabel(_) => "system_phone_label",
            Self::SystemPhoneType(_) => "system_phone_type",
            Self::SystemContactUri(_) => "system_contact_uri",
            Self::ProfileKey(_) => "profile_key",
            Self::ProfileName(_) => "profile_name",
            Self::ProfileAvatar(_) => "profile_avatar",
            Self::ProfileSharing(_) => "profile_sharing",
            Self::UnidentifiedAccessMode(_) => "unidentified_access_mode",
            Self::ForceSmsSelection(_) => "force_sms_selection",
        }
    }

    /// Storage representation of the new value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Blocked(v)
            | Self::SeenInviteReminder(v)
            | Self::ProfileSharing(v)
            | Self::ForceSmsSelection(v) => Value::Integer(i64::from(*v)),

            Self::MessageRingtone(v)
            | Self::CallRingtone(v)
            | Self::NotificationChannel(v)
            | Self::SystemDisplayName(v)
            | Self::SystemPhotoUri(v)
            | Self::SystemPhoneLabel(v)
            | Self::SystemContactUri(v)
            | Self::ProfileName(v)
            | Self::ProfileAvatar(v) => text(v.clone()),

            Self::MessageVibrate(v) | Self::CallVibrate(v) => Value::Integer(v.id().into()),
            Self::MuteUntil(v) => Value::Integer(*v),
            Self::Color(v) => text(v.map(|c| c.as_str().to_string())),
            Self::DefaultSubscriptionId(v) => {
                Value::Integer(v.unwrap_or(NO_SUBSCRIPTION_ID).into())
            }
            Self::ExpireMessages(v) | Self::SystemPhoneType(v) => Value::Integer((*v).into()),
            Self::Registered(v) => Value::Integer(v.id().into()),
            Self::ProfileKey(v) => text(v.as_ref().map(|key| STANDARD.encode(key))),
            Self::UnidentifiedAccessMode(v) => Value::Integer(v.mode().into()),
        }
    }
}

fn text(value: Option<String>) -> Value {
    value.map(Value::Text).unwrap_or(Value::Null)
}

/// Collapse a patch so each column appears once, keeping the last value
/// given for it and the order in which columns were first named.
pub(crate) fn dedup_last_wins(fields: &[RecipientField]) -> Vec<&RecipientField> {
    let mut out: Vec<&RecipientField> = Vec::with_capacity(fields.len());
    for field in fields {
        match out.iter_mut().find(|f| f.column() == field.column()) {
            Some(slot) => *slot = field,
            None => out.push(field),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_subscription_uses_sentinel() {
        assert_eq!(
            RecipientField::DefaultSubscriptionId(None).to_value(),
            Value::Integer(-1)
        );
    }

    #[test]
    fn profile_key_is_stored_as_base64() {
        assert_eq!(
            RecipientField::ProfileKey(Some(vec![1, 2, 3])).to_value(),
            Value::Text("AQID".into())
        );
        assert_eq!(RecipientField::ProfileKey(None).to_value(), Value::Null);
    }

    #[test]
    fn repeated_column_keeps_last_value() {
        let patch = [
            RecipientField::Blocked(true),
            RecipientField::MuteUntil(5),
            RecipientField::Blocked(false),
        ];
        let deduped = dedup_last_wins(&patch);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], &RecipientField::Blocked(false));
        assert_eq!(deduped[1], &RecipientField::MuteUntil(5));
    }
}
