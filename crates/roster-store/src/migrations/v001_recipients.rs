//! v001 -- Recipient table.
//!
//! One row per phone number, email or group. Exactly one address column is
//! set and each address column is unique, which makes the table the
//! authority for identifier allocation.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recipient (
    _id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    phone                    TEXT UNIQUE DEFAULT NULL,
    email                    TEXT UNIQUE DEFAULT NULL,
    group_id                 TEXT UNIQUE DEFAULT NULL,
    blocked                  INTEGER NOT NULL DEFAULT 0,
    message_ringtone         TEXT DEFAULT NULL,
    message_vibrate          INTEGER NOT NULL DEFAULT 0,   -- VibrateState
    call_ringtone            TEXT DEFAULT NULL,
    call_vibrate             INTEGER NOT NULL DEFAULT 0,   -- VibrateState
    notification_channel     TEXT DEFAULT NULL,
    mute_until               INTEGER NOT NULL DEFAULT 0,   -- epoch millis
    color                    TEXT DEFAULT NULL,            -- MaterialColor token
    seen_invite_reminder     INTEGER NOT NULL DEFAULT 0,
    default_subscription_id  INTEGER NOT NULL DEFAULT -1,
    message_expiration_time  INTEGER NOT NULL DEFAULT 0,   -- seconds
    registered               INTEGER NOT NULL DEFAULT 0,   -- RegisteredState
    system_display_name      TEXT DEFAULT NULL,
    system_photo_uri         TEXT DEFAULT NULL,
    system_phone_label       TEXT DEFAULT NULL,
    system_phone_type        INTEGER NOT NULL DEFAULT -1,
    system_contact_uri       TEXT DEFAULT NULL,
    profile_key              TEXT DEFAULT NULL,            -- base64
    profile_name             TEXT DEFAULT NULL,
    profile_avatar           TEXT DEFAULT NULL,
    profile_sharing          INTEGER NOT NULL DEFAULT 0,
    unidentified_access_mode INTEGER NOT NULL DEFAULT 0,
    force_sms_selection      INTEGER NOT NULL DEFAULT 0,

    CHECK ((phone IS NOT NULL) + (email IS NOT NULL) + (group_id IS NOT NULL) = 1)
);

CREATE INDEX IF NOT EXISTS idx_recipient_blocked ON recipient(blocked);
CREATE INDEX IF NOT EXISTS idx_recipient_registered ON recipient(registered);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
