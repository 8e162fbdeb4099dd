//! Identifier allocation and the per-recipient settings store.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use roster_shared::{
    Address, AddressKind, MaterialColor, RecipientId, RegisteredState, UnidentifiedAccessMode,
    VibrateState,
};
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{optional_phone_type, optional_subscription, RecipientSettings};
use crate::patch::{dedup_last_wins, RecipientField};

const SETTINGS_COLUMNS: &str = "_id, phone, email, group_id, blocked, message_ringtone, \
     message_vibrate, call_ringtone, call_vibrate, notification_channel, mute_until, color, \
     seen_invite_reminder, default_subscription_id, message_expiration_time, registered, \
     system_display_name, system_photo_uri, system_phone_label, system_phone_type, \
     system_contact_uri, profile_key, profile_name, profile_avatar, profile_sharing, \
     unidentified_access_mode, force_sms_selection";

/// Outcome of [`Database::get_or_insert_recipient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub id: RecipientId,
    /// The row did not exist before this call.
    pub created: bool,
    /// A profile name was written by this call.
    pub named: bool,
}

impl Database {
    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Look up the recipient for an address without creating it.
    pub fn find_recipient(&self, kind: AddressKind, address: &str) -> Result<Option<RecipientId>> {
        let address = kind.normalize(address)?;
        self.find_normalized(kind, &address)
    }

    fn find_normalized(&self, kind: AddressKind, address: &str) -> Result<Option<RecipientId>> {
        let sql = format!("SELECT _id FROM recipient WHERE {} = ?1", kind.column());
        let id = self
            .conn()
            .query_row(&sql, params![address], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id.map(RecipientId))
    }

    /// Return the id for `address`, creating the row on first use.
    ///
    /// The unique constraint on the address column decides races: when a
    /// concurrent writer inserted the same address first, the insert fails
    /// with a constraint violation and the winner's row is returned instead.
    ///
    /// `profile_name`, when given, is stored with a new row, or filled into
    /// an existing row whose profile name is still empty.
    pub fn get_or_insert_recipient(
        &self,
        kind: AddressKind,
        address: &str,
        profile_name: Option<&str>,
    ) -> Result<Allocation> {
        let address = kind.normalize(address)?;

        if let Some(id) = self.find_normalized(kind, &address)? {
            let named = self.fill_profile_name(id, profile_name)?;
            return Ok(Allocation { id, created: false, named });
        }

        let sql = format!(
            "INSERT INTO recipient ({}, profile_name) VALUES (?1, ?2)",
            kind.column()
        );
        match self.conn().execute(&sql, params![address, profile_name]) {
            Ok(_) => {
                let id = RecipientId(self.conn().last_insert_rowid());
                tracing::debug!(id = %id, kind = ?kind, "allocated recipient");
                Ok(Allocation { id, created: true, named: profile_name.is_some() })
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                tracing::debug!(kind = ?kind, "lost allocation race, re-reading existing row");
                let id = self
                    .find_normalized(kind, &address)?
                    .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                let named = self.fill_profile_name(id, profile_name)?;
                Ok(Allocation { id, created: false, named })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn fill_profile_name(&self, id: RecipientId, profile_name: Option<&str>) -> Result<bool> {
        let Some(name) = profile_name else {
            return Ok(false);
        };
        let affected = self.conn().execute(
            "UPDATE recipient SET profile_name = ?1 WHERE _id = ?2 AND profile_name IS NULL",
            params![name, id.0],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Read the settings snapshot for `id`.
    pub fn get_recipient_settings(&self, id: RecipientId) -> Result<RecipientSettings> {
        let sql = format!("SELECT {SETTINGS_COLUMNS} FROM recipient WHERE _id = ?1");
        self.conn()
            .query_row(&sql, params![id.0], row_to_settings)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::RecipientNotFound(id),
                other => StoreError::Sqlite(other),
            })
    }

    pub fn recipient_exists(&self, id: RecipientId) -> Result<bool> {
        let found = self
            .conn()
            .query_row("SELECT 1 FROM recipient WHERE _id = ?1", params![id.0], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Write only the columns named in `fields`.
    pub fn update_recipient(&self, id: RecipientId, fields: &[RecipientField]) -> Result<()> {
        let fields = dedup_last_wins(fields);
        if fields.is_empty() {
            return if self.recipient_exists(id)? {
                Ok(())
            } else {
                Err(StoreError::RecipientNotFound(id))
            };
        }

        let assignments: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{} = ?{}", f.column(), i + 1))
            .collect();
        let sql = format!(
            "UPDATE recipient SET {} WHERE _id = ?{}",
            assignments.join(", "),
            fields.len() + 1
        );

        let mut values: Vec<rusqlite::types::Value> = fields.iter().map(|f| f.to_value()).collect();
        values.push(rusqlite::types::Value::Integer(id.0));

        let affected = self.conn().execute(&sql, params_from_iter(values))?;
        if affected == 0 {
            return Err(StoreError::RecipientNotFound(id));
        }
        Ok(())
    }

    /// Mark `active` as registered and `inactive` as not registered. Each id
    /// is written on its own: an id with no row is skipped and the rest
    /// still transition. Returns the ids that were written, in input order.
    pub fn set_registered_bulk(
        &self,
        active: &[RecipientId],
        inactive: &[RecipientId],
    ) -> Result<Vec<RecipientId>> {
        let transitions = active
            .iter()
            .map(|id| (*id, RegisteredState::Registered))
            .chain(inactive.iter().map(|id| (*id, RegisteredState::NotRegistered)));

        let mut written = Vec::with_capacity(active.len() + inactive.len());
        for (id, state) in transitions {
            match self.update_recipient(id, &[RecipientField::Registered(state)]) {
                Ok(()) => written.push(id),
                Err(StoreError::RecipientNotFound(_)) => {
                    tracing::warn!(id = %id, "skipping registration update for unknown recipient");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            requested = active.len() + inactive.len(),
            written = written.len(),
            "registration states updated"
        );
        Ok(written)
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    pub fn blocked_recipients(&self) -> Result<Vec<RecipientId>> {
        self.query_ids("SELECT _id FROM recipient WHERE blocked = 1 ORDER BY _id")
    }

    pub fn recipients_with_notification_channels(&self) -> Result<Vec<RecipientId>> {
        self.query_ids("SELECT _id FROM recipient WHERE notification_channel IS NOT NULL ORDER BY _id")
    }

    pub fn registered_recipients(&self) -> Result<Vec<RecipientId>> {
        let sql = format!(
            "SELECT _id FROM recipient WHERE registered = {} ORDER BY _id",
            RegisteredState::Registered.id()
        );
        self.query_ids(&sql)
    }

    /// Recipients that currently carry address-book info.
    pub fn system_contacts(&self) -> Result<Vec<RecipientId>> {
        self.query_ids(
            "SELECT _id FROM recipient
             WHERE system_display_name IS NOT NULL AND system_display_name != ''
             ORDER BY _id",
        )
    }

    pub fn all_addresses(&self) -> Result<HashSet<Address>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT phone, email, group_id FROM recipient")?;
        let rows = stmt.query_map([], |row| address_from_row(row, 0))?;

        let mut addresses = HashSet::new();
        for row in rows {
            addresses.insert(row?);
        }
        Ok(addresses)
    }

    fn query_ids(&self, sql: &str) -> Result<Vec<RecipientId>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.map(|r| r.map(RecipientId))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Bulk recolouring
    // ------------------------------------------------------------------

    /// Recompute the colour of every address-book contact in one
    /// transaction. `updater` receives the display name and the stored
    /// colour token (if any). Returns the ids that were written.
    pub fn update_system_contact_colors<F>(&self, mut updater: F) -> Result<Vec<RecipientId>>
    where
        F: FnMut(&str, Option<&str>) -> MaterialColor,
    {
        let tx = self.conn().unchecked_transaction()?;

        let current: Vec<(i64, String, Option<String>)> = {
            let mut stmt = tx.prepare(
                "SELECT _id, system_display_name, color FROM recipient
                 WHERE system_display_name IS NOT NULL AND system_display_name != ''",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut touched = Vec::with_capacity(current.len());
        for (id, name, color) in current {
            let new_color = updater(&name, color.as_deref());
            tx.execute(
                "UPDATE recipient SET color = ?1 WHERE _id = ?2",
                params![new_color.as_str(), id],
            )?;
            touched.push(RecipientId(id));
        }

        tx.commit()?;
        tracing::debug!(count = touched.len(), "recoloured system contacts");
        Ok(touched)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn address_from_row(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Address> {
    let phone: Option<String> = row.get(first)?;
    let email: Option<String> = row.get(first + 1)?;
    let group_id: Option<String> = row.get(first + 2)?;

    match (phone, email, group_id) {
        (Some(p), _, _) => Ok(Address::Phone(p)),
        (None, Some(e), _) => Ok(Address::Email(e)),
        (None, None, Some(g)) => Ok(Address::Group(g)),
        (None, None, None) => Err(rusqlite::Error::InvalidColumnType(
            first,
            "phone".into(),
            rusqlite::types::Type::Null,
        )),
    }
}

/// Map a `rusqlite::Row` selected with `SETTINGS_COLUMNS` to a snapshot.
///
/// Optional fields that fail to decode are logged and read as absent so that
/// a single bad value never makes the whole recipient unreadable.
fn row_to_settings(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecipientSettings> {
    let id = RecipientId(row.get("_id")?);
    let address = address_from_row(row, 1)?;

    let color = row
        .get::<_, Option<String>>("color")?
        .and_then(|token| match MaterialColor::from_serialized(&token) {
            Ok(color) => Some(color),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "ignoring stored color");
                None
            }
        });

    let profile_key = row
        .get::<_, Option<String>>("profile_key")?
        .and_then(|encoded| match STANDARD.decode(encoded.as_bytes()) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "ignoring undecodable profile key");
                None
            }
        });

    let message_vibrate = VibrateState::from_id(row.get("message_vibrate")?)
        .unwrap_or_else(|e| recover(id, e, VibrateState::Default));
    let call_vibrate = VibrateState::from_id(row.get("call_vibrate")?)
        .unwrap_or_else(|e| recover(id, e, VibrateState::Default));
    let registered = RegisteredState::from_id(row.get("registered")?)
        .unwrap_or_else(|e| recover(id, e, RegisteredState::Unknown));
    let unidentified_access_mode =
        UnidentifiedAccessMode::from_mode(row.get("unidentified_access_mode")?)
            .unwrap_or_else(|e| recover(id, e, UnidentifiedAccessMode::Unknown));

    Ok(RecipientSettings {
        id,
        address,
        blocked: row.get::<_, i64>("blocked")? == 1,
        mute_until: row.get("mute_until")?,
        message_vibrate,
        call_vibrate,
        message_ringtone: row.get("message_ringtone")?,
        call_ringtone: row.get("call_ringtone")?,
        color,
        seen_invite_reminder: row.get::<_, i64>("seen_invite_reminder")? == 1,
        default_subscription_id: optional_subscription(row.get("default_subscription_id")?),
        expire_messages: row.get("message_expiration_time")?,
        registered,
        profile_key,
        system_display_name: row.get("system_display_name")?,
        system_photo_uri: row.get("system_photo_uri")?,
        system_phone_label: row.get("system_phone_label")?,
        system_phone_type: optional_phone_type(row.get("system_phone_type")?),
        system_contact_uri: row.get("system_contact_uri")?,
        profile_name: row.get("profile_name")?,
        profile_avatar: row.get("profile_avatar")?,
        profile_sharing: row.get::<_, i64>("profile_sharing")? == 1,
        notification_channel: row.get("notification_channel")?,
        unidentified_access_mode,
        force_sms_selection: row.get::<_, i64>("force_sms_selection")? == 1,
    })
}

fn recover<T>(id: RecipientId, error: roster_shared::RosterError, fallback: T) -> T {
    tracing::warn!(id = %id, error = %error, "unknown stored code, using default");
    fallback
}
