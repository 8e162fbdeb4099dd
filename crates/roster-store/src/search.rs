//! Directory source queries.
//!
//! Each query returns ready-made [`DirectoryRow`]s in its own order; the
//! caller decides how the sources are combined. Filters are case-insensitive
//! substring matches.

use roster_shared::constants::{PHONE_TYPE_CUSTOM, PHONE_TYPE_MOBILE};
use roster_shared::{RecipientId, RegisteredState};
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::database::Database;
use crate::error::Result;
use crate::models::{DirectoryRow, RowKind};

/// Build a `LIKE` pattern matching `filter` anywhere, with the wildcard
/// characters of the filter itself escaped (use with `ESCAPE '\'`).
pub(crate) fn like_pattern(filter: &str) -> String {
    let mut pattern = String::with_capacity(filter.len() + 2);
    pattern.push('%');
    for c in filter.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const CONTACT_COLUMNS: &str = "_id,
     COALESCE(system_display_name, profile_name, '') AS name,
     COALESCE(phone, email) AS number,
     system_phone_type,
     COALESCE(system_phone_label, '') AS label";

impl Database {
    /// Unblocked, registered individuals that have a name to show.
    pub fn query_service_contacts(&self, filter: &str) -> Result<Vec<DirectoryRow>> {
        let mut sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM recipient
             WHERE blocked = 0 AND registered = ?1 AND group_id IS NULL
               AND (system_display_name IS NOT NULL OR profile_sharing = 1)"
        );
        let mut args = vec![Value::Integer(RegisteredState::Registered.id().into())];

        if filter.is_empty() {
            sql.push_str(" AND (system_display_name IS NOT NULL OR profile_name IS NOT NULL)");
        } else {
            sql.push_str(
                " AND (phone LIKE ?2 ESCAPE '\\'
                       OR system_display_name LIKE ?2 ESCAPE '\\'
                       OR profile_name LIKE ?2 ESCAPE '\\')",
            );
            args.push(Value::Text(like_pattern(filter)));
        }

        sql.push_str(
            " ORDER BY COALESCE(system_display_name, profile_name) COLLATE NOCASE,
                       system_display_name COLLATE NOCASE,
                       profile_name COLLATE NOCASE,
                       phone COLLATE NOCASE",
        );

        self.query_contact_rows(&sql, args)
    }

    /// Unblocked address-book contacts that are not known to be registered.
    pub fn query_non_service_contacts(&self, filter: &str) -> Result<Vec<DirectoryRow>> {
        let mut sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM recipient
             WHERE blocked = 0 AND registered != ?1 AND group_id IS NULL
               AND system_display_name IS NOT NULL
               AND (phone IS NOT NULL OR email IS NOT NULL)"
        );
        let mut args = vec![Value::Integer(RegisteredState::Registered.id().into())];

        if !filter.is_empty() {
            sql.push_str(
                " AND (phone LIKE ?2 ESCAPE '\\' OR system_display_name LIKE ?2 ESCAPE '\\')",
            );
            args.push(Value::Text(like_pattern(filter)));
        }

        sql.push_str(" ORDER BY system_display_name COLLATE NOCASE, phone COLLATE NOCASE");

        self.query_contact_rows(&sql, args)
    }

    /// Groups whose title contains `filter`, as directory rows.
    pub fn query_groups(&self, filter: &str) -> Result<Vec<DirectoryRow>> {
        Ok(self
            .groups_filtered_by_title(filter)?
            .into_iter()
            .map(|group| DirectoryRow {
                id: Some(group.recipient_id),
                name: group.title,
                number: group.group_id,
                number_type: PHONE_TYPE_CUSTOM,
                label: String::new(),
                kind: RowKind::Normal,
            })
            .collect())
    }

    /// Up to `limit` most recently active conversations.
    pub fn query_recent_conversations(&self, limit: usize) -> Result<Vec<DirectoryRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT r._id,
                    COALESCE(r.system_display_name, r.profile_name, g.title,
                             r.phone, r.email, r.group_id) AS name,
                    COALESCE(r.phone, r.email, r.group_id) AS number
             FROM threads t
             JOIN recipient r ON r._id = t.recipient_id
             LEFT JOIN groups g ON g.recipient_id = r._id
             WHERE t.message_count > 0
             ORDER BY t.date DESC, t._id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(DirectoryRow {
                id: Some(RecipientId(row.get(0)?)),
                name: row.get(1)?,
                number: row.get(2)?,
                number_type: PHONE_TYPE_MOBILE,
                label: String::new(),
                kind: RowKind::Recent,
            })
        })?;

        let mut recents = Vec::new();
        for row in rows {
            recents.push(row?);
        }
        Ok(recents)
    }

    fn query_contact_rows(&self, sql: &str, args: Vec<Value>) -> Result<Vec<DirectoryRow>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(DirectoryRow {
                id: Some(RecipientId(row.get("_id")?)),
                name: row.get("name")?,
                number: row.get("number")?,
                number_type: row.get("system_phone_type")?,
                label: row.get("label")?,
                kind: RowKind::Normal,
            })
        })?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use roster_shared::AddressKind;

    use super::*;
    use crate::patch::RecipientField;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn contact(db: &Database, phone: &str, name: &str, registered: RegisteredState) -> RecipientId {
        let id = db.get_or_insert_recipient(AddressKind::Phone, phone, None).unwrap().id;
        db.update_recipient(
            id,
            &[
                RecipientField::SystemDisplayName(Some(name.to_string())),
                RecipientField::SystemPhoneType(PHONE_TYPE_MOBILE),
                RecipientField::SystemPhoneLabel(Some("Mobile".into())),
                RecipientField::Registered(registered),
            ],
        )
        .unwrap();
        id
    }

    fn names(rows: &[DirectoryRow]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("al"), "%al%");
        assert_eq!(like_pattern("5%_\\"), "%5\\%\\_\\\\%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn service_contacts_are_registered_unblocked_and_sorted() {
        let (_dir, db) = open();
        contact(&db, "5550003", "carol", RegisteredState::Registered);
        contact(&db, "5550001", "Alice", RegisteredState::Registered);
        contact(&db, "5550002", "Bob", RegisteredState::NotRegistered);
        let blocked = contact(&db, "5550004", "Aaron", RegisteredState::Registered);
        db.update_recipient(blocked, &[RecipientField::Blocked(true)]).unwrap();

        let rows = db.query_service_contacts("").unwrap();
        assert_eq!(names(&rows), vec!["Alice", "carol"]);
        assert_eq!(rows[0].number, "5550001");
        assert_eq!(rows[0].label, "Mobile");
        assert_eq!(rows[0].number_type, PHONE_TYPE_MOBILE);
        assert_eq!(rows[0].kind, RowKind::Normal);
    }

    #[test]
    fn service_contacts_include_sharing_profiles() {
        let (_dir, db) = open();
        let id = db
            .get_or_insert_recipient(AddressKind::Phone, "5550010", Some("Zed Profile"))
            .unwrap()
            .id;
        db.update_recipient(
            id,
            &[
                RecipientField::Registered(RegisteredState::Registered),
                RecipientField::ProfileSharing(true),
            ],
        )
        .unwrap();
        let unnamed = db.get_or_insert_recipient(AddressKind::Phone, "5550011", None).unwrap().id;
        db.update_recipient(
            unnamed,
            &[
                RecipientField::Registered(RegisteredState::Registered),
                RecipientField::ProfileSharing(true),
            ],
        )
        .unwrap();

        assert_eq!(names(&db.query_service_contacts("").unwrap()), vec!["Zed Profile"]);
        assert_eq!(names(&db.query_service_contacts("zed").unwrap()), vec!["Zed Profile"]);
        assert_eq!(db.query_service_contacts("5550011").unwrap().len(), 1);
    }

    #[test]
    fn filter_matches_phone_or_name() {
        let (_dir, db) = open();
        contact(&db, "5550001", "Alice", RegisteredState::Registered);
        contact(&db, "5559999", "Walter", RegisteredState::Registered);
        contact(&db, "5550002", "Albert", RegisteredState::Unknown);
        contact(&db, "5550003", "Sal", RegisteredState::NotRegistered);

        assert_eq!(names(&db.query_service_contacts("AL").unwrap()), vec!["Alice", "Walter"]);
        assert_eq!(names(&db.query_service_contacts("9999").unwrap()), vec!["Walter"]);
        assert_eq!(names(&db.query_non_service_contacts("al").unwrap()), vec!["Albert", "Sal"]);
        assert!(db.query_non_service_contacts("%").unwrap().is_empty());
    }

    #[test]
    fn non_service_requires_address_book_name() {
        let (_dir, db) = open();
        db.get_or_insert_recipient(AddressKind::Email, "x@example.org", Some("X"))
            .unwrap();
        let email = db
            .get_or_insert_recipient(AddressKind::Email, "y@example.org", None)
            .unwrap()
            .id;
        db.update_recipient(email, &[RecipientField::SystemDisplayName(Some("Yan".into()))])
            .unwrap();

        let rows = db.query_non_service_contacts("").unwrap();
        assert_eq!(names(&rows), vec!["Yan"]);
        assert_eq!(rows[0].number, "y@example.org");
        assert_eq!(rows[0].number_type, -1);
        assert_eq!(rows[0].label, "");
    }

    #[test]
    fn groups_become_custom_rows() {
        let (_dir, db) = open();
        let group = db.create_group("g1", "Hikers").unwrap();

        let rows = db.query_groups("hik").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, Some(group.recipient_id));
        assert_eq!(rows[0].number, "g1");
        assert_eq!(rows[0].number_type, PHONE_TYPE_CUSTOM);
    }

    #[test]
    fn recents_use_best_available_name() {
        let (_dir, db) = open();
        let named = contact(&db, "5550001", "Alice", RegisteredState::Registered);
        let bare = db.get_or_insert_recipient(AddressKind::Phone, "5550002", None).unwrap().id;
        let group = db.create_group("g1", "Hikers").unwrap().recipient_id;

        let at = |ms| Utc.timestamp_millis_opt(ms).unwrap();
        db.record_conversation(named, at(1_000)).unwrap();
        db.record_conversation(bare, at(3_000)).unwrap();
        db.record_conversation(group, at(2_000)).unwrap();

        let rows = db.query_recent_conversations(25).unwrap();
        assert_eq!(names(&rows), vec!["5550002", "Hikers", "Alice"]);
        assert!(rows.iter().all(|r| r.kind == RowKind::Recent));
        assert!(rows.iter().all(|r| r.number_type == PHONE_TYPE_MOBILE));
        assert_eq!(db.query_recent_conversations(1).unwrap().len(), 1);
    }
}
