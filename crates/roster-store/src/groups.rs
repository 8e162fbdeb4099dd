//! Group records.
//!
//! Every group is also a recipient (addressed by its `group_id` token), so
//! creating a group goes through the allocator first.

use roster_shared::{AddressKind, RecipientId};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::GroupRecord;
use crate::search::like_pattern;

impl Database {
    /// Create the group `group_id`, or retitle it if it already exists.
    pub fn create_group(&self, group_id: &str, title: &str) -> Result<GroupRecord> {
        let group_id = AddressKind::Group.normalize(group_id)?;
        let recipient_id = self
            .get_or_insert_recipient(AddressKind::Group, &group_id, None)?
            .id;

        self.conn().execute(
            "INSERT INTO groups (group_id, recipient_id, title) VALUES (?1, ?2, ?3)
             ON CONFLICT(group_id) DO UPDATE SET title = excluded.title",
            params![group_id, recipient_id.0, title],
        )?;

        tracing::debug!(id = %recipient_id, "group stored");
        Ok(GroupRecord {
            recipient_id,
            group_id,
            title: title.to_string(),
        })
    }

    /// Groups whose title contains `filter` (case-insensitive). An empty
    /// filter returns every group.
    pub fn groups_filtered_by_title(&self, filter: &str) -> Result<Vec<GroupRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT recipient_id, group_id, title FROM groups
             WHERE title LIKE ?1 ESCAPE '\\'
             ORDER BY _id",
        )?;
        let rows = stmt.query_map(params![like_pattern(filter)], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        recipient_id: RecipientId(row.get(0)?),
        group_id: row.get(1)?,
        title: row.get(2)?,
    })
}
