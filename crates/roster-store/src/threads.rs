//! Conversation activity, one thread per recipient.
//!
//! Only what the recents list needs is tracked here: when the conversation
//! was last active and how many messages it holds.

use chrono::{DateTime, Utc};
use roster_shared::RecipientId;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Count one message in the conversation with `recipient_id`, created on
    /// first use. The thread date never moves backwards.
    pub fn record_conversation(&self, recipient_id: RecipientId, at: DateTime<Utc>) -> Result<()> {
        if !self.recipient_exists(recipient_id)? {
            return Err(StoreError::RecipientNotFound(recipient_id));
        }

        self.conn().execute(
            "INSERT INTO threads (recipient_id, date, message_count) VALUES (?1, ?2, 1)
             ON CONFLICT(recipient_id) DO UPDATE SET
                 date = MAX(date, excluded.date),
                 message_count = message_count + 1",
            params![recipient_id.0, at.timestamp_millis()],
        )?;

        tracing::trace!(id = %recipient_id, "conversation activity recorded");
        Ok(())
    }
}
