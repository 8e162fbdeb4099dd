//! Bulk rewrite of the cached address-book fields.
//!
//! A full address-book re-sync touches hundreds or thousands of recipients.
//! [`SystemContactBatch`] runs the whole re-sync inside one exclusive
//! transaction: it starts by clearing the system-contact columns of every
//! row, accepts per-recipient writes, and on [`finish`] commits and reports
//! each touched id once so the caller can fan out one notification per
//! recipient instead of one per write.
//!
//! Dropping a batch without finishing it rolls everything back, including
//! the initial reset.
//!
//! [`finish`]: SystemContactBatch::finish

use std::collections::BTreeSet;
use std::ops::Deref;

use roster_shared::{AddressKind, RecipientId};

use crate::database::Database;
use crate::error::Result;
use crate::models::SystemContactInfo;

const RESET_SQL: &str = "UPDATE recipient SET
     system_display_name = NULL,
     system_photo_uri = NULL,
     system_phone_label = NULL,
     system_contact_uri = NULL";

/// An open system-contact re-sync.
///
/// Generic over how the database is held so that a caller can keep a lock
/// guard inside the batch for its whole lifetime (`&Database`,
/// `MutexGuard<'_, Database>`, ...).
pub struct SystemContactBatch<D: Deref<Target = Database>> {
    db: D,
    touched: BTreeSet<RecipientId>,
    committed: bool,
}

impl<D: Deref<Target = Database>> SystemContactBatch<D> {
    /// Begin the exclusive transaction and clear every row's system-contact
    /// fields.
    pub fn begin(db: D) -> Result<Self> {
        db.conn().execute_batch("BEGIN IMMEDIATE")?;

        match db.conn().execute(RESET_SQL, []) {
            Ok(rows) => tracing::debug!(rows, "cleared system contact info"),
            Err(e) => {
                if let Err(rollback) = db.conn().execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback after failed reset");
                }
                return Err(e.into());
            }
        }

        Ok(Self {
            db,
            touched: BTreeSet::new(),
            committed: false,
        })
    }

    /// Id for `address`, allocating it inside the open transaction when the
    /// address is new. An allocation is rolled back with the batch.
    pub fn get_or_insert_recipient(&self, kind: AddressKind, address: &str) -> Result<RecipientId> {
        Ok(self.db.get_or_insert_recipient(kind, address, None)?.id)
    }

    /// Write the address-book fields for one recipient.
    pub fn set_system_contact_info(
        &mut self,
        id: RecipientId,
        info: &SystemContactInfo,
    ) -> Result<()> {
        self.db.update_recipient(id, &info.fields())?;
        self.touched.insert(id);
        Ok(())
    }

    /// Number of distinct recipients written so far.
    pub fn touched(&self) -> usize {
        self.touched.len()
    }

    /// Commit the batch and return every distinct recipient it wrote, in id
    /// order. The database holder is released when this returns.
    pub fn finish(mut self) -> Result<Vec<RecipientId>> {
        self.db.conn().execute_batch("COMMIT")?;
        self.committed = true;

        let touched: Vec<RecipientId> = std::mem::take(&mut self.touched).into_iter().collect();
        tracing::info!(recipients = touched.len(), "system contact batch committed");
        Ok(touched)
    }
}

impl<D: Deref<Target = Database>> Drop for SystemContactBatch<D> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        tracing::warn!(
            pending = self.touched.len(),
            "system contact batch dropped without finish, rolling back"
        );
        if let Err(e) = self.db.conn().execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "rollback of system contact batch failed");
        }
    }
}

impl Database {
    /// Start an address-book re-sync on this handle.
    pub fn reset_all_system_contact_info(&self) -> Result<SystemContactBatch<&Database>> {
        SystemContactBatch::begin(self)
    }
}
