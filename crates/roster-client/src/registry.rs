//! The recipient registry.
//!
//! [`Registry`] owns the database handle, the live cache and the host
//! collaborators. Every mutation follows the same path: write through the
//! store, reload the row into the cache while still holding the database
//! lock, then release the lock and publish the id on the invalidation bus.
//!
//! Directory source queries run on a second, read-only connection when the
//! database lives in a file, so a long search does not hold up writers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use roster_shared::{
    Address, AddressKind, MaterialColor, RecipientId, RegisteredState, UnidentifiedAccessMode,
    VibrateState,
};
use roster_store::{
    Database, GroupRecord, RecipientField, RecipientSettings, SystemContactBatch,
    SystemContactInfo,
};
use tokio::sync::broadcast;

use crate::cache::LiveCache;
use crate::collaborators::{
    AlwaysGranted, DefaultLabels, DirectoryLabels, NameResolver, PermissionGate,
};
use crate::config::RosterConfig;
use crate::error::Result;

struct Inner {
    db: Mutex<Database>,
    /// Connection for directory queries; `None` means they share `db`.
    reader: Option<Mutex<Database>>,
    cache: LiveCache,
    config: RosterConfig,
    resolver: Option<Arc<dyn NameResolver>>,
    permissions: Arc<dyn PermissionGate>,
    labels: Arc<dyn DirectoryLabels>,
}

/// Shared handle to the registry. Cloning is cheap.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub struct RegistryBuilder {
    db: Database,
    config: RosterConfig,
    resolver: Option<Arc<dyn NameResolver>>,
    permissions: Arc<dyn PermissionGate>,
    labels: Arc<dyn DirectoryLabels>,
}

impl RegistryBuilder {
    pub fn config(mut self, config: RosterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn permission_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.permissions = gate;
        self
    }

    pub fn labels(mut self, labels: Arc<dyn DirectoryLabels>) -> Self {
        self.labels = labels;
        self
    }

    pub fn build(self) -> Registry {
        let reader = open_reader(&self.db);
        Registry {
            inner: Arc::new(Inner {
                db: Mutex::new(self.db),
                reader,
                cache: LiveCache::new(self.config.event_capacity.max(1)),
                config: self.config,
                resolver: self.resolver,
                permissions: self.permissions,
                labels: self.labels,
            }),
        }
    }
}

/// Open a second connection on the same file for directory reads.
fn open_reader(db: &Database) -> Option<Mutex<Database>> {
    let path = db.path().filter(|p| !p.as_os_str().is_empty())?;
    match Database::open_readonly_at(&path) {
        Ok(reader) => Some(Mutex::new(reader)),
        Err(e) => {
            tracing::warn!(error = %e, "no read connection, directory queries share the writer");
            None
        }
    }
}

impl Registry {
    pub fn builder(db: Database) -> RegistryBuilder {
        RegistryBuilder {
            db,
            config: RosterConfig::default(),
            resolver: None,
            permissions: Arc::new(AlwaysGranted),
            labels: Arc::new(DefaultLabels),
        }
    }

    /// Open the database named by `config` (or the platform default) with
    /// default collaborators.
    pub fn open(config: RosterConfig) -> Result<Self> {
        let db = match &config.database_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        Ok(Self::builder(db).config(config).build())
    }

    pub fn config(&self) -> &RosterConfig {
        &self.inner.config
    }

    pub(crate) fn db(&self) -> MutexGuard<'_, Database> {
        self.inner.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connection for directory source queries. Sees committed data only.
    pub(crate) fn reader(&self) -> MutexGuard<'_, Database> {
        self.inner
            .reader
            .as_ref()
            .unwrap_or(&self.inner.db)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn cache(&self) -> &LiveCache {
        &self.inner.cache
    }

    pub(crate) fn permissions(&self) -> &dyn PermissionGate {
        self.inner.permissions.as_ref()
    }

    pub(crate) fn labels(&self) -> &dyn DirectoryLabels {
        self.inner.labels.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl Registry {
    /// Return the stable id for an address, creating the recipient on first
    /// use. New phone recipients get a best-effort name from the configured
    /// resolver; a slow or failing resolver never fails the call.
    pub async fn resolve(&self, kind: AddressKind, address: &str) -> Result<RecipientId> {
        let address = kind.normalize(address)?;

        let existing = self.db().find_recipient(kind, &address)?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let name = match (&self.inner.resolver, kind) {
            (Some(resolver), AddressKind::Phone) => self.lookup_name(resolver, &address).await,
            _ => None,
        };

        let allocation = self
            .db()
            .get_or_insert_recipient(kind, &address, name.as_deref())?;

        if !allocation.created && allocation.named {
            self.refresh(allocation.id)?;
        }
        Ok(allocation.id)
    }

    pub async fn resolve_phone(&self, phone: &str) -> Result<RecipientId> {
        self.resolve(AddressKind::Phone, phone).await
    }

    pub async fn resolve_email(&self, email: &str) -> Result<RecipientId> {
        self.resolve(AddressKind::Email, email).await
    }

    pub async fn resolve_group(&self, group_id: &str) -> Result<RecipientId> {
        self.resolve(AddressKind::Group, group_id).await
    }

    async fn lookup_name(&self, resolver: &Arc<dyn NameResolver>, phone: &str) -> Option<String> {
        let timeout = self.inner.config.enrichment_timeout;
        match tokio::time::timeout(timeout, resolver.lookup_name(phone)).await {
            Ok(Some(name)) if !name.trim().is_empty() => Some(name.trim().to_string()),
            Ok(_) => {
                tracing::debug!("no name found for new recipient");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "name lookup timed out");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reads and the live cache
// ---------------------------------------------------------------------------

impl Registry {
    /// Current snapshot for `id`, loaded on first use.
    pub fn settings(&self, id: RecipientId) -> Result<Arc<RecipientSettings>> {
        if let Some(hit) = self.inner.cache.get(id) {
            return Ok(hit);
        }
        // Load and insert under the database lock so the entry cannot be
        // older than a refresh or re-sync that already finished.
        let db = self.db();
        self.inner
            .cache
            .get_or_load(id, || Ok(db.get_recipient_settings(id)?))
    }

    pub fn live(&self, id: RecipientId) -> LiveRecipient {
        LiveRecipient {
            id,
            registry: self.clone(),
        }
    }

    /// Receive the id of every recipient whose settings change.
    pub fn subscribe(&self) -> broadcast::Receiver<RecipientId> {
        self.inner.cache.subscribe()
    }

    /// Reload `id` from the store, replace its snapshot and announce it.
    pub fn refresh(&self, id: RecipientId) -> Result<Arc<RecipientSettings>> {
        let settings = {
            let db = self.db();
            self.inner.cache.put(db.get_recipient_settings(id)?)
        };
        self.inner.cache.publish(id);
        tracing::debug!(id = %id, "recipient refreshed");
        Ok(settings)
    }
}

/// A recipient handle that always reads the latest snapshot.
#[derive(Clone)]
pub struct LiveRecipient {
    id: RecipientId,
    registry: Registry,
}

impl LiveRecipient {
    pub fn id(&self) -> RecipientId {
        self.id
    }

    pub fn get(&self) -> Result<Arc<RecipientSettings>> {
        self.registry.settings(self.id)
    }
}

// ---------------------------------------------------------------------------
// Mutators
// ---------------------------------------------------------------------------

impl Registry {
    /// Write the given fields, then refresh and announce `id`.
    pub fn update(&self, id: RecipientId, fields: &[RecipientField]) -> Result<()> {
        self.db().update_recipient(id, fields)?;
        self.refresh(id)?;
        Ok(())
    }

    fn set(&self, id: RecipientId, field: RecipientField) -> Result<()> {
        self.update(id, &[field])
    }

    pub fn set_blocked(&self, id: RecipientId, blocked: bool) -> Result<()> {
        self.set(id, RecipientField::Blocked(blocked))
    }

    pub fn set_color(&self, id: RecipientId, color: MaterialColor) -> Result<()> {
        self.set(id, RecipientField::Color(Some(color)))
    }

    pub fn set_default_subscription_id(&self, id: RecipientId, sub: Option<i32>) -> Result<()> {
        self.set(id, RecipientField::DefaultSubscriptionId(sub))
    }

    pub fn set_force_sms_selection(&self, id: RecipientId, force: bool) -> Result<()> {
        self.set(id, RecipientField::ForceSmsSelection(force))
    }

    pub fn set_message_ringtone(&self, id: RecipientId, uri: Option<String>) -> Result<()> {
        self.set(id, RecipientField::MessageRingtone(uri))
    }

    pub fn set_call_ringtone(&self, id: RecipientId, uri: Option<String>) -> Result<()> {
        self.set(id, RecipientField::CallRingtone(uri))
    }

    pub fn set_message_vibrate(&self, id: RecipientId, state: VibrateState) -> Result<()> {
        self.set(id, RecipientField::MessageVibrate(state))
    }

    pub fn set_call_vibrate(&self, id: RecipientId, state: VibrateState) -> Result<()> {
        self.set(id, RecipientField::CallVibrate(state))
    }

    /// Mute notifications until `until_millis` (epoch millis); 0 unmutes.
    pub fn set_muted(&self, id: RecipientId, until_millis: i64) -> Result<()> {
        self.set(id, RecipientField::MuteUntil(until_millis))
    }

    pub fn set_seen_invite_reminder(&self, id: RecipientId, seen: bool) -> Result<()> {
        self.set(id, RecipientField::SeenInviteReminder(seen))
    }

    pub fn set_expire_messages(&self, id: RecipientId, seconds: i32) -> Result<()> {
        self.set(id, RecipientField::ExpireMessages(seconds))
    }

    pub fn set_unidentified_access_mode(
        &self,
        id: RecipientId,
        mode: UnidentifiedAccessMode,
    ) -> Result<()> {
        self.set(id, RecipientField::UnidentifiedAccessMode(mode))
    }

    pub fn set_profile_key(&self, id: RecipientId, key: Option<Vec<u8>>) -> Result<()> {
        self.set(id, RecipientField::ProfileKey(key))
    }

    pub fn set_profile_name(&self, id: RecipientId, name: Option<String>) -> Result<()> {
        self.set(id, RecipientField::ProfileName(name))
    }

    pub fn set_profile_avatar(&self, id: RecipientId, avatar: Option<String>) -> Result<()> {
        self.set(id, RecipientField::ProfileAvatar(avatar))
    }

    pub fn set_profile_sharing(&self, id: RecipientId, enabled: bool) -> Result<()> {
        self.set(id, RecipientField::ProfileSharing(enabled))
    }

    pub fn set_notification_channel(&self, id: RecipientId, channel: Option<String>) -> Result<()> {
        self.set(id, RecipientField::NotificationChannel(channel))
    }

    pub fn set_registered(&self, id: RecipientId, state: RegisteredState) -> Result<()> {
        self.set(id, RecipientField::Registered(state))
    }

    /// Record service registration results: `active` become registered,
    /// `inactive` become not registered. Ids are applied independently;
    /// unknown ids are skipped. Each id written is announced once and
    /// returned.
    pub fn set_registered_bulk(
        &self,
        active: &[RecipientId],
        inactive: &[RecipientId],
    ) -> Result<Vec<RecipientId>> {
        let written = self.db().set_registered_bulk(active, inactive)?;

        for id in &written {
            if let Err(e) = self.refresh(*id) {
                tracing::warn!(id = %id, error = %e, "refresh after registration update failed");
            }
        }
        Ok(written)
    }

    /// Recompute the colour of every address-book contact.
    pub fn update_system_contact_colors<F>(&self, updater: F) -> Result<Vec<RecipientId>>
    where
        F: FnMut(&str, Option<&str>) -> MaterialColor,
    {
        let touched = self.db().update_system_contact_colors(updater)?;
        for id in &touched {
            self.refresh(*id)?;
        }
        Ok(touched)
    }

    /// Start an address-book re-sync. The returned handle holds the
    /// database lock until it is finished or dropped; ids for contacts
    /// without a recipient yet come from [`BulkOperationsHandle::resolve`].
    pub fn reset_all_system_contact_info(&self) -> Result<BulkOperationsHandle<'_>> {
        let batch = SystemContactBatch::begin(self.db())?;
        Ok(BulkOperationsHandle {
            batch,
            registry: self,
        })
    }
}

/// Open address-book re-sync; see [`Registry::reset_all_system_contact_info`].
pub struct BulkOperationsHandle<'a> {
    batch: SystemContactBatch<MutexGuard<'a, Database>>,
    registry: &'a Registry,
}

impl BulkOperationsHandle<'_> {
    /// Id for `address`, allocated inside the re-sync when it is new.
    pub fn resolve(&self, kind: AddressKind, address: &str) -> Result<RecipientId> {
        Ok(self.batch.get_or_insert_recipient(kind, address)?)
    }

    pub fn set_system_contact_info(
        &mut self,
        id: RecipientId,
        info: &SystemContactInfo,
    ) -> Result<()> {
        self.batch.set_system_contact_info(id, info)?;
        Ok(())
    }

    /// Commit, then refresh and announce every recipient written in the
    /// batch exactly once. Returns those ids.
    pub fn finish(self) -> Result<Vec<RecipientId>> {
        let registry = self.registry;

        // The reset cleared every row, not only the touched ones. Clearing
        // while the batch still holds the database lock keeps concurrent
        // loads from caching a pre-reset row after the commit.
        registry.cache().clear();
        let touched = self.batch.finish()?;

        for id in &touched {
            if let Err(e) = registry.refresh(*id) {
                tracing::warn!(id = %id, error = %e, "refresh after system contact batch failed");
            }
        }
        Ok(touched)
    }
}

// ---------------------------------------------------------------------------
// Listings, groups and conversations
// ---------------------------------------------------------------------------

impl Registry {
    pub fn blocked(&self) -> Result<Vec<RecipientId>> {
        Ok(self.db().blocked_recipients()?)
    }

    pub fn with_notification_channels(&self) -> Result<Vec<RecipientId>> {
        Ok(self.db().recipients_with_notification_channels()?)
    }

    pub fn registered(&self) -> Result<Vec<RecipientId>> {
        Ok(self.db().registered_recipients()?)
    }

    pub fn system_contacts(&self) -> Result<Vec<RecipientId>> {
        Ok(self.db().system_contacts()?)
    }

    pub fn all_addresses(&self) -> Result<HashSet<Address>> {
        Ok(self.db().all_addresses()?)
    }

    pub fn create_group(&self, group_id: &str, title: &str) -> Result<GroupRecord> {
        Ok(self.db().create_group(group_id, title)?)
    }

    pub fn record_conversation(&self, id: RecipientId, at: DateTime<Utc>) -> Result<()> {
        Ok(self.db().record_conversation(id, at)?)
    }
}
