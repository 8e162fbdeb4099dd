//! Live cache of recipient snapshots and the invalidation bus.
//!
//! The cache maps a recipient id to the last snapshot read from the store.
//! Snapshots are immutable and shared as `Arc`s; a refresh swaps in a new
//! `Arc` and announces the id on a broadcast channel so observers can
//! re-read.
//!
//! The cache does no locking of the store itself. Callers insert only while
//! holding the lock that serialises writes to the store, so an entry can
//! never be older than a write that has already returned.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use roster_shared::RecipientId;
use roster_store::RecipientSettings;
use tokio::sync::broadcast;

use crate::error::Result;

pub struct LiveCache {
    entries: RwLock<HashMap<RecipientId, Arc<RecipientSettings>>>,
    events: broadcast::Sender<RecipientId>,
}

impl LiveCache {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn get(&self, id: RecipientId) -> Option<Arc<RecipientSettings>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Return the cached snapshot, loading it on a miss. No cache lock is
    /// held while `load` runs; a failed load caches nothing.
    pub fn get_or_load<F>(&self, id: RecipientId, load: F) -> Result<Arc<RecipientSettings>>
    where
        F: FnOnce() -> Result<RecipientSettings>,
    {
        if let Some(hit) = self.get(id) {
            return Ok(hit);
        }
        Ok(self.put(load()?))
    }

    /// Replace the snapshot for its id.
    pub fn put(&self, settings: RecipientSettings) -> Arc<RecipientSettings> {
        let settings = Arc::new(settings);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(settings.id, settings.clone());
        settings
    }

    pub fn invalidate(&self, id: RecipientId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Drop every entry; later reads reload from the store.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Announce that `id` changed. Having no subscribers is fine.
    pub fn publish(&self, id: RecipientId) {
        match self.events.send(id) {
            Ok(receivers) => tracing::trace!(id = %id, receivers, "change published"),
            Err(_) => tracing::trace!(id = %id, "change published with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecipientId> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use roster_shared::{Address, RegisteredState, UnidentifiedAccessMode, VibrateState};

    use super::*;
    use crate::error::ClientError;

    fn snapshot(id: i64, blocked: bool) -> RecipientSettings {
        RecipientSettings {
            id: RecipientId(id),
            address: Address::Phone(format!("555{id:04}")),
            blocked,
            mute_until: 0,
            message_vibrate: VibrateState::Default,
            call_vibrate: VibrateState::Default,
            message_ringtone: None,
            call_ringtone: None,
            color: None,
            seen_invite_reminder: false,
            default_subscription_id: None,
            expire_messages: 0,
            registered: RegisteredState::Unknown,
            profile_key: None,
            system_display_name: None,
            system_photo_uri: None,
            system_phone_label: None,
            system_phone_type: None,
            system_contact_uri: None,
            profile_name: None,
            profile_avatar: None,
            profile_sharing: false,
            notification_channel: None,
            unidentified_access_mode: UnidentifiedAccessMode::Unknown,
            force_sms_selection: false,
        }
    }

    #[test]
    fn loads_once_then_hits() {
        let cache = LiveCache::new(8);
        let mut calls = 0;

        let first = cache
            .get_or_load(RecipientId(1), || {
                calls += 1;
                Ok(snapshot(1, false))
            })
            .unwrap();
        let second = cache
            .get_or_load(RecipientId(1), || {
                calls += 1;
                Ok(snapshot(1, true))
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_load_caches_nothing() {
        let cache = LiveCache::new(8);

        let err = cache
            .get_or_load(RecipientId(1), || Err(ClientError::InvalidInput("gone".into())))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn put_replaces_whole_snapshot() {
        let cache = LiveCache::new(8);
        let old = cache.put(snapshot(1, false));
        let new = cache.put(snapshot(1, true));

        assert!(!old.blocked);
        assert!(new.blocked);
        assert!(cache.get(RecipientId(1)).unwrap().blocked);

        cache.invalidate(RecipientId(1));
        assert!(cache.get(RecipientId(1)).is_none());
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let cache = LiveCache::new(8);
        cache.publish(RecipientId(9));

        let mut a = cache.subscribe();
        let mut b = cache.subscribe();
        cache.publish(RecipientId(1));

        assert_eq!(a.recv().await.unwrap(), RecipientId(1));
        assert_eq!(b.recv().await.unwrap(), RecipientId(1));
    }
}
