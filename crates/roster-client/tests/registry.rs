use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use roster_client::{NameResolver, Registry, RosterConfig};
use roster_shared::{
    AddressKind, MaterialColor, RecipientId, RegisteredState, UnidentifiedAccessMode, VibrateState,
};
use roster_store::{Database, RecipientField, SystemContactInfo};
use tokio::sync::broadcast;

fn open(dir: &tempfile::TempDir) -> Database {
    Database::open_at(&dir.path().join("roster.db")).unwrap()
}

fn registry(dir: &tempfile::TempDir) -> Registry {
    Registry::builder(open(dir)).build()
}

fn drain(events: &mut broadcast::Receiver<RecipientId>) -> Vec<RecipientId> {
    let mut ids = Vec::new();
    while let Ok(id) = events.try_recv() {
        ids.push(id);
    }
    ids
}

struct FixedNames(HashMap<String, String>);

impl NameResolver for FixedNames {
    fn lookup_name(&self, phone: &str) -> BoxFuture<'static, Option<String>> {
        let name = self.0.get(phone).cloned();
        Box::pin(async move { name })
    }
}

struct SlowResolver;

impl NameResolver for SlowResolver {
    fn lookup_name(&self, _phone: &str) -> BoxFuture<'static, Option<String>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Some("Too Late".to_string())
        })
    }
}

#[tokio::test]
async fn resolve_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);

    let first = registry.resolve_phone("+1 (555) 123-4567").await.unwrap();
    let second = registry.resolve_phone("+15551234567").await.unwrap();
    let email = registry.resolve_email("bob@example.org").await.unwrap();
    let group = registry.resolve_group("__group__1").await.unwrap();

    assert_eq!(first, second);
    assert_ne!(first, email);
    assert_ne!(email, group);
    assert_eq!(registry.all_addresses().unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolves_share_one_id() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.resolve_email("race@example.org").await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn every_mutator_is_visible_on_next_read() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let id = registry.resolve_phone("5550100").await.unwrap();

    // Prime the cache so each read below has to see a refreshed snapshot.
    registry.settings(id).unwrap();

    registry.set_blocked(id, true).unwrap();
    registry.set_color(id, MaterialColor::Indigo).unwrap();
    registry.set_default_subscription_id(id, Some(3)).unwrap();
    registry.set_force_sms_selection(id, true).unwrap();
    registry
        .set_message_ringtone(id, Some("content://tone/1".into()))
        .unwrap();
    registry.set_call_ringtone(id, Some("content://tone/2".into())).unwrap();
    registry.set_message_vibrate(id, VibrateState::Enabled).unwrap();
    registry.set_call_vibrate(id, VibrateState::Disabled).unwrap();
    registry.set_muted(id, 4_102_444_800_000).unwrap();
    registry.set_seen_invite_reminder(id, true).unwrap();
    registry.set_expire_messages(id, 3_600).unwrap();
    registry
        .set_unidentified_access_mode(id, UnidentifiedAccessMode::Unrestricted)
        .unwrap();
    registry.set_profile_key(id, Some(vec![9u8; 32])).unwrap();
    registry.set_profile_name(id, Some("Dana".into())).unwrap();
    registry.set_profile_avatar(id, Some("avatar-1".into())).unwrap();
    registry.set_profile_sharing(id, true).unwrap();
    registry.set_notification_channel(id, Some("chan-1".into())).unwrap();
    registry.set_registered(id, RegisteredState::Registered).unwrap();

    let s = registry.settings(id).unwrap();
    assert!(s.blocked);
    assert_eq!(s.color, Some(MaterialColor::Indigo));
    assert_eq!(s.default_subscription_id, Some(3));
    assert!(s.force_sms_selection);
    assert_eq!(s.message_ringtone.as_deref(), Some("content://tone/1"));
    assert_eq!(s.call_ringtone.as_deref(), Some("content://tone/2"));
    assert_eq!(s.message_vibrate, VibrateState::Enabled);
    assert_eq!(s.call_vibrate, VibrateState::Disabled);
    assert!(s.is_muted_at(0));
    assert!(s.seen_invite_reminder);
    assert_eq!(s.expire_messages, 3_600);
    assert_eq!(s.unidentified_access_mode, UnidentifiedAccessMode::Unrestricted);
    assert_eq!(s.profile_key, Some(vec![9u8; 32]));
    assert_eq!(s.display_name(), Some("Dana"));
    assert_eq!(s.profile_avatar.as_deref(), Some("avatar-1"));
    assert!(s.profile_sharing);
    assert_eq!(s.notification_channel.as_deref(), Some("chan-1"));
    assert!(s.is_registered());

    registry.set_default_subscription_id(id, None).unwrap();
    registry.set_muted(id, 0).unwrap();
    let s = registry.settings(id).unwrap();
    assert_eq!(s.default_subscription_id, None);
    assert!(!s.is_muted_at(0));

    assert_eq!(registry.blocked().unwrap(), vec![id]);
    assert_eq!(registry.registered().unwrap(), vec![id]);
    assert_eq!(registry.with_notification_channels().unwrap(), vec![id]);
}

#[tokio::test]
async fn each_mutation_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let id = registry.resolve_phone("5550101").await.unwrap();
    let mut events = registry.subscribe();

    registry
        .update(
            id,
            &[
                RecipientField::Blocked(true),
                RecipientField::MuteUntil(10),
                RecipientField::Blocked(false),
            ],
        )
        .unwrap();

    assert_eq!(drain(&mut events), vec![id]);
    assert!(!registry.settings(id).unwrap().blocked);
    assert_eq!(registry.settings(id).unwrap().mute_until, 10);
}

#[tokio::test]
async fn live_recipient_follows_changes() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let id = registry.resolve_email("carol@example.org").await.unwrap();

    let live = registry.live(id);
    assert_eq!(live.id(), id);
    assert_eq!(live.get().unwrap().expire_messages, 0);

    registry.set_expire_messages(id, 60).unwrap();
    assert_eq!(live.get().unwrap().expire_messages, 60);
}

#[tokio::test]
async fn bulk_registration_notifies_each_id() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let a = registry.resolve_phone("5550201").await.unwrap();
    let b = registry.resolve_phone("5550202").await.unwrap();
    let c = registry.resolve_phone("5550203").await.unwrap();
    let mut events = registry.subscribe();

    let unknown = RecipientId(9_999);
    let written = registry.set_registered_bulk(&[a, unknown, b], &[c]).unwrap();

    assert_eq!(written, vec![a, b, c]);
    assert_eq!(drain(&mut events), vec![a, b, c]);
    assert!(registry.settings(a).unwrap().is_registered());
    assert!(registry.settings(b).unwrap().is_registered());
    assert_eq!(
        registry.settings(c).unwrap().registered,
        RegisteredState::NotRegistered
    );
    assert!(registry.settings(unknown).unwrap_err().is_not_found());
}

#[tokio::test]
async fn concurrent_writers_leave_the_stored_value_cached() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let id = registry.resolve_phone("5550250").await.unwrap();
    let store = open(&dir);

    for round in 0..25i64 {
        std::thread::scope(|s| {
            for writer in 0..8i64 {
                let registry = &registry;
                s.spawn(move || {
                    for n in 0..20i64 {
                        let until = round * 1_000 + writer * 20 + n + 1;
                        registry.set_muted(id, until).unwrap();
                    }
                });
            }
        });

        let cached = registry.settings(id).unwrap().mute_until;
        let stored = store.get_recipient_settings(id).unwrap().mute_until;
        assert_eq!(cached, stored, "round {round}");
    }
}

#[tokio::test]
async fn system_contact_resync() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let a = registry.resolve_phone("5550301").await.unwrap();
    let b = registry.resolve_phone("5550302").await.unwrap();
    let c = registry.resolve_phone("5550303").await.unwrap();

    let info = |name: &str| SystemContactInfo {
        display_name: Some(name.to_string()),
        photo_uri: Some(format!("content://photo/{name}")),
        phone_label: Some("Work".into()),
        phone_type: 3,
        contact_uri: Some(format!("content://contact/{name}")),
    };

    let mut handle = registry.reset_all_system_contact_info().unwrap();
    for (id, name) in [(a, "Ann"), (b, "Ben"), (c, "Cy")] {
        handle.set_system_contact_info(id, &info(name)).unwrap();
    }
    handle.finish().unwrap();

    // Cache a stale view of `c` before the next re-sync drops it.
    assert_eq!(
        registry.settings(c).unwrap().system_display_name.as_deref(),
        Some("Cy")
    );

    let mut events = registry.subscribe();
    let mut handle = registry.reset_all_system_contact_info().unwrap();
    handle.set_system_contact_info(a, &info("Anna")).unwrap();
    handle.set_system_contact_info(b, &info("Benji")).unwrap();
    handle.set_system_contact_info(a, &info("Annie")).unwrap();
    let touched = handle.finish().unwrap();

    assert_eq!(touched, vec![a, b]);
    assert_eq!(drain(&mut events), vec![a, b]);

    let sa = registry.settings(a).unwrap();
    assert_eq!(sa.system_display_name.as_deref(), Some("Annie"));
    assert_eq!(sa.system_phone_type, Some(3));

    let sc = registry.settings(c).unwrap();
    assert_eq!(sc.system_display_name, None);
    assert_eq!(sc.system_photo_uri, None);
    assert_eq!(sc.system_phone_label, None);
    assert_eq!(sc.system_contact_uri, None);

    assert_eq!(registry.system_contacts().unwrap(), vec![a, b]);
}

#[tokio::test]
async fn resync_allocates_contacts_without_a_row() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let known = registry.resolve_phone("5550310").await.unwrap();
    let mut events = registry.subscribe();

    let mut handle = registry.reset_all_system_contact_info().unwrap();
    let fresh = handle.resolve(AddressKind::Phone, "+1 555 0311").unwrap();
    assert_ne!(fresh, known);
    assert_eq!(handle.resolve(AddressKind::Phone, "555-0310").unwrap(), known);
    handle
        .set_system_contact_info(
            fresh,
            &SystemContactInfo {
                display_name: Some("Noor".into()),
                phone_type: 2,
                ..Default::default()
            },
        )
        .unwrap();
    let touched = handle.finish().unwrap();

    assert_eq!(touched, vec![fresh]);
    assert_eq!(drain(&mut events), vec![fresh]);
    assert_eq!(registry.resolve_phone("+15550311").await.unwrap(), fresh);
    assert_eq!(
        registry.settings(fresh).unwrap().system_display_name.as_deref(),
        Some("Noor")
    );
}

#[tokio::test]
async fn recolouring_refreshes_touched_contacts() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&dir);
    let named = registry.resolve_phone("5550401").await.unwrap();
    let unnamed = registry.resolve_phone("5550402").await.unwrap();
    registry
        .update(named, &[RecipientField::SystemDisplayName(Some("Zoe".into()))])
        .unwrap();

    let mut events = registry.subscribe();
    let touched = registry
        .update_system_contact_colors(|name, _| MaterialColor::for_name(name))
        .unwrap();

    assert_eq!(touched, vec![named]);
    assert_eq!(drain(&mut events), vec![named]);
    assert_eq!(
        registry.settings(named).unwrap().color,
        Some(MaterialColor::for_name("Zoe"))
    );
    assert_eq!(registry.settings(unnamed).unwrap().color, None);
}

#[tokio::test]
async fn new_phone_recipient_is_named_by_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = FixedNames(HashMap::from([(
        "+15550500".to_string(),
        "Erin".to_string(),
    )]));
    let registry = Registry::builder(open(&dir))
        .name_resolver(Arc::new(resolver))
        .build();

    let named = registry.resolve_phone("+1 555 0500").await.unwrap();
    let unknown = registry.resolve_phone("+15550501").await.unwrap();
    let email = registry.resolve_email("erin@example.org").await.unwrap();

    assert_eq!(registry.settings(named).unwrap().profile_name.as_deref(), Some("Erin"));
    assert_eq!(registry.settings(unknown).unwrap().profile_name, None);
    assert_eq!(registry.settings(email).unwrap().profile_name, None);
}

#[tokio::test]
async fn enrichment_timeout_still_allocates() {
    let dir = tempfile::tempdir().unwrap();
    let config = RosterConfig {
        enrichment_timeout: Duration::from_millis(50),
        ..RosterConfig::default()
    };
    let registry = Registry::builder(open(&dir))
        .config(config)
        .name_resolver(Arc::new(SlowResolver))
        .build();

    let id = registry.resolve(AddressKind::Phone, "5550600").await.unwrap();

    let settings = registry.settings(id).unwrap();
    assert_eq!(settings.profile_name, None);
    assert_eq!(
        registry.resolve_phone("555-0600").await.unwrap(),
        id,
        "second resolve must hit the existing row"
    );
}
