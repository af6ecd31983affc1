mod support;

use channel_session::{ChannelError, ChannelRegistry, ChannelSession};
use chatrelay_core_types::ChannelId;
use chatrelay_event_bus::NotificationHub;
use support::{profile, settings, FakeAuth, Harness};

fn registry_with_two_channels() -> (ChannelRegistry, Harness) {
    let h = Harness::new(FakeAuth::logged_in());
    let mut disabled = profile("spare");
    disabled.enabled = false;
    let spare = ChannelSession::new(
        disabled,
        h.provider.clone(),
        FakeAuth::logged_in(),
        NotificationHub::new(8),
        settings(),
    )
    .unwrap();

    let registry = ChannelRegistry::new();
    assert!(registry.register(h.session.clone()).is_none());
    assert!(registry.register(spare).is_none());
    (registry, h)
}

#[tokio::test]
async fn switching_checks_the_target() {
    let (registry, _h) = registry_with_two_channels();
    let test = ChannelId::from_static("test");
    let spare = ChannelId::from_static("spare");

    assert!(registry.initialize_all().await.is_empty());
    assert!(registry.switch_channel(Some(&spare), &test).await.unwrap());

    let err = registry.switch_channel(Some(&test), &spare).await.unwrap_err();
    assert!(matches!(err, ChannelError::ChannelUnavailable { .. }));
    assert!(err.to_string().contains("disabled"));

    let unknown = ChannelId::from_static("missing");
    assert!(registry.switch_channel(None, &unknown).await.is_err());
}

#[tokio::test]
async fn listing_reflects_flags_and_status() {
    let (registry, h) = registry_with_two_channels();
    let spare = ChannelId::from_static("spare");

    assert!(!registry.is_available(&spare));
    assert!(registry.set_enabled(&spare, true));
    assert!(registry.is_available(&spare));
    assert!(!registry.set_enabled(&ChannelId::from_static("missing"), true));

    h.session.initialize().await.unwrap();
    let rows = registry.list();
    let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(ids, vec!["spare", "test"]);
    assert!(rows[1].status.connected);
    assert!(!rows[0].status.connected);

    registry.destroy_all().await;
    assert!(registry
        .get(&ChannelId::from_static("test"))
        .map(|session| !session.get_status().connected)
        .unwrap_or(false));
}
