use std::sync::Arc;

use anyhow::Result;
use cdp_adapter::mock::{MockProvider, ScriptedPage};
use channel_session::ChannelError;
use chatrelay_cli::{Relay, RelayConfig};

fn relay(config: &RelayConfig) -> (Relay, Arc<ScriptedPage>) {
    let page = ScriptedPage::new();
    let provider = MockProvider::new(Arc::clone(&page));
    let relay = Relay::with_provider(config, provider).expect("relay");
    (relay, page)
}

#[tokio::test]
async fn builtin_channel_is_registered() -> Result<()> {
    let (relay, _page) = relay(&RelayConfig::default());

    let rows = relay.registry().list();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.as_str(), "doubao");
    assert!(rows[0].enabled);
    Ok(())
}

#[tokio::test]
async fn opening_a_channel_initializes_it() -> Result<()> {
    let (relay, page) = relay(&RelayConfig::default());

    let session = relay.open("doubao").await?;
    assert!(session.get_status().connected);

    // Login state comes from the page: no avatar, not logged in.
    assert!(!session.is_authenticated().await);
    page.set_element(".avatar", "");
    assert!(session.is_authenticated().await);

    relay.shutdown().await;
    assert!(page.is_closed());
    Ok(())
}

#[tokio::test]
async fn unknown_or_invalid_channels_are_rejected() {
    let (relay, _page) = relay(&RelayConfig::default());

    for raw in ["chatgpt", "Not Valid"] {
        let err = relay.open(raw).await.unwrap_err();
        assert!(
            matches!(err, ChannelError::ChannelUnavailable { .. }),
            "{raw}: {err}"
        );
    }
}
