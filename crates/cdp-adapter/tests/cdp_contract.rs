//! Contract tests against a real Chromium binary. Ignored by default because
//! they need Chrome/Chromium on the host machine.

use std::env;
use std::time::Duration;

use cdp_adapter::{CdpConfig, ChromiumHost, KeyInput, PageProvider, WaitUntil};

fn contract_enabled() -> bool {
    env::var("CHATRELAY_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn config() -> (CdpConfig, tempfile::TempDir) {
    let profile = tempfile::tempdir().expect("profile dir");
    let cfg = CdpConfig {
        user_data_dir: profile.path().to_path_buf(),
        headless: true,
        ..CdpConfig::default()
    };
    (cfg, profile)
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set CHATRELAY_CDP_CONTRACT=1"]
async fn contract_navigate_query_and_type() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CHATRELAY_CDP_CONTRACT not enabled)");
        return;
    }

    let (cfg, _profile) = config();
    let host = ChromiumHost::new(cfg);
    let page = host.acquire("contract").await.expect("page");
    page.navigate(
        "data:text/html,<textarea id='box'></textarea><p class='reply'>hello</p>",
        WaitUntil::Load,
        Duration::from_secs(15),
    )
    .await
    .expect("navigate");

    let input = page.query("#box").await.expect("query").expect("textarea");
    page.click(&input).await.expect("focus");
    for ch in "hi".chars() {
        page.press_key(&KeyInput::char(ch)).await.expect("key");
    }

    let reply = page.query(".reply").await.expect("query").expect("reply");
    assert_eq!(page.text_content(&reply).await.expect("text"), "hello");
    assert!(page.is_visible(&reply).await.expect("visibility"));

    host.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set CHATRELAY_CDP_CONTRACT=1"]
async fn contract_navigation_invalidates_handles() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CHATRELAY_CDP_CONTRACT not enabled)");
        return;
    }

    let (cfg, _profile) = config();
    let host = ChromiumHost::new(cfg);
    let page = host.acquire("contract").await.expect("page");
    page.navigate("data:text/html,<p>one</p>", WaitUntil::Load, Duration::from_secs(15))
        .await
        .expect("navigate");
    let para = page.query("p").await.expect("query").expect("paragraph");
    page.navigate("data:text/html,<p>two</p>", WaitUntil::Load, Duration::from_secs(15))
        .await
        .expect("navigate");

    let err = page.text_content(&para).await.unwrap_err();
    assert!(err.is_stale());
    host.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set CHATRELAY_CDP_CONTRACT=1"]
async fn contract_requerying_a_node_reuses_its_handle() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CHATRELAY_CDP_CONTRACT not enabled)");
        return;
    }

    let (cfg, _profile) = config();
    let host = ChromiumHost::new(cfg);
    let page = host.acquire("contract").await.expect("page");
    page.navigate(
        "data:text/html,<p class='loading'>...</p><p class='reply'>a</p>",
        WaitUntil::DocumentComplete,
        Duration::from_secs(15),
    )
    .await
    .expect("navigate");

    let first = page.query(".loading").await.expect("query").expect("indicator");
    for _ in 0..20 {
        let again = page.query(".loading").await.expect("query").expect("indicator");
        assert_eq!(again.id, first.id);
    }
    let all = page.query_all("p").await.expect("query all");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, first.id);
    assert!(page.is_visible(&first).await.expect("visibility"));

    host.shutdown().await;
}
