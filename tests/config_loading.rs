use std::fs;

use anyhow::Result;
use chatrelay_cli::cli::runtime::{default_config_path, load_config_from};
use tempfile::TempDir;

#[tokio::test]
async fn missing_file_falls_back_to_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("absent.yaml");

    let loaded = load_config_from(path.clone()).await?;

    assert_eq!(loaded.path, path);
    assert_eq!(loaded.config.capture.discovery_timeout_ms, 30_000);
    assert_eq!(loaded.config.profiles()[0].id.as_str(), "doubao");
    Ok(())
}

#[tokio::test]
async fn partial_file_overrides_only_named_keys() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "capture:\n  stable_ticks: 3\n  max_generation_ms: 60000\ntyping:\n  seed: 42\n",
    )?;

    let config = load_config_from(path).await?.config;

    assert_eq!(config.capture.stable_ticks, 3);
    assert_eq!(config.capture.max_generation_ms, Some(60_000));
    assert_eq!(config.capture.streaming.poll_interval_ms, 200);
    assert_eq!(config.typing.seed, Some(42));
    assert_eq!(config.typing.max_delay_ms, 150);
    assert_eq!(config.resolver.input_budget_ms, 5_000);
    Ok(())
}

#[tokio::test]
async fn custom_channels_replace_the_builtin_profile() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        r##"
channels:
  - id: local
    name: Local
    chat_url: http://127.0.0.1:3000/chat
    home_url: http://127.0.0.1:3000
    login_url: http://127.0.0.1:3000/login
    submit_with_enter: false
    locators:
      input_box:
        - selector: "#prompt"
      response_container:
        - selector: ".bubble"
          wait_time_ms: 250
"##,
    )?;

    let profiles = load_config_from(path).await?.config.profiles();

    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].id.as_str(), "local");
    assert!(!profiles[0].submit_with_enter);
    Ok(())
}

#[tokio::test]
async fn malformed_file_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.yaml");
    fs::write(&path, "channels: [ { id: Bad Id } ]")?;

    assert!(load_config_from(path).await.is_err());
    Ok(())
}

#[test]
fn local_config_directory_wins() -> Result<()> {
    let dir = TempDir::new()?;
    fs::create_dir(dir.path().join("config"))?;
    fs::write(dir.path().join("config").join("config.yaml"), "{}")?;

    let path = default_config_path(dir.path())?;
    assert_eq!(path, dir.path().join("config").join("config.yaml"));
    Ok(())
}
