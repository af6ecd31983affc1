use anyhow::Result;
use serde::Serialize;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct Info {
    version: &'static str,
    build_date: &'static str,
    git_commit: &'static str,
    config_path: String,
    browser: Option<String>,
    headless: bool,
    profile_dir: String,
    channels: Vec<String>,
}

pub async fn cmd_info(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let info = Info {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_commit: env!("GIT_HASH"),
        config_path: ctx.config_path().display().to_string(),
        browser: config
            .browser
            .resolve_executable()
            .map(|path| path.display().to_string()),
        headless: config.browser.headless,
        profile_dir: config.browser.user_data_dir.display().to_string(),
        channels: config
            .profiles()
            .into_iter()
            .map(|profile| profile.id.to_string())
            .collect(),
    };
    if output == OutputFormat::Json {
        return print_json(&info);
    }

    println!("ChatRelay System Information");
    println!("============================");
    println!("Version: {}", info.version);
    println!("Build Date: {}", info.build_date);
    println!("Git Commit: {}", info.git_commit);
    println!();
    println!("Configuration:");
    println!("- Config File: {}", info.config_path);
    println!(
        "- Browser: {}",
        info.browser.as_deref().unwrap_or("(not found)")
    );
    println!("- Headless: {}", info.headless);
    println!("- Profile Directory: {}", info.profile_dir);
    println!("- Channels: {}", info.channels.join(", "));
    Ok(())
}
