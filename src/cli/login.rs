use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use chatrelay_core_types::ChannelStatus;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ChannelArg {
    /// Channel id, e.g. `doubao`
    pub channel: String,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    channel: &'a str,
    authenticated: bool,
    status: ChannelStatus,
}

pub async fn cmd_status(args: ChannelArg, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let relay = ctx.relay().await?;
    let session = relay
        .open(&args.channel)
        .await
        .with_context(|| format!("Failed to open channel {}", args.channel))?;
    let authenticated = session.is_authenticated().await;
    let report = StatusReport {
        channel: &args.channel,
        authenticated,
        status: session.get_status(),
    };
    if output == OutputFormat::Json {
        return print_json(&report);
    }

    println!("Channel:       {}", report.channel);
    println!("Connected:     {}", report.status.connected);
    println!("Authenticated: {}", report.authenticated);
    if let Some(err) = &report.status.last_error {
        println!("Last error:    {err}");
    }
    Ok(())
}

pub async fn cmd_login(args: ChannelArg, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let relay = ctx.relay().await?;
    let session = relay
        .open(&args.channel)
        .await
        .with_context(|| format!("Failed to open channel {}", args.channel))?;
    let result = session.authenticate().await?;
    if output == OutputFormat::Json {
        print_json(&result)?;
    } else if result.success {
        println!(
            "Logged in to {} ({})",
            args.channel,
            result.message.as_deref().unwrap_or("ok")
        );
    }
    if !result.success {
        if result.needs_manual_login && ctx.config().browser.headless {
            bail!(
                "login to {} needs a visible browser; rerun with CHATRELAY_HEADLESS=0 or browser.headless: false",
                args.channel
            );
        }
        bail!(
            "login to {} failed: {}",
            args.channel,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub async fn cmd_logout(args: ChannelArg, ctx: &CliContext) -> Result<()> {
    let relay = ctx.relay().await?;
    let session = relay
        .open(&args.channel)
        .await
        .with_context(|| format!("Failed to open channel {}", args.channel))?;
    session.logout().await?;
    println!("Logged out of {}", args.channel);
    Ok(())
}
