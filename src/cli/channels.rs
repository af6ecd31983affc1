use anyhow::Result;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

pub async fn cmd_channels(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let relay = ctx.relay().await?;
    let rows = relay.registry().list();
    if output == OutputFormat::Json {
        return print_json(&rows);
    }

    println!("{:<12} {:<10} {:<8} WEBSITE", "CHANNEL", "NAME", "ENABLED");
    for row in rows {
        println!(
            "{:<12} {:<10} {:<8} {}",
            row.id,
            row.name,
            if row.enabled { "yes" } else { "no" },
            row.website
        );
    }
    Ok(())
}
