use super::channels::cmd_channels;
use super::env::CliArgs;
use super::info::cmd_info;
use super::login::{cmd_login, cmd_logout, cmd_status};
use super::send::cmd_send;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Channels => cmd_channels(ctx, cli.output).await,
        Commands::Status(args) => cmd_status(args, ctx, cli.output).await,
        Commands::Login(args) => cmd_login(args, ctx, cli.output).await,
        Commands::Logout(args) => cmd_logout(args, ctx).await,
        Commands::Send(args) => cmd_send(args, ctx, cli.output).await,
        Commands::Info => cmd_info(ctx, cli.output).await,
    }
}
