use clap::Subcommand;

use super::login::ChannelArg;
use super::send::SendArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// List configured channels
    Channels,

    /// Show connection and login state of a channel
    Status(ChannelArg),

    /// Open the channel's login page and wait for a manual login
    Login(ChannelArg),

    /// Log out of a channel
    Logout(ChannelArg),

    /// Send a message and print the reply
    Send(SendArgs),

    /// Show build and configuration information
    Info,
}
