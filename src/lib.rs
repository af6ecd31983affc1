//! ChatRelay library
//!
//! Exposes configuration, relay wiring and the CLI for integration testing

pub mod cli;
pub mod config;
pub mod relay;

pub use config::RelayConfig;
pub use relay::Relay;
