pub mod app;
pub mod channels;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod login;
pub mod output;
pub mod runtime;
pub mod send;
