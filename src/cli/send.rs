use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use serde::Serialize;
use tokio::fs;
use tracing::warn;

use channel_session::ChannelError;
use chatrelay_core_types::ChatContext;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SendArgs {
    /// Channel id, e.g. `doubao`
    pub channel: String,

    /// Message text
    pub message: String,

    /// Print the reply while it is being generated
    #[arg(long)]
    pub stream: bool,

    /// Attach the contents of this file as code context
    #[arg(long, value_name = "FILE")]
    pub code_file: Option<PathBuf>,

    /// Language tag for the code block
    #[arg(long)]
    pub language: Option<String>,

    /// File name shown with the code (defaults to --code-file)
    #[arg(long, value_name = "NAME")]
    pub file: Option<String>,

    /// Cursor line shown with the code
    #[arg(long, requires = "column")]
    pub line: Option<u32>,

    /// Cursor column shown with the code
    #[arg(long, requires = "line")]
    pub column: Option<u32>,
}

impl SendArgs {
    async fn context(&self) -> Result<Option<ChatContext>> {
        let Some(path) = &self.code_file else {
            return Ok(None);
        };
        let code = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read code file {}", path.display()))?;
        let mut context = ChatContext::with_code(code);
        context.current_file = self
            .file
            .clone()
            .or_else(|| Some(path.display().to_string()));
        context.language = self.language.clone();
        if let (Some(line), Some(column)) = (self.line, self.column) {
            context = context.cursor(line, column);
        }
        Ok(Some(context))
    }
}

#[derive(Serialize)]
struct SendReport<'a> {
    channel: &'a str,
    reply: &'a str,
    response_time_ms: Option<u64>,
}

pub async fn cmd_send(args: SendArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let context = args.context().await?;
    let relay = ctx.relay().await?;
    let session = relay
        .open(&args.channel)
        .await
        .with_context(|| format!("Failed to open channel {}", args.channel))?;

    let reply = if args.stream {
        let echo = output == OutputFormat::Human;
        let mut fragments = session.send_message_stream(args.message.clone(), context);
        let mut reply = String::new();
        let mut stdout = std::io::stdout();
        loop {
            let polled = tokio::select! {
                next = fragments.next() => Some(next),
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(next) = polled else {
                warn!("interrupted; stopping reply stream");
                fragments.stop();
                break;
            };
            let Some(fragment) = next else { break };
            let fragment = fragment.map_err(explain)?;
            if echo {
                print!("{fragment}");
                stdout.flush()?;
            }
            reply.push_str(&fragment);
        }
        if !fragments.is_settled() {
            warn!(len = reply.chars().count(), "reply ended before it settled");
        }
        if echo {
            println!();
        }
        reply
    } else {
        session
            .send_message(&args.message, context.as_ref())
            .await
            .map_err(explain)?
    };

    match output {
        OutputFormat::Json => print_json(&SendReport {
            channel: &args.channel,
            reply: &reply,
            response_time_ms: session.get_status().response_time_ms,
        }),
        OutputFormat::Human if !args.stream => {
            println!("{reply}");
            Ok(())
        }
        OutputFormat::Human => Ok(()),
    }
}

/// Attach the next step for errors a user can act on.
fn explain(err: ChannelError) -> anyhow::Error {
    let hint = match &err {
        ChannelError::NotAuthenticated { channel } => {
            Some(format!("run `chatrelay login {channel}` first"))
        }
        ChannelError::ElementNotFound { .. } => {
            Some("the page layout may have changed; check the channel's locators".to_string())
        }
        ChannelError::ReplySettleTimeout { .. } => {
            Some("raise capture.max_generation_ms for long replies".to_string())
        }
        _ => None,
    };
    match hint {
        Some(hint) => anyhow::Error::new(err).context(hint),
        None => err.into(),
    }
}
