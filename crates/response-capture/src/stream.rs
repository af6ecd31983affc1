use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::captor::CaptureRun;
use crate::differ::StreamDiffer;
use crate::errors::CaptureError;
use crate::state::TickOutcome;

/// Lazy, finite stream of reply fragments.
///
/// The first poll starts discovery. The stream ends after the reply settles,
/// after the first error, or as soon as [`ReplyStream::stop`] is called.
/// Stopping or dropping it guarantees no further page queries.
pub struct ReplyStream {
    inner: BoxStream<'static, Result<String, CaptureError>>,
    stop: CancellationToken,
}

struct Driver {
    run: CaptureRun,
    differ: StreamDiffer,
    done: bool,
}

impl Driver {
    async fn next(&mut self) -> Option<Result<String, CaptureError>> {
        if self.done {
            return None;
        }
        match self.advance().await {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(CaptureError::Cancelled) => {
                debug!(ticks = self.run.state.ticks(), "reply stream stopped");
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    /// Poll until there is a fragment to hand out (`Some`) or the reply
    /// settled (`None`).
    async fn advance(&mut self) -> Result<Option<String>, CaptureError> {
        if !self.run.is_discovered() {
            self.run.discover().await?;
        }
        loop {
            if self.run.state.ticks() > 0 {
                self.run.check_generation_cap()?;
                self.run.pause().await?;
            }
            let (snapshot, outcome) = self.run.tick().await?;
            let fragment = self.differ.push(&snapshot);
            if outcome == TickOutcome::Settled {
                self.done = true;
                if fragment.is_none() && !self.differ.has_emitted() {
                    return Err(CaptureError::EmptyReply {
                        ticks: self.run.state.ticks(),
                    });
                }
                info!(
                    ticks = self.run.state.ticks(),
                    elapsed_ms = self.run.state.elapsed_ms(),
                    len = self.differ.emitted().chars().count(),
                    "streamed reply settled"
                );
                return Ok(fragment);
            }
            if fragment.is_some() {
                return Ok(fragment);
            }
        }
    }
}

impl ReplyStream {
    pub(crate) fn new(run: CaptureRun, stop: CancellationToken) -> Self {
        let driver = Driver {
            run,
            differ: StreamDiffer::new(),
            done: false,
        };
        let inner = stream::unfold(driver, |mut driver| async move {
            let item = driver.next().await?;
            Some((item, driver))
        })
        .boxed();
        Self { inner, stop }
    }

    /// Ask the producer to stop; observed before its next page query.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Token that stops this stream when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl Stream for ReplyStream {
    type Item = Result<String, CaptureError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
