#![forbid(unsafe_code)]

//! Pull adapter over a push-style byte producer.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use rill_stream::{Controller, Source, StreamError, StreamResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::push::{PushByteSource, PushEvent};

/// Adapts a [`PushByteSource`] into a pull [`Source`] of [`Bytes`].
///
/// Contract: each pull pauses the producer, drains at most one chunk
/// and resumes. An empty drain closes the stream, so a finished
/// producer's remaining bytes reach the pull side before the close
/// lands; a producer failure errors the stream out of band. Teardown
/// always
/// detaches the producer before the terminal transition so a consumer
/// observing the closed stream cannot race a live producer.
pub struct PushStreamSource<P> {
    push: P,
    closed: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl<P: PushByteSource> PushStreamSource<P> {
    pub fn new(push: P) -> Self {
        Self {
            push,
            closed: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl<P: PushByteSource> Source for PushStreamSource<P> {
    type Item = Bytes;

    async fn start(&mut self, controller: &Controller<Bytes>) -> StreamResult<()> {
        let Some(mut events) = self.push.take_events() else {
            return Err(StreamError::Source(
                "push source event channel already consumed".into(),
            ));
        };

        let controller = controller.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                _ = shutdown.cancelled() => return,
                event = events.recv() => event,
            };
            match event {
                Some(PushEvent::Failed(reason)) => {
                    debug!(%reason, "push producer failed");
                    controller.error(StreamError::Source(reason));
                }
                // End of production (or a dropped producer handle)
                // only stops new bytes arriving. Closing here would
                // strand bytes the stream has not pulled yet; the
                // empty-drain branch of `pull` lands the close once
                // the buffer is exhausted.
                Some(PushEvent::End) | None => {
                    debug!("push producer finished; closing once drained");
                }
            }
        });
        Ok(())
    }

    async fn pull(&mut self, controller: &Controller<Bytes>) -> StreamResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }

        self.push.pause();
        match self.push.take() {
            Some(chunk) => {
                trace!(len = chunk.len(), "forwarding pushed chunk");
                controller.enqueue(chunk)?;
                self.push.resume();
                Ok(())
            }
            None => {
                self.closed.store(true, Ordering::Release);
                self.shutdown.cancel();
                self.push.detach();
                // The event listener may have closed concurrently.
                let _ = controller.close();
                Ok(())
            }
        }
    }

    async fn cancel(&mut self, reason: Option<String>) -> StreamResult<()> {
        debug!(?reason, "push adapter cancelled");
        self.closed.store(true, Ordering::Release);
        self.shutdown.cancel();
        self.push.detach();
        Ok(())
    }
}

impl<P> Drop for PushStreamSource<P> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
