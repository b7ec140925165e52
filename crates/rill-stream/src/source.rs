#![forbid(unsafe_code)]

use async_trait::async_trait;

use crate::{
    controller::Controller,
    error::{StreamError, StreamResult},
};

/// Pull-driven data producer supplying chunks to a stream on demand.
///
/// Callbacks run serialized on the stream's driver task: `pull` is
/// never invoked while a previous `pull` is outstanding, and `cancel`
/// / `seek` never interleave with an in-flight `pull`.
///
/// Normative:
/// - A rejection from any callback promotes the stream to its errored
///   state; the reason is fanned out to every pending and future read.
/// - `supports_seek()` is a capability flag read once at stream
///   construction, never probed per call. Sources that can jump to an
///   absolute position natively return true and implement `seek`;
///   everything else relies on the emulated discard-based seek of
///   [`SeekableStream`](crate::SeekableStream).
#[async_trait]
pub trait Source: Send + 'static {
    type Item: Send + 'static;

    /// One-time setup. The controller handed here is the stream's
    /// write-side gateway; sources that produce outside of `pull`
    /// (event listeners, timers) keep a clone of it.
    async fn start(&mut self, controller: &Controller<Self::Item>) -> StreamResult<()> {
        let _ = controller;
        Ok(())
    }

    /// Produce more data: enqueue at least zero chunks, close, or
    /// error. Called only while `desired_size` is positive.
    async fn pull(&mut self, controller: &Controller<Self::Item>) -> StreamResult<()>;

    /// Consumer-requested teardown. Not an error condition.
    async fn cancel(&mut self, reason: Option<String>) -> StreamResult<()> {
        let _ = reason;
        Ok(())
    }

    /// Whether [`seek`](Self::seek) can jump natively.
    fn supports_seek(&self) -> bool {
        false
    }

    /// Jump to an absolute position, returning the position actually
    /// reached. Only invoked when `supports_seek()` reported true.
    async fn seek(
        &mut self,
        controller: &Controller<Self::Item>,
        position: u64,
    ) -> StreamResult<u64> {
        let _ = (controller, position);
        Err(StreamError::NotSeekable)
    }
}

/// [`Source`] over any iterator: each pull yields the next item, and
/// exhaustion closes the stream.
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

#[async_trait]
impl<I, T> Source for IterSource<I>
where
    I: Iterator<Item = T> + Send + 'static,
    T: Send + 'static,
{
    type Item = T;

    async fn pull(&mut self, controller: &Controller<T>) -> StreamResult<()> {
        match self.iter.next() {
            Some(item) => controller.enqueue(item),
            None => controller.close(),
        }
    }
}
