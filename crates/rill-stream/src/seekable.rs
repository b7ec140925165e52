#![forbid(unsafe_code)]

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::oneshot;
use tracing::trace;

use crate::{
    driver::DriverCmd,
    error::{StreamError, StreamResult},
    readable::ReadableStream,
    reader::Reader,
    source::Source,
    strategy::QueuingStrategy,
};

/// Construction options for [`SeekableStream`].
#[derive(Debug, Clone, Copy)]
pub struct SeekableOptions {
    /// Suppress the source-initiated close path, keeping the stream
    /// open across logical re-reads of the same physical resource.
    pub prevent_close: bool,
}

impl Default for SeekableOptions {
    fn default() -> Self {
        Self {
            prevent_close: true,
        }
    }
}

/// A [`ReadableStream`] whose consumer can jump to an arbitrary
/// logical position.
///
/// When the source exposes native seek capability, `seek` delegates to
/// it directly. Otherwise the seek is emulated: chunks are read and
/// discarded until the reader's position reaches the target, which
/// makes a forward-only stream seekable at the cost of the discarded
/// data and rules out backward seeks.
pub struct SeekableStream<T> {
    stream: ReadableStream<T>,
    native_seek: bool,
    position: Arc<AtomicU64>,
}

impl<T: Send + 'static> SeekableStream<T> {
    pub fn new<S>(source: S, strategy: impl QueuingStrategy<T>, options: SeekableOptions) -> Self
    where
        S: Source<Item = T>,
    {
        // Capability flag is resolved once, here, never per call.
        let native_seek = source.supports_seek();
        let stream =
            ReadableStream::with_prevent_close(source, Arc::new(strategy), options.prevent_close);
        Self {
            stream,
            native_seek,
            position: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire the exclusive position-tracking reader.
    pub fn get_reader(&self) -> StreamResult<SeekableReader<T>> {
        if self.stream.shared().is_terminal() {
            return Err(StreamError::NotSeekable);
        }
        let reader = self.stream.get_reader()?;
        Ok(SeekableReader {
            reader,
            position: self.position.clone(),
        })
    }

    /// Move to an absolute logical `position`, returning the position
    /// actually reached.
    ///
    /// Without native seek capability the move is emulated by reading
    /// and discarding chunks, so it requires an active reader, only
    /// goes forward, and resolves with the final position when the
    /// stream ends before the target is reached. Discarding is
    /// chunk-granular: a target inside a chunk resolves past it, at
    /// the first chunk boundary at or beyond `position`.
    pub async fn seek(&self, position: u64) -> StreamResult<u64> {
        if self.native_seek {
            return self.native_seek_to(position).await;
        }

        let current = self.position.load(Ordering::Acquire);
        if self.stream.locked() {
            if position < current {
                return Err(StreamError::BackwardSeek);
            }
        } else {
            return Err(StreamError::NoReader);
        }

        trace!(from = current, to = position, "emulated seek, discarding chunks");
        loop {
            let current = self.position.load(Ordering::Acquire);
            if current >= position {
                return Ok(current);
            }
            match self.stream.shared().read_chunk().await? {
                Some(chunk) => {
                    let size = self.stream.shared().strategy.size(&chunk);
                    self.position.fetch_add(size, Ordering::AcqRel);
                }
                None => return Ok(self.position.load(Ordering::Acquire)),
            }
        }
    }

    async fn native_seek_to(&self, position: u64) -> StreamResult<u64> {
        let (done, ack) = oneshot::channel();
        let sent = self
            .stream
            .cmd_tx()
            .send(DriverCmd::Seek { position, done })
            .is_ok();
        let result = if sent {
            ack.await.map_err(|_| StreamError::Closed)?
        } else {
            Err(self
                .stream
                .shared()
                .stored_error()
                .unwrap_or(StreamError::Closed))
        };
        let reached = result?;
        self.position.store(reached, Ordering::Release);
        Ok(reached)
    }

    /// Whether `seek` delegates to the source natively.
    pub fn native_seek(&self) -> bool {
        self.native_seek
    }

    /// Whether the source-initiated close path is suppressed.
    pub fn prevent_close(&self) -> bool {
        self.stream.shared().inner.lock().prevent_close
    }

    pub fn locked(&self) -> bool {
        self.stream.locked()
    }

    pub async fn started(&self) -> StreamResult<()> {
        self.stream.started().await
    }

    pub async fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        self.stream.cancel(reason).await
    }

    pub fn strategy(&self) -> Arc<dyn QueuingStrategy<T>> {
        self.stream.strategy()
    }
}

/// Reader over a [`SeekableStream`], tracking the logical position of
/// everything consumed through it.
///
/// `current_position` advances by the strategy-reported size of each
/// chunk read (including chunks discarded by an emulated seek) and
/// only ever increases, except through an explicit native seek.
pub struct SeekableReader<T> {
    reader: Reader<T>,
    position: Arc<AtomicU64>,
}

impl<T: Send + 'static> SeekableReader<T> {
    pub async fn read(&self) -> StreamResult<Option<T>> {
        match self.reader.read().await? {
            Some(chunk) => {
                let size = self.reader.shared().strategy.size(&chunk);
                self.position.fetch_add(size, Ordering::AcqRel);
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    /// Logical position: total strategy-reported size consumed through
    /// this reader.
    pub fn current_position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub fn release_lock(&self) {
        self.reader.release_lock();
    }

    pub async fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        self.reader.cancel(reason).await
    }

    pub async fn closed(&self) -> StreamResult<()> {
        self.reader.closed().await
    }
}
