#![forbid(unsafe_code)]

//! Push-side primitives: a producer handle, a bounded byte buffer and
//! the capability surface the pull adapter drains it through.
//!
//! Contract: bytes pushed before `finish` are observable through
//! [`PushByteSource::take`] in push order. `pause` is advisory, the
//! buffer keeps accepting until [`PushOptions::max_buffer_bytes`];
//! past the cap `push` fails instead of blocking.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::errors::{IoError, IoResult};

/// Terminal events a producer signals out of band of the byte flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The producer finished; no further bytes will arrive.
    End,
    /// The producer failed with a reason.
    Failed(String),
}

/// Capability surface a push-style producer exposes to the pull
/// adapter: throttling, draining and teardown.
pub trait PushByteSource: Send + Sync + 'static {
    /// Signal the producer to stop pushing.
    fn pause(&self);

    /// Signal the producer that pushing may resume.
    fn resume(&self);

    /// Drain the oldest buffered chunk, if any.
    fn take(&self) -> Option<Bytes>;

    /// Hand over the terminal-event receiver. Yields `Some` exactly
    /// once; later calls return `None`.
    fn take_events(&self) -> Option<UnboundedReceiver<PushEvent>>;

    /// Sever the producer: drop buffered bytes and fail later pushes.
    fn detach(&self);
}

#[derive(Debug, Clone, Copy)]
pub struct PushOptions {
    /// Hard cap on buffered bytes; `push` fails beyond it.
    pub max_buffer_bytes: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            max_buffer_bytes: 8 * 1024 * 1024,
        }
    }
}

struct PushShared {
    buf: Mutex<VecDeque<Bytes>>,
    buffered_bytes: AtomicUsize,
    max_buffer_bytes: usize,
    paused: AtomicBool,
    detached: AtomicBool,
    events_tx: UnboundedSender<PushEvent>,
}

/// Producer half: push bytes, then finish or fail exactly once.
pub struct PushHandle {
    shared: Arc<PushShared>,
}

impl PushHandle {
    /// Buffer one chunk for the pull side.
    pub fn push(&self, chunk: Bytes) -> IoResult<()> {
        if self.shared.detached.load(Ordering::Acquire) {
            return Err(IoError::Detached);
        }
        let buffered = self.shared.buffered_bytes.load(Ordering::Acquire);
        if buffered + chunk.len() > self.shared.max_buffer_bytes {
            return Err(IoError::BufferFull {
                buffered,
                incoming: chunk.len(),
                max: self.shared.max_buffer_bytes,
            });
        }
        trace!(len = chunk.len(), buffered, "buffering pushed chunk");
        self.shared
            .buffered_bytes
            .fetch_add(chunk.len(), Ordering::AcqRel);
        self.shared.buf.lock().push_back(chunk);
        Ok(())
    }

    /// Signal end of stream. Already-buffered bytes still drain.
    pub fn finish(&self) -> IoResult<()> {
        self.shared
            .events_tx
            .send(PushEvent::End)
            .map_err(|_| IoError::ChannelClosed)
    }

    /// Signal producer failure.
    pub fn fail(&self, reason: impl Into<String>) -> IoResult<()> {
        self.shared
            .events_tx
            .send(PushEvent::Failed(reason.into()))
            .map_err(|_| IoError::ChannelClosed)
    }

    /// Advisory throttle flag set by the pull side.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }
}

/// Pull half of [`push_pair`]: a [`PushByteSource`] backed by the
/// in-memory buffer the matching [`PushHandle`] fills.
pub struct ChannelPush {
    shared: Arc<PushShared>,
    events_rx: Mutex<Option<UnboundedReceiver<PushEvent>>>,
}

impl PushByteSource for ChannelPush {
    fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    fn take(&self) -> Option<Bytes> {
        let chunk = self.shared.buf.lock().pop_front()?;
        self.shared
            .buffered_bytes
            .fetch_sub(chunk.len(), Ordering::AcqRel);
        Some(chunk)
    }

    fn take_events(&self) -> Option<UnboundedReceiver<PushEvent>> {
        self.events_rx.lock().take()
    }

    fn detach(&self) {
        self.shared.detached.store(true, Ordering::Release);
        self.shared.buf.lock().clear();
        self.shared.buffered_bytes.store(0, Ordering::Release);
    }
}

/// Build a connected producer/consumer pair around a bounded byte
/// buffer.
pub fn push_pair(options: PushOptions) -> (PushHandle, ChannelPush) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(PushShared {
        buf: Mutex::new(VecDeque::new()),
        buffered_bytes: AtomicUsize::new(0),
        max_buffer_bytes: options.max_buffer_bytes,
        paused: AtomicBool::new(false),
        detached: AtomicBool::new(false),
        events_tx,
    });
    (
        PushHandle {
            shared: shared.clone(),
        },
        ChannelPush {
            shared,
            events_rx: Mutex::new(Some(events_rx)),
        },
    )
}
