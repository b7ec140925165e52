#![forbid(unsafe_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use crate::{
    driver::DriverCmd,
    error::{StreamError, StreamResult},
    readable::send_cancel,
    state::Shared,
};

/// The single lock holder on a [`ReadableStream`](crate::ReadableStream).
///
/// Reads resolve strictly in request order: a read either dequeues a
/// buffered chunk immediately or joins a FIFO pending list fulfilled
/// as data, close, or error arrives. Dropping the reader releases the
/// lock.
pub struct Reader<T> {
    shared: Arc<Shared<T>>,
    cmd_tx: mpsc::UnboundedSender<DriverCmd>,
    released: AtomicBool,
}

impl<T: Send + 'static> Reader<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, cmd_tx: mpsc::UnboundedSender<DriverCmd>) -> Self {
        Self {
            shared,
            cmd_tx,
            released: AtomicBool::new(false),
        }
    }

    /// Read the next chunk. `Ok(Some(chunk))` is data, `Ok(None)` is
    /// end of stream; an errored stream rejects with its stored
    /// reason.
    pub async fn read(&self) -> StreamResult<Option<T>> {
        if self.released.load(Ordering::Acquire) {
            return Err(StreamError::ReaderReleased);
        }
        self.shared.read_chunk().await
    }

    /// Cancel the owning stream. Allowed for the lock holder only;
    /// resolves successfully and subsequent reads report done.
    pub async fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(StreamError::ReaderReleased);
        }
        if self.shared.is_terminal() {
            return Ok(());
        }
        send_cancel(&self.cmd_tx, reason).await
    }

    /// Resolves when the stream closes; rejects with the stored
    /// reason when it errors.
    pub async fn closed(&self) -> StreamResult<()> {
        self.shared.wait_closed().await
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }
}

impl<T> Reader<T> {
    /// Release the lock. Idempotent; buffered data is unaffected, but
    /// reads still pending at release time reject, and any further
    /// `read` on this reader fails.
    pub fn release_lock(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending: Vec<_> = {
            let mut inner = self.shared.inner.lock();
            inner.locked = false;
            inner.pending_reads.drain(..).collect()
        };
        for tx in pending {
            let _ = tx.send(Err(StreamError::ReaderReleased));
        }
    }
}

impl<T> Drop for Reader<T> {
    fn drop(&mut self) {
        self.release_lock();
    }
}
