#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::{
    controller::Controller,
    driver::{drive, DriverCmd},
    error::{StreamError, StreamResult},
    reader::Reader,
    source::Source,
    state::{Shared, State},
    strategy::QueuingStrategy,
};

/// Pull-based, backpressure-aware stream of chunks.
///
/// Owns a [`Source`](crate::Source) through a driver task spawned at
/// construction; the driver asks the source for more data whenever
/// buffer headroom (`desired_size`) is positive and no pull is
/// outstanding. At most one [`Reader`] may be locked to the stream at
/// a time.
///
/// Must be constructed from within a Tokio runtime context.
pub struct ReadableStream<T> {
    shared: Arc<Shared<T>>,
    cmd_tx: mpsc::UnboundedSender<DriverCmd>,
}

impl<T: Send + 'static> ReadableStream<T> {
    pub fn new<S>(source: S, strategy: impl QueuingStrategy<T>) -> Self
    where
        S: Source<Item = T>,
    {
        Self::with_prevent_close(source, Arc::new(strategy), false)
    }

    pub(crate) fn with_prevent_close<S>(
        source: S,
        strategy: Arc<dyn QueuingStrategy<T>>,
        prevent_close: bool,
    ) -> Self
    where
        S: Source<Item = T>,
    {
        let (shared, demand_rx) = Shared::new(strategy, prevent_close);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = Controller::new(shared.clone());
        tokio::spawn(drive(source, controller, cmd_rx, demand_rx));
        Self { shared, cmd_tx }
    }

    /// Acquire the exclusive reader. Fails with
    /// [`StreamError::Locked`] while another reader holds the lock.
    pub fn get_reader(&self) -> StreamResult<Reader<T>> {
        let mut inner = self.shared.inner.lock();
        if inner.locked {
            return Err(StreamError::Locked);
        }
        inner.locked = true;
        drop(inner);
        Ok(Reader::new(self.shared.clone(), self.cmd_tx.clone()))
    }

    /// Cancel the stream: the source is asked to tear down, buffered
    /// data is discarded, and pending reads resolve as done.
    ///
    /// Cancellation is restricted to the lock holder: on a locked
    /// stream this fails with [`StreamError::Locked`] — cancel through
    /// the reader instead.
    pub async fn cancel(&self, reason: Option<String>) -> StreamResult<()> {
        {
            let inner = self.shared.inner.lock();
            if inner.locked {
                return Err(StreamError::Locked);
            }
            if !matches!(inner.state, State::Readable) {
                return Ok(());
            }
        }
        send_cancel(&self.cmd_tx, reason).await
    }

    /// Whether a reader currently holds the lock.
    pub fn locked(&self) -> bool {
        self.shared.is_locked()
    }

    /// The queuing strategy configured at construction.
    pub fn strategy(&self) -> Arc<dyn QueuingStrategy<T>> {
        self.shared.strategy.clone()
    }

    /// Resolves once `Source::start` has completed; rejects with the
    /// stored reason if the source failed to start.
    pub async fn started(&self) -> StreamResult<()> {
        self.shared.wait_started().await
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    pub(crate) fn cmd_tx(&self) -> &mpsc::UnboundedSender<DriverCmd> {
        &self.cmd_tx
    }
}

/// Forward a cancel request to the driver. A driver that already
/// stopped means the stream is past cancellation; that is success for
/// the caller.
pub(crate) async fn send_cancel(
    cmd_tx: &mpsc::UnboundedSender<DriverCmd>,
    reason: Option<String>,
) -> StreamResult<()> {
    let (done, ack) = oneshot::channel();
    if cmd_tx.send(DriverCmd::Cancel { reason, done }).is_err() {
        return Ok(());
    }
    ack.await.unwrap_or(Ok(()))
}
