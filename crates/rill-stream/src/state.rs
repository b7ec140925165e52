#![forbid(unsafe_code)]

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::trace;

use crate::{
    error::{StreamError, StreamResult},
    queue::SizeQueue,
    strategy::QueuingStrategy,
};

/// Stream lifecycle state. Closed and Errored are terminal.
#[derive(Debug)]
pub(crate) enum State {
    Readable,
    Closed,
    Errored(StreamError),
}

pub(crate) struct Inner<T> {
    pub(crate) state: State,
    pub(crate) queue: SizeQueue<T>,
    /// Read requests waiting for data, resolved strictly FIFO.
    pub(crate) pending_reads: VecDeque<oneshot::Sender<StreamResult<Option<T>>>>,
    /// Close requested while the queue still held data; the Closed
    /// transition happens once the queue drains.
    pub(crate) close_requested: bool,
    /// Suppresses the source-initiated close path (seekable streams
    /// that re-read the same physical resource).
    pub(crate) prevent_close: bool,
    /// A `Source::pull` call is in flight.
    pub(crate) pulling: bool,
    pub(crate) started: bool,
    pub(crate) locked: bool,
}

/// State shared by the stream handle, its controller, its reader and
/// the driver task. Exclusive-owner chain: one `Arc<Shared>` per
/// stream; external callers never touch it directly.
pub(crate) struct Shared<T> {
    pub(crate) inner: Mutex<Inner<T>>,
    pub(crate) strategy: Arc<dyn QueuingStrategy<T>>,
    /// Demand events waking the driver: start completion, enqueue,
    /// dequeue, pending-read registration, terminal transitions.
    demand_tx: mpsc::UnboundedSender<()>,
    /// Bumped on every observable state change (`started`, Closed,
    /// Errored) for race-free check-then-wait observers.
    changed_tx: watch::Sender<()>,
}

impl<T: Send + 'static> Shared<T> {
    pub(crate) fn new(
        strategy: Arc<dyn QueuingStrategy<T>>,
        prevent_close: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (demand_tx, demand_rx) = mpsc::unbounded_channel();
        let (changed_tx, _) = watch::channel(());
        let shared = Arc::new(Self {
            inner: Mutex::new(Inner {
                state: State::Readable,
                queue: SizeQueue::new(),
                pending_reads: VecDeque::new(),
                close_requested: false,
                prevent_close,
                pulling: false,
                started: false,
                locked: false,
            }),
            strategy,
            demand_tx,
            changed_tx,
        });
        (shared, demand_rx)
    }

    pub(crate) fn signal_demand(&self) {
        let _ = self.demand_tx.send(());
    }

    fn signal_changed(&self) {
        self.changed_tx.send_replace(());
    }

    /// Write-side entry point: buffer a chunk, or hand it straight to
    /// the oldest pending read when one is waiting.
    pub(crate) fn enqueue(&self, chunk: T) -> StreamResult<()> {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Readable) || inner.close_requested {
                return Err(StreamError::Closed);
            }
            if let Some(pending) = inner.pending_reads.pop_front() {
                let _ = pending.send(Ok(Some(chunk)));
            } else {
                let size = self.strategy.size(&chunk);
                inner.queue.enqueue(chunk, size);
            }
        }
        self.signal_demand();
        Ok(())
    }

    /// Write-side close request. Deferred while the queue holds data;
    /// suppressed entirely when `prevent_close` is set.
    pub(crate) fn request_close(&self) -> StreamResult<()> {
        let closed_now = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Readable) || inner.close_requested {
                return Err(StreamError::Closed);
            }
            if inner.prevent_close {
                trace!("close request suppressed (prevent_close)");
                return Ok(());
            }
            inner.close_requested = true;
            if inner.queue.is_empty() {
                inner.state = State::Closed;
                let pending: Vec<_> = inner.pending_reads.drain(..).collect();
                for tx in pending {
                    let _ = tx.send(Ok(None));
                }
                true
            } else {
                trace!(buffered = inner.queue.len(), "close deferred until drained");
                false
            }
        };
        if closed_now {
            self.signal_changed();
        }
        self.signal_demand();
        Ok(())
    }

    /// Transition to Errored: discard the buffer and reject every
    /// pending read with the same reason. No-op once terminal, so a
    /// late pull result cannot clobber an earlier failure.
    pub(crate) fn error(&self, reason: StreamError) {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Readable) {
                return;
            }
            trace!(%reason, "stream errored");
            inner.queue.clear();
            let pending: Vec<_> = inner.pending_reads.drain(..).collect();
            for tx in pending {
                let _ = tx.send(Err(reason.clone()));
            }
            inner.state = State::Errored(reason);
        }
        self.signal_changed();
        self.signal_demand();
    }

    /// Cancellation teardown: buffered data is discarded and pending
    /// reads resolve as done. Not an error for the canceller.
    pub(crate) fn finish_cancel(&self) {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Readable) {
                return;
            }
            inner.queue.clear();
            let pending: Vec<_> = inner.pending_reads.drain(..).collect();
            for tx in pending {
                let _ = tx.send(Ok(None));
            }
            inner.state = State::Closed;
        }
        self.signal_changed();
        self.signal_demand();
    }

    /// One read step: dequeue a buffered chunk, observe a terminal
    /// state, or register a pending read resolved FIFO later.
    pub(crate) async fn read_chunk(&self) -> StreamResult<Option<T>> {
        let pending = {
            let mut inner = self.inner.lock();
            if let Some(value) = inner.queue.dequeue() {
                let drained = inner.close_requested && inner.queue.is_empty();
                if drained {
                    inner.state = State::Closed;
                }
                drop(inner);
                if drained {
                    self.signal_changed();
                }
                self.signal_demand();
                return Ok(Some(value));
            }
            match &inner.state {
                State::Closed => return Ok(None),
                State::Errored(reason) => return Err(reason.clone()),
                State::Readable => {
                    let (tx, rx) = oneshot::channel();
                    inner.pending_reads.push_back(tx);
                    rx
                }
            }
        };
        self.signal_demand();
        pending.await.map_err(|_| StreamError::Closed)?
    }

    /// `high_water_mark - total buffered size` while readable, zero
    /// while a deferred close drains, `None` once terminal.
    pub(crate) fn desired_size(&self) -> Option<i64> {
        let inner = self.inner.lock();
        match inner.state {
            State::Readable if !inner.close_requested => Some(
                self.strategy.high_water_mark() as i64 - inner.queue.total_size() as i64,
            ),
            State::Readable => Some(0),
            _ => None,
        }
    }

    /// Backpressure discipline: pull only while demand is positive and
    /// no pull is outstanding.
    pub(crate) fn should_pull(&self) -> bool {
        let inner = self.inner.lock();
        if !matches!(inner.state, State::Readable) || inner.close_requested || inner.pulling {
            return false;
        }
        self.strategy.high_water_mark() as i64 > inner.queue.total_size() as i64
    }

    pub(crate) fn begin_pull(&self) {
        self.inner.lock().pulling = true;
    }

    pub(crate) fn end_pull(&self) {
        self.inner.lock().pulling = false;
    }

    pub(crate) fn mark_started(&self) {
        self.inner.lock().started = true;
        self.signal_changed();
        self.signal_demand();
    }

    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self.inner.lock().state, State::Readable)
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    pub(crate) fn stored_error(&self) -> Option<StreamError> {
        match &self.inner.lock().state {
            State::Errored(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Resolves once `Source::start` has completed (or the stream
    /// reached a terminal state first).
    pub(crate) async fn wait_started(&self) -> StreamResult<()> {
        let mut changed = self.changed_tx.subscribe();
        loop {
            {
                let inner = self.inner.lock();
                if inner.started {
                    return Ok(());
                }
                match &inner.state {
                    State::Errored(reason) => return Err(reason.clone()),
                    State::Closed => return Ok(()),
                    State::Readable => {}
                }
            }
            if changed.changed().await.is_err() {
                return Err(StreamError::Closed);
            }
        }
    }

    /// Resolves when the stream closes; rejects with the stored reason
    /// when it errors.
    pub(crate) async fn wait_closed(&self) -> StreamResult<()> {
        let mut changed = self.changed_tx.subscribe();
        loop {
            {
                let inner = self.inner.lock();
                match &inner.state {
                    State::Closed => return Ok(()),
                    State::Errored(reason) => return Err(reason.clone()),
                    State::Readable => {}
                }
            }
            if changed.changed().await.is_err() {
                return Err(StreamError::Closed);
            }
        }
    }
}
