#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::{error::StreamResult, state::Shared, StreamError};

/// The stream-owned gateway through which a source enqueues data,
/// closes, or signals an error.
///
/// Exclusively paired with one stream. Cloneable so a source can hand
/// it to a listener task; all clones address the same stream.
pub struct Controller<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> Controller<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    /// Buffer a chunk, or resolve the oldest pending read directly
    /// when one is waiting. Fails with [`StreamError::Closed`] once
    /// the stream is closing or terminal.
    pub fn enqueue(&self, chunk: T) -> StreamResult<()> {
        self.shared.enqueue(chunk)
    }

    /// Request the end of the stream. The Closed transition is
    /// deferred until buffered chunks drain through subsequent reads.
    pub fn close(&self) -> StreamResult<()> {
        self.shared.request_close()
    }

    /// Transition the stream to its errored state immediately: the
    /// buffer is discarded and every pending read rejects with
    /// `reason`. Ignored once the stream is already terminal.
    pub fn error(&self, reason: StreamError) {
        self.shared.error(reason);
    }

    /// Buffer headroom: `high_water_mark - total buffered size` while
    /// readable, `None` once closed or errored.
    pub fn desired_size(&self) -> Option<i64> {
        self.shared.desired_size()
    }
}
