#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors raised by the push-side byte plumbing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// The pull side detached; pushed bytes have nowhere to go.
    #[error("push source detached")]
    Detached,

    /// The intermediate buffer hit its hard cap. The producer ignored
    /// the pause signal for too long.
    #[error("push buffer full ({buffered} + {incoming} > {max} bytes)")]
    BufferFull {
        buffered: usize,
        incoming: usize,
        max: usize,
    },

    /// The event channel receiver is gone.
    #[error("push event channel closed")]
    ChannelClosed,
}

pub type IoResult<T> = Result<T, IoError>;
