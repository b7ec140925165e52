#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors produced by `rill-stream`.
///
/// Notes:
/// - `Locked`, `ReaderReleased` and `NoReader` are lock-discipline
///   failures: an operation requiring exclusive reader access was
///   attempted while locked, after release, or without a reader.
/// - `Closed` is returned for write-side operations (enqueue/close)
///   attempted after the stream reached a terminal state.
/// - `Source(..)` carries a failure surfaced by a source callback; it
///   is unrecoverable for the stream instance, which stays errored and
///   rejects every pending and future read with the same reason.
/// - `BackwardSeek` and `NotSeekable` are local to the failing call
///   and leave the stream state unchanged.
///
/// The enum is `Clone` because a single source failure fans out to
/// every pending read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream is already locked to a reader")]
    Locked,

    #[error("reader has released its lock")]
    ReaderReleased,

    #[error("stream has no active reader")]
    NoReader,

    #[error("stream is closed")]
    Closed,

    #[error("source error: {0}")]
    Source(String),

    #[error("stream source is not seekable; cannot seek backwards")]
    BackwardSeek,

    #[error("stream is not seekable")]
    NotSeekable,
}

/// Result type for `rill-stream`.
pub type StreamResult<T> = Result<T, StreamError>;
