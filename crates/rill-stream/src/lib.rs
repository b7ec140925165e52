//! # rill-stream
//!
//! Pull-based, backpressure-aware streams with seekable readers.
//!
//! A [`Source`] supplies chunks on demand, a single [`Reader`]
//! consumes them through an async `read()` contract, and a
//! [`Controller`] mediates buffering, flow control, closing and error
//! propagation. [`SeekableStream`] layers logical seeking on top,
//! emulating it by discarding chunks when the source cannot jump
//! natively.
//!
//! ## Backpressure (Normative)
//!
//! **Contract:** `desired_size == high_water_mark - total buffered
//! size`, recomputed on every enqueue/dequeue. The source is asked to
//! `pull` only while `desired_size > 0` and no pull is outstanding;
//! production beyond demand is never requested.
//!
//! ## Read ordering (Normative)
//!
//! **Contract:** reads resolve in the order requested, and enqueued
//! data is delivered in enqueue order. A read on an empty readable
//! buffer joins a FIFO pending list fulfilled by the next enqueue,
//! close, or error.
//!
//! ## Terminal states (Normative)
//!
//! **Contract:** once closed-and-drained or errored, no further
//! enqueue is accepted. A source failure rejects every pending and
//! future read with the same reason, permanently. Cancellation is not
//! an error: it resolves successfully and subsequent reads report
//! done.
//!
//! ## Concurrency model
//!
//! Every source callback runs serialized on a driver task spawned at
//! stream construction; streams must therefore be built inside a
//! Tokio runtime context. No parallelism is assumed beyond that
//! single logical timeline.

#![forbid(unsafe_code)]

mod controller;
mod driver;
mod error;
mod queue;
mod readable;
mod reader;
mod seekable;
mod source;
mod state;
mod strategy;

pub use controller::Controller;
pub use error::{StreamError, StreamResult};
pub use queue::SizeQueue;
pub use readable::ReadableStream;
pub use reader::Reader;
pub use seekable::{SeekableOptions, SeekableReader, SeekableStream};
pub use source::{IterSource, Source};
pub use strategy::{ByteLengthStrategy, CountStrategy, QueuingStrategy};
