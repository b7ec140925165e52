#![forbid(unsafe_code)]

//! Push-to-pull byte plumbing for rill streams.
//!
//! A push-style producer (a socket callback, a decoder thread, an FFI
//! data handler) writes through a [`PushHandle`]; the matching
//! [`ChannelPush`] buffer is drained by a [`PushStreamSource`] mounted
//! in a pull stream. Backpressure crosses the boundary as an advisory
//! pause flag plus a hard byte cap on the intermediate buffer.
//!
//! # Normative
//!
//! - **Ordering.** Bytes pushed before a terminal event are delivered
//!   to the pull side in push order.
//! - **Terminal events.** `finish` closes the stream only after every
//!   buffered byte has drained to the pull side; `fail` errors it
//!   immediately and buffered bytes are discarded.
//! - **Teardown.** Cancel and close detach the producer before the
//!   stream reaches its terminal state; pushes after detach fail with
//!   [`IoError::Detached`].

mod errors;
mod push;
mod source;

pub use errors::{IoError, IoResult};
pub use push::{push_pair, ChannelPush, PushByteSource, PushEvent, PushHandle, PushOptions};
pub use source::PushStreamSource;
