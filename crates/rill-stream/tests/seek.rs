//! Integration tests for seekable streams: emulated discard-based
//! seek, native delegation and the prevent-close policy.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use rill_stream::{
    ByteLengthStrategy, Controller, CountStrategy, IterSource, SeekableOptions, SeekableStream,
    Source, StreamError, StreamResult,
};
use tokio::time::{sleep, timeout};

fn forward_only() -> SeekableOptions {
    SeekableOptions {
        prevent_close: false,
    }
}

/// Source with a native seek: records requested positions and serves
/// unit chunks numbered from the last seek target.
struct NativeSeekSource {
    cursor: u64,
    seeks: Arc<Mutex<Vec<u64>>>,
    fail_seek: bool,
}

impl NativeSeekSource {
    fn new(fail_seek: bool) -> (Self, Arc<Mutex<Vec<u64>>>) {
        let seeks = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                cursor: 0,
                seeks: seeks.clone(),
                fail_seek,
            },
            seeks,
        )
    }
}

#[async_trait]
impl Source for NativeSeekSource {
    type Item = u64;

    async fn pull(&mut self, controller: &Controller<u64>) -> StreamResult<()> {
        let chunk = self.cursor;
        self.cursor += 1;
        controller.enqueue(chunk)
    }

    fn supports_seek(&self) -> bool {
        true
    }

    async fn seek(&mut self, _controller: &Controller<u64>, position: u64) -> StreamResult<u64> {
        if self.fail_seek {
            return Err(StreamError::Source("seek broke".into()));
        }
        self.seeks.lock().push(position);
        self.cursor = position;
        Ok(position)
    }
}

#[tokio::test]
async fn test_emulated_seek_discards_to_position() {
    let stream = SeekableStream::new(IterSource::new(0u32..10), CountStrategy::new(1), forward_only());
    assert!(!stream.native_seek());
    let reader = stream.get_reader().unwrap();

    assert_eq!(stream.seek(5).await.unwrap(), 5);
    assert_eq!(reader.current_position(), 5);

    assert_eq!(reader.read().await.unwrap(), Some(5));
    assert_eq!(reader.current_position(), 6);
}

#[tokio::test]
async fn test_seek_to_current_position_discards_nothing() {
    let stream = SeekableStream::new(IterSource::new(0u32..10), CountStrategy::new(1), forward_only());
    let reader = stream.get_reader().unwrap();

    assert_eq!(stream.seek(0).await.unwrap(), 0);
    assert_eq!(reader.read().await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_backward_seek_rejected() {
    // Discard to position 5, then ask for 3.
    let stream = SeekableStream::new(IterSource::new(0u32..10), CountStrategy::new(1), forward_only());
    let reader = stream.get_reader().unwrap();

    assert_eq!(stream.seek(5).await.unwrap(), 5);
    assert_eq!(stream.seek(3).await.err(), Some(StreamError::BackwardSeek));

    // The stream itself is still usable after the rejection.
    assert_eq!(reader.read().await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_seek_past_end_resolves_at_final_position() {
    // 10 chunks total; seeking to 12 stops at end-of-stream.
    let stream = SeekableStream::new(IterSource::new(0u32..10), CountStrategy::new(1), forward_only());
    let reader = stream.get_reader().unwrap();

    assert_eq!(stream.seek(12).await.unwrap(), 10);
    assert_eq!(reader.read().await.unwrap(), None);
}

#[tokio::test]
async fn test_seek_to_exact_end() {
    let stream = SeekableStream::new(IterSource::new(0u32..10), CountStrategy::new(1), forward_only());
    let reader = stream.get_reader().unwrap();

    assert_eq!(stream.seek(10).await.unwrap(), 10);
    assert_eq!(reader.read().await.unwrap(), None);
}

#[tokio::test]
async fn test_emulated_seek_without_reader_fails() {
    let stream = SeekableStream::new(IterSource::new(0u32..10), CountStrategy::new(1), forward_only());
    assert_eq!(stream.seek(3).await.err(), Some(StreamError::NoReader));
}

#[tokio::test]
async fn test_position_advances_by_strategy_size() {
    let chunks: Vec<Vec<u8>> = vec![vec![0; 3], vec![0; 4]];
    let stream = SeekableStream::new(
        IterSource::new(chunks),
        ByteLengthStrategy::new(16),
        forward_only(),
    );
    let reader = stream.get_reader().unwrap();

    reader.read().await.unwrap();
    assert_eq!(reader.current_position(), 3);
    reader.read().await.unwrap();
    assert_eq!(reader.current_position(), 7);
}

#[tokio::test]
async fn test_emulated_seek_resolves_at_chunk_boundary() {
    let chunks: Vec<Vec<u8>> = vec![vec![0; 4], vec![0; 4], vec![0; 4]];
    let stream = SeekableStream::new(
        IterSource::new(chunks),
        ByteLengthStrategy::new(16),
        forward_only(),
    );
    let reader = stream.get_reader().unwrap();

    // The target sits inside the second chunk; discarding is
    // chunk-granular, so the seek lands at its far boundary.
    assert_eq!(stream.seek(5).await.unwrap(), 8);
    assert_eq!(reader.current_position(), 8);
}

#[tokio::test]
async fn test_native_seek_delegates_to_source() {
    let (source, seeks) = NativeSeekSource::new(false);
    let stream = SeekableStream::new(source, CountStrategy::new(2), forward_only());
    assert!(stream.native_seek());
    let reader = stream.get_reader().unwrap();

    assert_eq!(stream.seek(42).await.unwrap(), 42);
    assert_eq!(seeks.lock().as_slice(), &[42]);
    assert_eq!(reader.current_position(), 42);

    // Native seek may move backwards.
    assert_eq!(stream.seek(7).await.unwrap(), 7);
    assert_eq!(reader.current_position(), 7);
}

#[tokio::test]
async fn test_native_seek_failure_errors_stream() {
    let (source, _seeks) = NativeSeekSource::new(true);
    let stream = SeekableStream::new(source, CountStrategy::new(2), forward_only());
    let reader = stream.get_reader().unwrap();

    assert_eq!(
        stream.seek(9).await.err(),
        Some(StreamError::Source("seek broke".into()))
    );
    assert_eq!(
        reader.read().await.err(),
        Some(StreamError::Source("seek broke".into()))
    );
}

#[tokio::test]
async fn test_prevent_close_holds_stream_open() {
    // Default policy: the source draining does not close the stream,
    // so a read past the last chunk stays pending.
    let stream = SeekableStream::new(
        IterSource::new(vec![1u32, 2]),
        CountStrategy::new(1),
        SeekableOptions::default(),
    );
    assert!(stream.prevent_close());
    let reader = stream.get_reader().unwrap();

    assert_eq!(reader.read().await.unwrap(), Some(1));
    assert_eq!(reader.read().await.unwrap(), Some(2));

    let pending = timeout(Duration::from_millis(50), reader.read()).await;
    assert!(pending.is_err(), "read past the end must stay pending");
}

#[tokio::test]
async fn test_get_reader_on_terminal_stream_fails() {
    let stream = SeekableStream::new(IterSource::new(0u32..), CountStrategy::new(1), forward_only());
    stream.cancel(None).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    assert_eq!(stream.get_reader().err(), Some(StreamError::NotSeekable));
}

#[tokio::test]
async fn test_seekable_reader_cancel() {
    struct Endless {
        cancelled: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Source for Endless {
        type Item = u64;

        async fn pull(&mut self, controller: &Controller<u64>) -> StreamResult<()> {
            controller.enqueue(0)
        }

        async fn cancel(&mut self, _reason: Option<String>) -> StreamResult<()> {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let cancelled = Arc::new(AtomicU64::new(0));
    let stream = SeekableStream::new(
        Endless {
            cancelled: cancelled.clone(),
        },
        CountStrategy::new(2),
        forward_only(),
    );
    let reader = stream.get_reader().unwrap();
    assert_eq!(reader.read().await.unwrap(), Some(0));

    reader.cancel(None).await.unwrap();
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(reader.read().await.unwrap(), None);
}
