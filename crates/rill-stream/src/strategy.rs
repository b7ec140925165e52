#![forbid(unsafe_code)]

/// Queuing strategy: how large a chunk is and how much the stream
/// should buffer ahead of demand.
///
/// Immutable after construction. `desired_size` is always computed as
/// `high_water_mark() - <buffered total>`, so the high-water mark is
/// the backpressure threshold: once the buffered total reaches it, the
/// controller stops asking the source for more data.
pub trait QueuingStrategy<T>: Send + Sync + 'static {
    /// Size of a single chunk, in whatever unit the strategy counts
    /// (elements, bytes, ...). Defaults to 1 per chunk.
    fn size(&self, chunk: &T) -> u64 {
        let _ = chunk;
        1
    }

    /// Buffer headroom target in the same unit as [`size`](Self::size).
    fn high_water_mark(&self) -> u64;
}

/// Counts every chunk as size 1.
#[derive(Debug, Clone, Copy)]
pub struct CountStrategy {
    high_water_mark: u64,
}

impl CountStrategy {
    pub fn new(high_water_mark: u64) -> Self {
        Self { high_water_mark }
    }
}

impl<T: Send + 'static> QueuingStrategy<T> for CountStrategy {
    fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }
}

/// Counts chunks by their byte length.
#[derive(Debug, Clone, Copy)]
pub struct ByteLengthStrategy {
    high_water_mark: u64,
}

impl ByteLengthStrategy {
    pub fn new(high_water_mark: u64) -> Self {
        Self { high_water_mark }
    }
}

impl<T> QueuingStrategy<T> for ByteLengthStrategy
where
    T: AsRef<[u8]> + Send + 'static,
{
    fn size(&self, chunk: &T) -> u64 {
        chunk.as_ref().len() as u64
    }

    fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }
}
