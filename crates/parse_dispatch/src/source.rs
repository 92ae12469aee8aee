use crate::pool::RecordPool;
use anyhow::Result;

/// A `Reader` fills batches from an underlying input.
///
/// `read` is called concurrently by every worker, each passing its own
/// [`ReadScratch`]. On entry `batch` holds one blank record acquired by the
/// worker; the reader fills it and may append more records taken from `pool`.
///
/// `limit` is the most records the worker may still take in this pass; it is
/// always at least 1. A reader that produces more fails the worker.
///
/// Returns the number of records produced. `Ok(0)` means the input for the
/// current pass is exhausted; in that case the reader must leave `batch` as
/// it found it (one blank record). Implementations may block waiting for
/// upstream input.
pub trait Reader<R>: Send + Sync {
    fn read(
        &self,
        batch: &mut Vec<R>,
        limit: usize,
        pool: &dyn RecordPool<R>,
        scratch: &mut ReadScratch,
    ) -> Result<usize>;
}

/// Rewinds an input to its start so the next pass can be read.
///
/// Called only from the I/O helper thread, once per pass boundary, while no
/// worker is inside `Reader::read`.
pub trait ResetSource: Send + Sync {
    fn reset(&self) -> Result<()>;
}

/// Per-worker scratch space reused across reads.
#[derive(Debug, Default)]
pub struct ReadScratch {
    /// Raw text of the last line read.
    pub line: String,
    /// Records this worker has read since it started.
    pub records_read: usize,
}

impl ReadScratch {
    pub fn new() -> Self {
        Self::default()
    }
}
