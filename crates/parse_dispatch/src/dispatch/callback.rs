//! src/dispatch/callback.rs
//!
//! The downstream side of the loop: the `Dispatch` trait a consumer
//! implements and the `DispatchContext` it receives with every batch.

use anyhow::Result;

use super::state::SharedParserState;
use crate::batch::Batch;
use crate::pool::RecordPool;

/// Receives every batch the workers produce.
///
/// Called concurrently from all workers with different batches. The batch is
/// moved in; the implementation owns its records and is expected to hand
/// them back with [`DispatchContext::finish`] or
/// [`DispatchContext::finish_batch`] once it is done with them.
///
/// Besides one call per successful read, each pass boundary produces one
/// call with a singleton marker batch (`batch.is_end_pass()`), made before
/// any worker starts reading the next pass.
pub trait Dispatch<R>: Send + Sync {
    fn dispatch(&self, ctx: &DispatchContext<'_, R>, batch: Batch<R>) -> Result<()>;
}

impl<R, F> Dispatch<R> for F
where
    F: Fn(&DispatchContext<'_, R>, Batch<R>) -> Result<()> + Send + Sync,
{
    fn dispatch(&self, ctx: &DispatchContext<'_, R>, batch: Batch<R>) -> Result<()> {
        self(ctx, batch)
    }
}

/// What a dispatch call knows about where its batch came from.
pub struct DispatchContext<'a, R> {
    worker_id: usize,
    pass_index: u64,
    pool: &'a dyn RecordPool<R>,
    state: &'a SharedParserState,
}

impl<'a, R> DispatchContext<'a, R> {
    pub(crate) fn new(
        worker_id: usize,
        pass_index: u64,
        pool: &'a dyn RecordPool<R>,
        state: &'a SharedParserState,
    ) -> Self {
        Self {
            worker_id,
            pass_index,
            pool,
            state,
        }
    }

    /// Worker that produced the batch (0 to num_workers-1).
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Pass the batch belongs to.
    pub fn pass_index(&self) -> u64 {
        self.pass_index
    }

    /// Returns one processed record to the pool.
    pub fn finish(&self, record: R) {
        self.pool.release(record);
    }

    /// Returns every record of a processed batch to the pool.
    pub fn finish_batch(&self, batch: Batch<R>) {
        for record in batch {
            self.pool.release(record);
        }
    }

    pub fn pool(&self) -> &'a dyn RecordPool<R> {
        self.pool
    }

    /// True once the run is ending; long-running callbacks may bail out.
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Ends the current pass early. Workers stop reading, the records already
    /// read are still dispatched, then the pass boundary runs as usual.
    pub fn request_pass_end(&self) {
        self.state.request_pass_end();
    }
}
