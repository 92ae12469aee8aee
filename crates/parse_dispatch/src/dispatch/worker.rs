//! src/dispatch/worker.rs
//!
//! The per-worker dispatch loop.
//!
//! Each worker repeats one step until the run is done:
//!
//! ```text
//!            ┌──────────────┐   produced > 0   ┌──────────────┐
//!   loop ───►│ read a batch ├─────────────────►│   dispatch   │──► loop
//!            └──────┬───────┘                  └──────────────┘
//!                   │ nothing read (input exhausted, pass length
//!                   │ reached, budget spent, pass end requested)
//!                   ↓
//!            ┌──────────────┐  claimed         ┌──────────────┐
//!            │ claim closing├─────────────────►│   end_pass   │──► loop
//!            │   the pass   │                  └──────────────┘
//!            └──────┬───────┘
//!                   │ someone else is closing it
//!                   ↓
//!              park until the pass index settles ──► loop
//! ```
//!
//! A worker's `example_number` counts the records it read in the pass it is
//! currently reading. It goes back to zero when the worker closes a pass and
//! when it first observes a newly settled pass.

use anyhow::{bail, Context, Result};
use std::thread;

use super::callback::{Dispatch, DispatchContext};
use super::state::{PassTransition, SharedParserState};
use crate::batch::Batch;
use crate::error::DispatchError;
use crate::example::Record;
use crate::pool::RecordPool;
use crate::source::{ReadScratch, Reader};

pub(crate) struct DispatchWorker<'a, R, Rd: ?Sized, D: ?Sized> {
    worker_id: usize,
    state: &'a SharedParserState,
    reader: &'a Rd,
    pool: &'a dyn RecordPool<R>,
    dispatcher: &'a D,
    /// Records read in `pass_index` so far.
    example_number: usize,
    /// Last settled pass this worker observed.
    pass_index: u64,
    scratch: ReadScratch,
}

impl<'a, R, Rd, D> DispatchWorker<'a, R, Rd, D>
where
    R: Record,
    Rd: Reader<R> + ?Sized,
    D: Dispatch<R> + ?Sized,
{
    pub(crate) fn new(
        worker_id: usize,
        state: &'a SharedParserState,
        reader: &'a Rd,
        pool: &'a dyn RecordPool<R>,
        dispatcher: &'a D,
    ) -> Self {
        Self {
            worker_id,
            state,
            reader,
            pool,
            dispatcher,
            example_number: 0,
            pass_index: state.settled_pass(),
            scratch: ReadScratch::new(),
        }
    }

    /// Runs the loop until the run is done, then marks it done for everyone.
    ///
    /// A failure is stashed on the shared state (first one wins) before the
    /// run is marked done, so the driver can report it after joining.
    pub(crate) fn run(mut self) {
        let _done = DoneOnExit {
            state: self.state,
            worker_id: self.worker_id,
        };

        if let Err(err) = self.dispatch_loop() {
            self.report(err);
        }
        log::debug!(
            "worker {} exiting after {} records",
            self.worker_id,
            self.scratch.records_read
        );
    }

    fn report(&self, err: anyhow::Error) {
        let err = DispatchError::from_worker(self.example_number, err);
        log::error!("worker {}: {}", self.worker_id, err);
        if !self.state.stash_error(err) {
            log::debug!("worker {}: an earlier failure is already stashed", self.worker_id);
        }
    }

    fn dispatch_loop(&mut self) -> Result<()> {
        let state = self.state;
        while !state.is_done() {
            let observed = state.settled_pass();
            if observed != self.pass_index {
                self.pass_index = observed;
                self.example_number = 0;
            }

            let mut records = vec![self.pool.acquire()];

            let limit = self.read_limit();
            if limit > 0 {
                if let Some(_reading) = state.enter_read(observed) {
                    let read = self
                        .reader
                        .read(&mut records, limit, self.pool, &mut self.scratch);
                    let produced = match read {
                        Ok(produced) if produced > limit => {
                            self.release_all(records);
                            bail!(
                                "worker {}: reader returned {} records, at most {} allowed",
                                self.worker_id,
                                produced,
                                limit
                            );
                        }
                        Ok(produced) => produced,
                        Err(err) => {
                            self.release_all(records);
                            return Err(err).with_context(|| {
                                format!("worker {} failed to read", self.worker_id)
                            });
                        }
                    };

                    if produced > 0 {
                        for record in records.iter_mut() {
                            record.setup();
                        }
                        self.example_number += produced;
                        self.dispatch(Batch::new(records, observed))?;
                        continue;
                    }
                }
            }

            let marker = self.keep_one(records);
            match state.try_begin_transition(observed) {
                Some(transition) => self.end_pass(transition, marker)?,
                None => {
                    self.pool.release(marker);
                    log::debug!("worker {} parked after pass {}", self.worker_id, observed);
                    state.park_until_pass_settled();
                }
            }
        }
        Ok(())
    }

    /// Records this worker may still read in the current pass, bounded by the
    /// pass length and the example budget. Zero means the worker must not read.
    fn read_limit(&self) -> usize {
        self.state
            .pass_length()
            .min(self.state.max_examples())
            .saturating_sub(self.example_number)
    }

    /// Closes the pass this worker just failed to read from.
    fn end_pass(&mut self, transition: PassTransition<'_>, marker: R) -> Result<()> {
        let pass_index = transition.pass_index();

        transition.wait_for_readers();
        let ticket = transition.request_reset();
        let passes_complete = transition.mark_pass_complete();

        let batch = Batch::end_of_pass(marker, pass_index);
        transition.grow_pass_length(self.example_number);
        self.dispatch(batch)
            .with_context(|| format!("dispatching end of pass {}", pass_index))?;

        if transition.is_final(self.example_number) {
            transition.finish_run();
        }
        log::info!(
            "pass {} complete ({} records from worker {}, passes_complete={})",
            pass_index,
            self.example_number,
            self.worker_id,
            passes_complete
        );

        self.example_number = 0;
        transition.wait_for_reset(ticket);
        transition.complete();
        Ok(())
    }

    fn dispatch(&self, batch: Batch<R>) -> Result<()> {
        let ctx = DispatchContext::new(self.worker_id, batch.pass_index(), self.pool, self.state);
        self.dispatcher.dispatch(&ctx, batch)
    }

    /// Keeps the first slot of a failed read for the pass marker and returns
    /// the rest to the pool.
    fn keep_one(&self, records: Vec<R>) -> R {
        let mut records = records.into_iter();
        let kept = records.next().unwrap_or_else(|| self.pool.acquire());
        for extra in records {
            self.pool.release(extra);
        }
        kept
    }

    fn release_all(&self, records: Vec<R>) {
        for record in records {
            self.pool.release(record);
        }
    }
}

/// Marks the run done when the worker leaves its loop, however it leaves.
struct DoneOnExit<'a> {
    state: &'a SharedParserState,
    worker_id: usize,
}

impl Drop for DoneOnExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::warn!("worker {} panicked, stopping the run", self.worker_id);
        }
        self.state.lock_done();
    }
}
