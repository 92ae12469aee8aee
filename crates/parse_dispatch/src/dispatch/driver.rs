//! src/dispatch/driver.rs
//!
//! `DispatchLoop`: owns the collaborators of a run and drives it.
//!
//! # Thread layout of one run
//! ```text
//!   caller ── run() ──┬── dispatch-io          (rewinds the input between passes)
//!                     ├── dispatch-worker-0    ┐
//!                     ├── dispatch-worker-1    │ read → dispatch, close passes
//!                     └── dispatch-worker-N-1  ┘
//! ```
//!
//! All threads are scoped to `run()`, borrow the collaborators, and share one
//! freshly built `SharedParserState`. `run()` returns after every thread has
//! been joined.
//!
//! # Example
//! ```ignore
//! let config = DispatchConfig::builder().num_workers(4).num_passes(2).build();
//! let dispatch_loop = DispatchLoop::new(reader, ExamplePool::new(), learner, config)?;
//! let summary = dispatch_loop.run()?;
//! ```

use anyhow::anyhow;
use std::marker::PhantomData;
use std::thread::{self, ScopedJoinHandle};

use super::callback::Dispatch;
use super::config::DispatchConfig;
use super::io::run_io_helper;
use super::state::{RunSummary, SharedParserState};
use super::thread::set_worker_id;
use super::worker::DispatchWorker;
use crate::error::{DispatchError, Result};
use crate::example::Record;
use crate::pool::RecordPool;
use crate::source::{Reader, ResetSource};

// ================================================================================================
// 1. Core Type
// ================================================================================================
/// Drives worker threads that read batches from `reader` and hand them to
/// `dispatcher`, pass after pass.
///
/// # Type parameters:
/// - `R`: record type produced by the reader
/// - `Rd`: reader, also rewound between passes
/// - `P`: pool the records come from and go back to
/// - `D`: downstream consumer
pub struct DispatchLoop<R, Rd, P, D> {
    reader: Rd,
    pool: P,
    dispatcher: D,
    config: DispatchConfig,
    _record: PhantomData<fn() -> R>,
}

// ================================================================================================
// 2. Construction
// ================================================================================================
impl<R, Rd, P, D> DispatchLoop<R, Rd, P, D>
where
    R: Record,
    Rd: Reader<R> + ResetSource,
    P: RecordPool<R>,
    D: Dispatch<R>,
{
    /// Validates `config` and bundles the collaborators. No thread is started.
    pub fn new(reader: Rd, pool: P, dispatcher: D, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            pool,
            dispatcher,
            config,
            _record: PhantomData,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn reader(&self) -> &Rd {
        &self.reader
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Gives the collaborators back.
    pub fn into_parts(self) -> (Rd, P, D) {
        (self.reader, self.pool, self.dispatcher)
    }

    // ============================================================================================
    // 3. Running
    // ============================================================================================
    /// Runs the loop to completion.
    ///
    /// Returns once the last pass is complete or the run failed; in both cases
    /// every thread has exited. The first failure stashed by any thread is
    /// the one reported. A run can be started again; each starts from pass 0
    /// with the configured pass length. Whether the input was rewound after
    /// the final pass depends on timing, so rewind it before running again.
    pub fn run(&self) -> Result<RunSummary> {
        let state = SharedParserState::new(&self.config);
        log::info!(
            "starting dispatch run: {} workers, {} passes, pass_length={:?}, max_examples={:?}",
            self.config.num_workers,
            self.config.num_passes,
            self.config.pass_length,
            self.config.max_examples
        );

        let (worker_panics, io_panicked) = thread::scope(|scope| -> Result<(Vec<usize>, bool)> {
            let state = &state;
            let reader = &self.reader;
            let pool: &dyn RecordPool<R> = &self.pool;
            let dispatcher = &self.dispatcher;

            let io = thread::Builder::new()
                .name("dispatch-io".to_string())
                .spawn_scoped(scope, move || run_io_helper(state, reader))
                .map_err(|source| DispatchError::Spawn {
                    name: "dispatch-io".to_string(),
                    source,
                })?;

            let mut workers = Vec::with_capacity(self.config.num_workers);
            for worker_id in 0..self.config.num_workers {
                let name = format!("dispatch-worker-{}", worker_id);
                let spawned = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || {
                        set_worker_id(worker_id);
                        DispatchWorker::new(worker_id, state, reader, pool, dispatcher).run();
                    });

                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(source) => {
                        state.lock_done();
                        join_workers(workers);
                        let _ = io.join();
                        return Err(DispatchError::Spawn { name, source });
                    }
                }
            }

            let worker_panics = join_workers(workers);
            // Workers mark the run done on the way out; this also covers a run
            // whose workers all panicked before touching the state.
            state.lock_done();
            let io_panicked = io.join().is_err();
            Ok((worker_panics, io_panicked))
        })?;

        if let Some(err) = state.take_error() {
            return Err(err);
        }
        if let Some(&worker_id) = worker_panics.first() {
            return Err(DispatchError::WorkerPanicked { worker_id });
        }
        if io_panicked {
            return Err(DispatchError::Reset {
                source: anyhow!("I/O helper thread panicked"),
            });
        }

        let summary = state.summary();
        log::info!(
            "dispatch run finished: {} passes, pass_length={}",
            summary.passes,
            summary.pass_length
        );
        Ok(summary)
    }
}

/// Joins every worker, returning the ids of those that panicked.
fn join_workers(workers: Vec<ScopedJoinHandle<'_, ()>>) -> Vec<usize> {
    let mut panicked = Vec::new();
    for (worker_id, handle) in workers.into_iter().enumerate() {
        if handle.join().is_err() {
            log::error!("dispatch worker {} panicked", worker_id);
            panicked.push(worker_id);
        }
    }
    panicked
}
