#![allow(dead_code)]

use parse_dispatch::{Batch, Dispatch, DispatchContext, Example};

use anyhow::Result;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::collections::HashSet;
use std::sync::{Barrier, Mutex};
use std::thread;
use std::time::Duration;

/// Upper bound for any single run in the integration tests. A run that takes
/// longer is treated as deadlocked.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(20);

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `n` labeled lines, the i-th carrying feature `id:i`.
pub fn numbered_lines(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("1 | id:{}", i)).collect()
}

/// Runs `f` on its own thread and fails the test if it does not return
/// within `timeout`.
pub fn run_bounded<T, F>(timeout: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(timeout) {
        Ok(value) => value,
        Err(RecvTimeoutError::Timeout) => panic!("run did not finish within {:?}", timeout),
        Err(RecvTimeoutError::Disconnected) => panic!("run thread panicked"),
    }
}

/// One dispatch call as seen by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub worker_id: usize,
    pub pass_index: u64,
    pub end_pass: bool,
    /// `id` feature of every record in the batch.
    pub ids: Vec<usize>,
}

/// Consumer that records every batch and returns the records to the pool.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    /// When set, every worker waits here on its first data batch.
    first_batch: Option<Barrier>,
    started: Mutex<HashSet<usize>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the first data batch of each of `num_workers` workers wait for
    /// the others, so every worker reads at least once.
    pub fn with_first_batch_barrier(num_workers: usize) -> Self {
        Self {
            first_batch: Some(Barrier::new(num_workers)),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn markers(&self) -> Vec<Event> {
        self.events().into_iter().filter(|e| e.end_pass).collect()
    }

    /// Ids of every data record, in dispatch order.
    pub fn record_ids(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter(|e| !e.end_pass)
            .flat_map(|e| e.ids)
            .collect()
    }
}

impl Dispatch<Example> for Recorder {
    fn dispatch(&self, ctx: &DispatchContext<'_, Example>, batch: Batch<Example>) -> Result<()> {
        let end_pass = batch.is_end_pass();
        if !end_pass {
            if let Some(barrier) = &self.first_batch {
                if self.started.lock().unwrap().insert(ctx.worker_id()) {
                    barrier.wait();
                }
            }
        }

        let event = Event {
            worker_id: ctx.worker_id(),
            pass_index: batch.pass_index(),
            end_pass,
            ids: batch
                .iter()
                .filter_map(|r| r.feature("id"))
                .map(|v| v as usize)
                .collect(),
        };
        self.events.lock().unwrap().push(event);
        ctx.finish_batch(batch);
        Ok(())
    }
}
