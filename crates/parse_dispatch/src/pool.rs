//! Reusable record slots shared by all workers.
//!
//! The pool hands out owned records. A record leaves the pool on `acquire`
//! and comes back on `release`, either from the dispatch callback after it
//! has processed the record, or from the loop when a read produced nothing.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::example::Record;

/// Source of reusable records. Must be safe to call from every worker.
pub trait RecordPool<R>: Send + Sync {
    /// Takes a cleared record out of the pool.
    fn acquire(&self) -> R;

    /// Gives a record back to the pool.
    fn release(&self, record: R);
}

/// Free-list pool that allocates with `R::default()` when empty.
///
/// Released records are cleared before they are parked on the free list, so
/// `acquire` always returns a blank record.
pub struct ExamplePool<R> {
    free_tx: Sender<R>,
    free_rx: Receiver<R>,
    allocated: AtomicUsize,
    outstanding: AtomicUsize,
}

impl<R> ExamplePool<R>
where
    R: Record + Default,
{
    pub fn new() -> Self {
        let (free_tx, free_rx) = unbounded();
        Self {
            free_tx,
            free_rx,
            allocated: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Creates a pool with `capacity` records already allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        let pool = Self::new();
        for _ in 0..capacity {
            // The receiver lives in `pool`, so the send cannot fail.
            let _ = pool.free_tx.send(R::default());
        }
        pool.allocated.store(capacity, Ordering::Relaxed);
        pool
    }

    /// Total number of records this pool ever allocated.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Records currently handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Records sitting on the free list.
    pub fn idle(&self) -> usize {
        self.free_rx.len()
    }
}

impl<R> Default for ExamplePool<R>
where
    R: Record + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RecordPool<R> for ExamplePool<R>
where
    R: Record + Default,
{
    fn acquire(&self) -> R {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        match self.free_rx.try_recv() {
            Ok(record) => record,
            Err(_) => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                R::default()
            }
        }
    }

    fn release(&self, mut record: R) {
        record.clear();
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        let _ = self.free_tx.send(record);
    }
}
