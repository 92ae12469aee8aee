//! Thread-local worker identification.
//!
//! Every dispatch worker records its index when it starts, so readers and
//! callbacks deep in a call stack can tell which worker they run on.

use std::cell::Cell;

thread_local! {
    /// Worker index (0 to num_workers-1), `None` outside dispatch workers.
    static WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

pub(crate) fn set_worker_id(worker_id: usize) {
    WORKER_ID.with(|id| id.set(Some(worker_id)));
}

/// Index of the dispatch worker running on this thread, if any.
pub fn current_worker_id() -> Option<usize> {
    WORKER_ID.with(Cell::get)
}
