//! src/dispatch/state.rs
//!
//! Shared parser state: the one object every worker of a run holds.
//!
//! # Locking discipline
//! - `PassState` (pass indices, pass counters, reset tickets) is only touched
//!   under the `pass` mutex, through the methods below.
//! - `TransitionFlags` gate reading around a pass boundary. They are atomics
//!   so the read path never takes a lock.
//! - `TerminationFlags` only ever go from false to true.
//!
//! Every condition variable is waited on with the `pass` mutex and every
//! notification is issued while holding it, so a waiter cannot check its
//! predicate and then miss the wake-up.
//!
//! # Transition protocol
//! ```text
//!  claim         current += 1, in_transition = true       (one winner)
//!  drain         wait until no reader of the closing pass is active
//!  reset         done_with_io = true, wake the I/O helper
//!  bookkeeping   passes_complete += 1, pass_length growth
//!  marker        dispatch end-of-pass batch                 (worker.rs)
//!  finish?       last_pass_complete = true, lock_done
//!  reset ack     wait for the I/O helper
//!  complete      next += 1, in_transition = false, wake parked workers
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use super::config::DispatchConfig;
use crate::error::DispatchError;

/// Snapshot of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Pass boundaries crossed during the run.
    pub passes: u64,
    /// `passes_complete` when the run ended.
    pub passes_complete: usize,
    /// `pass_length` when the run ended, after any growth.
    pub pass_length: usize,
    pub last_pass_complete: bool,
}

#[derive(Debug)]
struct PassState {
    current_pass_index: u64,
    next_pass_index: u64,
    passes_complete: usize,
    resets_requested: u64,
    resets_completed: u64,
}

/// Flags that gate reading around a pass boundary.
#[derive(Debug, Default)]
struct TransitionFlags {
    /// Mirrors `current_pass_index != next_pass_index`.
    in_transition: AtomicBool,
    /// Ask the workers to stop reading the current pass early.
    reset_requested: AtomicBool,
    /// A source reset is waiting for the I/O helper.
    done_with_io: AtomicBool,
    /// Mirrors `next_pass_index`.
    settled_pass: AtomicU64,
    /// Workers between `enter_read` and the end of their dispatch.
    active_readers: AtomicUsize,
}

#[derive(Debug, Default)]
struct TerminationFlags {
    done: AtomicBool,
    last_pass_complete: AtomicBool,
}

/// State shared by all workers of one run.
#[derive(Debug)]
pub struct SharedParserState {
    pass: Mutex<PassState>,
    /// Parked workers wait here for the pass index to settle.
    pass_settled: Condvar,
    /// The I/O helper waits here for reset requests.
    io_request: Condvar,
    /// The transitioning worker waits here for readers to drain and for the
    /// I/O helper to finish a reset.
    transition_progress: Condvar,
    transition: TransitionFlags,
    termination: TerminationFlags,
    stashed_error: Mutex<Option<DispatchError>>,
    /// Read without the lock by workers deciding whether to read; written
    /// only under `pass`, together with `passes_complete`.
    pass_length: AtomicUsize,
    num_passes: usize,
    max_examples: usize,
}

impl SharedParserState {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            pass: Mutex::new(PassState {
                current_pass_index: 0,
                next_pass_index: 0,
                passes_complete: 0,
                resets_requested: 0,
                resets_completed: 0,
            }),
            pass_settled: Condvar::new(),
            io_request: Condvar::new(),
            transition_progress: Condvar::new(),
            transition: TransitionFlags::default(),
            termination: TerminationFlags::default(),
            stashed_error: Mutex::new(None),
            pass_length: AtomicUsize::new(config.effective_pass_length()),
            num_passes: config.num_passes,
            max_examples: config.effective_max_examples(),
        }
    }

    // ========== Observers ==========

    pub fn is_done(&self) -> bool {
        self.termination.done.load(Ordering::SeqCst)
    }

    pub fn last_pass_complete(&self) -> bool {
        self.termination.last_pass_complete.load(Ordering::SeqCst)
    }

    /// The most recent pass every worker may read.
    pub fn settled_pass(&self) -> u64 {
        self.transition.settled_pass.load(Ordering::SeqCst)
    }

    /// `(current_pass_index, next_pass_index)`
    pub fn pass_indices(&self) -> (u64, u64) {
        let pass = self.pass.lock();
        (pass.current_pass_index, pass.next_pass_index)
    }

    pub fn pass_length(&self) -> usize {
        self.pass_length.load(Ordering::SeqCst)
    }

    pub fn passes_complete(&self) -> usize {
        self.pass.lock().passes_complete
    }

    pub fn num_passes(&self) -> usize {
        self.num_passes
    }

    pub fn max_examples(&self) -> usize {
        self.max_examples
    }

    pub fn reset_requested(&self) -> bool {
        self.transition.reset_requested.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> RunSummary {
        let pass = self.pass.lock();
        RunSummary {
            passes: pass.current_pass_index,
            passes_complete: pass.passes_complete,
            pass_length: self.pass_length(),
            last_pass_complete: self.last_pass_complete(),
        }
    }

    // ========== Termination ==========

    /// Marks the run done and wakes every thread that could be waiting on
    /// this state. Safe to call any number of times from any thread.
    pub fn lock_done(&self) {
        if !self.termination.done.swap(true, Ordering::SeqCst) {
            log::debug!("dispatch run marked done");
        }
        let _pass = self.pass.lock();
        self.pass_settled.notify_all();
        self.io_request.notify_all();
        self.transition_progress.notify_all();
    }

    /// Records `err` as the failure of this run unless one is already there.
    /// Returns whether `err` was stored.
    pub(crate) fn stash_error(&self, err: DispatchError) -> bool {
        let mut slot = self.stashed_error.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(err);
        true
    }

    pub fn has_error(&self) -> bool {
        self.stashed_error.lock().is_some()
    }

    /// Removes the stashed failure, if any.
    pub fn take_error(&self) -> Option<DispatchError> {
        self.stashed_error.lock().take()
    }

    // ========== Read gate ==========

    /// Ends the current pass early: workers stop reading and one of them
    /// performs the transition.
    pub fn request_pass_end(&self) {
        self.transition.reset_requested.store(true, Ordering::SeqCst);
    }

    /// Registers the caller as a reader of `observed_pass`.
    ///
    /// Returns `None` when the pass is closing or already closed, the run is
    /// done, or a pass end was requested. The guard must be held until the
    /// records read under it have been dispatched.
    pub(crate) fn enter_read(&self, observed_pass: u64) -> Option<ReadGuard<'_>> {
        self.transition.active_readers.fetch_add(1, Ordering::SeqCst);
        let guard = ReadGuard { state: self };

        // `complete` stores `settled_pass` before clearing `in_transition`, so
        // checking them in this order cannot miss a pass that just closed.
        if self.transition.in_transition.load(Ordering::SeqCst)
            || self.settled_pass() != observed_pass
            || self.reset_requested()
            || self.is_done()
        {
            return None;
        }
        Some(guard)
    }

    fn leave_read(&self) {
        let previous = self
            .transition
            .active_readers
            .fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.transition.in_transition.load(Ordering::SeqCst) {
            let _pass = self.pass.lock();
            self.transition_progress.notify_all();
        }
    }

    // ========== Pass barrier ==========

    /// Claims the transition that closes `observed_pass`.
    ///
    /// Succeeds for exactly one caller per pass boundary: the check that no
    /// transition is in progress and the increment of `current_pass_index`
    /// happen under one lock. Callers whose `observed_pass` is already closed
    /// are refused, so a late failed read cannot close the following pass.
    pub(crate) fn try_begin_transition(&self, observed_pass: u64) -> Option<PassTransition<'_>> {
        let mut pass = self.pass.lock();
        if pass.current_pass_index != pass.next_pass_index
            || pass.next_pass_index != observed_pass
            || self.last_pass_complete()
            || self.is_done()
        {
            return None;
        }
        pass.current_pass_index += 1;
        self.transition.in_transition.store(true, Ordering::SeqCst);
        log::debug!("closing pass {}", observed_pass);

        Some(PassTransition {
            state: self,
            pass_index: observed_pass,
        })
    }

    /// Blocks until no transition is in progress, the last pass is complete,
    /// or the run is done.
    pub(crate) fn park_until_pass_settled(&self) {
        let mut pass = self.pass.lock();
        while pass.current_pass_index != pass.next_pass_index
            && !self.last_pass_complete()
            && !self.is_done()
        {
            self.pass_settled.wait(&mut pass);
        }
    }

    // ========== I/O helper ==========

    /// Blocks the I/O helper until a reset is requested (`true`) or the run
    /// is done (`false`).
    pub(crate) fn wait_for_reset_request(&self) -> bool {
        let mut pass = self.pass.lock();
        loop {
            if self.is_done() {
                return false;
            }
            if self.transition.done_with_io.swap(false, Ordering::SeqCst) {
                return true;
            }
            self.io_request.wait(&mut pass);
        }
    }

    /// Acknowledges the oldest outstanding reset request.
    pub(crate) fn finish_reset(&self) {
        let mut pass = self.pass.lock();
        pass.resets_completed += 1;
        self.transition_progress.notify_all();
    }
}

/// Proof that the holder is reading (and dispatching) records of a pass.
pub(crate) struct ReadGuard<'a> {
    state: &'a SharedParserState,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.state.leave_read();
    }
}

/// The right, held by exactly one worker, to close one pass.
pub(crate) struct PassTransition<'a> {
    state: &'a SharedParserState,
    pass_index: u64,
}

impl PassTransition<'_> {
    /// The pass being closed.
    pub(crate) fn pass_index(&self) -> u64 {
        self.pass_index
    }

    /// Waits until every worker that was reading the closing pass has
    /// dispatched what it read.
    pub(crate) fn wait_for_readers(&self) {
        let state = self.state;
        let mut pass = state.pass.lock();
        while state.transition.active_readers.load(Ordering::SeqCst) > 0 && !state.is_done() {
            state.transition_progress.wait(&mut pass);
        }
    }

    /// Asks the I/O helper to rewind the source. Returns the ticket to pass
    /// to [`wait_for_reset`](Self::wait_for_reset).
    pub(crate) fn request_reset(&self) -> u64 {
        let state = self.state;
        let mut pass = state.pass.lock();
        pass.resets_requested += 1;
        state.transition.done_with_io.store(true, Ordering::SeqCst);
        state.io_request.notify_one();
        log::debug!("requested source reset #{}", pass.resets_requested);
        pass.resets_requested
    }

    /// Clears a mid-pass reset request and counts the pass as complete.
    pub(crate) fn mark_pass_complete(&self) -> usize {
        self.state
            .transition
            .reset_requested
            .store(false, Ordering::SeqCst);
        let mut pass = self.state.pass.lock();
        pass.passes_complete += 1;
        pass.passes_complete
    }

    /// Applies the growth rule: once every scheduled pass has run and the
    /// closing worker read exactly `pass_length` records, start over with a
    /// pass of `2 * pass_length + 1`. Returns whether the pass length grew.
    pub(crate) fn grow_pass_length(&self, example_number: usize) -> bool {
        let mut pass = self.state.pass.lock();
        let pass_length = self.state.pass_length();
        if pass.passes_complete == self.state.num_passes && example_number == pass_length {
            let grown = pass_length.saturating_mul(2).saturating_add(1);
            pass.passes_complete = 0;
            self.state.pass_length.store(grown, Ordering::SeqCst);
            log::debug!("pass length grew to {}", grown);
            return true;
        }
        false
    }

    /// Whether this transition ends the run.
    pub(crate) fn is_final(&self, example_number: usize) -> bool {
        let pass = self.state.pass.lock();
        pass.passes_complete >= self.state.num_passes && self.state.max_examples >= example_number
    }

    /// Marks the last pass complete and ends the run.
    pub(crate) fn finish_run(&self) {
        self.state
            .termination
            .last_pass_complete
            .store(true, Ordering::SeqCst);
        self.state.lock_done();
    }

    /// Waits for the I/O helper to acknowledge reset `ticket`.
    pub(crate) fn wait_for_reset(&self, ticket: u64) {
        let state = self.state;
        let mut pass = state.pass.lock();
        while pass.resets_completed < ticket && !state.is_done() {
            state.transition_progress.wait(&mut pass);
        }
    }

    /// Settles the pass index and releases every parked worker.
    pub(crate) fn complete(self) {
        let state = self.state;
        let mut pass = state.pass.lock();
        pass.next_pass_index += 1;
        state
            .transition
            .settled_pass
            .store(pass.next_pass_index, Ordering::SeqCst);
        state
            .transition
            .in_transition
            .store(false, Ordering::SeqCst);
        state.pass_settled.notify_all();
    }
}
