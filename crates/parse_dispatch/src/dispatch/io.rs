//! src/dispatch/io.rs
//!
//! The I/O helper: one thread per run that rewinds the input between passes.
//!
//! The transitioning worker posts a reset request and waits for the helper to
//! acknowledge it before it releases the parked workers, so no worker ever
//! reads a half-rewound input.

use super::state::SharedParserState;
use crate::error::DispatchError;
use crate::source::ResetSource;

/// Serves reset requests until the run is done.
///
/// A failed reset is stashed as [`DispatchError::Reset`] and ends the run.
pub(crate) fn run_io_helper<S>(state: &SharedParserState, source: &S)
where
    S: ResetSource + ?Sized,
{
    let mut resets = 0usize;
    while state.wait_for_reset_request() {
        match source.reset() {
            Ok(()) => {
                resets += 1;
                log::debug!("input source reset #{}", resets);
                state.finish_reset();
            }
            Err(err) => {
                log::error!("input source reset failed: {:#}", err);
                state.stash_error(DispatchError::Reset { source: err });
                state.lock_done();
                return;
            }
        }
    }
    log::debug!("I/O helper exiting after {} resets", resets);
}
