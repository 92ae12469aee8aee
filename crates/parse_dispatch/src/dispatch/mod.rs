//! src/dispatch/mod.rs
//!
//! This module implements the multi-worker dispatch loop.
//!
//! Several workers pull batches of records from one shared `Reader` and hand
//! them to a `Dispatch` consumer. The input is read in passes: a pass ends
//! when a worker can no longer read (input exhausted, per-worker pass length
//! reached, example budget spent, or an early end requested), and exactly one
//! worker then closes it. Closing a pass emits one end-of-pass marker batch
//! and rewinds the input before any worker reads the next pass.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────┐
//!                   │ DispatchLoop │ ←───── DispatchConfig (workers, passes, lengths)
//!                   └──────┬───────┘
//!                          │ run(): scoped threads
//!            ┌─────────────┼──────────────┐
//!            ↓             ↓              ↓
//!       [worker 0]    [worker N-1]   [dispatch-io]
//!            │             │              │ ResetSource::reset
//!            │ Reader::read│              │ between passes
//!            ↓             ↓              │
//!      ┌───────────────────────────┐      │
//!      │     SharedParserState     │←─────┘
//!      │ pass indices, pass counts,│
//!      │ transition/termination    │
//!      │ flags, first error        │
//!      └───────────────────────────┘
//!            │
//!            │ Batch (records or end-of-pass marker)
//!            ↓
//!      ┌───────────┐
//!      │ Dispatch  │ → DispatchContext::finish → RecordPool
//!      └───────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dispatch/
//! ├── mod.rs        # Public API exports + module-level architecture docs
//! ├── config.rs     # DispatchConfig, builder, and validation
//! ├── driver.rs     # DispatchLoop: owns collaborators, spawns and joins threads
//! ├── state.rs      # SharedParserState: pass barrier, flags, error slot
//! ├── worker.rs     # Per-worker read/dispatch/transition loop
//! ├── io.rs         # I/O helper thread that rewinds the input
//! ├── callback.rs   # Dispatch trait and DispatchContext
//! └── thread.rs     # Thread-local worker ID
//! ```
//!
//! # Guarantees
//! - Every pass boundary is executed by exactly one worker and produces
//!   exactly one marker batch, dispatched before any worker reads the next
//!   pass.
//! - Within one worker, batches reach the consumer in read order.
//! - Every thread exits on every path: success, error, and panic all mark
//!   the run done and wake every waiter.
//! - The first failure wins; later failures are logged and dropped.
//!
//! # Example Usage
//!
//! ```ignore
//! let reader = TxtReader::open("train.txt")?;
//! let config = DispatchConfig::builder()
//!     .num_workers(4)
//!     .num_passes(2)
//!     .build();
//!
//! let learner = |ctx: &DispatchContext<'_, Example>, batch: Batch<Example>| {
//!     if !batch.is_end_pass() {
//!         // learn from batch.records()
//!     }
//!     ctx.finish_batch(batch);
//!     Ok(())
//! };
//!
//! let summary = DispatchLoop::new(reader, ExamplePool::new(), learner, config)?.run()?;
//! ```

mod callback;
mod config;
mod driver;
mod io;
mod state;
mod thread;
mod worker;

pub use callback::{Dispatch, DispatchContext};
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use driver::DispatchLoop;
pub use state::{RunSummary, SharedParserState};
pub use thread::current_worker_id;
