pub mod batch;
pub mod dispatch;
pub mod error;
pub mod example;
pub mod pool;
pub mod readers;
pub mod source;

pub use batch::Batch;
pub use dispatch::{
    current_worker_id, Dispatch, DispatchConfig, DispatchContext, DispatchLoop, RunSummary,
    SharedParserState,
};
pub use error::{DispatchError, ParseError};
pub use example::{Example, Feature, Record};
pub use pool::{ExamplePool, RecordPool};
pub use readers::{MemoryReader, TxtReader};
pub use source::{ReadScratch, Reader, ResetSource};
