pub mod memory;
pub mod txt;

pub use memory::MemoryReader;
pub use txt::TxtReader;
