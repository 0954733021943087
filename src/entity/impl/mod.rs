pub mod memory;

pub use memory::MemoryEntityClient;
