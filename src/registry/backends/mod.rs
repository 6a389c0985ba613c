//! Registry backend implementations

pub mod memory;

pub use memory::{MemoryRegistry, MemoryRepository};
