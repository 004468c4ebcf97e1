//! Store adapters.

/// In-process store implementations.
pub mod memory;

pub use memory::{InMemoryIdentityStore, InMemoryTaskStore};
