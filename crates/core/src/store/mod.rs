//! Store adapters.

mod memory_store;

pub use memory_store::InMemoryDocumentStore;
