//! In-process storage backend, used by tests and single-node deployments

mod store;

pub use store::MemoryStore;
