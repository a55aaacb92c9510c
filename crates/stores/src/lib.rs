//! Local [`DocumentStore`](docport_core::DocumentStore) backends.
//!
//! Both stores keep the schema bytes exactly as pushed and check inserted
//! documents against them, failing with `NotFound` for a missing collection
//! and `InvalidArgument` for documents the schema does not admit.

mod file_store;
mod mem_store;
mod validate;

pub use file_store::FileDocumentStore;
pub use mem_store::MemDocumentStore;
