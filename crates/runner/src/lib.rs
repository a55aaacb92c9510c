pub mod importer;
pub mod input;
pub mod version;

pub use importer::{ImportError, ImportSession, ImportSummary};
pub use input::{
    Batcher, InputSource, read_documents, settle, sources, spawn_reader,
};
