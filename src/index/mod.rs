//! Per-tenant index storage, the document codec, and the write/read paths

mod document;
mod reader;
mod registry;
mod writer;

pub use document::FlowSchema;
pub use reader::FlowSearcher;
pub use registry::{StorageBackend, TenantIndex, TenantIndexRegistry};
pub use writer::FlowIndexer;
