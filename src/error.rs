//! Error types for the search engine core

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, FlowSearchError>;

/// Errors surfaced by the indexing and search paths
#[derive(Debug, thiserror::Error)]
pub enum FlowSearchError {
    /// Encode-time validation failure; raised before any I/O is attempted
    #[error("invalid flow record: {0}")]
    InvalidRecord(String),

    /// Tenant identifier is not usable as a filesystem path segment
    #[error("invalid tenant id: {0:?}")]
    InvalidTenant(String),

    /// Persistent backend creation failed and the in-memory fallback is disabled
    #[error("storage unavailable for tenant {tenant_id}: {reason}")]
    StorageUnavailable { tenant_id: String, reason: String },

    /// I/O failure during an upsert or delete commit; the commit did not happen
    #[error("index write failed for tenant {tenant_id}, record {record_id}: {source}")]
    IndexWriteFailed {
        tenant_id: String,
        record_id: String,
        #[source]
        source: tantivy::TantivyError,
    },

    /// Malformed query string, surfaced verbatim with the offending input
    #[error("failed to parse query {query:?}: {source}")]
    QueryParseError {
        query: String,
        #[source]
        source: tantivy::query::QueryParserError,
    },

    /// Search execution failed
    #[error("search execution failed: {0}")]
    SearchFailed(String),

    /// Index open or schema setup failed
    #[error("index initialization failed: {0}")]
    IndexInitFailed(String),
}

impl From<tantivy::TantivyError> for FlowSearchError {
    fn from(err: tantivy::TantivyError) -> Self {
        FlowSearchError::SearchFailed(err.to_string())
    }
}
