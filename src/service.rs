//! Engine facade tying the write path, read path, filtering and projection
//! together behind the surface external collaborators call

use crate::config::EngineConfig;
use crate::error::Result;
use crate::filter;
use crate::index::{FlowIndexer, FlowSearcher, TenantIndexRegistry};
use crate::models::FlowRecord;
use crate::projection;
use std::sync::Arc;

/// One search request: a query string plus optional filter, sort and paging
#[derive(Debug, Clone)]
pub struct FlowQuery {
    /// Query string in the text-search grammar
    pub query: String,

    /// Field unprefixed terms match against; engine default when None
    pub default_field: Option<String>,

    /// Filter expression applied to materialized results
    pub filter: Option<String>,

    /// Sort field applied after filtering
    pub sort_by: Option<String>,

    /// Sort direction
    pub descending: bool,

    /// Records to skip after sorting
    pub skip: Option<i64>,

    /// Page size; unbounded when None or negative
    pub limit: Option<i64>,

    /// Cap on raw search hits before filtering; engine default when None
    pub max_results: Option<usize>,
}

impl FlowQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            default_field: None,
            filter: None,
            sort_by: None,
            descending: false,
            skip: None,
            limit: None,
            max_results: None,
        }
    }

    pub fn with_default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = Some(field.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_by = Some(field.into());
        self.descending = descending;
        self
    }

    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Multi-tenant flow-record search engine
///
/// External collaborators interact with the core only through this type:
/// "index this record", "delete this record by id", "search for records
/// matching X", and "does tenant T have an index".
pub struct FlowSearchEngine {
    registry: Arc<TenantIndexRegistry>,
    indexer: FlowIndexer,
    searcher: FlowSearcher,
}

impl FlowSearchEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let registry = Arc::new(TenantIndexRegistry::new(
            &config.base_path,
            config.fallback_to_memory,
        ));
        let indexer = FlowIndexer::new(Arc::clone(&registry), config.writer_heap_size);
        let searcher = FlowSearcher::new(
            Arc::clone(&registry),
            config.default_field.clone(),
            config.max_results,
        );

        tracing::info!(base_path = %config.base_path.display(), "flow search engine initialized");
        Ok(Self {
            registry,
            indexer,
            searcher,
        })
    }

    /// Insert or replace one flow record
    pub async fn upsert(&self, tenant_id: &str, record: &FlowRecord) -> Result<()> {
        self.indexer.upsert(tenant_id, record).await
    }

    /// Insert or replace a batch of flow records under one commit
    pub async fn upsert_many(&self, tenant_id: &str, records: &[FlowRecord]) -> Result<usize> {
        self.indexer.upsert_many(tenant_id, records).await
    }

    /// Delete one flow record by id
    pub async fn delete(&self, tenant_id: &str, record_id: &str) -> Result<()> {
        self.indexer.delete(tenant_id, record_id).await
    }

    /// Execute the read-path pipeline: text search, then filter expression,
    /// then sort, then paging
    pub async fn search(&self, tenant_id: &str, query: &FlowQuery) -> Result<Vec<FlowRecord>> {
        let default_field = query
            .default_field
            .as_deref()
            .unwrap_or_else(|| self.searcher.default_field());
        let max_results = query.max_results.unwrap_or_else(|| self.searcher.max_results());

        let mut records = self
            .searcher
            .search_text(tenant_id, default_field, &query.query, max_results)
            .await?;

        if let Some(filter_text) = &query.filter {
            records = filter::apply(filter_text, records);
        }
        if let Some(sort_field) = &query.sort_by {
            records = projection::sort_records(records, sort_field, query.descending);
        }
        Ok(projection::page_records(records, query.skip, query.limit))
    }

    /// Whether the tenant has an index; no side effects
    pub fn has_index(&self, tenant_id: &str) -> bool {
        self.searcher.index_exists(tenant_id)
    }

    /// Number of live documents in the tenant's index
    pub async fn document_count(&self, tenant_id: &str) -> Result<u64> {
        self.searcher.document_count(tenant_id).await
    }

    /// Close one tenant's handle; no-op if absent
    pub fn close_tenant(&self, tenant_id: &str) -> bool {
        self.registry.close(tenant_id)
    }

    /// Close every tenant handle; called once at process teardown
    pub fn shutdown(&self) {
        self.registry.close_all();
    }

    pub fn indexer(&self) -> &FlowIndexer {
        &self.indexer
    }

    pub fn searcher(&self) -> &FlowSearcher {
        &self.searcher
    }

    pub fn registry(&self) -> &Arc<TenantIndexRegistry> {
        &self.registry
    }
}
