//! Read path: per-call reader snapshots and query execution

use crate::error::{FlowSearchError, Result};
use crate::index::registry::TenantIndexRegistry;
use crate::models::FlowRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, QueryParser, QueryParserError};
use tantivy::{IndexReader, ReloadPolicy, TantivyDocument};

/// Executes queries against a tenant's index
///
/// Each call opens and closes its own reader snapshot: a point-in-time view
/// that does not observe commits made after it was opened, and never blocks
/// concurrent writers.
pub struct FlowSearcher {
    registry: Arc<TenantIndexRegistry>,
    default_field: String,
    max_results: usize,
}

impl FlowSearcher {
    pub fn new(registry: Arc<TenantIndexRegistry>, default_field: String, max_results: usize) -> Self {
        Self {
            registry,
            default_field,
            max_results,
        }
    }

    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Parse a query string against `default_field` and execute it
    ///
    /// The grammar is tantivy's query language: `field:value` terms,
    /// bracket ranges `field:[min TO max]` with `*` for an open bound,
    /// boolean AND/OR/NOT, wildcard and phrase matching. A syntactically
    /// invalid query fails with `QueryParseError` rather than returning
    /// zero results.
    pub async fn search_text(
        &self,
        tenant_id: &str,
        default_field: &str,
        query_str: &str,
        max_results: usize,
    ) -> Result<Vec<FlowRecord>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let schema = self.registry.flow_schema();
        let tenant = self.registry.get_or_create(tenant_id)?;

        let field = schema.schema.get_field(default_field).map_err(|_| {
            FlowSearchError::QueryParseError {
                query: query_str.to_string(),
                source: QueryParserError::FieldDoesNotExist(default_field.to_string()),
            }
        })?;

        let reader = open_snapshot(tenant.index())?;
        let searcher = reader.searcher();

        let parser = QueryParser::for_index(tenant.index(), vec![field]);
        let query = parser
            .parse_query(query_str)
            .map_err(|e| FlowSearchError::QueryParseError {
                query: query_str.to_string(),
                source: e,
            })?;

        let top_docs = searcher
            .search(&*query, &TopDocs::with_limit(max_results))
            .map_err(|e| FlowSearchError::SearchFailed(format!("query execution failed: {e}")))?;

        let mut records = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| FlowSearchError::SearchFailed(format!("failed to retrieve doc: {e}")))?;
            records.push(schema.decode(&doc));
        }

        tracing::debug!(
            tenant = tenant_id,
            query = query_str,
            hits = records.len(),
            "search completed"
        );
        Ok(records)
    }

    /// Search with the configured default field and result cap
    pub async fn search_flow_records(&self, tenant_id: &str, query_str: &str) -> Result<Vec<FlowRecord>> {
        self.search_text(tenant_id, &self.default_field, query_str, self.max_results)
            .await
    }

    /// Exact source-IP match
    pub async fn search_by_source_ip(&self, tenant_id: &str, source_ip: &str) -> Result<Vec<FlowRecord>> {
        self.search_flow_records(tenant_id, &format!("sourceIP:\"{source_ip}\""))
            .await
    }

    /// Exact destination-IP match
    pub async fn search_by_dest_ip(&self, tenant_id: &str, dest_ip: &str) -> Result<Vec<FlowRecord>> {
        self.search_flow_records(tenant_id, &format!("destIP:\"{dest_ip}\""))
            .await
    }

    /// Inclusive port range on either the source or the destination port
    pub async fn search_by_port_range(
        &self,
        tenant_id: &str,
        min_port: u16,
        max_port: u16,
    ) -> Result<Vec<FlowRecord>> {
        let query = format!(
            "sourcePort:[{min_port} TO {max_port}] OR destPort:[{min_port} TO {max_port}]"
        );
        self.search_flow_records(tenant_id, &query).await
    }

    /// Inclusive timestamp range
    pub async fn search_by_time_range(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FlowRecord>> {
        let query = format!(
            "timestamp:[{} TO {}]",
            start.timestamp_millis(),
            end.timestamp_millis()
        );
        self.search_flow_records(tenant_id, &query).await
    }

    /// Flows with at least `min_bytes` forward bytes
    pub async fn search_min_bytes(&self, tenant_id: &str, min_bytes: u64) -> Result<Vec<FlowRecord>> {
        self.search_flow_records(tenant_id, &format!("bytes:[{min_bytes} TO *]"))
            .await
    }

    /// Whether the tenant has an index, without creating one as a side effect
    pub fn index_exists(&self, tenant_id: &str) -> bool {
        self.registry.has(tenant_id)
            || self
                .registry
                .base_path()
                .join(tenant_id)
                .join("meta.json")
                .exists()
    }

    /// Number of live documents, observed through a snapshot that is
    /// dropped before returning
    pub async fn document_count(&self, tenant_id: &str) -> Result<u64> {
        let tenant = self.registry.get_or_create(tenant_id)?;
        let reader = open_snapshot(tenant.index())?;
        let searcher = reader.searcher();

        let count = searcher
            .search(&AllQuery, &Count)
            .map_err(|e| FlowSearchError::SearchFailed(format!("failed to count documents: {e}")))?;
        Ok(count as u64)
    }
}

fn open_snapshot(index: &tantivy::Index) -> Result<IndexReader> {
    index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()
        .map_err(|e: tantivy::TantivyError| {
            FlowSearchError::SearchFailed(format!("failed to open reader: {e}"))
        })
}
