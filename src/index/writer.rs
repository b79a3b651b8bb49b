//! Write path: transactional upserts and deletes against a tenant's index

use crate::error::{FlowSearchError, Result};
use crate::models::FlowRecord;
use crate::index::registry::TenantIndexRegistry;
use std::sync::Arc;
use tantivy::{IndexWriter, Term};

/// Applies upserts and deletes keyed by the flow `id`
///
/// One writer is opened, committed and closed per call. Simple and correct,
/// not optimized for high-frequency single-record writes; `upsert_many`
/// amortizes one writer and commit over a batch.
pub struct FlowIndexer {
    registry: Arc<TenantIndexRegistry>,
    writer_heap_size: usize,
}

impl FlowIndexer {
    pub fn new(registry: Arc<TenantIndexRegistry>, writer_heap_size: usize) -> Self {
        Self {
            registry,
            writer_heap_size,
        }
    }

    /// Insert or replace the document whose `id` equals the record's id
    pub async fn upsert(&self, tenant_id: &str, record: &FlowRecord) -> Result<()> {
        let schema = self.registry.flow_schema();
        // Fail fast on invalid records, before any I/O
        let doc = schema.encode(record)?;

        let tenant = self.registry.get_or_create(tenant_id)?;
        let _guard = tenant.write_guard().await;

        let mut writer: IndexWriter = tenant
            .index()
            .writer(self.writer_heap_size)
            .map_err(|e| write_failed(tenant_id, &record.id, e))?;

        writer.delete_term(Term::from_field_text(schema.id, &record.id));
        writer
            .add_document(doc)
            .map_err(|e| write_failed(tenant_id, &record.id, e))?;
        writer
            .commit()
            .map_err(|e| write_failed(tenant_id, &record.id, e))?;

        tracing::debug!(tenant = tenant_id, record = %record.id, "upserted flow record");
        Ok(())
    }

    /// Upsert a batch of records under a single writer and commit
    ///
    /// Any invalid record aborts the whole batch before I/O is attempted;
    /// a commit failure means none of the batch became visible.
    pub async fn upsert_many(&self, tenant_id: &str, records: &[FlowRecord]) -> Result<usize> {
        let schema = self.registry.flow_schema();
        let docs = records
            .iter()
            .map(|record| schema.encode(record).map(|doc| (record.id.as_str(), doc)))
            .collect::<Result<Vec<_>>>()?;

        if docs.is_empty() {
            return Ok(0);
        }

        let tenant = self.registry.get_or_create(tenant_id)?;
        let _guard = tenant.write_guard().await;

        let mut writer: IndexWriter = tenant
            .index()
            .writer(self.writer_heap_size)
            .map_err(|e| write_failed(tenant_id, "<batch>", e))?;

        for (record_id, doc) in docs {
            writer.delete_term(Term::from_field_text(schema.id, record_id));
            writer
                .add_document(doc)
                .map_err(|e| write_failed(tenant_id, record_id, e))?;
        }
        writer
            .commit()
            .map_err(|e| write_failed(tenant_id, "<batch>", e))?;

        tracing::debug!(tenant = tenant_id, count = records.len(), "upserted flow record batch");
        Ok(records.len())
    }

    /// Delete all documents matching the flow id; deleting a nonexistent id
    /// is a no-op, not an error
    pub async fn delete(&self, tenant_id: &str, record_id: &str) -> Result<()> {
        let schema = self.registry.flow_schema();
        let tenant = self.registry.get_or_create(tenant_id)?;
        let _guard = tenant.write_guard().await;

        let mut writer: IndexWriter = tenant
            .index()
            .writer(self.writer_heap_size)
            .map_err(|e| write_failed(tenant_id, record_id, e))?;

        writer.delete_term(Term::from_field_text(schema.id, record_id));
        writer
            .commit()
            .map_err(|e| write_failed(tenant_id, record_id, e))?;

        tracing::debug!(tenant = tenant_id, record = record_id, "deleted flow record");
        Ok(())
    }
}

fn write_failed(tenant_id: &str, record_id: &str, source: tantivy::TantivyError) -> FlowSearchError {
    FlowSearchError::IndexWriteFailed {
        tenant_id: tenant_id.to_string(),
        record_id: record_id.to_string(),
        source,
    }
}
