//! Tenant-to-index registry with on-disk storage and in-memory fallback

use crate::error::{FlowSearchError, Result};
use crate::index::document::{register_tokenizers, FlowSchema};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::Index;
use tokio::sync::{Mutex, MutexGuard};

/// Where a tenant's index lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Persistent directory under `{base_path}/{tenant_id}`
    Disk(PathBuf),
    /// Transient in-memory fallback; lost at process exit
    Memory,
}

/// An open handle to one tenant's index
///
/// Owned exclusively by the registry; the write and read paths borrow it
/// for the duration of one operation and never retain it.
#[derive(Debug)]
pub struct TenantIndex {
    index: Index,
    backend: StorageBackend,
    // Tantivy admits a single live IndexWriter per index; per-call writers
    // serialize on this instead of failing on the writer lockfile.
    write_lock: Mutex<()>,
}

impl TenantIndex {
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    pub(crate) async fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}

/// Maps tenant identifiers to open index handles, lazily created
///
/// The tenant map is the only shared mutable state in the engine; creation
/// is insert-if-absent under the map's shard lock, so two concurrent
/// first-access calls for one tenant converge on a single handle.
pub struct TenantIndexRegistry {
    base_path: PathBuf,
    fallback_to_memory: bool,
    flow_schema: Arc<FlowSchema>,
    tenants: DashMap<String, Arc<TenantIndex>>,
}

impl TenantIndexRegistry {
    pub fn new(base_path: impl Into<PathBuf>, fallback_to_memory: bool) -> Self {
        let base_path = base_path.into();
        tracing::info!(base_path = %base_path.display(), fallback_to_memory, "tenant index registry initialized");
        Self {
            base_path,
            fallback_to_memory,
            flow_schema: Arc::new(FlowSchema::build()),
            tenants: DashMap::new(),
        }
    }

    /// Return the existing handle for a tenant or create one
    pub fn get_or_create(&self, tenant_id: &str) -> Result<Arc<TenantIndex>> {
        validate_tenant_id(tenant_id)?;

        if let Some(existing) = self.tenants.get(tenant_id) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.tenants.entry(tenant_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let handle = Arc::new(self.open_backend(tenant_id)?);
                entry.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    fn open_backend(&self, tenant_id: &str) -> Result<TenantIndex> {
        let path = self.base_path.join(tenant_id);
        match self.open_disk_index(&path) {
            Ok(index) => {
                tracing::debug!(tenant = tenant_id, path = %path.display(), "opened on-disk index");
                Ok(TenantIndex {
                    index,
                    backend: StorageBackend::Disk(path),
                    write_lock: Mutex::new(()),
                })
            }
            Err(reason) => {
                tracing::warn!(tenant = tenant_id, %reason, "failed to open on-disk index");
                if self.fallback_to_memory {
                    tracing::info!(tenant = tenant_id, "falling back to in-memory index");
                    let index = Index::create_in_ram(self.flow_schema.schema.clone());
                    register_tokenizers(&index);
                    Ok(TenantIndex {
                        index,
                        backend: StorageBackend::Memory,
                        write_lock: Mutex::new(()),
                    })
                } else {
                    Err(FlowSearchError::StorageUnavailable {
                        tenant_id: tenant_id.to_string(),
                        reason,
                    })
                }
            }
        }
    }

    fn open_disk_index(&self, path: &Path) -> std::result::Result<Index, String> {
        std::fs::create_dir_all(path).map_err(|e| format!("failed to create index directory: {e}"))?;

        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path).map_err(|e| format!("failed to open existing index: {e}"))?
        } else {
            Index::create_in_dir(path, self.flow_schema.schema.clone())
                .map_err(|e| format!("failed to create new index: {e}"))?
        };

        register_tokenizers(&index);
        Ok(index)
    }

    /// Close and remove one tenant's handle; no-op if absent
    pub fn close(&self, tenant_id: &str) -> bool {
        let removed = self.tenants.remove(tenant_id).is_some();
        if removed {
            tracing::debug!(tenant = tenant_id, "closed tenant index");
        }
        removed
    }

    /// Close every handle; used once at shutdown. Later `get_or_create`
    /// calls create fresh handles, which keeps the registry restartable.
    pub fn close_all(&self) {
        tracing::info!(count = self.tenants.len(), "closing all tenant indexes");
        self.tenants.clear();
    }

    pub fn has(&self, tenant_id: &str) -> bool {
        self.tenants.contains_key(tenant_id)
    }

    pub fn count(&self) -> usize {
        self.tenants.len()
    }

    pub fn flow_schema(&self) -> Arc<FlowSchema> {
        Arc::clone(&self.flow_schema)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    let safe = !tenant_id.is_empty()
        && tenant_id != "."
        && tenant_id != ".."
        && !tenant_id.contains(['/', '\\', '\0']);
    if safe {
        Ok(())
    } else {
        Err(FlowSearchError::InvalidTenant(tenant_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_or_create_is_lazy_and_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let registry = TenantIndexRegistry::new(temp_dir.path(), true);

        assert!(!registry.has("acme"));
        assert_eq!(registry.count(), 0);

        let first = registry.get_or_create("acme").unwrap();
        let second = registry.get_or_create("acme").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.has("acme"));
        assert_eq!(registry.count(), 1);
        assert_eq!(
            *first.backend(),
            StorageBackend::Disk(temp_dir.path().join("acme"))
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let registry = TenantIndexRegistry::new(temp_dir.path(), true);

        registry.get_or_create("acme").unwrap();
        assert!(registry.close("acme"));
        assert!(!registry.close("acme"));
        assert!(!registry.has("acme"));
    }

    #[test]
    fn test_close_all_permits_recreation() {
        let temp_dir = TempDir::new().unwrap();
        let registry = TenantIndexRegistry::new(temp_dir.path(), true);

        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        registry.close_all();
        assert_eq!(registry.count(), 0);

        registry.get_or_create("a").unwrap();
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_memory_fallback_when_path_is_unusable() {
        // base_path is a regular file, so the tenant directory cannot exist
        let temp_dir = TempDir::new().unwrap();
        let blocked = temp_dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let registry = TenantIndexRegistry::new(&blocked, true);
        let handle = registry.get_or_create("acme").unwrap();
        assert_eq!(*handle.backend(), StorageBackend::Memory);
    }

    #[test]
    fn test_storage_unavailable_when_fallback_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let blocked = temp_dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let registry = TenantIndexRegistry::new(&blocked, false);
        let err = registry.get_or_create("acme").unwrap_err();
        assert!(matches!(err, FlowSearchError::StorageUnavailable { .. }));
        assert!(!registry.has("acme"));
    }

    #[test]
    fn test_rejects_unsafe_tenant_ids() {
        let temp_dir = TempDir::new().unwrap();
        let registry = TenantIndexRegistry::new(temp_dir.path(), true);

        for tenant in ["", ".", "..", "a/b", "a\\b"] {
            let err = registry.get_or_create(tenant).unwrap_err();
            assert!(matches!(err, FlowSearchError::InvalidTenant(_)), "accepted {tenant:?}");
        }
    }

    #[test]
    fn test_reopens_existing_index_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let registry = TenantIndexRegistry::new(temp_dir.path(), true);

        registry.get_or_create("acme").unwrap();
        registry.close("acme");

        // meta.json persisted, so the second open takes the open path
        assert!(temp_dir.path().join("acme").join("meta.json").exists());
        let handle = registry.get_or_create("acme").unwrap();
        assert_eq!(
            *handle.backend(),
            StorageBackend::Disk(temp_dir.path().join("acme"))
        );
    }
}
