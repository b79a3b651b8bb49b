//! Multi-tenant flow-record search and indexing engine powered by Tantivy.
//!
//! This crate is the search core of an IPFIX flow collection service. It
//! owns one inverted index per tenant, keeps flow documents in sync with
//! transactional upserts and deletes, and answers structured and free-text
//! queries with deterministic sorting and paging:
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              FlowSearchEngine                    │
//! ├──────────────────────────────────────────────────┤
//! │  upsert() / delete()          search()           │
//! └──────────────────────────────────────────────────┘
//!        │                              │
//!        ▼                              ▼
//! ┌───────────────┐   ┌──────────────────────────────┐
//! │  FlowIndexer  │   │  FlowSearcher                │
//! │  (write path) │   │  → filter expression eval    │
//! └───────────────┘   │  → sort + page projection    │
//!        │            └──────────────────────────────┘
//!        ▼                              │
//! ┌──────────────────────────────────────────────────┐
//! │           TenantIndexRegistry                    │
//! │  tenant id → Tantivy index handle                │
//! │  (on-disk directory, in-memory fallback)         │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Every write and read opens its own writer or reader snapshot against the
//! tenant's handle and releases it before returning; the registry's tenant
//! map is the only shared mutable state.
//!
//! # Example
//!
//! ```no_run
//! use flow_search_engine::{EngineConfig, FlowQuery, FlowSearchEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = FlowSearchEngine::new(EngineConfig::default())?;
//!
//!     let query = FlowQuery::new("sourceIP:192.168.1.100")
//!         .with_filter("bytes gt 1000")
//!         .with_sort("timestamp", true)
//!         .with_limit(20);
//!
//!     let records = engine.search("tenant-a", &query).await?;
//!     println!("found {} flows", records.len());
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod models;
pub mod projection;
pub mod service;

pub use config::EngineConfig;
pub use error::{FlowSearchError, Result};
pub use filter::{CompareOp, Connective, FilterExpr, FilterParseError};
pub use index::{FlowIndexer, FlowSchema, FlowSearcher, StorageBackend, TenantIndexRegistry};
pub use models::FlowRecord;
pub use service::{FlowQuery, FlowSearchEngine};
