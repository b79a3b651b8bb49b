//! End-to-end tests for the flow search engine

use chrono::{DateTime, Duration, TimeZone, Utc};
use flow_search_engine::{
    EngineConfig, FlowQuery, FlowRecord, FlowSearchEngine, FlowSearchError, StorageBackend,
};
use std::sync::Arc;
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn test_engine(temp_dir: &TempDir) -> FlowSearchEngine {
    let config = EngineConfig {
        base_path: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    FlowSearchEngine::new(config).unwrap()
}

fn flow(id: &str, source_ip: &str, bytes: u64, minutes: i64) -> FlowRecord {
    FlowRecord {
        id: id.to_string(),
        source_ip: source_ip.to_string(),
        dest_ip: "10.0.0.5".to_string(),
        source_port: 51234,
        dest_port: 443,
        protocol: "TCP".to_string(),
        bytes,
        packets: bytes / 100,
        reverse_bytes: 0,
        reverse_packets: 0,
        timestamp: base_time() + Duration::minutes(minutes),
        flow_start_time: Some(base_time() + Duration::minutes(minutes) - Duration::seconds(30)),
        flow_end_time: Some(base_time() + Duration::minutes(minutes)),
        tcp_flags: 0x18,
        tos_value: 0,
    }
}

#[tokio::test]
async fn test_upsert_search_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let record = flow("flow-0001", "192.168.1.100", 5000, 0);
    engine.upsert("acme", &record).await.unwrap();

    let hits = engine
        .searcher()
        .search_text("acme", "id", "id:\"flow-0001\"", 1)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0], record);
}

#[tokio::test]
async fn test_upsert_replaces_instead_of_duplicating() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let mut record = flow("flow-0001", "192.168.1.100", 100, 0);
    engine.upsert("acme", &record).await.unwrap();

    record.bytes = 9999;
    record.protocol = "UDP".to_string();
    engine.upsert("acme", &record).await.unwrap();

    assert_eq!(engine.document_count("acme").await.unwrap(), 1);

    let hits = engine
        .searcher()
        .search_text("acme", "id", "id:\"flow-0001\"", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].bytes, 9999);
    assert_eq!(hits[0].protocol, "UDP");
}

#[tokio::test]
async fn test_delete_removes_record_and_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    engine
        .upsert("acme", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();
    engine.delete("acme", "flow-0001").await.unwrap();

    let hits = engine
        .searcher()
        .search_text("acme", "id", "id:\"flow-0001\"", 10)
        .await
        .unwrap();
    assert!(hits.is_empty());

    // Deleting a nonexistent id is a no-op, not an error
    engine.delete("acme", "no-such-flow").await.unwrap();
}

#[tokio::test]
async fn test_upsert_many_is_visible_after_one_commit() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let records: Vec<_> = (0..5)
        .map(|i| flow(&format!("batch-{i}"), "172.16.0.9", 100 * (i + 1) as u64, i))
        .collect();

    let indexed = engine.upsert_many("acme", &records).await.unwrap();
    assert_eq!(indexed, 5);
    assert_eq!(engine.document_count("acme").await.unwrap(), 5);

    let hits = engine
        .searcher()
        .search_by_source_ip("acme", "172.16.0.9")
        .await
        .unwrap();
    assert_eq!(hits.len(), 5);
}

#[tokio::test]
async fn test_invalid_record_fails_before_io() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let mut record = flow("", "192.168.1.100", 100, 0);
    record.id = String::new();

    let err = engine.upsert("acme", &record).await.unwrap_err();
    assert!(matches!(err, FlowSearchError::InvalidRecord(_)));

    // Encoding failed before any storage was touched
    assert!(!engine.has_index("acme"));
}

#[tokio::test]
async fn test_invalid_query_string_is_a_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    engine
        .upsert("acme", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();

    let err = engine
        .searcher()
        .search_text("acme", "sourceIP", "bytes:[100 TO", 10)
        .await
        .unwrap_err();

    match err {
        FlowSearchError::QueryParseError { query, .. } => assert_eq!(query, "bytes:[100 TO"),
        other => panic!("expected QueryParseError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_default_field_is_a_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let err = engine
        .searcher()
        .search_text("acme", "nosuchfield", "x", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowSearchError::QueryParseError { .. }));
}

#[tokio::test]
async fn test_no_cross_tenant_leakage() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    // Ten flows across two tenants; three in "a" carry the probed source IP
    for i in 0..3 {
        engine
            .upsert("a", &flow(&format!("a-hit-{i}"), "192.168.1.100", 500, i))
            .await
            .unwrap();
    }
    for i in 0..2 {
        engine
            .upsert("a", &flow(&format!("a-other-{i}"), "10.1.1.1", 500, i))
            .await
            .unwrap();
    }
    for i in 0..5 {
        engine
            .upsert("b", &flow(&format!("b-{i}"), "192.168.1.100", 500, i))
            .await
            .unwrap();
    }

    let hits = engine
        .searcher()
        .search_text("a", "sourceIP", "sourceIP:192.168.1.100", 100)
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|r| r.id.starts_with("a-hit-")));
    assert!(hits.iter().all(|r| r.source_ip == "192.168.1.100"));
}

#[tokio::test]
async fn test_convenience_searches() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let mut web = flow("web", "192.168.1.10", 50_000, 0);
    web.dest_port = 443;
    let mut dns = flow("dns", "192.168.1.10", 300, 10);
    dns.dest_port = 53;
    dns.dest_ip = "8.8.8.8".to_string();
    let mut late = flow("late", "10.9.9.9", 700, 120);
    late.dest_port = 8080;

    for record in [&web, &dns, &late] {
        engine.upsert("acme", record).await.unwrap();
    }

    let by_dest = engine
        .searcher()
        .search_by_dest_ip("acme", "8.8.8.8")
        .await
        .unwrap();
    assert_eq!(by_dest.len(), 1);
    assert_eq!(by_dest[0].id, "dns");

    let low_ports = engine
        .searcher()
        .search_by_port_range("acme", 1, 1023)
        .await
        .unwrap();
    let mut ids: Vec<_> = low_ports.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["dns", "web"]);

    let window = engine
        .searcher()
        .search_by_time_range("acme", base_time(), base_time() + Duration::minutes(15))
        .await
        .unwrap();
    let mut ids: Vec<_> = window.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["dns", "web"]);

    let heavy = engine.searcher().search_min_bytes("acme", 1000).await.unwrap();
    assert_eq!(heavy.len(), 1);
    assert_eq!(heavy[0].id, "web");
}

#[tokio::test]
async fn test_protocol_matching_is_case_insensitive_but_stored_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let mut record = flow("flow-0001", "192.168.1.100", 100, 0);
    record.protocol = "Tcp".to_string();
    engine.upsert("acme", &record).await.unwrap();

    let hits = engine
        .searcher()
        .search_text("acme", "protocol", "protocol:TCP", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].protocol, "Tcp");
}

#[tokio::test]
async fn test_full_read_pipeline_filter_sort_page() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    let records: Vec<_> = (0..10)
        .map(|i| flow(&format!("f{i}"), "192.168.1.100", 100 * (i + 1) as u64, i))
        .collect();
    engine.upsert_many("acme", &records).await.unwrap();

    let query = FlowQuery::new("bytes:[0 TO *]")
        .with_filter("bytes gt 300")
        .with_sort("bytes", true)
        .with_skip(1)
        .with_limit(3);

    let page = engine.search("acme", &query).await.unwrap();

    // bytes > 300 leaves 400..1000; descending drops the top one via skip
    let bytes: Vec<_> = page.iter().map(|r| r.bytes).collect();
    assert_eq!(bytes, vec![900, 800, 700]);
}

#[tokio::test]
async fn test_has_index_and_document_count() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    assert!(!engine.has_index("acme"));
    assert_eq!(engine.document_count("acme").await.unwrap(), 0);

    engine
        .upsert("acme", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();

    assert!(engine.has_index("acme"));
    assert_eq!(engine.document_count("acme").await.unwrap(), 1);

    // The on-disk index survives closing the handle
    assert!(engine.close_tenant("acme"));
    assert!(engine.has_index("acme"));
    assert_eq!(engine.document_count("acme").await.unwrap(), 1);
}

#[tokio::test]
async fn test_shutdown_and_restartability() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    engine
        .upsert("acme", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();
    engine.shutdown();
    assert_eq!(engine.registry().count(), 0);

    // Fresh handles after shutdown still see the persisted documents
    let hits = engine
        .searcher()
        .search_text("acme", "id", "id:\"flow-0001\"", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_access_converges_on_one_handle() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);
    let registry = Arc::clone(engine.registry());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.get_or_create("shared").unwrap()
        }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    let first = &handles[0];
    assert!(handles.iter().all(|h| Arc::ptr_eq(first, h)));
    assert_eq!(registry.count(), 1);

    // A write through the engine is observable through any handle's index
    engine
        .upsert("shared", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();
    assert_eq!(engine.document_count("shared").await.unwrap(), 1);
}

#[tokio::test]
async fn test_memory_fallback_engine_still_indexes_and_searches() {
    // base_path is a regular file, forcing every tenant into memory
    let temp_dir = TempDir::new().unwrap();
    let blocked = temp_dir.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").unwrap();

    let config = EngineConfig {
        base_path: blocked,
        fallback_to_memory: true,
        ..Default::default()
    };
    let engine = FlowSearchEngine::new(config).unwrap();

    engine
        .upsert("acme", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();

    let handle = engine.registry().get_or_create("acme").unwrap();
    assert_eq!(*handle.backend(), StorageBackend::Memory);

    let hits = engine
        .searcher()
        .search_by_source_ip("acme", "192.168.1.100")
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_zero_max_results_returns_empty() {
    let temp_dir = TempDir::new().unwrap();
    let engine = test_engine(&temp_dir);

    engine
        .upsert("acme", &flow("flow-0001", "192.168.1.100", 100, 0))
        .await
        .unwrap();

    let hits = engine
        .searcher()
        .search_text("acme", "sourceIP", "sourceIP:192.168.1.100", 0)
        .await
        .unwrap();
    assert!(hits.is_empty());
}
