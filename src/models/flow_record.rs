//! Flow record entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed network flow
///
/// `id` is the unique document key: re-indexing the same id replaces the
/// prior document atomically. Field names serialize in camelCase to match
/// the index field catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    /// Unique flow identifier, immutable once indexed
    pub id: String,

    /// Source IP address (IPv4 or IPv6 textual form)
    #[serde(rename = "sourceIP")]
    pub source_ip: String,

    /// Destination IP address
    #[serde(rename = "destIP")]
    pub dest_ip: String,

    /// Source transport port
    pub source_port: u16,

    /// Destination transport port
    pub dest_port: u16,

    /// Transport protocol, e.g. "TCP", "UDP", "ICMP"
    pub protocol: String,

    /// Forward byte counter
    pub bytes: u64,

    /// Forward packet counter
    pub packets: u64,

    /// Reverse byte counter (bidirectional flows)
    pub reverse_bytes: u64,

    /// Reverse packet counter
    pub reverse_packets: u64,

    /// Observation timestamp
    pub timestamp: DateTime<Utc>,

    /// Flow start time, when exported
    pub flow_start_time: Option<DateTime<Utc>>,

    /// Flow end time, at or after the start time when both are present
    pub flow_end_time: Option<DateTime<Utc>>,

    /// Cumulative TCP flags
    pub tcp_flags: u16,

    /// IP type-of-service byte
    pub tos_value: u8,
}

impl FlowRecord {
    /// Create a record with the identifying tuple set and counters zeroed
    pub fn new(
        id: impl Into<String>,
        source_ip: impl Into<String>,
        dest_ip: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source_ip: source_ip.into(),
            dest_ip: dest_ip.into(),
            source_port: 0,
            dest_port: 0,
            protocol: String::new(),
            bytes: 0,
            packets: 0,
            reverse_bytes: 0,
            reverse_packets: 0,
            timestamp,
            flow_start_time: None,
            flow_end_time: None,
            tcp_flags: 0,
            tos_value: 0,
        }
    }

    /// Total bytes in both directions
    pub fn total_bytes(&self) -> u64 {
        self.bytes + self.reverse_bytes
    }

    /// Total packets in both directions
    pub fn total_packets(&self) -> u64 {
        self.packets + self.reverse_packets
    }

    /// Whether any reverse-direction traffic was observed
    pub fn is_bidirectional(&self) -> bool {
        self.reverse_bytes > 0 || self.reverse_packets > 0
    }
}

impl std::fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FlowRecord{{id='{}', {}:{} -> {}:{}, protocol='{}', bytes={}, packets={}}}",
            self.id,
            self.source_ip,
            self.source_port,
            self.dest_ip,
            self.dest_port,
            self.protocol,
            self.bytes,
            self.packets
        )
    }
}
