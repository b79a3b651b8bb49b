//! Index schema and the FlowRecord <-> document codec

use crate::error::{FlowSearchError, Result};
use crate::models::FlowRecord;
use chrono::{DateTime, Utc};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, INDEXED, STORED,
    STRING,
};
use tantivy::tokenizer::{LowerCaser, RawTokenizer, TextAnalyzer};
use tantivy::{Index, TantivyDocument};

/// Tokenizer that indexes the whole value as one lowercased term. Used for
/// the protocol field so matching is case-insensitive while the stored copy
/// keeps its original case.
pub(crate) const RAW_LOWERCASE: &str = "raw_lowercase";

/// Register the custom analyzers on an index. Must run after every
/// open/create, before any document is added or query parsed.
pub(crate) fn register_tokenizers(index: &Index) {
    index.tokenizers().register(
        RAW_LOWERCASE,
        TextAnalyzer::builder(RawTokenizer::default())
            .filter(LowerCaser)
            .build(),
    );
}

/// The flow-record index schema with resolved field handles
///
/// Field catalogue: keyword (exact-match) fields for identifiers and
/// addresses, numeric range-indexed fields for counters, ports and
/// timestamps (epoch millis), and a stored copy of every field for
/// retrieval. Every field that participates in a comparison filter or a
/// range query is both comparable-indexed and stored.
#[derive(Debug, Clone)]
pub struct FlowSchema {
    pub schema: Schema,
    pub id: Field,
    pub source_ip: Field,
    pub dest_ip: Field,
    pub source_port: Field,
    pub dest_port: Field,
    pub protocol: Field,
    pub bytes: Field,
    pub packets: Field,
    pub reverse_bytes: Field,
    pub reverse_packets: Field,
    pub timestamp: Field,
    pub flow_start_time: Field,
    pub flow_end_time: Field,
    pub tcp_flags: Field,
    pub tos_value: Field,
}

impl FlowSchema {
    pub fn build() -> Self {
        let mut builder = Schema::builder();

        let id = builder.add_text_field("id", STRING | STORED);
        let source_ip = builder.add_text_field("sourceIP", STRING | STORED);
        let dest_ip = builder.add_text_field("destIP", STRING | STORED);
        let source_port = builder.add_u64_field("sourcePort", INDEXED | STORED | FAST);
        let dest_port = builder.add_u64_field("destPort", INDEXED | STORED | FAST);

        // Indexed lowercased for matching, stored with original case
        let protocol_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(RAW_LOWERCASE)
                    .set_index_option(IndexRecordOption::Basic),
            )
            .set_stored();
        let protocol = builder.add_text_field("protocol", protocol_options);

        let bytes = builder.add_u64_field("bytes", INDEXED | STORED | FAST);
        let packets = builder.add_u64_field("packets", INDEXED | STORED | FAST);
        let reverse_bytes = builder.add_u64_field("reverseBytes", INDEXED | STORED | FAST);
        let reverse_packets = builder.add_u64_field("reversePackets", INDEXED | STORED | FAST);

        // Epoch millis
        let timestamp = builder.add_i64_field("timestamp", INDEXED | STORED | FAST);
        let flow_start_time = builder.add_i64_field("flowStartTime", INDEXED | STORED | FAST);
        let flow_end_time = builder.add_i64_field("flowEndTime", INDEXED | STORED | FAST);

        let tcp_flags = builder.add_u64_field("tcpFlags", INDEXED | STORED | FAST);
        let tos_value = builder.add_u64_field("tosValue", INDEXED | STORED | FAST);

        Self {
            schema: builder.build(),
            id,
            source_ip,
            dest_ip,
            source_port,
            dest_port,
            protocol,
            bytes,
            packets,
            reverse_bytes,
            reverse_packets,
            timestamp,
            flow_start_time,
            flow_end_time,
            tcp_flags,
            tos_value,
        }
    }

    /// Project a flow record into an index document
    ///
    /// Pure and deterministic; fails only when the record id is empty, and
    /// does so before any I/O is attempted.
    pub fn encode(&self, record: &FlowRecord) -> Result<TantivyDocument> {
        if record.id.is_empty() {
            return Err(FlowSearchError::InvalidRecord(
                "record id must not be empty".to_string(),
            ));
        }

        let mut doc = TantivyDocument::new();
        doc.add_text(self.id, &record.id);
        doc.add_text(self.source_ip, &record.source_ip);
        doc.add_text(self.dest_ip, &record.dest_ip);
        doc.add_u64(self.source_port, u64::from(record.source_port));
        doc.add_u64(self.dest_port, u64::from(record.dest_port));
        doc.add_text(self.protocol, &record.protocol);
        doc.add_u64(self.bytes, record.bytes);
        doc.add_u64(self.packets, record.packets);
        doc.add_u64(self.reverse_bytes, record.reverse_bytes);
        doc.add_u64(self.reverse_packets, record.reverse_packets);
        doc.add_i64(self.timestamp, record.timestamp.timestamp_millis());
        if let Some(start) = record.flow_start_time {
            doc.add_i64(self.flow_start_time, start.timestamp_millis());
        }
        if let Some(end) = record.flow_end_time {
            doc.add_i64(self.flow_end_time, end.timestamp_millis());
        }
        doc.add_u64(self.tcp_flags, u64::from(record.tcp_flags));
        doc.add_u64(self.tos_value, u64::from(record.tos_value));

        Ok(doc)
    }

    /// Hydrate a stored document back into a flow record
    ///
    /// Best-effort: a field that is missing or mistyped is left at its zero
    /// value and reported as a warning rather than failing the record.
    pub fn decode(&self, doc: &TantivyDocument) -> FlowRecord {
        FlowRecord {
            id: stored_text(doc, self.id, "id"),
            source_ip: stored_text(doc, self.source_ip, "sourceIP"),
            dest_ip: stored_text(doc, self.dest_ip, "destIP"),
            source_port: stored_port(doc, self.source_port, "sourcePort"),
            dest_port: stored_port(doc, self.dest_port, "destPort"),
            protocol: stored_text(doc, self.protocol, "protocol"),
            bytes: stored_u64(doc, self.bytes, "bytes"),
            packets: stored_u64(doc, self.packets, "packets"),
            reverse_bytes: stored_u64(doc, self.reverse_bytes, "reverseBytes"),
            reverse_packets: stored_u64(doc, self.reverse_packets, "reversePackets"),
            timestamp: stored_timestamp(doc, self.timestamp, "timestamp"),
            flow_start_time: stored_optional_timestamp(doc, self.flow_start_time, "flowStartTime"),
            flow_end_time: stored_optional_timestamp(doc, self.flow_end_time, "flowEndTime"),
            tcp_flags: stored_u64(doc, self.tcp_flags, "tcpFlags") as u16,
            tos_value: stored_u64(doc, self.tos_value, "tosValue") as u8,
        }
    }
}

fn stored_text(doc: &TantivyDocument, field: Field, name: &str) -> String {
    match doc.get_first(field).and_then(|v| v.as_str()) {
        Some(value) => value.to_string(),
        None => {
            tracing::warn!(field = name, "stored text field missing; defaulting to empty");
            String::new()
        }
    }
}

fn stored_u64(doc: &TantivyDocument, field: Field, name: &str) -> u64 {
    match doc.get_first(field).and_then(|v| v.as_u64()) {
        Some(value) => value,
        None => {
            tracing::warn!(field = name, "stored numeric field missing; defaulting to 0");
            0
        }
    }
}

fn stored_port(doc: &TantivyDocument, field: Field, name: &str) -> u16 {
    let value = stored_u64(doc, field, name);
    u16::try_from(value).unwrap_or_else(|_| {
        tracing::warn!(field = name, value, "stored port out of range; defaulting to 0");
        0
    })
}

fn stored_timestamp(doc: &TantivyDocument, field: Field, name: &str) -> DateTime<Utc> {
    stored_optional_timestamp(doc, field, name).unwrap_or_else(|| {
        tracing::warn!(field = name, "stored timestamp missing; defaulting to epoch");
        DateTime::<Utc>::UNIX_EPOCH
    })
}

fn stored_optional_timestamp(doc: &TantivyDocument, field: Field, name: &str) -> Option<DateTime<Utc>> {
    let millis = doc.get_first(field).and_then(|v| v.as_i64())?;
    match DateTime::from_timestamp_millis(millis) {
        Some(ts) => Some(ts),
        None => {
            tracing::warn!(field = name, millis, "stored timestamp out of range; dropping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> FlowRecord {
        FlowRecord {
            id: "flow-0001".to_string(),
            source_ip: "192.168.1.100".to_string(),
            dest_ip: "10.0.0.5".to_string(),
            source_port: 51234,
            dest_port: 443,
            protocol: "TCP".to_string(),
            bytes: 123_456,
            packets: 87,
            reverse_bytes: 5_000,
            reverse_packets: 12,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            flow_start_time: Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 59, 0).unwrap()),
            flow_end_time: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 30).unwrap()),
            tcp_flags: 0x18,
            tos_value: 0,
        }
    }

    #[test]
    fn test_schema_has_full_field_catalogue() {
        let flow_schema = FlowSchema::build();
        for name in [
            "id",
            "sourceIP",
            "destIP",
            "sourcePort",
            "destPort",
            "protocol",
            "bytes",
            "packets",
            "reverseBytes",
            "reversePackets",
            "timestamp",
            "flowStartTime",
            "flowEndTime",
            "tcpFlags",
            "tosValue",
        ] {
            assert!(flow_schema.schema.get_field(name).is_ok(), "missing field {name}");
        }
    }

    #[test]
    fn test_encode_rejects_empty_id() {
        let flow_schema = FlowSchema::build();
        let mut record = sample_record();
        record.id = String::new();

        let err = flow_schema.encode(&record).unwrap_err();
        assert!(matches!(err, FlowSearchError::InvalidRecord(_)));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let flow_schema = FlowSchema::build();
        let record = sample_record();

        let doc = flow_schema.encode(&record).unwrap();
        let decoded = flow_schema.decode(&doc);

        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let flow_schema = FlowSchema::build();
        let mut doc = TantivyDocument::new();
        doc.add_text(flow_schema.id, "partial");

        let decoded = flow_schema.decode(&doc);

        assert_eq!(decoded.id, "partial");
        assert_eq!(decoded.bytes, 0);
        assert_eq!(decoded.source_port, 0);
        assert_eq!(decoded.timestamp, DateTime::<Utc>::UNIX_EPOCH);
        assert!(decoded.flow_start_time.is_none());
        assert!(decoded.flow_end_time.is_none());
    }

    #[test]
    fn test_optional_flow_times_are_omitted_when_absent() {
        let flow_schema = FlowSchema::build();
        let mut record = sample_record();
        record.flow_start_time = None;
        record.flow_end_time = None;

        let doc = flow_schema.encode(&record).unwrap();
        let decoded = flow_schema.decode(&doc);

        assert!(decoded.flow_start_time.is_none());
        assert!(decoded.flow_end_time.is_none());
    }
}
