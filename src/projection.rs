//! Deterministic sorting and paging over result sequences

use crate::filter::{self, AttrValue};
use crate::models::FlowRecord;
use std::cmp::Ordering;

/// Stable sort by a numeric attribute
///
/// Records with a missing or zero key sort after records with a present
/// key regardless of direction; equal keys keep their input order. An
/// unsupported field name leaves the input order untouched.
pub fn sort_records(mut records: Vec<FlowRecord>, field: &str, descending: bool) -> Vec<FlowRecord> {
    if !filter::is_numeric_attribute(field) {
        tracing::debug!(field, "unsupported sort field; leaving input order");
        return records;
    }

    records.sort_by(|a, b| match (sort_key(a, field), sort_key(b, field)) {
        (Some(x), Some(y)) => {
            if descending {
                y.cmp(&x)
            } else {
                x.cmp(&y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    records
}

fn sort_key(record: &FlowRecord, field: &str) -> Option<i64> {
    match filter::attribute_value(record, field) {
        Some(AttrValue::Num(0)) | None => None,
        Some(AttrValue::Num(n)) => Some(n),
        Some(AttrValue::Text(_)) => None,
    }
}

/// Skip then limit; negative skip means 0, negative limit means unbounded
pub fn page_records(records: Vec<FlowRecord>, skip: Option<i64>, limit: Option<i64>) -> Vec<FlowRecord> {
    let skip = skip.unwrap_or(0).max(0) as usize;
    let iter = records.into_iter().skip(skip);
    match limit {
        Some(limit) if limit >= 0 => iter.take(limit as usize).collect(),
        _ => iter.collect(),
    }
}
