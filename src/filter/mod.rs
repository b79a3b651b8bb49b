//! Constrained filter-expression language over materialized flow records
//!
//! Grammar (keywords case-insensitive):
//!
//! ```text
//! expr      := clause (("and" | "or") clause)*
//! clause    := field operator value
//! operator  := "eq" | "ne" | "gt" | "ge" | "lt" | "le"
//! field     := flow record attribute name (case-insensitive)
//! value     := 'quoted string' | bareword | number
//! ```
//!
//! A single connective kind per expression: mixing `and` and `or` is a
//! parse error. Malformed clauses are not errors at evaluation time:
//! unknown fields, ordering operators on string attributes and unparsable
//! numeric literals all evaluate to `false`. Callers that translate
//! structured filters into this language rely on that silent-exclusion
//! policy, so it must stay.

mod parser;

pub use parser::FilterParseError;

use crate::models::FlowRecord;

/// Comparison operator inside one clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub(crate) fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }
}

/// Boolean connective chaining clauses; one kind per expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// One `field operator value` unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub op: CompareOp,
    pub value: String,
}

impl Clause {
    /// Evaluate against one record; anything malformed matches nothing
    pub fn matches(&self, record: &FlowRecord) -> bool {
        let Some(actual) = attribute_value(record, &self.field) else {
            return false;
        };

        match actual {
            AttrValue::Text(text) => match self.op {
                CompareOp::Eq => text.eq_ignore_ascii_case(&self.value),
                CompareOp::Ne => !text.eq_ignore_ascii_case(&self.value),
                // Ordering operators only apply to numeric attributes
                _ => false,
            },
            AttrValue::Num(number) => match self.op {
                CompareOp::Eq => num_eq(number, &self.value),
                CompareOp::Ne => !num_eq(number, &self.value),
                op => num_cmp(number, &self.value, op),
            },
        }
    }
}

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Single(Clause),
    Chain {
        connective: Connective,
        clauses: Vec<Clause>,
    },
}

impl FilterExpr {
    /// Evaluate against one record; `And` short-circuits on the first
    /// failing clause, `Or` on the first passing one
    pub fn matches(&self, record: &FlowRecord) -> bool {
        match self {
            Self::Single(clause) => clause.matches(record),
            Self::Chain {
                connective: Connective::And,
                clauses,
            } => clauses.iter().all(|clause| clause.matches(record)),
            Self::Chain {
                connective: Connective::Or,
                clauses,
            } => clauses.iter().any(|clause| clause.matches(record)),
        }
    }
}

impl std::str::FromStr for FilterExpr {
    type Err = FilterParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parser::parse(input)
    }
}

/// Single-record evaluation; an unparsable filter matches nothing
pub fn evaluate(filter_text: &str, record: &FlowRecord) -> bool {
    match filter_text.parse::<FilterExpr>() {
        Ok(expr) => expr.matches(record),
        Err(err) => {
            tracing::warn!(filter = filter_text, error = %err, "unparsable filter matches nothing");
            false
        }
    }
}

/// Keep the records the expression matches, preserving input order
pub fn apply(filter_text: &str, records: Vec<FlowRecord>) -> Vec<FlowRecord> {
    match filter_text.parse::<FilterExpr>() {
        Ok(expr) => records
            .into_iter()
            .filter(|record| expr.matches(record))
            .collect(),
        Err(err) => {
            tracing::warn!(filter = filter_text, error = %err, "unparsable filter matches nothing");
            Vec::new()
        }
    }
}

/// A flow record attribute projected for comparison
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttrValue {
    Text(String),
    Num(i64),
}

/// Look up an attribute by its case-insensitive external name.
/// Timestamps surface as epoch millis; absent optional flow times are None.
pub(crate) fn attribute_value(record: &FlowRecord, name: &str) -> Option<AttrValue> {
    match name.to_ascii_lowercase().as_str() {
        "id" => Some(AttrValue::Text(record.id.clone())),
        "sourceip" => Some(AttrValue::Text(record.source_ip.clone())),
        "destip" => Some(AttrValue::Text(record.dest_ip.clone())),
        "protocol" => Some(AttrValue::Text(record.protocol.clone())),
        "sourceport" => Some(AttrValue::Num(i64::from(record.source_port))),
        "destport" => Some(AttrValue::Num(i64::from(record.dest_port))),
        "bytes" => Some(AttrValue::Num(record.bytes as i64)),
        "packets" => Some(AttrValue::Num(record.packets as i64)),
        "reversebytes" => Some(AttrValue::Num(record.reverse_bytes as i64)),
        "reversepackets" => Some(AttrValue::Num(record.reverse_packets as i64)),
        "tcpflags" => Some(AttrValue::Num(i64::from(record.tcp_flags))),
        "tosvalue" => Some(AttrValue::Num(i64::from(record.tos_value))),
        "timestamp" => Some(AttrValue::Num(record.timestamp.timestamp_millis())),
        "flowstarttime" => record
            .flow_start_time
            .map(|t| AttrValue::Num(t.timestamp_millis())),
        "flowendtime" => record
            .flow_end_time
            .map(|t| AttrValue::Num(t.timestamp_millis())),
        _ => None,
    }
}

/// Whether a name refers to a numeric attribute, usable as a sort key
pub(crate) fn is_numeric_attribute(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "sourceport"
            | "destport"
            | "bytes"
            | "packets"
            | "reversebytes"
            | "reversepackets"
            | "tcpflags"
            | "tosvalue"
            | "timestamp"
            | "flowstarttime"
            | "flowendtime"
    )
}

fn num_eq(actual: i64, literal: &str) -> bool {
    if literal.contains('.') {
        literal
            .parse::<f64>()
            .map(|value| actual as f64 == value)
            .unwrap_or(false)
    } else {
        literal
            .parse::<i64>()
            .map(|value| actual == value)
            .unwrap_or(false)
    }
}

fn num_cmp(actual: i64, literal: &str, op: CompareOp) -> bool {
    let Ok(value) = literal.parse::<f64>() else {
        return false;
    };
    let actual = actual as f64;
    match op {
        CompareOp::Gt => actual > value,
        CompareOp::Ge => actual >= value,
        CompareOp::Lt => actual < value,
        CompareOp::Le => actual <= value,
        CompareOp::Eq | CompareOp::Ne => false,
    }
}
