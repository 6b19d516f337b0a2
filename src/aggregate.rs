//! Aggregates over one field: pushed down to SQL on the local engine, reduced client-side for the
//! remote backend (which cannot run SUM/AVG/GROUP BY on request).

use crate::config::BackendKind;
use crate::error::StorageError;
use crate::record::Record;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateOp {
    pub fn sql_function(&self) -> &'static str {
        match self {
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_function().to_ascii_lowercase())
    }
}

impl FromStr for AggregateOp {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(AggregateOp::Sum),
            "avg" => Ok(AggregateOp::Avg),
            "count" => Ok(AggregateOp::Count),
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            _ => Err(StorageError::MalformedQuery(format!(
                "unknown aggregate: {} (expected sum, avg, count, min or max)",
                s
            ))),
        }
    }
}

/// Where an aggregate is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateStrategy {
    /// The store evaluates the aggregate (`SELECT SUM(field) ...`).
    Native,
    /// Matching values are fetched and reduced in process with [`reduce`].
    ClientSide,
}

impl AggregateStrategy {
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Local => AggregateStrategy::Native,
            BackendKind::Remote => AggregateStrategy::ClientSide,
        }
    }
}

/// Numbers and numeric strings contribute; nulls and anything else are skipped.
fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reduce `field` over `rows`. `None` when no row matched; min/max are also `None` when every value is null.
/// Sum and avg over rows whose values are all null yield `0`. Count covers every non-null value,
/// the other ops only the numeric ones.
pub fn reduce(rows: &[Record], field: &str, op: AggregateOp) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let present: Vec<&Value> = rows
        .iter()
        .filter_map(|r| r.get(field))
        .filter(|v| !v.is_null())
        .collect();
    let values: Vec<f64> = present.iter().copied().filter_map(numeric).collect();

    match op {
        AggregateOp::Sum => Some(values.iter().sum()),
        AggregateOp::Avg => {
            if values.is_empty() {
                Some(0.0)
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AggregateOp::Count => Some(present.len() as f64),
        // Strict comparison keeps the first occurrence on ties.
        AggregateOp::Min => values
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, v| match acc {
                Some(m) if m <= v => Some(m),
                _ => Some(v),
            }),
        AggregateOp::Max => values
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, v| match acc {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            }),
    }
}
