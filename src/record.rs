//! Query descriptors and result shapes shared by both adapters.
//!
//! A record is a JSON object (field name -> scalar or null). Conditions are equality-only and
//! implicitly AND-ed; null entries are skipped so callers can pass optional filters straight through.

use crate::error::StorageError;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

pub type Record = serde_json::Map<String, Value>;

/// Page size applied when an offset is given without a limit.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn order_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)(?:\s+((?i:asc|desc)))?\s*$").expect("static regex")
    })
}

/// Reject anything that is not a plain identifier. Table and field names end up in SQL text and URLs.
pub fn check_ident(name: &str) -> Result<&str, StorageError> {
    if ident_re().is_match(name) {
        Ok(name)
    } else {
        Err(StorageError::MalformedQuery(format!("invalid identifier: {:?}", name)))
    }
}

/// Normalize a projection: `*` or a comma-separated identifier list. Returns the canonical form.
pub fn check_select(select: &str) -> Result<String, StorageError> {
    let trimmed = select.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok("*".to_string());
    }
    let cols = trimmed
        .split(',')
        .map(|c| check_ident(c.trim()).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols.join(","))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions(Vec<(String, Value)>);

impl Conditions {
    pub fn new() -> Self {
        Conditions(Vec::new())
    }

    /// Add an equality condition. A null value (e.g. `None`) is kept but ignored when the query is built.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, value);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.push((field.into(), value.into()));
    }

    /// Non-null conditions in insertion order.
    pub fn active(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// True when `record` satisfies every active condition.
    pub fn matches(&self, record: &Record) -> bool {
        self.active()
            .all(|(k, v)| record.get(k).map(|rv| values_equal(rv, v)).unwrap_or(false))
    }
}

impl From<Record> for Conditions {
    fn from(map: Record) -> Self {
        Conditions(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Conditions(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Loose equality: numbers compare by value so `1` matches `1.0`.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Single-row lookup target: a bare primary key or a conditions map.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Id(Value),
    Where(Conditions),
}

impl Lookup {
    pub fn into_conditions(self) -> Conditions {
        match self {
            Lookup::Id(id) => Conditions::new().eq("id", id),
            Lookup::Where(c) => c,
        }
    }
}

impl From<Conditions> for Lookup {
    fn from(c: Conditions) -> Self {
        Lookup::Where(c)
    }
}

impl From<&str> for Lookup {
    fn from(id: &str) -> Self {
        Lookup::Id(Value::String(id.to_string()))
    }
}

impl From<String> for Lookup {
    fn from(id: String) -> Self {
        Lookup::Id(Value::String(id))
    }
}

impl From<i64> for Lookup {
    fn from(id: i64) -> Self {
        Lookup::Id(Value::from(id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse `"field"`, `"field ASC"` or `"field DESC"` (direction case-insensitive).
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let caps = order_re()
            .captures(s)
            .ok_or_else(|| StorageError::MalformedQuery(format!("invalid order: {:?}", s)))?;
        let descending = caps
            .get(2)
            .map(|m| m.as_str().eq_ignore_ascii_case("desc"))
            .unwrap_or(false);
        Ok(OrderBy {
            field: caps[1].to_string(),
            descending,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    pub select: Option<String>,
    pub order: Option<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Parse an order string such as `"date DESC"`.
    pub fn order_str(mut self, order: &str) -> Result<Self, StorageError> {
        self.order = Some(OrderBy::parse(order)?);
        Ok(self)
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Zero limit and zero offset mean "not set". An offset without a limit pages by [`DEFAULT_PAGE_SIZE`].
    pub fn window(&self) -> (Option<u32>, Option<u32>) {
        let limit = self.limit.filter(|n| *n > 0);
        let offset = self.offset.filter(|n| *n > 0);
        match (limit, offset) {
            (None, Some(o)) => (Some(DEFAULT_PAGE_SIZE), Some(o)),
            other => other,
        }
    }

    pub fn projection(&self) -> Result<String, StorageError> {
        check_select(self.select.as_deref().unwrap_or("*"))
    }
}

/// Result of a table insert: backend id (surrogate or generated) plus the stored row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InsertOutcome {
    pub last_insert_id: Option<Value>,
    pub changes: u64,
    pub record: Record,
}

/// Result of a raw statement on the local engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub changes: u64,
    pub last_insert_id: i64,
}

/// Result of a delete. `changes` is `None` when the backend does not report affected rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub changes: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawOutcome {
    Rows(Vec<Record>),
    /// The active backend cannot execute arbitrary SQL.
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_parsing_accepts_direction_in_any_case() {
        assert_eq!(OrderBy::parse("date").unwrap(), OrderBy::asc("date"));
        assert_eq!(OrderBy::parse("date DESC").unwrap(), OrderBy::desc("date"));
        assert_eq!(OrderBy::parse("  date desc ").unwrap(), OrderBy::desc("date"));
        assert_eq!(OrderBy::parse("nom Asc").unwrap(), OrderBy::asc("nom"));
    }

    #[test]
    fn order_parsing_rejects_injection() {
        assert!(OrderBy::parse("date; DROP TABLE users").is_err());
        assert!(OrderBy::parse("date DESC, nom").is_err());
        assert!(OrderBy::parse("").is_err());
    }

    #[test]
    fn null_conditions_are_ignored() {
        let c = Conditions::new()
            .eq("zone", "Nord")
            .eq("statut", Value::Null)
            .eq("email", None::<String>);
        let active: Vec<_> = c.active().collect();
        assert_eq!(active, vec![("zone", &json!("Nord"))]);
        assert!(Conditions::new().eq("x", Value::Null).is_empty());
    }

    #[test]
    fn conditions_match_records_with_numeric_coercion() {
        let c = Conditions::new().eq("quantite", 10).eq("zone", "Nord");
        let rec = json!({"quantite": 10.0, "zone": "Nord"});
        assert!(c.matches(rec.as_object().unwrap()));
        let other = json!({"quantite": 10.0, "zone": "Sud"});
        assert!(!c.matches(other.as_object().unwrap()));
    }

    #[test]
    fn select_lists_are_normalized() {
        assert_eq!(check_select("").unwrap(), "*");
        assert_eq!(check_select("id, nom ,zone").unwrap(), "id,nom,zone");
        assert!(check_select("id, count(*)").is_err());
    }

    #[test]
    fn window_defaults_limit_when_only_offset_given() {
        assert_eq!(QueryOptions::new().offset(20).window(), (Some(100), Some(20)));
        assert_eq!(QueryOptions::new().limit(0).offset(0).window(), (None, None));
        assert_eq!(QueryOptions::new().limit(5).window(), (Some(5), None));
    }
}
