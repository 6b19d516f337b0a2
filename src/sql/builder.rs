//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and aggregate statements for SQLite.

use crate::aggregate::AggregateOp;
use crate::error::StorageError;
use crate::record::{check_ident, check_select, Conditions, QueryOptions, Record};
use serde_json::Value;

/// Quote identifier for SQLite. Callers validate with `check_ident` first.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn quoted_table(table: &str) -> Result<String, StorageError> {
    Ok(quoted(check_ident(table)?))
}

fn column_list(select: &str) -> Result<String, StorageError> {
    let select = check_select(select)?;
    if select == "*" {
        return Ok(select);
    }
    Ok(select.split(',').map(quoted).collect::<Vec<_>>().join(", "))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) {
        self.params.push(v);
    }

    /// ` WHERE a = ? AND b = ?` over active conditions, or empty.
    fn where_clause(&mut self, conditions: &Conditions) -> Result<String, StorageError> {
        let mut parts = Vec::new();
        for (col, val) in conditions.active() {
            parts.push(format!("{} = ?", quoted(check_ident(col)?)));
            self.push_param(val.clone());
        }
        Ok(if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        })
    }
}

/// SELECT with equality filters, optional ORDER BY and LIMIT/OFFSET window.
pub fn select(
    table: &str,
    conditions: &Conditions,
    options: &QueryOptions,
) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    let cols = column_list(options.select.as_deref().unwrap_or("*"))?;
    let where_clause = q.where_clause(conditions)?;
    let order_clause = match &options.order {
        Some(o) => format!(
            " ORDER BY {} {}",
            quoted(check_ident(&o.field)?),
            if o.descending { "DESC" } else { "ASC" }
        ),
        None => String::new(),
    };
    let (limit, offset) = options.window();
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        cols, table, where_clause, order_clause, limit_clause, offset_clause
    );
    Ok(q)
}

/// SELECT first matching row.
pub fn select_one(table: &str, conditions: &Conditions, select: &str) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    let cols = column_list(select)?;
    let where_clause = q.where_clause(conditions)?;
    q.sql = format!("SELECT {} FROM {}{} LIMIT 1", cols, table, where_clause);
    Ok(q)
}

/// INSERT one row and return it. An empty record inserts column defaults.
pub fn insert(table: &str, record: &Record) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    if record.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table);
        return Ok(q);
    }
    let mut cols = Vec::with_capacity(record.len());
    for (k, v) in record {
        cols.push(quoted(check_ident(k)?));
        q.push_param(v.clone());
    }
    let placeholders = vec!["?"; cols.len()].join(", ");
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        table,
        cols.join(", "),
        placeholders
    );
    Ok(q)
}

/// INSERT or, on conflict with `on_conflict`, overwrite every other supplied column.
pub fn upsert(table: &str, record: &Record, on_conflict: &str) -> Result<QueryBuf, StorageError> {
    let conflict = quoted(check_ident(on_conflict)?);
    let mut q = insert(table, record)?;
    let sets: Vec<String> = record
        .keys()
        .filter(|k| k.as_str() != on_conflict)
        .map(|k| format!("{0} = excluded.{0}", quoted(k)))
        .collect();
    let action = if sets.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", sets.join(", "))
    };
    let base = q.sql.trim_end_matches(" RETURNING *").to_string();
    q.sql = format!("{} ON CONFLICT({}) {} RETURNING *", base, conflict, action);
    Ok(q)
}

/// UPDATE by id, setting only supplied columns; `id` in the body is ignored.
/// With `stamp_updated_at`, `updated_at` is set to CURRENT_TIMESTAMP.
pub fn update(
    table: &str,
    id: &Value,
    changes: &Record,
    stamp_updated_at: bool,
) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    let mut sets = Vec::new();
    for (k, v) in changes {
        if k == "id" || (stamp_updated_at && k == "updated_at") {
            continue;
        }
        sets.push(format!("{} = ?", quoted(check_ident(k)?)));
        q.push_param(v.clone());
    }
    if stamp_updated_at {
        sets.push(format!("{} = CURRENT_TIMESTAMP", quoted("updated_at")));
    }
    if sets.is_empty() {
        q.params.clear();
        q.sql = format!("SELECT * FROM {} WHERE {} = ?", table, quoted("id"));
        q.push_param(id.clone());
        return Ok(q);
    }
    q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ? RETURNING *",
        table,
        sets.join(", "),
        quoted("id")
    );
    Ok(q)
}

/// DELETE by id.
pub fn delete(table: &str, id: &Value) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    q.push_param(id.clone());
    q.sql = format!("DELETE FROM {} WHERE {} = ?", table, quoted("id"));
    Ok(q)
}

pub fn count(table: &str, conditions: &Conditions) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    let where_clause = q.where_clause(conditions)?;
    q.sql = format!("SELECT COUNT(*) AS count FROM {}{}", table, where_clause);
    Ok(q)
}

/// `SELECT OP(field) AS value, COUNT(*) AS matched ...`; `matched` distinguishes "no rows" from "all null".
pub fn aggregate(
    table: &str,
    field: &str,
    op: AggregateOp,
    conditions: &Conditions,
) -> Result<QueryBuf, StorageError> {
    let mut q = QueryBuf::new();
    let table = quoted_table(table)?;
    let field = quoted(check_ident(field)?);
    let where_clause = q.where_clause(conditions)?;
    q.sql = format!(
        "SELECT {}({}) AS value, COUNT(*) AS matched FROM {}{}",
        op.sql_function(),
        field,
        table,
        where_clause
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OrderBy;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn select_builds_where_order_and_window() {
        let c = Conditions::new().eq("zone", "Nord").eq("statut", Value::Null);
        let o = QueryOptions::new().order(OrderBy::desc("date")).limit(10).offset(20);
        let q = select("producers", &c, &o).unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM \"producers\" WHERE \"zone\" = ? ORDER BY \"date\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![json!("Nord")]);
    }

    #[test]
    fn select_projection_is_quoted() {
        let q = select("producers", &Conditions::new(), &QueryOptions::new().select("id, nom")).unwrap();
        assert_eq!(q.sql, "SELECT \"id\", \"nom\" FROM \"producers\"");
    }

    #[test]
    fn bad_identifiers_are_rejected() {
        let c = Conditions::new().eq("zone = zone OR 1", 1);
        assert!(select("producers", &c, &QueryOptions::new()).is_err());
        assert!(insert("producers; --", &Record::new()).is_err());
    }

    #[test]
    fn update_skips_id_and_stamps() {
        let q = update("producers", &json!("PROD-0001"), &rec(json!({"id": "X", "nom": "A"})), true).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"producers\" SET \"nom\" = ?, \"updated_at\" = CURRENT_TIMESTAMP WHERE \"id\" = ? RETURNING *"
        );
        assert_eq!(q.params, vec![json!("A"), json!("PROD-0001")]);
    }

    #[test]
    fn empty_update_without_stamp_reads_row() {
        let q = update("collections", &json!("COLL-00001"), &Record::new(), false).unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"collections\" WHERE \"id\" = ?");
        assert_eq!(q.params, vec![json!("COLL-00001")]);
    }

    #[test]
    fn upsert_updates_non_key_columns() {
        let q = upsert("customers", &rec(json!({"id": "CUST-0001", "nom": "B"})), "id").unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"customers\" (\"id\", \"nom\") VALUES (?, ?) ON CONFLICT(\"id\") DO UPDATE SET \"nom\" = excluded.\"nom\" RETURNING *"
        );
    }

    #[test]
    fn aggregate_reports_matched_rows() {
        let q = aggregate("collections", "quantite", AggregateOp::Sum, &Conditions::new().eq("qualite", "A")).unwrap();
        assert_eq!(
            q.sql,
            "SELECT SUM(\"quantite\") AS value, COUNT(*) AS matched FROM \"collections\" WHERE \"qualite\" = ?"
        );
    }
}
