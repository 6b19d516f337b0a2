//! Statement execution over one SQLite connection. Shared by the pooled adapter and by open transactions.

use crate::aggregate::AggregateOp;
use crate::error::{StorageError, StoreError};
use crate::record::{Conditions, InsertOutcome, Lookup, QueryOptions, Record, RunOutcome, WriteOutcome};
use crate::sql::{self, row_to_record, QueryBuf, SqliteBindValue};
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::query::Query;
use sqlx::{Row, SqliteConnection};

fn bind_all<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(SqliteBindValue::from_json(p));
    }
    query
}

fn log_failure(op: &'static str, sql: &str, e: &sqlx::Error) {
    tracing::error!(op, sql = %sql, error = %e, "sqlite statement failed");
}

pub async fn execute(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<RunOutcome, StoreError> {
    tracing::debug!(sql = %sql, params = ?params, "execute");
    let res = bind_all(sql, params)
        .execute(&mut *conn)
        .await
        .inspect_err(|e| log_failure("run", sql, e))?;
    Ok(RunOutcome {
        changes: res.rows_affected(),
        last_insert_id: res.last_insert_rowid(),
    })
}

pub async fn fetch_optional(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<Option<Record>, StoreError> {
    tracing::debug!(sql = %sql, params = ?params, "query");
    let row = bind_all(sql, params)
        .fetch_optional(&mut *conn)
        .await
        .inspect_err(|e| log_failure("get", sql, e))?;
    Ok(row.map(|r| row_to_record(&r)))
}

pub async fn fetch_all(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<Vec<Record>, StoreError> {
    tracing::debug!(sql = %sql, params = ?params, "query");
    let rows = bind_all(sql, params)
        .fetch_all(&mut *conn)
        .await
        .inspect_err(|e| log_failure("all", sql, e))?;
    Ok(rows.iter().map(row_to_record).collect())
}

async fn returning_one(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<Option<Record>, StoreError> {
    fetch_optional(conn, &q.sql, &q.params).await
}

pub async fn insert(conn: &mut SqliteConnection, table: &str, record: &Record) -> Result<InsertOutcome, StoreError> {
    let q = sql::insert(table, record)?;
    let row = returning_one(conn, &q)
        .await?
        .ok_or_else(|| StorageError::Decode(format!("insert into {} returned no row", table)))?;
    Ok(InsertOutcome {
        last_insert_id: row.get("id").cloned(),
        changes: 1,
        record: row,
    })
}

pub async fn upsert(
    conn: &mut SqliteConnection,
    table: &str,
    record: &Record,
    on_conflict: &str,
) -> Result<Option<Record>, StoreError> {
    let q = sql::upsert(table, record, on_conflict)?;
    returning_one(conn, &q).await
}

pub async fn find_one(
    conn: &mut SqliteConnection,
    table: &str,
    lookup: Lookup,
    select: &str,
) -> Result<Option<Record>, StoreError> {
    let q = sql::select_one(table, &lookup.into_conditions(), select)?;
    returning_one(conn, &q).await
}

pub async fn find_all(
    conn: &mut SqliteConnection,
    table: &str,
    conditions: &Conditions,
    options: &QueryOptions,
) -> Result<Vec<Record>, StoreError> {
    let q = sql::select(table, conditions, options)?;
    fetch_all(conn, &q.sql, &q.params).await
}

pub async fn update(
    conn: &mut SqliteConnection,
    table: &str,
    id: &Value,
    changes: &Record,
    stamp_updated_at: bool,
) -> Result<Option<Record>, StoreError> {
    let q = sql::update(table, id, changes, stamp_updated_at)?;
    returning_one(conn, &q).await
}

pub async fn delete(conn: &mut SqliteConnection, table: &str, id: &Value) -> Result<WriteOutcome, StoreError> {
    let q = sql::delete(table, id)?;
    let res = execute(conn, &q.sql, &q.params).await?;
    Ok(WriteOutcome {
        success: true,
        changes: Some(res.changes),
    })
}

pub async fn count(conn: &mut SqliteConnection, table: &str, conditions: &Conditions) -> Result<u64, StoreError> {
    let q = sql::count(table, conditions)?;
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_all(&q.sql, &q.params)
        .fetch_one(&mut *conn)
        .await
        .inspect_err(|e| log_failure("count", &q.sql, e))?;
    let n: i64 = row.try_get("count")?;
    Ok(n.max(0) as u64)
}

/// Native aggregate. `None` when no row matched.
pub async fn aggregate(
    conn: &mut SqliteConnection,
    table: &str,
    field: &str,
    op: AggregateOp,
    conditions: &Conditions,
) -> Result<Option<f64>, StoreError> {
    let q = sql::aggregate(table, field, op, conditions)?;
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_all(&q.sql, &q.params)
        .fetch_one(&mut *conn)
        .await
        .inspect_err(|e| log_failure("aggregate", &q.sql, e))?;
    let matched: i64 = row.try_get("matched")?;
    if matched == 0 {
        return Ok(None);
    }
    let value: Option<f64> = row.try_get_unchecked("value")?;
    Ok(match op {
        AggregateOp::Min | AggregateOp::Max => value,
        _ => Some(value.unwrap_or(0.0)),
    })
}
