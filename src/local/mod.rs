//! Embedded SQLite adapter: on-disk file, WAL journal, catalog bootstrapped on open.

pub(crate) mod ops;

use crate::aggregate::AggregateOp;
use crate::catalog::{self, Table};
use crate::config::BackendKind;
use crate::error::StoreError;
use crate::record::{Conditions, InsertOutcome, Lookup, QueryOptions, RawOutcome, Record, RunOutcome, WriteOutcome};
use crate::store::TableStore;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LocalAdapter {
    pool: SqlitePool,
    path: PathBuf,
}

impl LocalAdapter {
    /// Create the parent directory and file if missing, open with WAL, and create the catalog.
    /// Safe to call on every start.
    pub async fn initialize(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(opts)
            .await?;

        let mut conn = pool.acquire().await?;
        catalog::ensure_tables(&mut conn).await?;
        drop(conn);

        tracing::info!(path = %path.display(), "sqlite database initialized");
        Ok(LocalAdapter { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn conn(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    /// INSERT/UPDATE/DELETE with bound parameters.
    pub async fn run(&self, sql: &str, params: &[Value]) -> Result<RunOutcome, StoreError> {
        let mut conn = self.conn().await?;
        ops::execute(&mut conn, sql, params).await
    }

    /// First row of a SELECT, `None` for zero rows.
    pub async fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, StoreError> {
        let mut conn = self.conn().await?;
        ops::fetch_optional(&mut conn, sql, params).await
    }

    /// All rows of a SELECT.
    pub async fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StoreError> {
        let mut conn = self.conn().await?;
        ops::fetch_all(&mut conn, sql, params).await
    }
}

/// Catalog tables without an `updated_at` column are not stamped; unknown tables are left alone.
pub(crate) fn stamps_updated_at(table: &str) -> bool {
    Table::from_str(table).map(|t| t.has_updated_at()).unwrap_or(false)
}

#[async_trait]
impl TableStore for LocalAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn insert(&self, table: &str, record: Record) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.conn().await?;
        ops::insert(&mut conn, table, &record).await
    }

    async fn bulk_insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(records.len());
        for record in &records {
            out.push(ops::insert(&mut tx, table, record).await?.record);
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        on_conflict: &str,
    ) -> Result<Vec<Record>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(row) = ops::upsert(&mut tx, table, record, on_conflict).await? {
                out.push(row);
            }
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn find_one(&self, table: &str, lookup: Lookup, select: &str) -> Result<Option<Record>, StoreError> {
        let mut conn = self.conn().await?;
        ops::find_one(&mut conn, table, lookup, select).await
    }

    async fn find_all(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let mut conn = self.conn().await?;
        ops::find_all(&mut conn, table, conditions, options).await
    }

    async fn update(&self, table: &str, id: &Value, changes: Record) -> Result<Option<Record>, StoreError> {
        let mut conn = self.conn().await?;
        ops::update(&mut conn, table, id, &changes, stamps_updated_at(table)).await
    }

    async fn delete(&self, table: &str, id: &Value) -> Result<WriteOutcome, StoreError> {
        let mut conn = self.conn().await?;
        ops::delete(&mut conn, table, id).await
    }

    async fn count(&self, table: &str, conditions: &Conditions) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        ops::count(&mut conn, table, conditions).await
    }

    async fn aggregate(
        &self,
        table: &str,
        field: &str,
        op: AggregateOp,
        conditions: &Conditions,
    ) -> Result<Option<f64>, StoreError> {
        let mut conn = self.conn().await?;
        ops::aggregate(&mut conn, table, field, op, conditions).await
    }

    async fn raw(&self, sql: &str) -> Result<RawOutcome, StoreError> {
        Ok(RawOutcome::Rows(self.all(sql, &[]).await?))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.get("SELECT 1", &[]).await.map(|_| ())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!(path = %self.path.display(), "sqlite connection closed");
    }
}
