//! Remote adapter: translates descriptors into `TableQuery` calls and emulates aggregates client-side.

use crate::aggregate::{self, AggregateOp};
use crate::catalog::Table;
use crate::config::{validate_remote, BackendKind, RemoteCredentials};
use crate::error::{ConfigError, StorageError, StoreError};
use crate::record::{Conditions, InsertOutcome, Lookup, QueryOptions, RawOutcome, Record, WriteOutcome};
use crate::remote::client::{RestClient, TableClient, NO_ROWS_CODE};
use crate::remote::query::TableQuery;
use crate::store::TableStore;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

pub struct RemoteAdapter {
    client: RwLock<Option<Arc<dyn TableClient>>>,
}

impl RemoteAdapter {
    /// Validate credentials and build the HTTP client. No request is sent.
    pub fn connect(creds: &RemoteCredentials) -> Result<Self, StoreError> {
        let url = validate_remote(creds)?;
        let client = RestClient::new(&url, creds.key.trim())?;
        tracing::info!(url = %url, "remote table backend connected");
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Wrap any table client (e.g. an in-process one).
    pub fn with_client(client: Arc<dyn TableClient>) -> Self {
        RemoteAdapter {
            client: RwLock::new(Some(client)),
        }
    }

    fn client(&self) -> Result<Arc<dyn TableClient>, StoreError> {
        let guard = self
            .client
            .read()
            .map_err(|_| StorageError::Decode("remote client lock poisoned".into()))?;
        guard.clone().ok_or_else(|| ConfigError::Closed.into())
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Catalog tables without `updated_at` are not stamped; unknown tables are.
fn stamps_updated_at(table: &str) -> bool {
    Table::from_str(table).map(|t| t.has_updated_at()).unwrap_or(true)
}

#[async_trait]
impl TableStore for RemoteAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn insert(&self, table: &str, record: Record) -> Result<InsertOutcome, StoreError> {
        let rows = self.client()?.insert(table, &[record], None).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Decode(format!("insert into {} returned no row", table)))?;
        Ok(InsertOutcome {
            last_insert_id: row.get("id").cloned(),
            changes: 1,
            record: row,
        })
    }

    async fn bulk_insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.client()?.insert(table, &records, None).await?)
    }

    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        on_conflict: &str,
    ) -> Result<Vec<Record>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.client()?.insert(table, &records, Some(on_conflict)).await?)
    }

    async fn find_one(&self, table: &str, lookup: Lookup, select: &str) -> Result<Option<Record>, StoreError> {
        let query = TableQuery::from(table)?
            .select(select)?
            .filter(&lookup.into_conditions())?
            .limit(1);
        match self.client()?.select_single(&query).await {
            Ok(row) => Ok(Some(row)),
            Err(e) if e.remote_code() == Some(NO_ROWS_CODE) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_all(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let query = TableQuery::from(table)?.filter(conditions)?.options(options)?;
        Ok(self.client()?.select(&query).await?)
    }

    async fn update(&self, table: &str, id: &Value, mut changes: Record) -> Result<Option<Record>, StoreError> {
        changes.remove("id");
        if stamps_updated_at(table) {
            changes.insert("updated_at".to_string(), Value::String(now_timestamp()));
        }
        let query = TableQuery::from(table)?.eq("id", id.clone())?;
        let rows = self.client()?.update(&query, &changes).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, table: &str, id: &Value) -> Result<WriteOutcome, StoreError> {
        let query = TableQuery::from(table)?.eq("id", id.clone())?;
        self.client()?.delete(&query).await?;
        Ok(WriteOutcome {
            success: true,
            changes: None,
        })
    }

    async fn count(&self, table: &str, conditions: &Conditions) -> Result<u64, StoreError> {
        let query = TableQuery::from(table)?.filter(conditions)?;
        Ok(self.client()?.count(&query).await?)
    }

    async fn aggregate(
        &self,
        table: &str,
        field: &str,
        op: AggregateOp,
        conditions: &Conditions,
    ) -> Result<Option<f64>, StoreError> {
        let query = TableQuery::from(table)?.select(field)?.filter(conditions)?;
        let rows = self.client()?.select(&query).await?;
        tracing::debug!(table, field, op = %op, rows = rows.len(), "client-side aggregate");
        Ok(aggregate::reduce(&rows, field, op))
    }

    async fn raw(&self, sql: &str) -> Result<RawOutcome, StoreError> {
        tracing::warn!(sql = %sql, "raw SQL is not supported by the remote backend");
        Ok(RawOutcome::Unsupported)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.count(Table::Users.name(), &Conditions::new()).await.map(|_| ())
    }

    async fn close(&self) {
        if let Ok(mut guard) = self.client.write() {
            guard.take();
        }
        tracing::info!("remote table backend closed");
    }
}
