//! Unified facade: one object, one active backend chosen at initialization.
//!
//! Two method families live here. The SQL family (`run`, `get`, `all`) talks to the embedded engine
//! directly and is refused with [`ConfigError::UnsupportedOnBackend`] when the remote backend is
//! active. The table family (`insert`, `find_one`, `find_all`, `update`, `delete`, `count`,
//! `aggregate`, ...) works against whichever backend is active.

use crate::aggregate::{AggregateOp, AggregateStrategy};
use crate::catalog::Table;
use crate::config::{BackendKind, StoreConfig};
use crate::error::{ConfigError, StoreError};
use crate::id::generate_id;
use crate::local::{self, ops, LocalAdapter};
use crate::record::{
    Conditions, InsertOutcome, Lookup, QueryOptions, RawOutcome, Record, RunOutcome, WriteOutcome,
};
use crate::remote::{RemoteAdapter, TableClient};
use crate::store::TableStore;
use serde_json::Value;
use sqlx::Sqlite;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

enum Backend {
    Local(LocalAdapter),
    Remote(RemoteAdapter),
}

impl Backend {
    fn store(&self) -> &dyn TableStore {
        match self {
            Backend::Local(l) => l,
            Backend::Remote(r) => r,
        }
    }
}

/// Observable facade state. Construction performs `Uninitialized -> Initializing -> Ready`;
/// a failed initialization returns an error instead of a facade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Ready(BackendKind),
    Closed,
}

pub struct Database {
    backend: Backend,
    closed: AtomicBool,
}

impl Database {
    /// Select the remote backend when credentials are present and valid, the local one otherwise.
    pub async fn initialize(config: &StoreConfig) -> Result<Self, StoreError> {
        match &config.remote {
            Some(creds) => match RemoteAdapter::connect(creds) {
                Ok(remote) => {
                    tracing::info!(backend = "remote", "database backend selected");
                    return Ok(Self::from_remote(remote));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "remote backend unavailable; falling back to sqlite");
                }
            },
            None => tracing::info!("no remote credentials; using sqlite"),
        }
        let local = LocalAdapter::initialize(&config.db_path)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "sqlite initialization failed"))?;
        tracing::info!(backend = "local", path = %config.db_path.display(), "database backend selected");
        Ok(Self::from_local(local))
    }

    pub fn from_local(adapter: LocalAdapter) -> Self {
        Database {
            backend: Backend::Local(adapter),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_remote(adapter: RemoteAdapter) -> Self {
        Database {
            backend: Backend::Remote(adapter),
            closed: AtomicBool::new(false),
        }
    }

    /// Remote facade over an arbitrary table client.
    pub fn with_remote_client(client: Arc<dyn TableClient>) -> Self {
        Self::from_remote(RemoteAdapter::with_client(client))
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.store().kind()
    }

    pub fn is_remote(&self) -> bool {
        self.backend_kind() == BackendKind::Remote
    }

    pub fn aggregate_strategy(&self) -> AggregateStrategy {
        AggregateStrategy::for_backend(self.backend_kind())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.closed.load(Ordering::Acquire) {
            Lifecycle::Closed
        } else {
            Lifecycle::Ready(self.backend_kind())
        }
    }

    fn active(&self) -> Result<&Backend, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConfigError::Closed.into());
        }
        Ok(&self.backend)
    }

    fn store(&self) -> Result<&dyn TableStore, StoreError> {
        Ok(self.active()?.store())
    }

    fn local(&self, operation: &'static str) -> Result<&LocalAdapter, StoreError> {
        match self.active()? {
            Backend::Local(l) => Ok(l),
            Backend::Remote(_) => Err(ConfigError::UnsupportedOnBackend {
                operation,
                backend: BackendKind::Remote.as_str(),
            }
            .into()),
        }
    }

    // SQL family: local engine only.

    pub async fn run(&self, sql: &str, params: &[Value]) -> Result<RunOutcome, StoreError> {
        self.local("run")?.run(sql, params).await
    }

    pub async fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, StoreError> {
        self.local("get")?.get(sql, params).await
    }

    pub async fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StoreError> {
        self.local("all")?.all(sql, params).await
    }

    /// Arbitrary SQL on the local engine. Refused like the SQL family on the remote backend,
    /// whose adapter only answers [`RawOutcome::Unsupported`].
    pub async fn raw(&self, sql: &str) -> Result<Vec<Record>, StoreError> {
        match self.local("raw")?.raw(sql).await? {
            RawOutcome::Rows(rows) => Ok(rows),
            RawOutcome::Unsupported => Err(ConfigError::UnsupportedOnBackend {
                operation: "raw",
                backend: BackendKind::Local.as_str(),
            }
            .into()),
        }
    }

    // Table family: either backend.

    pub async fn insert(&self, table: &str, record: Record) -> Result<InsertOutcome, StoreError> {
        self.store()?.insert(table, record).await
    }

    pub async fn bulk_insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        self.store()?.bulk_insert(table, records).await
    }

    pub async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        on_conflict: &str,
    ) -> Result<Vec<Record>, StoreError> {
        self.store()?.upsert(table, records, on_conflict).await
    }

    pub async fn find_one(
        &self,
        table: &str,
        lookup: impl Into<Lookup>,
        select: &str,
    ) -> Result<Option<Record>, StoreError> {
        self.store()?.find_one(table, lookup.into(), select).await
    }

    pub async fn find_all(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError> {
        self.store()?.find_all(table, conditions, options).await
    }

    pub async fn update(&self, table: &str, id: &Value, changes: Record) -> Result<Option<Record>, StoreError> {
        self.store()?.update(table, id, changes).await
    }

    pub async fn delete(&self, table: &str, id: &Value) -> Result<WriteOutcome, StoreError> {
        self.store()?.delete(table, id).await
    }

    pub async fn count(&self, table: &str, conditions: &Conditions) -> Result<u64, StoreError> {
        self.store()?.count(table, conditions).await
    }

    pub async fn aggregate(
        &self,
        table: &str,
        field: &str,
        op: AggregateOp,
        conditions: &Conditions,
    ) -> Result<Option<f64>, StoreError> {
        self.store()?.aggregate(table, field, op, conditions).await
    }

    /// Next id for `table`: read every existing id, then format `count + 1`.
    /// Two callers racing here can compute the same id; the primary key is the only guard.
    pub async fn next_id(&self, table: &str, prefix: &str, width: usize) -> Result<String, StoreError> {
        let existing = self
            .find_all(table, &Conditions::new(), &QueryOptions::new().select("id"))
            .await?;
        Ok(generate_id(prefix, &existing, width))
    }

    /// [`Database::next_id`] with the catalog's prefix and width. `None` for tables keyed by integer.
    pub async fn next_id_for(&self, table: Table) -> Result<Option<String>, StoreError> {
        match table.id_format() {
            Some((prefix, width)) => self.next_id(table.name(), prefix, width).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store()?.ping().await
    }

    /// Run `f` as a unit. Atomic (commit or rollback) on the local engine; on the remote backend
    /// `f` runs immediately with no rollback, so callers must not rely on all-or-nothing there.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Transaction<'_>) -> BoxFuture<'t, Result<T, StoreError>> + Send,
    {
        match self.active()? {
            Backend::Local(local) => {
                let mut tx = local.pool().begin().await?;
                let result = {
                    let mut scope = Transaction::Local(&mut tx);
                    f(&mut scope).await
                };
                match result {
                    Ok(v) => {
                        tx.commit().await?;
                        Ok(v)
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "transaction rolled back");
                        tx.rollback().await?;
                        Err(e)
                    }
                }
            }
            Backend::Remote(remote) => {
                tracing::warn!("transactions are not atomic on the remote backend");
                let mut scope = Transaction::Remote(remote);
                f(&mut scope).await
            }
        }
    }

    /// Release the backend. Every later call fails with [`ConfigError::Closed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.backend.store().close().await;
        tracing::info!("database connection closed");
    }
}

/// Operations available inside [`Database::transaction`].
pub enum Transaction<'a> {
    Local(&'a mut sqlx::Transaction<'static, Sqlite>),
    Remote(&'a RemoteAdapter),
}

impl Transaction<'_> {
    pub fn is_atomic(&self) -> bool {
        matches!(self, Transaction::Local(_))
    }

    fn unsupported(operation: &'static str) -> StoreError {
        ConfigError::UnsupportedOnBackend {
            operation,
            backend: BackendKind::Remote.as_str(),
        }
        .into()
    }

    pub async fn run(&mut self, sql: &str, params: &[Value]) -> Result<RunOutcome, StoreError> {
        match self {
            Transaction::Local(tx) => ops::execute(tx, sql, params).await,
            Transaction::Remote(_) => Err(Self::unsupported("run")),
        }
    }

    pub async fn get(&mut self, sql: &str, params: &[Value]) -> Result<Option<Record>, StoreError> {
        match self {
            Transaction::Local(tx) => ops::fetch_optional(tx, sql, params).await,
            Transaction::Remote(_) => Err(Self::unsupported("get")),
        }
    }

    pub async fn all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StoreError> {
        match self {
            Transaction::Local(tx) => ops::fetch_all(tx, sql, params).await,
            Transaction::Remote(_) => Err(Self::unsupported("all")),
        }
    }

    pub async fn insert(&mut self, table: &str, record: Record) -> Result<InsertOutcome, StoreError> {
        match self {
            Transaction::Local(tx) => ops::insert(tx, table, &record).await,
            Transaction::Remote(r) => r.insert(table, record).await,
        }
    }

    pub async fn find_one(
        &mut self,
        table: &str,
        lookup: impl Into<Lookup>,
        select: &str,
    ) -> Result<Option<Record>, StoreError> {
        match self {
            Transaction::Local(tx) => ops::find_one(tx, table, lookup.into(), select).await,
            Transaction::Remote(r) => r.find_one(table, lookup.into(), select).await,
        }
    }

    pub async fn find_all(
        &mut self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError> {
        match self {
            Transaction::Local(tx) => ops::find_all(tx, table, conditions, options).await,
            Transaction::Remote(r) => r.find_all(table, conditions, options).await,
        }
    }

    pub async fn update(&mut self, table: &str, id: &Value, changes: Record) -> Result<Option<Record>, StoreError> {
        match self {
            Transaction::Local(tx) => {
                ops::update(tx, table, id, &changes, local::stamps_updated_at(table)).await
            }
            Transaction::Remote(r) => r.update(table, id, changes).await,
        }
    }

    pub async fn delete(&mut self, table: &str, id: &Value) -> Result<WriteOutcome, StoreError> {
        match self {
            Transaction::Local(tx) => ops::delete(tx, table, id).await,
            Transaction::Remote(r) => r.delete(table, id).await,
        }
    }

    pub async fn count(&mut self, table: &str, conditions: &Conditions) -> Result<u64, StoreError> {
        match self {
            Transaction::Local(tx) => ops::count(tx, table, conditions).await,
            Transaction::Remote(r) => r.count(table, conditions).await,
        }
    }
}
