//! The capability set both adapters implement. The facade holds exactly one implementation.

use crate::aggregate::AggregateOp;
use crate::config::BackendKind;
use crate::error::StoreError;
use crate::record::{Conditions, InsertOutcome, Lookup, QueryOptions, RawOutcome, Record, WriteOutcome};
use async_trait::async_trait;
use serde_json::Value;

/// Table-oriented read/write primitives, uniform across backends.
///
/// Filtering is equality-only (AND of `field = value`); there is no range, LIKE or OR composition.
#[async_trait]
pub trait TableStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Insert one record; the outcome carries the stored row and its id.
    async fn insert(&self, table: &str, record: Record) -> Result<InsertOutcome, StoreError>;

    /// Insert many records, returning the stored rows.
    async fn bulk_insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Record>, StoreError>;

    /// Insert or overwrite records keyed by `on_conflict`.
    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        on_conflict: &str,
    ) -> Result<Vec<Record>, StoreError>;

    /// First matching row, or `None`. Zero rows is never an error.
    async fn find_one(&self, table: &str, lookup: Lookup, select: &str) -> Result<Option<Record>, StoreError>;

    /// All matching rows; empty when nothing matches.
    async fn find_all(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError>;

    /// Update by primary key and stamp `updated_at`. `None` when no row has that id.
    ///
    /// `collections` and `transactions` carry no `updated_at` column and are never stamped.
    async fn update(&self, table: &str, id: &Value, changes: Record) -> Result<Option<Record>, StoreError>;

    /// Delete by primary key. Zero affected rows is still success.
    async fn delete(&self, table: &str, id: &Value) -> Result<WriteOutcome, StoreError>;

    async fn count(&self, table: &str, conditions: &Conditions) -> Result<u64, StoreError>;

    /// `op` over non-null values of `field` in matching rows; `None` when no row matched.
    async fn aggregate(
        &self,
        table: &str,
        field: &str,
        op: AggregateOp,
        conditions: &Conditions,
    ) -> Result<Option<f64>, StoreError>;

    /// Arbitrary SQL, where the backend can run it.
    async fn raw(&self, sql: &str) -> Result<RawOutcome, StoreError>;

    /// Cheap round trip proving the backend answers.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the connection or client handle.
    async fn close(&self);
}
