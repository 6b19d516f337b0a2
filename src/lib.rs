//! Data-access layer for the cooperative ERP: one facade over an embedded SQLite file
//! or a hosted table API, selected at startup.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod id;
pub mod local;
pub mod record;
pub mod remote;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;

pub use aggregate::{AggregateOp, AggregateStrategy};
pub use catalog::Table;
pub use config::{BackendKind, RemoteCredentials, StoreConfig};
pub use database::{Database, Lifecycle, Transaction};
pub use error::{ConfigError, StorageError, StoreError};
pub use id::{format_id, generate_id};
pub use local::LocalAdapter;
pub use record::{
    Conditions, InsertOutcome, Lookup, OrderBy, QueryOptions, RawOutcome, Record, RunOutcome, WriteOutcome,
};
pub use remote::{RemoteAdapter, RestClient, TableClient, TableQuery, NO_ROWS_CODE};
pub use routes::common_routes;
pub use state::AppState;
pub use store::TableStore;
