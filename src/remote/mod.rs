//! Hosted table backend: fluent query builder, HTTP client, and the adapter over them.

mod adapter;
pub mod client;
pub mod query;

pub use adapter::RemoteAdapter;
pub use client::{RestClient, TableClient, NO_ROWS_CODE};
pub use query::TableQuery;
