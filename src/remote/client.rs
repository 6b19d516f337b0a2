//! The remote table API and its HTTP implementation (PostgREST, as served by Supabase).

use crate::error::StorageError;
use crate::record::Record;
use crate::remote::query::TableQuery;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use std::time::Duration;

/// Error code the remote API returns when a single-row read matches no row.
pub const NO_ROWS_CODE: &str = "PGRST116";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

/// Table-oriented remote backend. No arbitrary SQL, no server-side aggregates.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Record>, StorageError>;

    /// Exactly one row. Zero (or several) rows is an error carrying [`NO_ROWS_CODE`].
    async fn select_single(&self, query: &TableQuery) -> Result<Record, StorageError>;

    /// Insert rows and return them as stored. With `on_conflict`, duplicates are merged.
    async fn insert(
        &self,
        table: &str,
        rows: &[Record],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Record>, StorageError>;

    /// Patch rows matching the query filters and return them.
    async fn update(&self, query: &TableQuery, changes: &Record) -> Result<Vec<Record>, StorageError>;

    async fn delete(&self, query: &TableQuery) -> Result<(), StorageError>;

    /// Exact count of rows matching the query filters, without fetching them.
    async fn count(&self, query: &TableQuery) -> Result<u64, StorageError>;
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

pub struct RestClient {
    http: Client,
    base: Url,
}

impl RestClient {
    /// `base_url` is the project url; tables live under `/rest/v1/`.
    pub fn new(base_url: &Url, key: &str) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(key)
            .map_err(|e| StorageError::MalformedQuery(format!("api key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| StorageError::MalformedQuery(format!("api key: {}", e)))?;
        headers.insert("apikey", key_value);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;
        let mut root = base_url.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let base = root
            .join("rest/v1/")
            .map_err(|e| StorageError::MalformedQuery(format!("base url: {}", e)))?;
        Ok(RestClient { http, base })
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, StorageError> {
        let url = self
            .base
            .join(table)
            .map_err(|e| StorageError::MalformedQuery(format!("table url: {}", e)))?;
        Ok(self.http.request(method, url))
    }

    async fn send(&self, req: RequestBuilder, table: &str) -> Result<Response, StorageError> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<RemoteErrorBody>(&text) {
            Ok(body) => {
                let message = match (body.message, body.details) {
                    (Some(m), Some(d)) => format!("{} ({})", m, d),
                    (Some(m), None) => m,
                    (None, _) => text.clone(),
                };
                (body.code, message)
            }
            Err(_) => (None, text),
        };
        if code.as_deref() != Some(NO_ROWS_CODE) {
            tracing::error!(table, status, code = ?code, message = %message, "remote request failed");
        }
        Err(StorageError::Remote {
            status,
            code,
            message,
        })
    }
}

#[async_trait]
impl TableClient for RestClient {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Record>, StorageError> {
        let pairs = query.to_query_pairs();
        tracing::debug!(table = %query.table, method = "GET", query = ?pairs, "remote");
        let req = self.request(Method::GET, &query.table)?.query(&pairs);
        let resp = self.send(req, &query.table).await?;
        Ok(resp.json().await?)
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Record, StorageError> {
        let pairs = query.to_query_pairs();
        tracing::debug!(table = %query.table, method = "GET", query = ?pairs, "remote single");
        let req = self
            .request(Method::GET, &query.table)?
            .query(&pairs)
            .header(ACCEPT, OBJECT_MEDIA_TYPE);
        let resp = self.send(req, &query.table).await?;
        Ok(resp.json().await?)
    }

    async fn insert(
        &self,
        table: &str,
        rows: &[Record],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Record>, StorageError> {
        tracing::debug!(table, method = "POST", rows = rows.len(), on_conflict = ?on_conflict, "remote");
        let mut req = self.request(Method::POST, table)?.json(rows);
        req = match on_conflict {
            Some(col) => req
                .query(&[("on_conflict", col)])
                .header("Prefer", "return=representation,resolution=merge-duplicates"),
            None => req.header("Prefer", "return=representation"),
        };
        let resp = self.send(req, table).await?;
        Ok(resp.json().await?)
    }

    async fn update(&self, query: &TableQuery, changes: &Record) -> Result<Vec<Record>, StorageError> {
        let pairs = query.filter_pairs();
        tracing::debug!(table = %query.table, method = "PATCH", query = ?pairs, "remote");
        let req = self
            .request(Method::PATCH, &query.table)?
            .query(&pairs)
            .header("Prefer", "return=representation")
            .json(changes);
        let resp = self.send(req, &query.table).await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, query: &TableQuery) -> Result<(), StorageError> {
        let pairs = query.filter_pairs();
        tracing::debug!(table = %query.table, method = "DELETE", query = ?pairs, "remote");
        let req = self
            .request(Method::DELETE, &query.table)?
            .query(&pairs)
            .header("Prefer", "return=minimal");
        self.send(req, &query.table).await?;
        Ok(())
    }

    async fn count(&self, query: &TableQuery) -> Result<u64, StorageError> {
        let pairs = query.filter_pairs();
        tracing::debug!(table = %query.table, method = "HEAD", query = ?pairs, "remote count");
        let req = self
            .request(Method::HEAD, &query.table)?
            .query(&pairs)
            .header("Prefer", "count=exact");
        let resp = self.send(req, &query.table).await?;
        let range = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range_total(range)
            .ok_or_else(|| StorageError::Decode(format!("content-range without total: {:?}", range)))
    }
}

/// Total from a `Content-Range` header: `0-24/3573` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}
