//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Calls the active backend cannot serve, or calls made after `close()`.
/// Raised before any I/O is attempted.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{operation} is not supported on the {backend} backend")]
    UnsupportedOnBackend {
        operation: &'static str,
        backend: &'static str,
    },
    #[error("database is closed")]
    Closed,
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("invalid remote url: {0}")]
    InvalidRemoteUrl(String),
}

/// Failures originating in the underlying engine. Propagated unchanged, never retried.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote {status}: {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    #[error("decode: {0}")]
    Decode(String),
}

impl StorageError {
    /// Backend error code, when the remote API reported one (e.g. `23505` for a unique violation).
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            StorageError::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Storage(StorageError::Sqlite(e))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Storage(StorageError::Http(e))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Storage(StorageError::Io(e))
    }
}

impl StoreError {
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::Config(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            StoreError::Config(ConfigError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, "closed"),
            StoreError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            StoreError::Storage(StorageError::Http(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            StoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
