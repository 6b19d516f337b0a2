//! Backend selection config. Built once at process start and passed by reference afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default on-disk location of the local database, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/scck_erp.db";

/// Credentials for the hosted table backend (PostgREST-compatible, e.g. Supabase).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub url: String,
    pub key: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// `Some` only when both url and key were supplied. Validity is checked at initialization.
    #[serde(default)]
    pub remote: Option<RemoteCredentials>,
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            remote: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl StoreConfig {
    /// Local-only config at `db_path`.
    pub fn local(db_path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            remote: None,
            db_path: db_path.into(),
        }
    }

    pub fn with_remote(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.remote = Some(RemoteCredentials {
            url: url.into(),
            key: key.into(),
        });
        self
    }
}

/// Which adapter the facade delegates to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
