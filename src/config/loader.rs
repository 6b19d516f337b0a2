//! Load `StoreConfig` from the process environment.

use crate::config::types::{RemoteCredentials, StoreConfig, DEFAULT_DB_PATH};
use std::path::PathBuf;

pub const ENV_REMOTE_URL: &str = "SUPABASE_URL";
pub const ENV_REMOTE_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_REMOTE_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
pub const ENV_DB_PATH: &str = "DB_PATH";

impl StoreConfig {
    /// Read `SUPABASE_URL`, `SUPABASE_ANON_KEY` (or `SUPABASE_SERVICE_KEY`) and `DB_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`StoreConfig::from_env`] with an injectable variable source.
    /// Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let url = var(ENV_REMOTE_URL);
        let key = var(ENV_REMOTE_KEY).or_else(|| var(ENV_REMOTE_SERVICE_KEY));
        let remote = match (url, key) {
            (Some(url), Some(key)) => Some(RemoteCredentials { url, key }),
            _ => None,
        };
        let db_path = var(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        StoreConfig { remote, db_path }
    }
}
