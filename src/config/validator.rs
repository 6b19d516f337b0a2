//! Remote credential validation. A failure here routes initialization to the local backend.

use crate::config::types::RemoteCredentials;
use crate::error::ConfigError;

/// Url must parse with an http(s) scheme and a host; key must be non-empty.
pub fn validate_remote(creds: &RemoteCredentials) -> Result<reqwest::Url, ConfigError> {
    if creds.key.trim().is_empty() {
        return Err(ConfigError::MissingCredential("remote key"));
    }
    let url = reqwest::Url::parse(creds.url.trim())
        .map_err(|e| ConfigError::InvalidRemoteUrl(format!("{}: {}", creds.url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidRemoteUrl(format!(
            "{}: scheme must be http or https",
            creds.url
        )));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidRemoteUrl(format!("{}: no host", creds.url)));
    }
    Ok(url)
}
