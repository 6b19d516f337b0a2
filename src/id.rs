//! Human-readable entity ids: `PREFIX-00042`.
//!
//! The number is the current row count plus one. Nothing re-checks uniqueness, so two creates that
//! read the same count produce the same id; the primary key constraint is the only guard.

/// Pad width used for most entities (`PROD-0001`).
pub const DEFAULT_ID_WIDTH: usize = 4;
/// Pad width used for high-volume ledgers: collections and transactions (`COLL-00001`).
pub const LEDGER_ID_WIDTH: usize = 5;

/// `"{prefix}-{n}"` with `n = existing.len() + 1` left-padded with zeros to `width` digits.
/// Only the length of `existing` is used.
pub fn generate_id<T>(prefix: &str, existing: &[T], width: usize) -> String {
    format_id(prefix, existing.len() as u64 + 1, width)
}

pub fn format_id(prefix: &str, n: u64, width: usize) -> String {
    format!("{}-{:0width$}", prefix, n, width = width)
}
