use std::path::PathBuf;

use thiserror::Error;

/// Per-item failures. Each one is caught at the item boundary, logged, and
/// turned into a skip; none of them aborts a build run.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no route id in URL: {0}")]
    InvalidUrl(String),

    #[error("invalid route type '{0}' (expected road, gravel, or mixed)")]
    InvalidOverride(String),

    #[error("both fetch tiers failed for route {id}: {reasons}")]
    FetchFailed { id: String, reasons: String },

    #[error("malformed record {path}: {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("cache write failed for {path}: {reason}")]
    CacheWrite { path: PathBuf, reason: String },
}
