use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by fragment parsers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("configuration directory not found or unreadable: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("failed to read fragment '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse fragment '{path}': {source}")]
    ParseError { path: PathBuf, source: BoxError },

    #[error("unusable cache artifact '{path}': {reason}")]
    CacheRead { path: PathBuf, reason: String },

    #[error("failed to write cache artifact '{path}': {source}")]
    CacheWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode cache artifact: {0}")]
    CacheEncode(#[from] serde_json::Error),
}
