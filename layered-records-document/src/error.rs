//! Error types for document resolution.

use std::path::PathBuf;

use layered_records::RecordError;
use thiserror::Error;

/// Errors loading a [`ResolverConfig`](crate::ResolverConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors raised while resolving a document.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A record operation failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A candidate resolver could not produce records for an element.
    #[error("resolver failed on element {element}: {message}")]
    Resolver { element: usize, message: String },
}

/// Result type for document resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;
