//! Error types for document editing.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, editing or saving a document.
#[derive(Debug, Error)]
pub enum Error {
    /// Document file does not exist
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    /// Document could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Document could not be written back
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Input is not valid YAML
    #[error("malformed YAML in {origin}: {source}")]
    Malformed {
        /// File path, or `<memory>` for in-memory text
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Top-level node is a sequence or scalar
    #[error("{0} is not a YAML mapping")]
    NotMapping(String),

    /// Key cannot be addressed or written as a single line
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}

impl Error {
    /// Check if the error means the document is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, Error>;
