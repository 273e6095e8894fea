//! Error types raised by the file storage backend.

use std::{io, path::PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Convenient result alias returning [`FileStoreError`] failures.
pub type FileResult<T> = Result<T, FileStoreError>;

/// Failures that can occur while reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The data directory could not be created.
    #[error("failed to create data directory `{}`", path.display())]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The data directory is missing or not a directory.
    #[error("data directory `{}` is not available", path.display())]
    MissingDir {
        /// Directory path.
        path: PathBuf,
    },
    /// The data directory could not be listed.
    #[error("failed to list data directory `{}`", path.display())]
    ReadDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A snapshot file could not be read.
    #[error("failed to read snapshot `{}`", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A snapshot file could not be written.
    #[error("failed to write snapshot `{}`", path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A bout could not be encoded to JSON.
    #[error("failed to encode bout `{id}`")]
    Encode {
        /// Bout identifier.
        id: Uuid,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
    /// A snapshot file does not contain a valid bout.
    #[error("failed to decode snapshot `{}`", path.display())]
    Decode {
        /// File path.
        path: PathBuf,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}
