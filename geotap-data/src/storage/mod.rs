//! Storage adapters that enumerate, describe and read source files.
//!
//! Paths handed out by [`Storage::glob`] are logical: local filesystem paths
//! for [`LocalStorage`], scheme-qualified URLs for [`ObjectStorage`]. Every
//! other method accepts those logical paths back.

use std::fmt;
use std::io::{self, Read};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use geotap_core::SourceFile;
use thiserror::Error;

mod local;
mod object;

pub use local::LocalStorage;
pub use object::ObjectStorage;

/// A file resolved by a storage adapter for one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Logical path of the file.
    pub path: String,
    /// Last modification time reported by the storage.
    pub modified: DateTime<Utc>,
}

impl FileInfo {
    /// Originating-file identity carried by records built from this file.
    pub fn source(&self) -> SourceFile {
        SourceFile::new(self.path.clone(), self.modified)
    }
}

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The configured glob pattern is malformed.
    #[error("invalid path pattern {pattern:?}: {source}")]
    Pattern {
        /// Offending pattern.
        pattern: String,
        /// Parser error.
        #[source]
        source: glob::PatternError,
    },
    /// Enumerating or reading local files failed.
    #[error("failed to access {path:?}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An object store request failed.
    #[error("object store request for {path:?} failed: {source}")]
    Store {
        /// Logical path or pattern involved.
        path: String,
        /// Underlying object store error.
        #[source]
        source: object_store::Error,
    },
    /// A URL could not be mapped onto an object store.
    #[error("unsupported storage location {location:?}: {reason}")]
    Location {
        /// Rejected URL or pattern.
        location: String,
        /// Why the location was rejected.
        reason: String,
    },
    /// The blocking runtime for object store calls could not start.
    #[error("failed to start the object store runtime: {source}")]
    Runtime {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Access to the files matching one configured path pattern.
pub trait Storage: fmt::Debug {
    /// Pattern this storage was built from.
    fn pattern(&self) -> &str;

    /// Enumerate matching files in a stable order.
    fn glob(&self) -> Result<Vec<String>, StorageError>;

    /// Report the modification time of `path`.
    fn describe(&self, path: &str) -> Result<FileInfo, StorageError>;

    /// Open `path` for sequential reading.
    fn open(&self, path: &str) -> Result<Box<dyn Read>, StorageError>;

    /// Local filesystem location of `path` when it can be read in place.
    fn local_path(&self, _path: &str) -> Option<Utf8PathBuf> {
        None
    }
}

/// Choose the storage adapter for a configured pattern.
///
/// Patterns carrying a `scheme://` prefix other than `file` go to
/// [`ObjectStorage`]; everything else is read from the local filesystem.
///
/// # Examples
/// ```
/// use geotap_data::storage::{Storage, storage_for};
///
/// let storage = storage_for("data/*.geojson").expect("local storage");
/// assert_eq!(storage.pattern(), "data/*.geojson");
/// ```
pub fn storage_for(pattern: &str) -> Result<Box<dyn Storage>, StorageError> {
    match pattern.split_once("://") {
        Some(("file", rest)) => Ok(Box::new(LocalStorage::new(rest))),
        Some(_) => Ok(Box::new(ObjectStorage::from_url(pattern)?)),
        None => Ok(Box::new(LocalStorage::new(pattern))),
    }
}
