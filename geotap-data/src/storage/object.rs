//! Object store storage (S3, GCS, Azure, HTTP, in-memory).
//!
//! Calls are driven to completion on a current-thread Tokio runtime owned by
//! the adapter, keeping the rest of the engine synchronous.

use std::io::{Cursor, Read};
use std::sync::Arc;

use futures_util::TryStreamExt;
use glob::{MatchOptions, Pattern};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use tokio::runtime::{Builder, Runtime};
use url::Url;

use super::{FileInfo, Storage, StorageError};

const GLOB_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Files in an object store matching a key glob.
///
/// Logical paths are `base` joined with the object key, for example
/// `s3://bucket/data/roads.shp` for base `s3://bucket`.
#[derive(Debug)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    base: String,
    key_pattern: String,
    pattern: String,
    runtime: Runtime,
}

impl ObjectStorage {
    /// Wrap `store`, matching keys against `key_pattern`.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        base: impl Into<String>,
        key_pattern: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let mut base = base.into();
        if base.ends_with('/') && !base.ends_with("://") {
            base.pop();
        }
        let key_pattern = key_pattern.into().trim_start_matches('/').to_owned();
        let pattern = format!("{base}/{key_pattern}");
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| StorageError::Runtime { source })?;
        Ok(Self {
            store,
            base,
            key_pattern,
            pattern,
            runtime,
        })
    }

    /// Build storage for a `scheme://authority/key-glob` pattern.
    ///
    /// Credentials and regions come from the environment variables each
    /// backend reads (for example `AWS_REGION`).
    pub fn from_url(pattern: &str) -> Result<Self, StorageError> {
        let location_error = |reason: String| StorageError::Location {
            location: pattern.to_owned(),
            reason,
        };
        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| location_error("missing scheme".to_owned()))?;
        let (authority, key_pattern) = rest.split_once('/').unwrap_or((rest, ""));
        let base = format!("{scheme}://{authority}");
        let root = Url::parse(&format!("{base}/")).map_err(|err| location_error(err.to_string()))?;
        let (store, _) =
            object_store::parse_url(&root).map_err(|err| location_error(err.to_string()))?;
        Self::new(Arc::from(store), base, key_pattern)
    }

    fn key(&self, path: &str) -> Result<ObjectPath, StorageError> {
        let key = path
            .strip_prefix(&self.base)
            .unwrap_or(path)
            .trim_start_matches('/');
        ObjectPath::parse(key).map_err(|source| StorageError::Store {
            path: path.to_owned(),
            source: source.into(),
        })
    }

    fn logical_path(&self, key: &ObjectPath) -> String {
        format!("{}/{}", self.base, key.as_ref())
    }

    /// Longest directory prefix of the key pattern free of glob syntax.
    fn literal_prefix(&self) -> Option<ObjectPath> {
        let literal_end = self
            .key_pattern
            .find(['*', '?', '['])
            .unwrap_or(self.key_pattern.len());
        let literal = self.key_pattern.get(..literal_end).unwrap_or_default();
        let directory = literal.rfind('/').and_then(|end| literal.get(..end))?;
        (!directory.is_empty()).then(|| ObjectPath::from(directory))
    }
}

fn store_error(path: &str) -> impl FnOnce(object_store::Error) -> StorageError {
    let path = path.to_owned();
    move |source| StorageError::Store { path, source }
}

impl Storage for ObjectStorage {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn glob(&self) -> Result<Vec<String>, StorageError> {
        let matcher = Pattern::new(&self.key_pattern).map_err(|source| StorageError::Pattern {
            pattern: self.pattern.clone(),
            source,
        })?;
        let prefix = self.literal_prefix();
        let listed: Vec<ObjectMeta> = self
            .runtime
            .block_on(self.store.list(prefix.as_ref()).try_collect())
            .map_err(store_error(&self.pattern))?;
        let mut files: Vec<String> = listed
            .iter()
            .filter(|meta| matcher.matches_with(meta.location.as_ref(), GLOB_MATCH))
            .map(|meta| self.logical_path(&meta.location))
            .collect();
        files.sort();
        Ok(files)
    }

    fn describe(&self, path: &str) -> Result<FileInfo, StorageError> {
        let key = self.key(path)?;
        let meta = self
            .runtime
            .block_on(self.store.head(&key))
            .map_err(store_error(path))?;
        Ok(FileInfo {
            path: path.to_owned(),
            modified: meta.last_modified,
        })
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read>, StorageError> {
        let key = self.key(path)?;
        let bytes = self
            .runtime
            .block_on(async { self.store.get(&key).await?.bytes().await })
            .map_err(store_error(path))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}
