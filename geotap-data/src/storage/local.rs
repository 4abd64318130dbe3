//! Local filesystem storage backed by `glob` and `cap-std`.

use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use geotap_fs::{file_is_file, modified_time, open_utf8_file};
use log::warn;

use super::{FileInfo, Storage, StorageError};

/// Files on the local filesystem matching a glob pattern.
///
/// `**` matches across directories. Enumeration is sorted so repeated runs
/// visit files in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStorage {
    pattern: String,
}

impl LocalStorage {
    /// Construct storage for `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    fn io_error(path: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

impl Storage for LocalStorage {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn glob(&self) -> Result<Vec<String>, StorageError> {
        let entries = glob::glob(&self.pattern).map_err(|source| StorageError::Pattern {
            pattern: self.pattern.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| {
                let path = err.path().to_string_lossy().into_owned();
                Self::io_error(&path, err.into_error())
            })?;
            let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                warn!("Skipping non-UTF-8 path matched by {}", self.pattern);
                continue;
            };
            if file_is_file(&path).map_err(|source| Self::io_error(path.as_str(), source))? {
                files.push(path.into_string());
            }
        }
        files.sort();
        Ok(files)
    }

    fn describe(&self, path: &str) -> Result<FileInfo, StorageError> {
        let modified =
            modified_time(Utf8Path::new(path)).map_err(|source| Self::io_error(path, source))?;
        Ok(FileInfo {
            path: path.to_owned(),
            modified,
        })
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read>, StorageError> {
        let file = open_utf8_file(Utf8Path::new(path)).map_err(|source| Self::io_error(path, source))?;
        Ok(Box::new(file))
    }

    fn local_path(&self, path: &str) -> Option<Utf8PathBuf> {
        let candidate = Utf8PathBuf::from(path);
        matches!(file_is_file(&candidate), Ok(true)).then_some(candidate)
    }
}
