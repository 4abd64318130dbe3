//! Staging of source files into locally parseable form.
//!
//! Files a storage can expose in place are used directly. Everything else is
//! copied into a private temporary directory that lives exactly as long as
//! the returned [`StagedFile`]; dropping it removes the directory on every
//! exit path.

use camino::{Utf8Path, Utf8PathBuf};
use geotap_core::record::base_name;
use geotap_fs::write_into_dir;
use log::{debug, warn};
use tempfile::TempDir;
use thiserror::Error;

use crate::dispatch::{SHAPEFILE_COMPONENTS, extension, file_stem, sibling_candidates};
use crate::storage::{Storage, StorageError};

/// Errors raised while staging a file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StagingError {
    /// The temporary directory could not be created.
    #[error("failed to create a staging directory: {source}")]
    TempDir {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The primary file could not be fetched from storage.
    #[error("failed to fetch {path:?}: {source}")]
    Fetch {
        /// Logical path of the file.
        path: String,
        /// Storage failure.
        #[source]
        source: StorageError,
    },
    /// The fetched bytes could not be written locally.
    #[error("failed to write staged copy of {path:?}: {source}")]
    Write {
        /// Logical path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A source file available on the local filesystem.
#[derive(Debug)]
pub enum StagedFile {
    /// The storage exposed the file in place.
    Local(Utf8PathBuf),
    /// The file was copied into a temporary directory.
    Temporary {
        /// Directory holding every staged component; removed on drop.
        dir: TempDir,
        /// Local path of the primary component.
        path: Utf8PathBuf,
    },
}

impl StagedFile {
    /// Local path of the primary component.
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Local(path) | Self::Temporary { path, .. } => path,
        }
    }

    /// Whether the file lives in a temporary staging directory.
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary { .. })
    }

    /// Directory removed when this value is dropped, if any.
    pub fn staging_dir(&self) -> Option<&std::path::Path> {
        match self {
            Self::Local(_) => None,
            Self::Temporary { dir, .. } => Some(dir.path()),
        }
    }
}

/// Make `path` from `storage` readable on the local filesystem.
///
/// Shapefiles (`.shp`, any case) bring their `.shx`, `.dbf`, `.prj` and `.cpg`
/// siblings along. Each sibling is looked up under the primary's extension
/// case first and then under the other spellings; a missing sibling is
/// logged and skipped, leaving the reader to decide whether it can proceed.
/// Staged components always carry lower-case extensions so the shapefile
/// reader finds them. Other formats are fetched as a single file.
///
/// # Examples
/// ```
/// use geotap_data::staging::stage;
/// use geotap_data::storage::{LocalStorage, Storage};
///
/// let dir = tempfile::tempdir().expect("temp dir");
/// let file = dir.path().join("points.geojson");
/// std::fs::write(&file, "{}").expect("write file");
/// let path = file.to_str().expect("utf-8 path");
///
/// let staged = stage(&LocalStorage::new(path), path).expect("stage file");
/// assert!(!staged.is_temporary());
/// assert_eq!(staged.path().as_str(), path);
/// ```
pub fn stage(storage: &dyn Storage, path: &str) -> Result<StagedFile, StagingError> {
    let is_shapefile = extension(path).is_some_and(|ext| ext.eq_ignore_ascii_case("shp"));
    let readable_in_place = !is_shapefile || extension(path) == Some("shp");
    if readable_in_place && let Some(local) = storage.local_path(path) {
        return Ok(StagedFile::Local(local));
    }

    let dir = TempDir::new().map_err(|source| StagingError::TempDir { source })?;
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|_| {
        StagingError::TempDir {
            source: std::io::Error::other("staging directory is not valid UTF-8"),
        }
    })?;

    let local = if is_shapefile {
        let stem = file_stem(path);
        let local = fetch(storage, path, &root, &format!("{stem}.shp"))?;
        for component in SHAPEFILE_COMPONENTS.iter().skip(1) {
            let target = format!("{stem}.{component}");
            if let Err(err) = fetch_any(storage, &sibling_candidates(path, component), &root, &target)
            {
                warn!("Skipping shapefile component {target} of {path}: {err}");
            }
        }
        local
    } else {
        fetch(storage, path, &root, base_name(path))?
    };
    debug!("Staged {path} at {local}");

    Ok(StagedFile::Temporary { dir, path: local })
}

/// Fetch the first of `candidates` the storage can open.
fn fetch_any(
    storage: &dyn Storage,
    candidates: &[String],
    root: &Utf8Path,
    target: &str,
) -> Result<Utf8PathBuf, StagingError> {
    let mut last = None;
    for candidate in candidates {
        match fetch(storage, candidate, root, target) {
            Ok(local) => return Ok(local),
            Err(err) => last = Some(err),
        }
    }
    Err(last.unwrap_or_else(|| StagingError::Fetch {
        path: target.to_owned(),
        source: StorageError::Io {
            path: target.to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        },
    }))
}

fn fetch(
    storage: &dyn Storage,
    path: &str,
    root: &Utf8Path,
    target: &str,
) -> Result<Utf8PathBuf, StagingError> {
    let mut reader = storage.open(path).map_err(|source| StagingError::Fetch {
        path: path.to_owned(),
        source,
    })?;
    write_into_dir(root, target, &mut reader).map_err(|source| StagingError::Write {
        path: path.to_owned(),
        source,
    })
}
