//! Test doubles for storage-facing code.
//!
//! [`StubStorage`] keeps file bodies and modification times in memory so
//! tests can control exactly when a file "changes" between runs.
//! [`point_shapefile`] builds real shapefile bytes for driver and staging
//! tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use shapefile::dbase::{self, FieldName, FieldValue, TableWriterBuilder};
use shapefile::{Point, Writer};

use crate::storage::{FileInfo, Storage, StorageError};

#[derive(Debug, Clone)]
struct StubFile {
    modified: DateTime<Utc>,
    body: Vec<u8>,
}

/// In-memory [`Storage`] with caller-controlled modification times.
///
/// Clones share their contents, so a test can keep a handle and rewrite a
/// file after the storage has been handed to a stream.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use geotap_data::storage::Storage;
/// use geotap_data::test_support::StubStorage;
///
/// let storage = StubStorage::new("remote/*.geojson");
/// let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid timestamp");
/// storage.insert("remote/a.geojson", at, "{}");
/// assert_eq!(storage.glob().expect("glob stub"), ["remote/a.geojson"]);
/// ```
#[derive(Debug, Clone)]
pub struct StubStorage {
    pattern: String,
    files: Rc<RefCell<BTreeMap<String, StubFile>>>,
    opened: Rc<RefCell<Vec<String>>>,
}

impl StubStorage {
    /// Create an empty storage answering to `pattern`.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            files: Rc::default(),
            opened: Rc::default(),
        }
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<String>, modified: DateTime<Utc>, body: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(
            path.into(),
            StubFile {
                modified,
                body: body.into(),
            },
        );
    }

    /// Paths passed to [`Storage::open`], in call order.
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    fn missing(path: &str) -> StorageError {
        StorageError::Io {
            path: path.to_owned(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such stub file"),
        }
    }
}

impl Storage for StubStorage {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn glob(&self) -> Result<Vec<String>, StorageError> {
        let matcher = glob::Pattern::new(&self.pattern).map_err(|source| StorageError::Pattern {
            pattern: self.pattern.clone(),
            source,
        })?;
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|path| matcher.matches(path))
            .cloned()
            .collect())
    }

    fn describe(&self, path: &str) -> Result<FileInfo, StorageError> {
        let files = self.files.borrow();
        let file = files.get(path).ok_or_else(|| Self::missing(path))?;
        Ok(FileInfo {
            path: path.to_owned(),
            modified: file.modified,
        })
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read>, StorageError> {
        self.opened.borrow_mut().push(path.to_owned());
        let files = self.files.borrow();
        let file = files.get(path).ok_or_else(|| Self::missing(path))?;
        Ok(Box::new(Cursor::new(file.body.clone())))
    }
}

/// Bytes of a point shapefile with a `name` attribute per point.
///
/// Components are returned as `(extension, bytes)` pairs for `shp`, `shx`
/// and `dbf`, in that order.
///
/// # Examples
/// ```
/// use geotap_data::test_support::point_shapefile;
///
/// let components = point_shapefile(&[("Main", 1.0, 2.0)]).expect("write shapefile");
/// let extensions: Vec<&str> = components.iter().map(|(ext, _)| *ext).collect();
/// assert_eq!(extensions, ["shp", "shx", "dbf"]);
/// ```
pub fn point_shapefile(
    points: &[(&str, f64, f64)],
) -> Result<Vec<(&'static str, Vec<u8>)>, shapefile::Error> {
    let dir = tempfile::tempdir()?;
    let shp = dir.path().join("layer.shp");
    let name = FieldName::try_from("name").map_err(io::Error::other)?;
    {
        let mut writer = Writer::from_path(&shp, TableWriterBuilder::new().add_character_field(name, 32))?;
        for (label, x, y) in points {
            let mut record = dbase::Record::default();
            record.insert(
                "name".to_owned(),
                FieldValue::Character(Some((*label).to_owned())),
            );
            writer.write_shape_and_record(&Point::new(*x, *y), &record)?;
        }
    }
    ["shp", "shx", "dbf"]
        .into_iter()
        .map(|ext| -> Result<_, shapefile::Error> {
            Ok((ext, fs::read(shp.with_extension(ext))?))
        })
        .collect()
}
