//! Vector datasets and the record producer built on them.
//!
//! A [`VectorDataset`] is opened from a staged local path. The driver is
//! chosen by extension: GeoJSON (`.geojson`, `.json`) or ESRI Shapefile
//! (`.shp`). Datasets expose their driver name and CRS descriptor once and
//! yield [`RawFeature`]s in file order.

use camino::{Utf8Path, Utf8PathBuf};
use geo::Geometry;
use geotap_core::{
    Attributes, CORE_FIELDS, FieldProjector, GeometryFormat, Record, SourceFile, encode_geometry,
};
use serde_json::Value;
use thiserror::Error;

use crate::dispatch::extension;
use crate::error::ExtractError;

mod json;
mod shp;

/// Boxed iterator over the features of an open dataset.
pub type FeatureIter = Box<dyn Iterator<Item = Result<RawFeature, VectorError>>>;

/// Errors raised by vector drivers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VectorError {
    /// No driver handles the file's extension.
    #[error("no vector driver for {path}")]
    UnsupportedFormat {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Reading the file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not well-formed JSON.
    #[error("{path} is not valid JSON: {source}")]
    Json {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The JSON document is not GeoJSON.
    #[error("{path} is not valid GeoJSON: {source}")]
    GeoJson {
        /// File being parsed.
        path: Utf8PathBuf,
        /// GeoJSON decoding error.
        #[source]
        source: Box<geojson::Error>,
    },
    /// The shapefile could not be opened.
    #[error("failed to open shapefile {path}: {source}")]
    Shapefile {
        /// File being opened.
        path: Utf8PathBuf,
        /// Shapefile reader error.
        #[source]
        source: shapefile::Error,
    },
    /// A feature's geometry could not be converted.
    #[error("invalid feature geometry: {reason}")]
    Geometry {
        /// Conversion failure description.
        reason: String,
    },
    /// A shapefile record could not be read.
    #[error("failed to read shapefile record: {source}")]
    Record {
        /// Shapefile reader error.
        #[source]
        source: shapefile::Error,
    },
    /// A shape has no matching dBase row.
    #[error("shapefile has no attribute row for shape {index}")]
    MissingRecord {
        /// Zero-based shape index.
        index: usize,
    },
}

/// Vector drivers understood by [`VectorDataset::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorDriver {
    /// RFC 7946 GeoJSON.
    GeoJson,
    /// ESRI Shapefile with dBase attributes.
    Shapefile,
}

impl VectorDriver {
    /// Driver handling `path`, chosen by extension.
    pub fn for_path(path: &Utf8Path) -> Option<Self> {
        match extension(path.as_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("geojson" | "json") => Some(Self::GeoJson),
            Some("shp") => Some(Self::Shapefile),
            _ => None,
        }
    }

    /// Name reported in record metadata.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GeoJson => "GeoJSON",
            Self::Shapefile => "ESRI Shapefile",
        }
    }
}

/// One feature as read from a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Attribute bag in source casing.
    pub attributes: Attributes,
    /// Geometry, when the feature has one.
    pub geometry: Option<Geometry<f64>>,
}

/// An open vector dataset.
pub struct VectorDataset {
    driver: VectorDriver,
    crs: Option<String>,
    features: FeatureIter,
}

impl std::fmt::Debug for VectorDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDataset")
            .field("driver", &self.driver)
            .field("crs", &self.crs)
            .finish_non_exhaustive()
    }
}

impl VectorDataset {
    /// Open the dataset at a local `path`.
    ///
    /// # Examples
    /// ```
    /// use camino::Utf8PathBuf;
    /// use geotap_data::vector::VectorDataset;
    ///
    /// let dir = tempfile::tempdir().expect("temp dir");
    /// let path = Utf8PathBuf::from_path_buf(dir.path().join("p.geojson")).expect("utf-8");
    /// std::fs::write(&path, r#"{"type":"Point","coordinates":[1,2]}"#).expect("write");
    ///
    /// let dataset = VectorDataset::open(&path).expect("open dataset");
    /// assert_eq!(dataset.driver_name(), "GeoJSON");
    /// assert_eq!(dataset.crs(), Some("EPSG:4326"));
    /// assert_eq!(dataset.into_features().count(), 1);
    /// ```
    pub fn open(path: &Utf8Path) -> Result<Self, VectorError> {
        match VectorDriver::for_path(path) {
            Some(VectorDriver::GeoJson) => json::open(path),
            Some(VectorDriver::Shapefile) => shp::open(path),
            None => Err(VectorError::UnsupportedFormat {
                path: path.to_owned(),
            }),
        }
    }

    fn new(driver: VectorDriver, crs: Option<String>, features: FeatureIter) -> Self {
        Self {
            driver,
            crs,
            features,
        }
    }

    /// Driver that opened the dataset.
    pub const fn driver(&self) -> VectorDriver {
        self.driver
    }

    /// Driver name reported in record metadata.
    pub const fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// Coordinate reference system descriptor, if the dataset declares one.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Consume the dataset, yielding its features in file order.
    pub fn into_features(self) -> FeatureIter {
        self.features
    }

    fn metadata(&self, source: &SourceFile) -> Attributes {
        let mut metadata = Attributes::new();
        metadata.insert("source".to_owned(), Value::String(source.path.clone()));
        metadata.insert(
            "driver".to_owned(),
            Value::String(self.driver_name().to_owned()),
        );
        metadata.insert(
            "crs".to_owned(),
            self.crs.clone().map_or(Value::Null, Value::String),
        );
        metadata
    }
}

/// Turn every feature of `dataset` into a [`Record`].
///
/// The first feature that cannot be read or encoded ends the sequence with an
/// error naming the file and the feature's zero-based index.
pub fn vector_records(
    dataset: VectorDataset,
    projector: FieldProjector,
    format: GeometryFormat,
    source: SourceFile,
) -> impl Iterator<Item = Result<Record, ExtractError>> {
    let metadata = dataset.metadata(&source);
    dataset
        .into_features()
        .enumerate()
        .map(move |(index, feature)| {
            let feature = feature.map_err(|err| ExtractError::Feature {
                path: source.path.clone(),
                index,
                source: err,
            })?;
            let geometry = feature
                .geometry
                .as_ref()
                .map(|geometry| encode_geometry(geometry, format))
                .transpose()
                .map_err(|err| ExtractError::Encode {
                    path: source.path.clone(),
                    index,
                    source: err,
                })?;
            let projection = projector.project(feature.attributes, &CORE_FIELDS);
            Ok(Record::vector(projection, geometry, metadata.clone(), &source))
        })
}

#[cfg(test)]
mod tests;
