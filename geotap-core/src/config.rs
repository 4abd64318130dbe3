//! Stream configuration and the exposed-field set derived from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::GeometryFormat;

/// Envelope slots that an attribute may never be promoted into.
pub const CORE_FIELDS: [&str; 3] = ["geometry", "features", "metadata"];

/// Envelope slots reserved on OpenStreetMap records.
pub const OSM_FIELDS: [&str; 6] = ["geometry", "features", "metadata", "id", "type", "members"];

/// Errors raised while validating stream configuration or preparing a stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A stream entry did not list any path pattern.
    #[error("stream {stream:?} requires at least one path pattern")]
    MissingPaths {
        /// Configured table name, when one was supplied.
        stream: Option<String>,
    },
    /// The tap configuration did not contain any stream entry.
    #[error("tap configuration must list at least one file entry")]
    NoStreams,
    /// Two stream entries resolved to the same stream name.
    #[error("duplicate stream name {name:?}")]
    DuplicateStream {
        /// Name shared by more than one entry.
        name: String,
    },
    /// None of the configured patterns matched a file for schema detection.
    #[error("no files matched {patterns:?} for schema detection")]
    NoFilesForSchema {
        /// Patterns that were searched.
        patterns: Vec<String>,
    },
}

/// Configuration for one logical stream.
///
/// # Examples
/// ```
/// use geotap_core::{GeometryFormat, StreamConfig};
///
/// let config: StreamConfig = serde_json::from_str(
///     r#"{"paths": ["data/roads.shp"], "expose_fields": ["Name"]}"#,
/// )
/// .expect("valid configuration");
/// assert_eq!(config.stream_name(), "roads");
/// assert_eq!(config.geometry_format, GeometryFormat::Wkt);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Glob patterns or object-store URLs to enumerate.
    pub paths: Vec<String>,
    /// Stream name; defaults to the stem of the first pattern.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Attribute names identifying a record downstream.
    #[serde(default)]
    pub primary_keys: Vec<String>,
    /// Attribute names dropped before projection (exact match).
    #[serde(default)]
    pub skip_fields: Vec<String>,
    /// Attribute names promoted to top-level record keys.
    #[serde(default)]
    pub expose_fields: Vec<String>,
    /// Output representation for geometries.
    #[serde(default)]
    pub geometry_format: GeometryFormat,
}

impl StreamConfig {
    /// Construct a configuration reading the supplied patterns.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Override the stream name.
    #[must_use]
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Set the primary key attribute names.
    #[must_use]
    pub fn with_primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attribute names to drop.
    #[must_use]
    pub fn with_skip_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attribute names to promote.
    #[must_use]
    pub fn with_expose_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Select the geometry output representation.
    #[must_use]
    pub const fn with_geometry_format(mut self, format: GeometryFormat) -> Self {
        self.geometry_format = format;
        self
    }

    /// Reject configurations that cannot produce a stream.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.paths.iter().all(|path| path.trim().is_empty()) {
            return Err(ConfigurationError::MissingPaths {
                stream: self.table_name.clone(),
            });
        }
        Ok(())
    }

    /// Name of the stream: the table name, else the first pattern's stem.
    pub fn stream_name(&self) -> String {
        if let Some(name) = self.table_name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_owned();
        }
        self.paths
            .first()
            .and_then(|pattern| file_stem(pattern))
            .unwrap_or("stream")
            .to_owned()
    }

    /// Primary keys normalised to lower case.
    pub fn key_properties(&self) -> Vec<String> {
        self.primary_keys
            .iter()
            .map(|key| key.to_lowercase())
            .collect()
    }

    /// Derive the exposed-field set for this stream.
    pub fn exposed_fields(&self) -> ExposedFields {
        ExposedFields::new(&self.expose_fields, &self.primary_keys)
    }
}

/// Multi-stream configuration loaded by the command-line tap.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TapConfig {
    /// One entry per logical stream.
    pub files: Vec<StreamConfig>,
}

impl TapConfig {
    /// Validate every entry and reject duplicate stream names.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.files.is_empty() {
            return Err(ConfigurationError::NoStreams);
        }
        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.files {
            entry.validate()?;
            let name = entry.stream_name();
            if !seen.insert(name.clone()) {
                return Err(ConfigurationError::DuplicateStream { name });
            }
        }
        Ok(())
    }
}

/// Lower-cased attribute names promoted to top-level record keys.
///
/// Names colliding with [`CORE_FIELDS`] are dropped from the configured list;
/// primary keys are appended afterwards when not already present.
///
/// # Examples
/// ```
/// use geotap_core::ExposedFields;
///
/// let exposed = ExposedFields::new(
///     &["Name".to_owned(), "Geometry".to_owned()],
///     &["ID".to_owned()],
/// );
/// let names: Vec<&str> = exposed.iter().collect();
/// assert_eq!(names, ["name", "id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExposedFields(Vec<String>);

impl ExposedFields {
    /// Build the set from configured exposed fields and primary keys.
    pub fn new(expose: &[String], primary_keys: &[String]) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(expose.len() + primary_keys.len());
        for name in expose.iter().map(|field| field.to_lowercase()) {
            if CORE_FIELDS.contains(&name.as_str()) || names.contains(&name) {
                continue;
            }
            names.push(name);
        }
        for key in primary_keys.iter().map(|key| key.to_lowercase()) {
            if !names.contains(&key) {
                names.push(key);
            }
        }
        Self(names)
    }

    /// Iterate over the names in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether `name` (compared case-insensitively) is exposed.
    pub fn contains(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.0.contains(&lowered)
    }

    /// Number of exposed names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no names are exposed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stem of the last path segment, without its final extension.
fn file_stem(pattern: &str) -> Option<&str> {
    let name = pattern.rsplit(['/', '\\']).next()?;
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => name.get(..dot)?,
    };
    (!stem.is_empty()).then_some(stem)
}
