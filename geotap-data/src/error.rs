//! Errors surfaced by stream extraction.

use geotap_core::{ConfigurationError, GeometryError, WatermarkError};
use thiserror::Error;

use crate::osm::OsmError;
use crate::staging::StagingError;
use crate::state::StateError;
use crate::storage::StorageError;
use crate::vector::VectorError;

/// Failure of a stream run. Any of these ends the run; the file being
/// processed keeps its previous watermark.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The stream configuration cannot be used.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Enumerating or describing files failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The file could not be made available locally.
    #[error("failed to stage {path}: {source}")]
    Staging {
        /// Logical path of the file.
        path: String,
        /// Staging failure.
        #[source]
        source: StagingError,
    },
    /// The vector reader could not open the staged file.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Logical path of the file.
        path: String,
        /// Reader failure.
        #[source]
        source: VectorError,
    },
    /// The OSM handler could not read the file.
    #[error("failed to read OSM data from {path}: {source}")]
    Osm {
        /// Logical path of the file.
        path: String,
        /// Handler failure.
        #[source]
        source: OsmError,
    },
    /// A feature could not be read.
    #[error("feature {index} of {path} is unreadable: {source}")]
    Feature {
        /// Logical path of the file.
        path: String,
        /// Zero-based feature position within the file.
        index: usize,
        /// Reader failure.
        #[source]
        source: VectorError,
    },
    /// A feature's geometry could not be encoded.
    #[error("feature {index} of {path} has an unencodable geometry: {source}")]
    Encode {
        /// Logical path of the file.
        path: String,
        /// Zero-based feature position within the file.
        index: usize,
        /// Encoding failure.
        #[source]
        source: GeometryError,
    },
    /// A stored watermark could not be parsed.
    #[error("bookmark for {file} in stream {stream} is unusable: {source}")]
    Watermark {
        /// Stream name.
        stream: String,
        /// File base name.
        file: String,
        /// Parse failure.
        #[source]
        source: WatermarkError,
    },
    /// Reading or writing bookmarks failed.
    #[error(transparent)]
    State(#[from] StateError),
}
