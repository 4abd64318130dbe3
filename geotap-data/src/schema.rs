//! Schema inference from a representative file.

use geotap_core::{ConfigurationError, ExposedFields, SchemaKind, StreamSchema};
use log::debug;

use crate::dispatch::SourceFormat;
use crate::error::ExtractError;
use crate::staging::stage;
use crate::storage::Storage;
use crate::vector::VectorDataset;

/// Declare the schema for a stream from its first matching file.
///
/// Only the first file of the first storage with any match is inspected.
/// Vector files must open successfully; OSM files are not read.
pub fn infer_schema(
    storages: &[Box<dyn Storage>],
    exposed: &ExposedFields,
) -> Result<StreamSchema, ExtractError> {
    for storage in storages {
        let Some(path) = storage.glob()?.into_iter().next() else {
            continue;
        };
        debug!("Inferring schema from {path}");
        let format = SourceFormat::from_path(&path);
        if format.is_osm() {
            return Ok(StreamSchema::declare(exposed, SchemaKind::Osm));
        }
        let staged = stage(storage.as_ref(), &path).map_err(|source| ExtractError::Staging {
            path: path.clone(),
            source,
        })?;
        VectorDataset::open(staged.path()).map_err(|source| ExtractError::Open { path, source })?;
        return Ok(StreamSchema::declare(exposed, SchemaKind::Vector));
    }
    Err(ConfigurationError::NoFilesForSchema {
        patterns: storages
            .iter()
            .map(|storage| storage.pattern().to_owned())
            .collect(),
    }
    .into())
}
