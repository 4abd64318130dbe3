//! Facade crate for the geotap extraction engine.
//!
//! This crate re-exports the domain model from `geotap-core` and, behind the
//! default `data` feature, the storage, staging and stream machinery from
//! `geotap-data`.

#![forbid(unsafe_code)]

pub use geotap_core::{
    Attributes, CORE_FIELDS, ConfigurationError, ExposedFields, FieldProjector, GeometryFormat,
    GeometryValue, OSM_FIELDS, OsmKind, Projection, Record, SchemaKind, SourceFile, StreamConfig,
    StreamSchema, TapConfig,
};

#[cfg(feature = "data")]
pub use geotap_data::{
    ExtractError, FileInfo, GeoStream, LocalStorage, MemoryState, ObjectStorage, RecordIter,
    SqliteState, StateStore, Storage, Tap,
};
