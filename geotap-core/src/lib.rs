//! Core domain types for the geotap extraction engine.
//!
//! Responsibilities:
//! - Describe stream configuration and the derived exposed-field set.
//! - Project dynamic attribute bags into promoted fields and a remainder.
//! - Encode geometries as WKT or GeoJSON.
//! - Compare and format replication watermarks.
//! - Declare the permissive record schema for a stream.
//!
//! Boundaries:
//! - No I/O lives here; storage, staging and parsing belong to `geotap-data`.
//!
//! Invariants:
//! - Every [`Record`] serialises `geometry`, `features` and `metadata`.
//! - Promoted keys are always lower-case.

pub mod config;
pub mod geometry;
pub mod projection;
pub mod record;
pub mod schema;
pub mod watermark;

pub use config::{
    CORE_FIELDS, ConfigurationError, ExposedFields, OSM_FIELDS, StreamConfig, TapConfig,
};
pub use geometry::{GeometryError, GeometryFormat, GeometryValue, encode_geometry, to_wkt};
pub use projection::{FieldProjector, Projection};
pub use record::{
    Attributes, Member, OsmIdentity, OsmKind, Record, SDC_FILENAME, SDC_INCREMENTAL_KEY,
    SourceFile,
};
pub use schema::{SchemaKind, StreamSchema};
pub use watermark::{WatermarkError, advance, format_watermark, parse_watermark, should_skip};
