//! Storage, staging and record production for the geotap engine.
//!
//! Responsibilities:
//! - Enumerate files behind local globs and object-store URLs.
//! - Stage remote files, with their shapefile sidecars, onto local disk.
//! - Read vector datasets and OpenStreetMap extracts into records.
//! - Persist per-file watermarks and drive incremental stream runs.
//!
//! Boundaries:
//! - Projection, geometry encoding and watermark rules live in `geotap-core`.
//! - Output framing belongs to the command-line front end.
//!
//! Invariants:
//! - A file's watermark is committed only after its last record is yielded.
//! - Staged copies never outlive the file run that created them.

pub mod dispatch;
pub mod error;
pub mod osm;
pub mod schema;
pub mod staging;
pub mod state;
pub mod storage;
pub mod stream;
pub mod tap;
#[doc(hidden)]
pub mod test_support;
pub mod vector;

pub use dispatch::SourceFormat;
pub use error::ExtractError;
pub use osm::{OsmError, OsmHandler};
pub use schema::infer_schema;
pub use staging::{StagedFile, StagingError, stage};
pub use state::{MemoryState, SqliteState, StateError, StateStore};
pub use storage::{FileInfo, LocalStorage, ObjectStorage, Storage, StorageError, storage_for};
pub use stream::{GeoStream, RecordIter};
pub use tap::Tap;
pub use vector::{VectorDataset, VectorError};
