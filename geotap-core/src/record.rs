//! The Canonical Record envelope emitted for every feature or OSM entity.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::geometry::GeometryValue;
use crate::projection::Projection;
use crate::watermark::format_watermark;

/// Replication key carried by every record.
pub const SDC_INCREMENTAL_KEY: &str = "_sdc_last_modified";

/// State partition key carried by every record.
pub const SDC_FILENAME: &str = "_sdc_filename";

/// Dynamic attribute bag keyed by attribute name.
pub type Attributes = serde_json::Map<String, Value>;

/// OpenStreetMap element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmKind {
    /// A tagged point.
    Node,
    /// An ordered list of node references.
    Way,
    /// A grouping of other elements.
    Relation,
}

impl OsmKind {
    /// Lower-case name used in records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

/// A relation member reference.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Member {
    /// Kind of the referenced element.
    #[serde(rename = "type")]
    pub kind: OsmKind,
    /// Identifier of the referenced element.
    #[serde(rename = "ref")]
    pub reference: i64,
    /// Role of the member within the relation.
    pub role: String,
}

/// Identity slots carried by OSM-origin records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmIdentity {
    /// Element identifier rendered as a decimal string.
    pub id: String,
    /// Element kind.
    pub kind: OsmKind,
    /// Relation members or way node references; `None` for nodes.
    pub members: Option<Vec<Member>>,
}

/// Originating file of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Logical path as enumerated by the storage adapter.
    pub path: String,
    /// Base name used as the state partition key.
    pub file_name: String,
    /// Modification time of the file; the record's replication value.
    pub modified: DateTime<Utc>,
}

impl SourceFile {
    /// Describe a file, deriving its base name from `path`.
    pub fn new(path: impl Into<String>, modified: DateTime<Utc>) -> Self {
        let path = path.into();
        let file_name = base_name(&path).to_owned();
        Self {
            path,
            file_name,
            modified,
        }
    }
}

/// Final `/`- or `\`-separated segment of `path`.
///
/// # Examples
/// ```
/// use geotap_core::record::base_name;
///
/// assert_eq!(base_name("s3://bucket/data/roads.shp"), "roads.shp");
/// assert_eq!(base_name("roads.shp"), "roads.shp");
/// ```
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Uniform output envelope.
///
/// Serialises to a flat object: promoted fields first, then the OSM identity
/// slots (OSM records only), `geometry`, `features`, `metadata`,
/// [`SDC_INCREMENTAL_KEY`] and [`SDC_FILENAME`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Exposed attributes promoted to top-level keys.
    pub promoted: Attributes,
    /// OSM identity, present on OSM-origin records.
    pub osm: Option<OsmIdentity>,
    /// Encoded geometry, `None` when the source had none.
    pub geometry: Option<GeometryValue>,
    /// Remaining attributes.
    pub features: Attributes,
    /// Dataset-level metadata.
    pub metadata: Attributes,
    /// Replication value: the source file's modification time.
    pub last_modified: DateTime<Utc>,
    /// Base name of the source file.
    pub file_name: String,
}

impl Record {
    /// Assemble a record for a vector feature.
    pub fn vector(
        projection: Projection,
        geometry: Option<GeometryValue>,
        metadata: Attributes,
        source: &SourceFile,
    ) -> Self {
        Self {
            promoted: projection.promoted,
            osm: None,
            geometry,
            features: projection.remainder,
            metadata,
            last_modified: source.modified,
            file_name: source.file_name.clone(),
        }
    }

    /// Assemble a record for an OSM entity; metadata carries the source path.
    pub fn osm(
        identity: OsmIdentity,
        projection: Projection,
        geometry: Option<GeometryValue>,
        source: &SourceFile,
    ) -> Self {
        let mut metadata = Attributes::new();
        metadata.insert("source".to_owned(), Value::String(source.path.clone()));
        Self {
            promoted: projection.promoted,
            osm: Some(identity),
            geometry,
            features: projection.remainder,
            metadata,
            last_modified: source.modified,
            file_name: source.file_name.clone(),
        }
    }

    /// Serialise into a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.promoted {
            map.serialize_entry(key, value)?;
        }
        if let Some(identity) = &self.osm {
            map.serialize_entry("id", &identity.id)?;
            map.serialize_entry("type", &identity.kind)?;
            map.serialize_entry("members", &identity.members)?;
        }
        map.serialize_entry("geometry", &self.geometry)?;
        map.serialize_entry("features", &self.features)?;
        map.serialize_entry("metadata", &self.metadata)?;
        map.serialize_entry(SDC_INCREMENTAL_KEY, &format_watermark(self.last_modified))?;
        map.serialize_entry(SDC_FILENAME, &self.file_name)?;
        map.end()
    }
}
