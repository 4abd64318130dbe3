//! OpenStreetMap entity extraction and the OSM record producer.
//!
//! [`OsmHandler`] buffers a whole file in one pass: way geometry needs the
//! locations of nodes seen earlier, so entities are only handed out once the
//! file has been read completely.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, Geometry, LineString, Point};
use geotap_core::{
    Attributes, FieldProjector, GeometryFormat, Member, OSM_FIELDS, OsmIdentity, OsmKind, Record,
    SourceFile, encode_geometry,
};
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::error::ExtractError;

mod pbf;
mod xml;

/// Errors raised while reading an OSM file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OsmError {
    /// The file could not be opened.
    #[error("failed to open OSM file {path}: {source}")]
    Open {
        /// File being opened.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The XML document is malformed.
    #[error("malformed OSM XML in {path}: {source}")]
    Xml {
        /// File being parsed.
        path: Utf8PathBuf,
        /// XML reader error.
        #[source]
        source: quick_xml::Error,
    },
    /// An element lacks a required attribute or carries an unreadable one.
    #[error("invalid <{element}> in {path}: attribute {attribute:?} is missing or malformed")]
    Attribute {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: &'static str,
    },
    /// The PBF blob stream could not be opened or decoded.
    #[error("failed to decode OSM PBF data in {path}: {source}")]
    Pbf {
        /// File being decoded.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: osmpbf::Error,
    },
}

/// Encoding of an OSM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsmEncoding {
    /// `.osm` XML.
    Xml,
    /// `.pbf` protocol buffers.
    Pbf,
}

/// A fully assembled OSM entity.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmEntity {
    /// OSM identifier.
    pub id: i64,
    /// Element kind.
    pub kind: OsmKind,
    /// Point for nodes, line for ways with at least two located nodes.
    pub geometry: Option<Geometry<f64>>,
    /// Element tags.
    pub tags: Attributes,
    /// Relation members or way node references; `None` for nodes.
    pub members: Option<Vec<Member>>,
}

/// Single-pass collector of OSM entities.
///
/// # Examples
/// ```
/// use geotap_core::{Attributes, OsmKind};
/// use geotap_data::osm::OsmHandler;
///
/// let mut handler = OsmHandler::default();
/// handler.node(1, Some((0.0, 0.0)), Attributes::new());
/// handler.node(2, Some((1.0, 1.0)), Attributes::new());
/// handler.way(10, vec![1, 2], Attributes::new());
///
/// let entities = handler.finish();
/// assert_eq!(entities[2].kind, OsmKind::Way);
/// assert!(entities[2].geometry.is_some());
/// ```
#[derive(Debug, Default)]
pub struct OsmHandler {
    locations: HashMap<i64, Coord<f64>>,
    entities: Vec<OsmEntity>,
    unresolved: usize,
}

impl OsmHandler {
    /// Read every entity of the file at `path`.
    pub fn apply_file(
        mut self,
        path: &Utf8Path,
        encoding: OsmEncoding,
    ) -> Result<Vec<OsmEntity>, OsmError> {
        match encoding {
            OsmEncoding::Xml => xml::read(path, &mut self)?,
            OsmEncoding::Pbf => pbf::read(path, &mut self)?,
        }
        Ok(self.finish())
    }

    /// Record a node; `location` is `(lon, lat)` in degrees.
    pub fn node(&mut self, id: i64, location: Option<(f64, f64)>, tags: Attributes) {
        let coord = location.and_then(|(lon, lat)| validated_coord(lon, lat));
        if let Some(coord) = coord {
            self.locations.insert(id, coord);
        } else {
            debug!("Node {id} has no valid location");
        }
        self.entities.push(OsmEntity {
            id,
            kind: OsmKind::Node,
            geometry: coord.map(|coord| Geometry::Point(Point::from(coord))),
            tags,
            members: None,
        });
    }

    /// Record a way over previously seen node references.
    pub fn way(&mut self, id: i64, refs: Vec<i64>, tags: Attributes) {
        let coords: Vec<Coord<f64>> = refs
            .iter()
            .filter_map(|node| self.locations.get(node).copied())
            .collect();
        self.unresolved += refs.len() - coords.len();
        let geometry = if coords.len() >= 2 {
            Some(Geometry::LineString(LineString::new(coords)))
        } else {
            debug!("Way {id} has fewer than two located nodes; geometry left empty");
            None
        };
        let members = refs
            .into_iter()
            .map(|reference| Member {
                kind: OsmKind::Node,
                reference,
                role: String::new(),
            })
            .collect();
        self.entities.push(OsmEntity {
            id,
            kind: OsmKind::Way,
            geometry,
            tags,
            members: Some(members),
        });
    }

    /// Record a relation with its ordered members.
    pub fn relation(&mut self, id: i64, members: Vec<Member>, tags: Attributes) {
        self.entities.push(OsmEntity {
            id,
            kind: OsmKind::Relation,
            geometry: None,
            tags,
            members: Some(members),
        });
    }

    /// Entities in file order.
    pub fn finish(self) -> Vec<OsmEntity> {
        if self.unresolved > 0 {
            warn!(
                "Skipped {} way node references without coordinates",
                self.unresolved
            );
        }
        self.entities
    }
}

pub(crate) fn collect_tags<'a, T>(tags: T) -> Attributes
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
        .collect()
}

fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

/// Turn buffered entities into [`Record`]s.
pub fn osm_records(
    entities: Vec<OsmEntity>,
    projector: FieldProjector,
    format: GeometryFormat,
    source: SourceFile,
) -> impl Iterator<Item = Result<Record, ExtractError>> {
    entities
        .into_iter()
        .enumerate()
        .map(move |(index, entity)| {
            let geometry = entity
                .geometry
                .as_ref()
                .map(|geometry| encode_geometry(geometry, format))
                .transpose()
                .map_err(|err| ExtractError::Encode {
                    path: source.path.clone(),
                    index,
                    source: err,
                })?;
            let identity = OsmIdentity {
                id: entity.id.to_string(),
                kind: entity.kind,
                members: entity.members,
            };
            let projection = projector.project(entity.tags, &OSM_FIELDS);
            Ok(Record::osm(identity, projection, geometry, &source))
        })
}
