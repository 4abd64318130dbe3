//! Geometry output encoding.
//!
//! Records carry geometries either as well-known text or as a GeoJSON
//! geometry object. WKT follows the `POINT (1 2)` spacing with coordinates
//! printed in their shortest round-trip form.

use std::fmt::{self, Display, Formatter};

use geo::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Representation used for the `geometry` slot of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    /// Well-known text string.
    #[default]
    Wkt,
    /// GeoJSON geometry object.
    GeoJson,
}

/// Encoded geometry stored in a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeometryValue {
    /// Well-known text.
    Wkt(String),
    /// GeoJSON geometry object.
    GeoJson(Value),
}

impl GeometryValue {
    /// Borrow the WKT text when this value is WKT.
    pub fn as_wkt(&self) -> Option<&str> {
        match self {
            Self::Wkt(text) => Some(text),
            Self::GeoJson(_) => None,
        }
    }
}

/// Errors raised while encoding a geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Serialising the GeoJSON geometry failed.
    #[error("failed to serialise GeoJSON geometry: {source}")]
    GeoJson {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

/// Encode `geometry` in the requested representation.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use geotap_core::{GeometryFormat, GeometryValue, encode_geometry};
///
/// let point = Geometry::Point(Point::new(1.0, 2.0));
/// let encoded = encode_geometry(&point, GeometryFormat::Wkt).expect("encode point");
/// assert_eq!(encoded, GeometryValue::Wkt("POINT (1 2)".to_owned()));
/// ```
pub fn encode_geometry(
    geometry: &Geometry<f64>,
    format: GeometryFormat,
) -> Result<GeometryValue, GeometryError> {
    match format {
        GeometryFormat::Wkt => Ok(GeometryValue::Wkt(to_wkt(geometry))),
        GeometryFormat::GeoJson => {
            let document = geojson::Geometry::new(geojson::Value::from(geometry));
            serde_json::to_value(&document)
                .map(GeometryValue::GeoJson)
                .map_err(|source| GeometryError::GeoJson { source })
        }
    }
}

/// Render `geometry` as well-known text.
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    Wkt(geometry).to_string()
}

struct Wkt<'a>(&'a Geometry<f64>);

impl Display for Wkt<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_geometry(f, self.0)
    }
}

fn write_geometry(f: &mut Formatter<'_>, geometry: &Geometry<f64>) -> fmt::Result {
    match geometry {
        Geometry::Point(point) => {
            f.write_str("POINT (")?;
            write_coord(f, point.0)?;
            f.write_str(")")
        }
        Geometry::Line(line) => {
            f.write_str("LINESTRING ")?;
            write_coords(f, &[line.start, line.end])
        }
        Geometry::LineString(line) => {
            f.write_str("LINESTRING ")?;
            write_line(f, line)
        }
        Geometry::Polygon(polygon) => {
            f.write_str("POLYGON ")?;
            write_polygon(f, polygon)
        }
        Geometry::MultiPoint(points) => {
            f.write_str("MULTIPOINT ")?;
            write_list(f, &points.0, |f, point| {
                f.write_str("(")?;
                write_coord(f, point.0)?;
                f.write_str(")")
            })
        }
        Geometry::MultiLineString(lines) => {
            f.write_str("MULTILINESTRING ")?;
            write_list(f, &lines.0, write_line)
        }
        Geometry::MultiPolygon(polygons) => {
            f.write_str("MULTIPOLYGON ")?;
            write_list(f, &polygons.0, write_polygon)
        }
        Geometry::GeometryCollection(collection) => {
            f.write_str("GEOMETRYCOLLECTION ")?;
            write_list(f, &collection.0, write_geometry)
        }
        Geometry::Rect(rect) => {
            f.write_str("POLYGON ")?;
            write_polygon(f, &rect.to_polygon())
        }
        Geometry::Triangle(triangle) => {
            f.write_str("POLYGON ")?;
            write_polygon(f, &triangle.to_polygon())
        }
    }
}

fn write_coord(f: &mut Formatter<'_>, coord: Coord<f64>) -> fmt::Result {
    write!(f, "{} {}", coord.x, coord.y)
}

fn write_coords(f: &mut Formatter<'_>, coords: &[Coord<f64>]) -> fmt::Result {
    write_list(f, coords, |f, coord| write_coord(f, *coord))
}

fn write_line(f: &mut Formatter<'_>, line: &LineString<f64>) -> fmt::Result {
    write_coords(f, &line.0)
}

fn write_polygon(f: &mut Formatter<'_>, polygon: &Polygon<f64>) -> fmt::Result {
    if polygon.exterior().0.is_empty() {
        return f.write_str("EMPTY");
    }
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();
    write_list(f, &rings, |f, ring| write_line(f, ring))
}

/// Write `(a, b, c)` using `item` for each element, or `EMPTY`.
fn write_list<T>(
    f: &mut Formatter<'_>,
    items: &[T],
    mut item: impl FnMut(&mut Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    if items.is_empty() {
        return f.write_str("EMPTY");
    }
    f.write_str("(")?;
    for (index, value) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        item(f, value)?;
    }
    f.write_str(")")
}
