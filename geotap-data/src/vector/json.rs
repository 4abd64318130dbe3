//! GeoJSON driver.

use std::io::Read;

use camino::Utf8Path;
use geo::Geometry;
use geojson::{Feature, GeoJson};
use geotap_fs::open_utf8_file;
use serde_json::Value;

use super::{RawFeature, VectorDataset, VectorDriver, VectorError};

/// CRS assumed for GeoJSON without a legacy `crs` member.
const DEFAULT_CRS: &str = "EPSG:4326";

pub(super) fn open(path: &Utf8Path) -> Result<VectorDataset, VectorError> {
    let read_error = |source| VectorError::Read {
        path: path.to_owned(),
        source,
    };
    let mut text = String::new();
    open_utf8_file(path)
        .map_err(read_error)?
        .read_to_string(&mut text)
        .map_err(read_error)?;

    let document: Value = serde_json::from_str(&text).map_err(|source| VectorError::Json {
        path: path.to_owned(),
        source,
    })?;
    let crs = legacy_crs(&document).unwrap_or(DEFAULT_CRS).to_owned();
    let geojson = GeoJson::from_json_value(document).map_err(|source| VectorError::GeoJson {
        path: path.to_owned(),
        source: Box::new(source),
    })?;

    let features: Vec<Result<RawFeature, VectorError>> = match geojson {
        GeoJson::FeatureCollection(collection) => {
            collection.features.into_iter().map(raw_feature).collect()
        }
        GeoJson::Feature(feature) => vec![raw_feature(feature)],
        GeoJson::Geometry(geometry) => vec![convert(geometry).map(|geometry| RawFeature {
            attributes: serde_json::Map::new(),
            geometry: Some(geometry),
        })],
    };

    Ok(VectorDataset::new(
        VectorDriver::GeoJson,
        Some(crs),
        Box::new(features.into_iter()),
    ))
}

/// `crs.properties.name` from the pre-RFC 7946 CRS member.
fn legacy_crs(document: &Value) -> Option<&str> {
    document
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
}

fn raw_feature(feature: Feature) -> Result<RawFeature, VectorError> {
    let geometry = feature.geometry.map(convert).transpose()?;
    Ok(RawFeature {
        attributes: feature.properties.unwrap_or_default(),
        geometry,
    })
}

fn convert(geometry: geojson::Geometry) -> Result<Geometry<f64>, VectorError> {
    Geometry::<f64>::try_from(geometry).map_err(|err| VectorError::Geometry {
        reason: err.to_string(),
    })
}
