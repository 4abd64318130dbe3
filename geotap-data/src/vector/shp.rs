//! ESRI Shapefile driver.
//!
//! Requires the `.dbf` sibling next to the `.shp`; the `.prj` sibling, when
//! present, supplies the CRS descriptor verbatim. With a `.shx` index the
//! shapes are read one at a time as the dataset is iterated; without one the
//! file is read in a single pass when opened.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use geo::Geometry;
use geotap_core::Attributes;
use geotap_fs::{file_is_file, open_utf8_file};
use serde_json::{Number, Value};
use shapefile::dbase::{self, FieldValue, Record};
use shapefile::{Reader, Shape, ShapeReader};

use super::{FeatureIter, RawFeature, VectorDataset, VectorDriver, VectorError};

type Table = dbase::Reader<BufReader<File>>;

pub(super) fn open(path: &Utf8Path) -> Result<VectorDataset, VectorError> {
    let open_error = |source| VectorError::Shapefile {
        path: path.to_owned(),
        source,
    };
    let dbf = path.with_extension("dbf");
    if !file_is_file(&dbf).map_err(|source| VectorError::Read {
        path: dbf.clone(),
        source,
    })? {
        return Err(open_error(shapefile::Error::MissingDbf));
    }
    let shapes = ShapeReader::from_path(path).map_err(open_error)?;
    let table = dbase::Reader::from_path(&dbf).map_err(|err| open_error(err.into()))?;
    let crs = read_projection(path)?;

    let features: FeatureIter = if shapes.shape_count().is_ok() {
        Box::new(IndexedFeatures {
            shapes,
            table,
            next: 0,
        })
    } else {
        Box::new(read_sequentially(Reader::new(shapes, table)).into_iter())
    };

    Ok(VectorDataset::new(VectorDriver::Shapefile, crs, features))
}

/// Shapes located through the `.shx` index, paired with their dBase rows.
struct IndexedFeatures {
    shapes: ShapeReader<BufReader<File>>,
    table: Table,
    next: usize,
}

impl IndexedFeatures {
    fn record(&mut self, index: usize) -> Result<Record, VectorError> {
        self.table.seek(index).map_err(|err| VectorError::Record {
            source: err.into(),
        })?;
        self.table
            .iter_records()
            .next()
            .ok_or(VectorError::MissingRecord { index })?
            .map_err(|err| VectorError::Record {
                source: err.into(),
            })
    }
}

impl Iterator for IndexedFeatures {
    type Item = Result<RawFeature, VectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let shape = self.shapes.read_nth_shape(index)?;
        self.next += 1;
        Some(
            shape
                .map_err(|source| VectorError::Record { source })
                .and_then(|shape| {
                    let record = self.record(index)?;
                    raw_feature(shape, record)
                }),
        )
    }
}

fn read_sequentially(
    mut reader: Reader<BufReader<File>, BufReader<File>>,
) -> Vec<Result<RawFeature, VectorError>> {
    let mut features = Vec::new();
    for entry in reader.iter_shapes_and_records() {
        let failed = entry.is_err();
        features.push(
            entry
                .map_err(|source| VectorError::Record { source })
                .and_then(|(shape, record)| raw_feature(shape, record)),
        );
        if failed {
            break;
        }
    }
    features
}

fn read_projection(path: &Utf8Path) -> Result<Option<String>, VectorError> {
    let prj: Utf8PathBuf = path.with_extension("prj");
    let read_error = |source| VectorError::Read {
        path: prj.clone(),
        source,
    };
    if !file_is_file(&prj).map_err(read_error)? {
        return Ok(None);
    }
    let mut text = String::new();
    open_utf8_file(&prj)
        .map_err(read_error)?
        .read_to_string(&mut text)
        .map_err(read_error)?;
    let trimmed = text.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
}

fn raw_feature(shape: Shape, record: Record) -> Result<RawFeature, VectorError> {
    let geometry = match shape {
        Shape::NullShape => None,
        other => Some(
            Geometry::<f64>::try_from(other).map_err(|err| VectorError::Geometry {
                reason: err.to_string(),
            })?,
        ),
    };
    let fields: HashMap<String, FieldValue> = record.into();
    let attributes: Attributes = fields
        .into_iter()
        .map(|(name, value)| (name, field_value(value)))
        .collect();
    Ok(RawFeature {
        attributes,
        geometry,
    })
}

/// Map a dBase value onto JSON; empty values become null.
pub(super) fn field_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(text) => text.map_or(Value::Null, Value::String),
        FieldValue::Memo(text) => Value::String(text),
        FieldValue::Logical(flag) => flag.map_or(Value::Null, Value::Bool),
        FieldValue::Integer(number) => Value::from(number),
        FieldValue::Numeric(number) => number.map_or(Value::Null, float),
        FieldValue::Float(number) => number.map_or(Value::Null, |value| float(f64::from(value))),
        FieldValue::Double(number) | FieldValue::Currency(number) => float(number),
        FieldValue::Date(date) => date.map_or(Value::Null, |date| Value::String(iso_date(date))),
        FieldValue::DateTime(stamp) => {
            let time = stamp.time();
            Value::String(format!(
                "{}T{:02}:{:02}:{:02}",
                iso_date(stamp.date()),
                time.hours(),
                time.minutes(),
                time.seconds()
            ))
        }
    }
}

fn iso_date(date: dbase::Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
