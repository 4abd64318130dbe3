//! Unit tests for vector drivers and the vector record producer.

use super::*;
use chrono::{TimeZone, Utc};
use geotap_core::{ExposedFields, StreamConfig};
use rstest::{fixture, rstest};
use serde_json::json;
use crate::test_support::point_shapefile;
use shapefile::dbase::{Date, DateTime, FieldValue, Time};
use std::fs;
use tempfile::TempDir;

#[fixture]
fn workdir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
    (dir, root)
}

#[fixture]
fn source() -> SourceFile {
    let modified = Utc
        .with_ymd_and_hms(2024, 4, 2, 8, 30, 0)
        .single()
        .expect("valid timestamp");
    SourceFile::new("data/a.geojson", modified)
}

fn write(root: &Utf8Path, name: &str, body: &str) -> Utf8PathBuf {
    let path = root.join(name);
    fs::write(&path, body).expect("write fixture");
    path
}

#[rstest]
fn reads_feature_collections_in_order(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write(
        &root,
        "a.geojson",
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"X","pop":10},
             "geometry":{"type":"Point","coordinates":[1,2]}},
            {"type":"Feature","properties":{"name":"Y"},"geometry":null}
        ]}"#,
    );
    let dataset = VectorDataset::open(&path).expect("open dataset");
    assert_eq!(dataset.driver(), VectorDriver::GeoJson);
    let features: Vec<RawFeature> = dataset
        .into_features()
        .collect::<Result<_, _>>()
        .expect("read features");
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].attributes.get("name"), Some(&json!("X")));
    assert!(features[0].geometry.is_some());
    assert!(features[1].geometry.is_none());
}

#[rstest]
fn legacy_crs_member_is_reported(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write(
        &root,
        "b.json",
        r#"{"type":"FeatureCollection",
            "crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::27700"}},
            "features":[]}"#,
    );
    let dataset = VectorDataset::open(&path).expect("open dataset");
    assert_eq!(dataset.crs(), Some("urn:ogc:def:crs:EPSG::27700"));
    assert_eq!(dataset.into_features().count(), 0);
}

#[rstest]
#[case("broken.geojson", "{not json", "JSON")]
#[case("odd.geojson", r#"{"type":"Banana"}"#, "GeoJSON")]
fn malformed_documents_fail_to_open(
    workdir: (TempDir, Utf8PathBuf),
    #[case] name: &str,
    #[case] body: &str,
    #[case] expected: &str,
) {
    let (_guard, root) = workdir;
    let path = write(&root, name, body);
    let err = VectorDataset::open(&path).expect_err("malformed document");
    let matched = match err {
        VectorError::Json { .. } => "JSON",
        VectorError::GeoJson { .. } => "GeoJSON",
        ref other => panic!("unexpected error {other:?}"),
    };
    assert_eq!(matched, expected);
}

#[rstest]
fn unknown_extensions_have_no_driver(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write(&root, "layers.gpkg", "");
    assert!(matches!(
        VectorDataset::open(&path),
        Err(VectorError::UnsupportedFormat { .. })
    ));
}

#[rstest]
fn corrupt_shapefiles_fail_to_open(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write(&root, "roads.shp", "not a shapefile");
    assert!(matches!(
        VectorDataset::open(&path),
        Err(VectorError::Shapefile { .. })
    ));
}

fn write_shapefile(root: &Utf8Path, stem: &str, points: &[(&str, f64, f64)]) -> Utf8PathBuf {
    for (ext, bytes) in point_shapefile(points).expect("build shapefile") {
        fs::write(root.join(format!("{stem}.{ext}")), bytes).expect("write component");
    }
    root.join(format!("{stem}.shp"))
}

#[rstest]
fn reads_shapefile_attributes_and_projection(
    workdir: (TempDir, Utf8PathBuf),
    source: SourceFile,
) {
    let (_guard, root) = workdir;
    let path = write_shapefile(&root, "roads", &[("Main", 1.0, 2.0), ("High", 3.5, -4.0)]);
    write(&root, "roads.prj", "PROJCS[\"OSGB 1936 / British National Grid\"]\n");

    let dataset = VectorDataset::open(&path).expect("open shapefile");
    assert_eq!(dataset.driver(), VectorDriver::Shapefile);
    assert_eq!(dataset.crs(), Some("PROJCS[\"OSGB 1936 / British National Grid\"]"));

    let records: Vec<Record> = vector_records(
        dataset,
        FieldProjector::default(),
        GeometryFormat::Wkt,
        source,
    )
    .collect::<Result<_, _>>()
    .expect("produce records");
    let values: Vec<Value> = records.iter().map(Record::to_json).collect();
    assert_eq!(values[0]["geometry"], json!("POINT (1 2)"));
    assert_eq!(values[0]["features"], json!({"name": "Main"}));
    assert_eq!(values[1]["geometry"], json!("POINT (3.5 -4)"));
    assert_eq!(values[1]["features"], json!({"name": "High"}));
    assert_eq!(
        values[1]["metadata"],
        json!({
            "source": "data/a.geojson",
            "driver": "ESRI Shapefile",
            "crs": "PROJCS[\"OSGB 1936 / British National Grid\"]",
        })
    );
}

#[rstest]
fn shapefiles_without_projection_have_no_crs(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write_shapefile(&root, "plain", &[("Only", 0.0, 0.0)]);
    let dataset = VectorDataset::open(&path).expect("open shapefile");
    assert_eq!(dataset.crs(), None);
    assert_eq!(dataset.into_features().count(), 1);
}

#[rstest]
fn shapefiles_need_their_attribute_table(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write_shapefile(&root, "bare", &[("Only", 0.0, 0.0)]);
    fs::remove_file(root.join("bare.dbf")).expect("remove dbf");
    assert!(matches!(
        VectorDataset::open(&path),
        Err(VectorError::Shapefile {
            source: shapefile::Error::MissingDbf,
            ..
        })
    ));
}

#[rstest]
fn truncated_attribute_table_fails_at_the_missing_row(workdir: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workdir;
    let path = write_shapefile(&root, "cut", &[("First", 0.0, 0.0), ("Second", 1.0, 1.0)]);
    let dbf = root.join("cut.dbf");
    let mut bytes = fs::read(&dbf).expect("read dbf");
    bytes.truncate(bytes.len() - 12);
    fs::write(&dbf, bytes).expect("truncate dbf");

    let features: Vec<_> = VectorDataset::open(&path)
        .expect("open shapefile")
        .into_features()
        .collect();
    assert_eq!(features.len(), 2);
    assert!(features[0].is_ok());
    assert!(matches!(
        features[1],
        Err(VectorError::MissingRecord { index: 1 })
    ));
}

#[rstest]
#[case(FieldValue::Character(Some("Harbour".to_owned())), json!("Harbour"))]
#[case(FieldValue::Character(None), Value::Null)]
#[case(FieldValue::Numeric(Some(2.5)), json!(2.5))]
#[case(FieldValue::Numeric(None), Value::Null)]
#[case(FieldValue::Logical(Some(true)), json!(true))]
#[case(FieldValue::Integer(7), json!(7))]
#[case(FieldValue::Double(1.25), json!(1.25))]
#[case(FieldValue::Float(Some(0.5)), json!(0.5))]
#[case(FieldValue::Date(Some(Date::new(2, 4, 2024))), json!("2024-04-02"))]
#[case(
    FieldValue::DateTime(DateTime::new(Date::new(2, 4, 2024), Time::new(8, 30, 5))),
    json!("2024-04-02T08:30:05")
)]
fn maps_dbase_values(#[case] value: FieldValue, #[case] expected: Value) {
    assert_eq!(shp::field_value(value), expected);
}

#[rstest]
fn produces_point_record(workdir: (TempDir, Utf8PathBuf), source: SourceFile) {
    let (_guard, root) = workdir;
    let path = write(
        &root,
        "a.geojson",
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"X","pop":10},
             "geometry":{"type":"Point","coordinates":[1,2]}}
        ]}"#,
    );
    let config = StreamConfig::new(["data/a.geojson"]).with_expose_fields(["name"]);
    let dataset = VectorDataset::open(&path).expect("open dataset");
    let records: Vec<Record> = vector_records(
        dataset,
        FieldProjector::from_config(&config),
        GeometryFormat::Wkt,
        source,
    )
    .collect::<Result<_, _>>()
    .expect("produce records");

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].to_json(),
        json!({
            "name": "X",
            "geometry": "POINT (1 2)",
            "features": {"pop": 10},
            "metadata": {"source": "data/a.geojson", "driver": "GeoJSON", "crs": "EPSG:4326"},
            "_sdc_last_modified": "2024-04-02T08:30:00Z",
            "_sdc_filename": "a.geojson",
        })
    );
}

#[rstest]
fn geojson_output_keeps_structured_geometry(
    workdir: (TempDir, Utf8PathBuf),
    source: SourceFile,
) {
    let (_guard, root) = workdir;
    let path = write(&root, "g.geojson", r#"{"type":"Point","coordinates":[3,4]}"#);
    let dataset = VectorDataset::open(&path).expect("open dataset");
    let record = vector_records(
        dataset,
        FieldProjector::default(),
        GeometryFormat::GeoJson,
        source,
    )
    .next()
    .expect("one record")
    .expect("valid record");
    assert_eq!(
        record.to_json()["geometry"],
        json!({"type": "Point", "coordinates": [3.0, 4.0]})
    );
}

#[rstest]
fn failing_feature_reports_path_and_index(source: SourceFile) {
    let features: Vec<Result<RawFeature, VectorError>> = vec![
        Ok(RawFeature {
            attributes: Attributes::new(),
            geometry: None,
        }),
        Err(VectorError::Geometry {
            reason: "ring is not closed".to_owned(),
        }),
    ];
    let dataset = VectorDataset::new(
        VectorDriver::GeoJson,
        None,
        Box::new(features.into_iter()),
    );
    let projector = FieldProjector::new(ExposedFields::default(), Vec::new());
    let outcomes: Vec<_> = vector_records(dataset, projector, GeometryFormat::Wkt, source).collect();

    assert!(outcomes[0].is_ok());
    match &outcomes[1] {
        Err(ExtractError::Feature { path, index, .. }) => {
            assert_eq!(path, "data/a.geojson");
            assert_eq!(*index, 1);
        }
        other => panic!("expected a feature error, got {other:?}"),
    }
}
