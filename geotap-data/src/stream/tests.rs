//! Unit tests for the stream engine.

use super::*;
use crate::state::MemoryState;
use crate::test_support::{StubStorage, point_shapefile};
use chrono::TimeZone;
use geotap_core::{ConfigurationError, GeometryFormat, SchemaKind};
use rstest::{fixture, rstest};
use serde_json::json;

const POINT: &str = r#"{"type":"FeatureCollection","features":[
    {"type":"Feature","properties":{"name":"X","pop":10},
     "geometry":{"type":"Point","coordinates":[1,2]}}
]}"#;

const TWO_POINTS: &str = r#"{"type":"FeatureCollection","features":[
    {"type":"Feature","properties":{"name":"P"},"geometry":{"type":"Point","coordinates":[0,0]}},
    {"type":"Feature","properties":{"name":"Q"},"geometry":{"type":"Point","coordinates":[5,5]}}
]}"#;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

#[fixture]
fn remote() -> StubStorage {
    StubStorage::new("remote/*")
}

fn stream_over(storage: &StubStorage, config: StreamConfig) -> GeoStream {
    GeoStream::with_storages(config, vec![Box::new(storage.clone())]).expect("build stream")
}

fn points_config() -> StreamConfig {
    StreamConfig::new(["remote/*"])
        .with_table_name("points")
        .with_expose_fields(["name"])
}

fn drain(stream: &GeoStream, state: &mut MemoryState) -> Vec<Record> {
    stream
        .records(state)
        .collect::<Result<_, _>>()
        .expect("extract records")
}

#[rstest]
fn emits_records_and_commits_watermark(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();

    let records = drain(&stream, &mut state);

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].to_json(),
        json!({
            "name": "X",
            "geometry": "POINT (1 2)",
            "features": {"pop": 10},
            "metadata": {"source": "remote/a.geojson", "driver": "GeoJSON", "crs": "EPSG:4326"},
            "_sdc_last_modified": "2024-05-01T12:00:00Z",
            "_sdc_filename": "a.geojson",
        })
    );
    assert_eq!(
        state.bookmark("points", "a.geojson").expect("lookup").as_deref(),
        Some("2024-05-01T12:00:00Z")
    );
}

#[rstest]
fn unchanged_files_are_skipped_without_reading(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();
    drain(&stream, &mut state);
    let opened_after_first_run = remote.opened().len();

    assert!(drain(&stream, &mut state).is_empty());
    assert_eq!(remote.opened().len(), opened_after_first_run);
}

#[rstest]
fn only_changed_files_are_reprocessed(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    remote.insert("remote/b.geojson", at(1), TWO_POINTS);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();
    assert_eq!(drain(&stream, &mut state).len(), 3);

    remote.insert("remote/b.geojson", at(3), TWO_POINTS);
    let records = drain(&stream, &mut state);

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.file_name == "b.geojson"));
    assert_eq!(
        state.bookmark("points", "b.geojson").expect("lookup").as_deref(),
        Some("2024-05-03T12:00:00Z")
    );
}

#[rstest]
fn naive_bookmarks_are_read_as_utc(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();
    state
        .commit("points", "a.geojson", "2024-05-01T12:00:00")
        .expect("seed bookmark");

    assert!(drain(&stream, &mut state).is_empty());
}

#[rstest]
fn unusable_bookmarks_abort_the_run(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();
    state
        .commit("points", "a.geojson", "last tuesday")
        .expect("seed bookmark");

    let outcomes: Vec<_> = stream.records(&mut state).collect();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], Err(ExtractError::Watermark { .. })));
}

#[rstest]
fn failing_file_withholds_its_watermark_and_ends_the_run(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    remote.insert("remote/b.geojson", at(1), "{broken");
    remote.insert("remote/c.geojson", at(1), POINT);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();

    let mut records = stream.records(&mut state);
    assert!(matches!(records.next(), Some(Ok(_))));
    match records.next() {
        Some(Err(ExtractError::Open { path, .. })) => assert_eq!(path, "remote/b.geojson"),
        other => panic!("expected an open error, got {other:?}"),
    }
    assert!(records.next().is_none());
    assert!(records.next().is_none());
    drop(records);

    assert!(state.bookmark("points", "a.geojson").expect("lookup").is_some());
    assert!(state.bookmark("points", "b.geojson").expect("lookup").is_none());
    assert!(state.bookmark("points", "c.geojson").expect("lookup").is_none());
}

#[rstest]
fn abandoning_iteration_cleans_up_and_keeps_watermark(remote: StubStorage) {
    remote.insert("remote/b.geojson", at(2), TWO_POINTS);
    let stream = stream_over(&remote, points_config());
    let mut state = MemoryState::default();

    let mut records = stream.records(&mut state);
    assert!(matches!(records.next(), Some(Ok(_))));
    let staging_dir = records
        .current
        .as_ref()
        .and_then(|run| run._staged.staging_dir())
        .expect("remote file is staged")
        .to_path_buf();
    assert!(staging_dir.is_dir());
    drop(records);

    assert!(!staging_dir.exists());
    assert!(state.bookmark("points", "b.geojson").expect("lookup").is_none());
}

#[rstest]
fn osm_files_produce_identity_records(remote: StubStorage) {
    remote.insert(
        "remote/town.osm",
        at(4),
        r#"<osm><node id="7" lat="1" lon="2"><tag k="name" v="Well"/></node></osm>"#,
    );
    let config = StreamConfig::new(["remote/*.osm"])
        .with_table_name("town")
        .with_expose_fields(["name"])
        .with_geometry_format(GeometryFormat::GeoJson);
    let stream = stream_over(&remote, config);
    let mut state = MemoryState::default();

    let records = drain(&stream, &mut state);
    let value = records[0].to_json();
    assert_eq!(stream.name(), "town");
    assert_eq!(value["id"], json!("7"));
    assert_eq!(value["type"], json!("node"));
    assert_eq!(value["name"], json!("Well"));
    assert_eq!(value["geometry"], json!({"type": "Point", "coordinates": [2.0, 1.0]}));
    assert_eq!(value["metadata"], json!({"source": "remote/town.osm"}));
}

#[rstest]
fn schema_is_declared_when_the_stream_is_built(remote: StubStorage) {
    remote.insert("remote/a.geojson", at(1), POINT);
    let stream = stream_over(&remote, points_config().with_primary_keys(["ID"]));
    let opened = remote.opened();

    assert_eq!(opened, ["remote/a.geojson"]);
    assert_eq!(stream.schema().kind(), SchemaKind::Vector);
    assert!(stream.schema().property("id").is_some());
    assert_eq!(remote.opened(), opened);
    assert_eq!(stream.key_properties(), ["id"]);
}

#[rstest]
fn streams_without_matching_files_are_rejected(remote: StubStorage) {
    let err = GeoStream::with_storages(points_config(), vec![Box::new(remote)])
        .expect_err("nothing to infer a schema from");
    match err {
        ExtractError::Configuration(ConfigurationError::NoFilesForSchema { patterns }) => {
            assert_eq!(patterns, ["remote/*"]);
        }
        other => panic!("expected NoFilesForSchema, got {other:?}"),
    }
}

#[rstest]
fn local_patterns_without_matches_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pattern = dir.path().join("*.geojson");
    let pattern = pattern.to_str().expect("utf-8 path");
    let err = GeoStream::new(StreamConfig::new([pattern])).expect_err("no files");
    assert!(
        matches!(
            err,
            ExtractError::Configuration(ConfigurationError::NoFilesForSchema { .. })
        ),
        "got {err:?}"
    );
}

#[rstest]
fn empty_path_lists_are_rejected() {
    let err = GeoStream::with_storages(StreamConfig::default(), Vec::new())
        .expect_err("no paths");
    assert!(matches!(
        err,
        ExtractError::Configuration(ConfigurationError::MissingPaths { .. })
    ));
}

#[rstest]
fn remote_uppercase_shapefiles_are_read() {
    let remote = StubStorage::new("remote/*.SHP");
    let components = point_shapefile(&[("Main", 1.0, 2.0)]).expect("build shapefile");
    for (ext, bytes) in components {
        remote.insert(format!("remote/ROADS.{}", ext.to_ascii_uppercase()), at(6), bytes);
    }
    remote.insert("remote/ROADS.PRJ", at(6), "GEOGCS[\"WGS 84\"]");
    let config = StreamConfig::new(["remote/*.SHP"])
        .with_table_name("roads")
        .with_expose_fields(["name"]);
    let stream = stream_over(&remote, config);
    let mut state = MemoryState::default();

    let records = drain(&stream, &mut state);

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].to_json(),
        json!({
            "name": "Main",
            "geometry": "POINT (1 2)",
            "features": {},
            "metadata": {
                "source": "remote/ROADS.SHP",
                "driver": "ESRI Shapefile",
                "crs": "GEOGCS[\"WGS 84\"]",
            },
            "_sdc_last_modified": "2024-05-06T12:00:00Z",
            "_sdc_filename": "ROADS.SHP",
        })
    );
    assert!(state.bookmark("roads", "ROADS.SHP").expect("lookup").is_some());
}

#[rstest]
fn feature_failure_mid_file_cleans_up_and_withholds_watermark() {
    let remote = StubStorage::new("remote/*.shp");
    for (ext, mut bytes) in point_shapefile(&[("First", 0.0, 0.0), ("Second", 1.0, 1.0)])
        .expect("build shapefile")
    {
        if ext == "dbf" {
            bytes.truncate(bytes.len() - 12);
        }
        remote.insert(format!("remote/cut.{ext}"), at(7), bytes);
    }
    let config = StreamConfig::new(["remote/*.shp"]).with_table_name("cut");
    let stream = stream_over(&remote, config);
    let mut state = MemoryState::default();

    let mut records = stream.records(&mut state);
    assert!(matches!(records.next(), Some(Ok(_))));
    let staging_dir = records
        .current
        .as_ref()
        .and_then(|run| run._staged.staging_dir())
        .expect("remote file is staged")
        .to_path_buf();
    match records.next() {
        Some(Err(ExtractError::Feature { path, index, .. })) => {
            assert_eq!(path, "remote/cut.shp");
            assert_eq!(index, 1);
        }
        other => panic!("expected a feature error, got {other:?}"),
    }
    assert!(!staging_dir.exists());
    assert!(records.next().is_none());
    drop(records);

    assert!(state.bookmark("cut", "cut.shp").expect("lookup").is_none());
}
