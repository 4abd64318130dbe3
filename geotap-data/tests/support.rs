//! Shared helpers for behavioural tests.

use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use geotap_core::{Record, StreamConfig};
use geotap_data::{ExtractError, GeoStream, StateStore};

/// Two named points.
pub const PLACES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "Quay", "kind": "harbour"},
     "geometry": {"type": "Point", "coordinates": [-1.5, 53.8]}},
    {"type": "Feature", "properties": {"name": "Mill", "kind": "works"},
     "geometry": {"type": "Point", "coordinates": [-1.6, 53.9]}}
  ]
}"#;

/// Two nodes joined by one way.
pub const TOWN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="53.8" lon="-1.5"/>
  <node id="2" lat="53.9" lon="-1.6"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
    <tag k="name" v="Mill Lane"/>
  </way>
</osm>"#;

/// Write `contents` to `dir/name`.
pub fn write_file(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap_or_else(|err| {
        panic!("failed to write fixture {path:?}: {err}");
    });
}

/// Push the modification time of `dir/name` one hour into the future.
pub fn touch(dir: &Path, name: &str) {
    let path = dir.join(name);
    let file = File::options()
        .write(true)
        .open(&path)
        .unwrap_or_else(|err| panic!("failed to open {path:?}: {err}"));
    let later = SystemTime::now() + Duration::from_secs(3600);
    file.set_modified(later)
        .unwrap_or_else(|err| panic!("failed to touch {path:?}: {err}"));
}

/// Build a stream over `pattern` inside `dir`.
pub fn stream_in(dir: &Path, pattern: &str, table: &str) -> GeoStream {
    let pattern = dir.join(pattern);
    let pattern = pattern
        .to_str()
        .unwrap_or_else(|| panic!("non UTF-8 temp path {pattern:?}"));
    let config = StreamConfig::new([pattern])
        .with_table_name(table)
        .with_expose_fields(["name"]);
    GeoStream::new(config).unwrap_or_else(|err| panic!("failed to build stream: {err}"))
}

/// Drain one run of `stream` against `state`.
pub fn run(stream: &GeoStream, state: &mut dyn StateStore) -> Result<Vec<Record>, ExtractError> {
    stream.records(state).collect()
}
