//! Test helpers for laying out tap configurations and source files.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

pub(super) const PLACES: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "properties": {"name": "Quay", "ref": "Q1"},
     "geometry": {"type": "Point", "coordinates": [1, 2]}}
]}"#;

/// A scratch directory holding one GeoJSON file and a tap configuration.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non UTF-8 temp dir {path:?}"));
        fs::write(root.join("places.geojson"), PLACES).expect("write places");
        let tap = json!({
            "files": [{
                "paths": [root.join("*.geojson").as_str()],
                "table_name": "places",
                "primary_keys": ["ref"],
                "expose_fields": ["name"],
            }]
        });
        fs::write(root.join("tap.json"), tap.to_string()).expect("write tap config");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn tap_config(&self) -> Utf8PathBuf {
        self.root.join("tap.json")
    }

    pub(super) fn state_db(&self) -> Utf8PathBuf {
        self.root.join("state/bookmarks.db")
    }
}

/// Decode JSON-lines output into messages.
pub(super) fn parse_lines(output: &[u8]) -> Vec<Value> {
    let text = std::str::from_utf8(output).expect("UTF-8 output");
    text.lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect()
}

/// Message types in output order.
pub(super) fn message_types(messages: &[Value]) -> Vec<&str> {
    messages
        .iter()
        .filter_map(|message| message["type"].as_str())
        .collect()
}
