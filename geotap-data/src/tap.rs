//! The set of streams described by a tap configuration.

use geotap_core::TapConfig;
use log::debug;

use crate::error::ExtractError;
use crate::stream::GeoStream;

/// Every configured stream, in configuration order.
#[derive(Debug)]
pub struct Tap {
    streams: Vec<GeoStream>,
}

impl Tap {
    /// Validate `config` and build one stream per entry.
    ///
    /// Every stream declares its schema here, so a stream whose patterns
    /// match nothing fails the whole tap before any records are read.
    ///
    /// # Examples
    /// ```
    /// use geotap_core::{StreamConfig, TapConfig};
    /// use geotap_data::Tap;
    ///
    /// let dir = tempfile::tempdir().expect("temp dir");
    /// let file = dir.path().join("roads.geojson");
    /// std::fs::write(&file, r#"{"type":"FeatureCollection","features":[]}"#).expect("write");
    ///
    /// let config = TapConfig {
    ///     files: vec![StreamConfig::new([file.to_str().expect("utf-8 path")])],
    /// };
    /// let tap = Tap::new(config).expect("valid tap");
    /// assert!(tap.stream("roads").is_some());
    /// ```
    pub fn new(config: TapConfig) -> Result<Self, ExtractError> {
        config.validate()?;
        let streams = config
            .files
            .into_iter()
            .map(GeoStream::new)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Configured {} stream(s)", streams.len());
        Ok(Self { streams })
    }

    /// Streams in configuration order.
    pub fn streams(&self) -> &[GeoStream] {
        &self.streams
    }

    /// Look up a stream by name.
    pub fn stream(&self, name: &str) -> Option<&GeoStream> {
        self.streams.iter().find(|stream| stream.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotap_core::{ConfigurationError, StreamConfig};
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    const EMPTY_COLLECTION: &str = r#"{"type":"FeatureCollection","features":[]}"#;

    #[fixture]
    fn data_dir() -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("roads.geojson"), EMPTY_COLLECTION).expect("write roads");
        fs::write(dir.path().join("places.geojson"), EMPTY_COLLECTION).expect("write places");
        dir
    }

    fn pattern(dir: &TempDir, name: &str) -> String {
        dir.path()
            .join(name)
            .to_str()
            .expect("utf-8 temp path")
            .to_owned()
    }

    #[rstest]
    fn builds_streams_in_order(data_dir: TempDir) {
        let tap = Tap::new(TapConfig {
            files: vec![
                StreamConfig::new([pattern(&data_dir, "roads.geojson")]),
                StreamConfig::new([pattern(&data_dir, "*.geojson")]).with_table_name("places"),
            ],
        })
        .expect("valid tap");
        let names: Vec<&str> = tap.streams().iter().map(GeoStream::name).collect();
        assert_eq!(names, ["roads", "places"]);
        assert!(tap.stream("missing").is_none());
    }

    #[rstest]
    fn any_stream_without_files_fails_the_tap(data_dir: TempDir) {
        let err = Tap::new(TapConfig {
            files: vec![
                StreamConfig::new([pattern(&data_dir, "roads.geojson")]),
                StreamConfig::new([pattern(&data_dir, "*.shp")]).with_table_name("parcels"),
            ],
        })
        .expect_err("second stream has no files");
        match err {
            ExtractError::Configuration(ConfigurationError::NoFilesForSchema { patterns }) => {
                assert_eq!(patterns, [pattern(&data_dir, "*.shp")]);
            }
            other => panic!("expected NoFilesForSchema, got {other:?}"),
        }
    }

    #[rstest]
    fn rejects_empty_configuration() {
        let err = Tap::new(TapConfig::default()).expect_err("no streams");
        assert!(matches!(
            err,
            ExtractError::Configuration(ConfigurationError::NoStreams)
        ));
    }

    #[rstest]
    fn rejects_unknown_schemes() {
        let err = Tap::new(TapConfig {
            files: vec![StreamConfig::new(["gopher://host/a.geojson"])],
        })
        .expect_err("unsupported scheme");
        assert!(matches!(err, ExtractError::Storage(_)));
    }
}
