//! Incremental extraction of one configured stream.
//!
//! Responsibilities:
//! - Declare the schema when the stream is built, so a stream with no
//!   matching files is rejected before any record is produced.
//! - Enumerate files pattern by pattern, in storage order.
//! - Skip files whose modification time is not newer than their bookmark.
//! - Stage, dispatch and produce records lazily, one file at a time.
//! - Commit a file's watermark only after its last record was yielded.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use geotap_core::{
    FieldProjector, Record, StreamConfig, StreamSchema, advance, format_watermark, parse_watermark,
    should_skip,
};
use log::{debug, info};

use crate::dispatch::SourceFormat;
use crate::error::ExtractError;
use crate::osm::{OsmEncoding, OsmHandler, osm_records};
use crate::schema::infer_schema;
use crate::staging::{StagedFile, stage};
use crate::state::StateStore;
use crate::storage::{FileInfo, Storage, storage_for};
use crate::vector::{VectorDataset, vector_records};

type RecordSource = Box<dyn Iterator<Item = Result<Record, ExtractError>>>;

/// One logical stream over the files matched by its path patterns.
pub struct GeoStream {
    config: StreamConfig,
    name: String,
    projector: FieldProjector,
    storages: Vec<Box<dyn Storage>>,
    schema: StreamSchema,
}

impl std::fmt::Debug for GeoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoStream")
            .field("name", &self.name)
            .field("storages", &self.storages)
            .finish_non_exhaustive()
    }
}

impl GeoStream {
    /// Build a stream, choosing a storage adapter for every pattern.
    ///
    /// # Errors
    /// Fails with [`ExtractError::Configuration`] when no pattern matches a
    /// file, and with the schema builder's error when the first match cannot
    /// be opened.
    pub fn new(config: StreamConfig) -> Result<Self, ExtractError> {
        config.validate()?;
        let storages = config
            .paths
            .iter()
            .filter(|pattern| !pattern.trim().is_empty())
            .map(|pattern| storage_for(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_storages(config, storages)
    }

    /// Build a stream reading from pre-built storages.
    pub fn with_storages(
        config: StreamConfig,
        storages: Vec<Box<dyn Storage>>,
    ) -> Result<Self, ExtractError> {
        config.validate()?;
        let projector = FieldProjector::from_config(&config);
        let schema = infer_schema(&storages, projector.exposed())?;
        let name = config.stream_name();
        debug!("Declared {:?} schema for stream {name}", schema.kind());
        Ok(Self {
            name,
            projector,
            config,
            storages,
            schema,
        })
    }

    /// Stream name used for bookmarks and output messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the stream was built from.
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Lower-cased primary key names.
    pub fn key_properties(&self) -> Vec<String> {
        self.config.key_properties()
    }

    /// Record schema declared when the stream was built.
    pub const fn schema(&self) -> &StreamSchema {
        &self.schema
    }

    /// Lazily extract records from every new or changed file.
    ///
    /// Watermarks are committed to `state` as each file completes. The first
    /// error is yielded once and ends the iteration.
    pub fn records<'a>(&'a self, state: &'a mut dyn StateStore) -> RecordIter<'a> {
        RecordIter {
            stream: self,
            state,
            next_storage: 0,
            queue: VecDeque::new(),
            current: None,
            finished: false,
        }
    }

    fn open_file(
        &self,
        storage: &dyn Storage,
        info: &FileInfo,
    ) -> Result<(StagedFile, RecordSource), ExtractError> {
        let path = info.path.as_str();
        let staged = stage(storage, path).map_err(|source| ExtractError::Staging {
            path: path.to_owned(),
            source,
        })?;
        let format = self.config.geometry_format;
        let projector = self.projector.clone();
        let records: RecordSource = match SourceFormat::from_path(path) {
            SourceFormat::Vector => {
                let dataset =
                    VectorDataset::open(staged.path()).map_err(|source| ExtractError::Open {
                        path: path.to_owned(),
                        source,
                    })?;
                Box::new(vector_records(dataset, projector, format, info.source()))
            }
            osm @ (SourceFormat::OsmXml | SourceFormat::OsmPbf) => {
                let encoding = if osm == SourceFormat::OsmPbf {
                    OsmEncoding::Pbf
                } else {
                    OsmEncoding::Xml
                };
                let entities = OsmHandler::default()
                    .apply_file(staged.path(), encoding)
                    .map_err(|source| ExtractError::Osm {
                        path: path.to_owned(),
                        source,
                    })?;
                Box::new(osm_records(entities, projector, format, info.source()))
            }
        };
        Ok((staged, records))
    }
}

/// A file whose records are being yielded.
struct FileRun {
    info: FileInfo,
    prior: Option<DateTime<Utc>>,
    records: RecordSource,
    // Keeps the staging directory alive until the file is finished.
    _staged: StagedFile,
}

/// Lazy record sequence returned by [`GeoStream::records`].
///
/// Dropping the iterator early removes any staged copy of the current file
/// and leaves its watermark untouched.
pub struct RecordIter<'a> {
    stream: &'a GeoStream,
    state: &'a mut dyn StateStore,
    next_storage: usize,
    queue: VecDeque<(usize, String)>,
    current: Option<FileRun>,
    finished: bool,
}

impl RecordIter<'_> {
    fn next_path(&mut self) -> Result<Option<(usize, String)>, ExtractError> {
        let stream = self.stream;
        while self.queue.is_empty() {
            let Some(storage) = stream.storages.get(self.next_storage) else {
                return Ok(None);
            };
            let index = self.next_storage;
            self.next_storage += 1;
            self.queue
                .extend(storage.glob()?.into_iter().map(|path| (index, path)));
        }
        Ok(self.queue.pop_front())
    }

    fn start(&mut self, index: usize, path: &str) -> Result<Option<FileRun>, ExtractError> {
        let stream = self.stream;
        let Some(storage) = stream.storages.get(index) else {
            return Ok(None);
        };
        let info = storage.describe(path)?;
        let file_name = info.source().file_name;
        let prior = self
            .state
            .bookmark(stream.name(), &file_name)?
            .map(|raw| {
                parse_watermark(&raw).map_err(|source| ExtractError::Watermark {
                    stream: stream.name().to_owned(),
                    file: file_name.clone(),
                    source,
                })
            })
            .transpose()?;

        if should_skip(prior, info.modified) {
            info!(
                "Skipping {} (modified {} <= bookmark {})",
                info.path,
                format_watermark(info.modified),
                prior.map(format_watermark).unwrap_or_default()
            );
            return Ok(None);
        }

        debug!("Extracting {}", info.path);
        let (staged, records) = stream.open_file(storage.as_ref(), &info)?;
        Ok(Some(FileRun {
            info,
            prior,
            records,
            _staged: staged,
        }))
    }

    fn complete(&mut self, run: FileRun) -> Result<(), ExtractError> {
        let watermark = format_watermark(advance(run.prior, run.info.modified));
        let file_name = run.info.source().file_name;
        self.state
            .commit(self.stream.name(), &file_name, &watermark)?;
        debug!("Committed watermark {watermark} for {}", run.info.path);
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Record>, ExtractError> {
        loop {
            if let Some(run) = self.current.as_mut() {
                if let Some(outcome) = run.records.next() {
                    return outcome.map(Some);
                }
                if let Some(done) = self.current.take() {
                    self.complete(done)?;
                }
                continue;
            }
            let Some((index, path)) = self.next_path()? else {
                return Ok(None);
            };
            self.current = self.start(index, &path)?;
        }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<Record, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                self.current = None;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for RecordIter<'_> {}

#[cfg(test)]
mod tests;
