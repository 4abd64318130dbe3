//! Error types emitted by the geotap CLI.
//!
//! Extraction failures are boxed so `CliError` stays small enough for
//! `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geotap_data::{ExtractError, StateError};
use thiserror::Error;

/// Errors emitted by the geotap CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening a JSON input failed.
    #[error("failed to open {path:?}: {source}")]
    OpenInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A JSON input could not be decoded.
    #[error("failed to parse JSON in {path:?}: {source}")]
    ParseInput {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Opening or reading the bookmark store failed.
    #[error(transparent)]
    State(#[from] StateError),
    /// Building or running a stream failed.
    #[error(transparent)]
    Extract(Box<ExtractError>),
    /// Serializing an output message failed.
    #[error("failed to serialize {kind} message: {source}")]
    SerializeMessage {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// Writing to the output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<ExtractError> for CliError {
    fn from(err: ExtractError) -> Self {
        Self::Extract(Box::new(err))
    }
}
