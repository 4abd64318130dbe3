//! Extract command implementation for the geotap CLI.

use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geotap_core::TapConfig;
use geotap_data::{MemoryState, SqliteState, StateStore, Tap};
use geotap_fs::open_utf8_file;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::messages::MessageWriter;
use crate::{ARG_CONFIG, ARG_STATE, ARG_STATE_DB, CliError, ENV_CONFIG};

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Run every stream described by a tap configuration and write \
                 SCHEMA, RECORD and STATE messages as JSON lines. Files whose \
                 modification time has not advanced past their bookmark are \
                 skipped.",
    about = "Extract new and changed files as JSON-lines messages"
)]
#[ortho_config(prefix = "GEOTAP")]
pub(crate) struct ExtractArgs {
    /// Path to the JSON tap configuration.
    #[arg(long = ARG_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) tap_config: Option<Utf8PathBuf>,
    /// SQLite database holding bookmarks between runs.
    #[arg(long = ARG_STATE_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) state_db: Option<Utf8PathBuf>,
    /// Partitioned state snapshot used to seed in-memory bookmarks.
    #[arg(long = ARG_STATE, value_name = "path")]
    #[serde(default)]
    pub(crate) state: Option<Utf8PathBuf>,
}

impl ExtractArgs {
    pub(crate) fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractConfig {
    /// Path to the tap configuration.
    pub(crate) tap_config: Utf8PathBuf,
    /// Optional persistent bookmark database.
    pub(crate) state_db: Option<Utf8PathBuf>,
    /// Optional initial state snapshot.
    pub(crate) state: Option<Utf8PathBuf>,
}

impl ExtractConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.tap_config, ARG_CONFIG)?;
        if let Some(state) = &self.state {
            require_existing(state, ARG_STATE)?;
        }
        Ok(())
    }

    fn open_state(&self) -> Result<Box<dyn StateStore>, CliError> {
        if let Some(db) = &self.state_db {
            if self.state.is_some() {
                warn!("Ignoring --{ARG_STATE} because --{ARG_STATE_DB} was supplied");
            }
            return Ok(Box::new(SqliteState::open(db)?));
        }
        match &self.state {
            Some(path) => {
                let snapshot: Value = read_json(path)?;
                Ok(Box::new(MemoryState::from_snapshot(&snapshot)))
            }
            None => Ok(Box::new(MemoryState::default())),
        }
    }
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        let tap_config = args.tap_config.ok_or(CliError::MissingArgument {
            field: ARG_CONFIG,
            env: ENV_CONFIG,
        })?;
        Ok(Self {
            tap_config,
            state_db: args.state_db,
            state: args.state,
        })
    }
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match geotap_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseInput {
        path: path.to_path_buf(),
        source,
    })
}

/// Run every configured stream, writing messages to `out`.
///
/// Every stream's schema is declared before any output is written. A failing
/// stream still emits a `STATE` message covering the files it completed, and
/// the output is flushed before the error is returned.
pub(crate) fn run_extract<W: Write>(config: &ExtractConfig, out: W) -> Result<W, CliError> {
    config.validate_sources()?;
    let tap = Tap::new(read_json::<TapConfig>(&config.tap_config)?)?;
    let mut state = config.open_state()?;
    let mut writer = MessageWriter::new(out);

    for stream in tap.streams() {
        writer.schema(
            stream.name(),
            stream.schema().as_json(),
            &stream.key_properties(),
        )?;
        let mut emitted = 0_usize;
        let mut failure = None;
        for record in stream.records(state.as_mut()) {
            match record {
                Ok(record) => {
                    writer.record(stream.name(), &record)?;
                    emitted += 1;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        info!("Stream {} emitted {emitted} record(s)", stream.name());
        writer.state(&state.snapshot()?)?;
        if let Some(err) = failure {
            writer.finish()?;
            return Err(err.into());
        }
    }
    writer.finish()
}
