//! Command-line interface for the geotap extractor.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod extract;
mod messages;

pub use error::CliError;

use extract::{ExtractArgs, run_extract};

const ARG_CONFIG: &str = "config";
const ARG_STATE_DB: &str = "state-db";
const ARG_STATE: &str = "state";
const ENV_CONFIG: &str = "GEOTAP_CMDS_EXTRACT_TAP_CONFIG";

/// Run the geotap CLI with the current process arguments and environment.
///
/// Messages are written to standard output.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Extract(args) => {
            let config = args.into_config()?;
            run_extract(&config, std::io::stdout().lock())?;
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "geotap",
    about = "Incremental extraction of geospatial files as JSON-lines messages",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract records from new and changed files.
    Extract(ExtractArgs),
}

#[cfg(test)]
mod tests;
