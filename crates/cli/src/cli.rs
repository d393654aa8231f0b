//! Command-line argument structures.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Media task engine: trims, compresses, transcodes and merges media with ffmpeg"
)]
pub struct Cli {
    /// Configuration file (defaults to ./config.toml when present).
    #[arg(short, long, global = true, env = "MEDIATASK_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queues requests and runs them to completion
    Run(RunArgs),
    /// Prints the encoder command for a request without running it
    Command(CommandArgs),
    /// Lists detected encoders and the encoder chosen per codec
    Encoders,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Request files (JSON), run in the given order
    #[arg(required = true, value_name = "REQUEST_JSON")]
    pub requests: Vec<PathBuf>,

    /// Print every task update as a JSON record
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CommandArgs {
    /// Request file (JSON)
    #[arg(value_name = "REQUEST_JSON")]
    pub request: PathBuf,

    /// Output path (defaults to a generated name in the output directory)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}
