use std::path::PathBuf;

use clap::Parser;

/// Compare the JSON responses of two API backends, driven by a test suite file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the test suite (YAML or TOML)
    pub path: String,

    /// Print the resolved URLs and headers for every request
    #[arg(short, long)]
    pub debug: bool,

    /// Print both normalized response bodies for every case
    #[arg(short, long)]
    pub print: bool,

    /// Write the structured report as JSON to this file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, env = "APIDIFF_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}
