use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "eda-agent", about = "Autonomous EDA Agent", version)]
pub struct Cli {
    /// Path to the dataset (CSV/Parquet).
    #[arg(long)]
    pub path: PathBuf,

    /// Run in interactive mode.
    #[arg(long)]
    pub interactive: bool,

    /// Large language model to use (overrides DEFAULT_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Print answers as plain text instead of rendered markdown.
    #[arg(long = "no-md")]
    pub no_md: bool,

    /// Debug logging (RUST_LOG still takes precedence).
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
