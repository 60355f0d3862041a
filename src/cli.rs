use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "gitbar")]
#[command(about = "Status-bar monitor for the working-tree and sync state of a set of Git repositories")]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Repository to monitor (repeatable, replaces the configured list)
    #[arg(long = "repo", value_name = "PATH")]
    pub repos: Vec<String>,

    /// Emit a single status object and exit
    #[arg(long)]
    pub once: bool,

    /// Print picker entries for every repository and exit
    #[arg(long, conflicts_with = "once")]
    pub list: bool,
}
