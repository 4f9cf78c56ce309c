//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Mirror an Apache/Nginx autoindex directory tree to local disk.
///
/// Walks the listing pages under URL depth-first and downloads every file
/// whose extension is on the allow-list. Files that already exist locally
/// are skipped, so an interrupted run can simply be started again.
#[derive(Parser, Debug)]
#[command(name = "autoindex-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Root listing URL (prompted for when omitted and stdin is a terminal)
    pub url: Option<String>,

    /// Local folder to mirror into [default: downloads]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum concurrent downloads per directory (1-64) [default: 4]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub concurrency: Option<u8>,

    /// Per-request timeout in seconds (1-3600) [default: 10]
    #[arg(short = 't', long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Write buffer and progress granularity in bytes (4096-16777216) [default: 131072]
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(4096..=16_777_216))]
    pub chunk_size: Option<u64>,

    /// Deepest subdirectory level to descend into (1-1024) [default: 32]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1024))]
    pub max_depth: Option<u16>,

    /// Allowed file extensions, comma separated (replaces the built-in list)
    #[arg(short = 'e', long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Skip links containing TOKEN (repeatable; replaces the built-in list)
    #[arg(long = "restrict", value_name = "TOKEN", conflicts_with = "no_restrict")]
    pub restrict: Vec<String>,

    /// Do not skip any restricted tokens
    #[arg(long)]
    pub no_restrict: bool,

    /// Append failures to this file [default: autoindex-mirror-errors.log]
    #[arg(long, value_name = "FILE")]
    pub error_log: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
