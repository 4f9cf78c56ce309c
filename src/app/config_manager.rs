//! Configuration lifecycle: defaults, optional TOML file, then CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use autoindex_mirror::report::DEFAULT_ERROR_LOG;
use autoindex_mirror::{FileConfig, MirrorConfig};

use crate::cli::Args;

/// Settings resolved before the root URL is known.
#[derive(Debug)]
pub(crate) struct ResolvedConfig {
    pub(crate) config: MirrorConfig,
    /// Output folder from the CLI or config file; `None` means prompt or default.
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) error_log: PathBuf,
}

/// Loads the config file named by `--config` (if any), overlays CLI flags and
/// validates the result.
pub(crate) fn resolve_config(args: &Args) -> Result<ResolvedConfig> {
    let file = args
        .config
        .as_deref()
        .map(|path| {
            FileConfig::load(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))
        })
        .transpose()?
        .unwrap_or_default();

    let config = apply_cli_overrides(MirrorConfig::default().merge_file(&file), args);
    config.validate().context("Invalid configuration")?;

    Ok(ResolvedConfig {
        config,
        output_dir: args.output.clone().or(file.output_dir),
        error_log: args
            .error_log
            .clone()
            .or(file.error_log)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ERROR_LOG)),
    })
}

fn apply_cli_overrides(mut config: MirrorConfig, args: &Args) -> MirrorConfig {
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(usize::from(concurrency));
    }
    if let Some(secs) = args.timeout {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(chunk_size) = args.chunk_size {
        config = config.with_chunk_size(usize::try_from(chunk_size).unwrap_or(usize::MAX));
    }
    if let Some(max_depth) = args.max_depth {
        config = config.with_max_depth(usize::from(max_depth));
    }
    if !args.extensions.is_empty() {
        config = config.with_allowed_extensions(&args.extensions);
    }
    if args.no_restrict {
        config = config.with_restricted_tokens(Vec::<String>::new());
    } else if !args.restrict.is_empty() {
        config = config.with_restricted_tokens(&args.restrict);
    }
    config
}
