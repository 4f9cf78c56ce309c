use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use autoindex_mirror::{ErrorLogReporter, FanoutReporter, TracingReporter, Traverser};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config_manager, exit_handler, input_processor, progress_manager, terminal};
use crate::cli::Args;

pub(crate) async fn run_mirror() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    terminal::init_tracing(
        terminal::resolve_default_log_level(&args),
        terminal::no_color_env_requested(),
    );
    debug!(?args, "CLI arguments parsed");

    let resolved = config_manager::resolve_config(&args)?;
    let Some(target) = input_processor::resolve_target(args.url.as_deref(), resolved.output_dir)?
    else {
        info!("No listing URL provided.");
        info!("Example: autoindex-mirror https://example.org/pub/ -o mirror");
        return Ok(ProcessExit::Success);
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let use_progress = terminal::should_use_progress(
        io::stderr().is_terminal(),
        args.quiet,
        args.no_progress,
        terminal::is_dumb_terminal(),
    );
    let progress = use_progress.then(|| Arc::new(progress_manager::ProgressReporter::new()));

    let error_log = Arc::new(ErrorLogReporter::new(resolved.error_log));
    let mut reporter = FanoutReporter::new()
        .with(Arc::new(TracingReporter))
        .with(error_log.clone());
    if let Some(progress) = &progress {
        reporter = reporter.with(progress.clone());
    }

    let traverser = Traverser::new(resolved.config, Arc::new(reporter), cancel)
        .context("Failed to initialize mirror")?;
    info!(
        url = %target.root_url,
        output = %target.output_dir.display(),
        "Mirror starting"
    );
    let result = traverser
        .traverse(&target.root_url, &target.output_dir)
        .await;

    if let Some(progress) = &progress {
        progress.finish();
    }
    let summary = result?;

    info!(
        downloaded = summary.files_downloaded,
        existing = summary.files_existing,
        skipped = summary.files_skipped,
        failed = summary.files_failed,
        directories = summary.directories_completed,
        directories_failed = summary.directories_failed,
        bytes = summary.bytes_written,
        "Mirror finished"
    );
    if summary.has_failures() {
        warn!(
            error_log = %error_log.path().display(),
            "Some items failed; see the error log for details"
        );
    }

    Ok(exit_handler::determine_exit_outcome(&summary))
}
