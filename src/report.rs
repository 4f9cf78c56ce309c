//! Reporters that turn [`MirrorEvent`]s into log output.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, trace, warn};

use crate::download::ErrorKind;
use crate::events::{EventReporter, MirrorEvent, SkipReason};

/// Default file name of the append-only error log.
pub const DEFAULT_ERROR_LOG: &str = "autoindex-mirror-errors.log";

/// Forwards events to `tracing`.
///
/// Navigation and parent links appear on every listing page, so their skips
/// are logged at `trace`; every other skip is logged at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl EventReporter for TracingReporter {
    fn report(&self, event: &MirrorEvent) {
        match event {
            MirrorEvent::Skip { reason, target } => {
                let kind = event.kind().unwrap_or(ErrorKind::ClassificationSkip);
                match reason {
                    SkipReason::ParentOrSelf | SkipReason::Navigation => {
                        trace!(%kind, %reason, item = %target, "skipped");
                    }
                    _ => info!(%kind, %reason, item = %target, "skipped"),
                }
            }
            MirrorEvent::DownloadStarted {
                file_name,
                total_bytes,
            } => debug!(file_name, ?total_bytes, "downloading"),
            MirrorEvent::DownloadProgress { file_name, bytes } => {
                trace!(file_name, bytes, "progress");
            }
            MirrorEvent::DownloadSucceeded {
                file_name,
                path,
                bytes,
            } => info!(file_name, path = %path.display(), bytes, "downloaded"),
            MirrorEvent::DownloadFailed {
                file_name,
                url,
                kind,
                message,
            } => warn!(file_name, url, %kind, message, "download failed"),
            MirrorEvent::DirectoryFailed { url, kind, message } => {
                warn!(url, %kind, message, "directory failed");
            }
            MirrorEvent::DirectoryFinished { path } => {
                info!(path = %path.display(), "directory finished");
            }
        }
    }
}

/// Appends one line per failure to an error log file.
///
/// Lines look like `[autoindex-mirror ERROR] Download: HTTP Error 404 - ...`.
/// The file is created on the first failure, so clean runs leave nothing
/// behind.
#[derive(Debug)]
pub struct ErrorLogReporter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ErrorLogReporter {
    /// Creates a reporter appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if guard.is_none() {
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "cannot open error log");
                    return;
                }
            }
        }
        if let Some(file) = guard.as_mut()
            && let Err(e) = writeln!(file, "{line}")
        {
            warn!(path = %self.path.display(), error = %e, "cannot write error log");
        }
    }
}

impl EventReporter for ErrorLogReporter {
    fn report(&self, event: &MirrorEvent) {
        let Some(kind) = event.kind().filter(|kind| kind.is_failure()) else {
            return;
        };
        let (category, message) = match event {
            MirrorEvent::DownloadFailed { message, .. } => ("Download", message),
            MirrorEvent::DirectoryFailed { message, .. } => ("Directory", message),
            _ => return,
        };
        self.append(&format!("[autoindex-mirror ERROR] {category}: {kind} - {message}"));
    }
}
