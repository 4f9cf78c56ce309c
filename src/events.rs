//! Structured events emitted by the mirror core.
//!
//! The core never formats console output. Every skip, download transition,
//! failure and finished directory is handed to an [`EventReporter`] as a
//! [`MirrorEvent`]; presentation and log-file writing live in reporters.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::download::ErrorKind;

/// Why an anchor, file or directory was deliberately not processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Parent, self or root marker, or a link back up the tree.
    ParentOrSelf,
    /// Query-only, fragment-only or empty reference (column sort links).
    Navigation,
    /// Non-HTTP scheme such as `mailto:`.
    UnsupportedScheme {
        /// The scheme that was found.
        scheme: String,
    },
    /// The reference contains a restricted token.
    Restricted {
        /// The matching token.
        token: String,
    },
    /// A directory link that is not beneath the listing being processed.
    OutsideTree,
    /// A file link pointing at another origin.
    ExternalOrigin,
    /// The reference could not be resolved into a URL.
    InvalidUrl,
    /// The file extension is not on the allow-list.
    DisallowedExtension {
        /// Lower-cased extension, empty when the name has none.
        extension: String,
    },
    /// The URL has no usable file name.
    NoFileName,
    /// The destination file already exists.
    AlreadyExists,
    /// Another link of the same listing already saves to this local name.
    DuplicateFileName {
        /// The decoded, sanitized file name.
        name: String,
    },
    /// The directory name decodes to empty, `.`, `..` or a restricted token.
    InvalidDirectoryName {
        /// The decoded name.
        name: String,
    },
    /// The directory lies deeper than the configured cap.
    DepthLimit {
        /// Configured maximum depth.
        max_depth: usize,
    },
    /// The directory URL was already processed in this run.
    AlreadyVisited,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentOrSelf => f.write_str("parent/root directory"),
            Self::Navigation => f.write_str("navigation link"),
            Self::UnsupportedScheme { scheme } => write!(f, "unsupported scheme {scheme}"),
            Self::Restricted { token } => write!(f, "restricted path token {token}"),
            Self::OutsideTree => f.write_str("outside mirrored tree"),
            Self::ExternalOrigin => f.write_str("external origin"),
            Self::InvalidUrl => f.write_str("invalid URL"),
            Self::DisallowedExtension { extension } if extension.is_empty() => {
                f.write_str("no extension")
            }
            Self::DisallowedExtension { extension } => {
                write!(f, "extension .{extension} not in allowed list")
            }
            Self::NoFileName => f.write_str("no valid file name"),
            Self::AlreadyExists => f.write_str("file already exists"),
            Self::DuplicateFileName { name } => {
                write!(f, "another link already saves to {name}")
            }
            Self::InvalidDirectoryName { name } if name.is_empty() => {
                f.write_str("directory name is empty")
            }
            Self::InvalidDirectoryName { name } => write!(f, "invalid directory name {name}"),
            Self::DepthLimit { max_depth } => write!(f, "deeper than max depth {max_depth}"),
            Self::AlreadyVisited => f.write_str("already visited"),
        }
    }
}

/// One structured event from the traversal or a download worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// Something was deliberately not processed.
    Skip {
        /// Why it was skipped.
        reason: SkipReason,
        /// URL, href or file name that was skipped.
        target: String,
    },
    /// A file transfer is about to begin.
    DownloadStarted {
        /// Decoded file name.
        file_name: String,
        /// Size announced by the HEAD probe, when known.
        total_bytes: Option<u64>,
    },
    /// Bytes were written for an in-flight file.
    DownloadProgress {
        /// Decoded file name.
        file_name: String,
        /// Bytes written since the previous progress event.
        bytes: u64,
    },
    /// A file landed at its final path.
    DownloadSucceeded {
        /// Decoded file name.
        file_name: String,
        /// Final path on disk.
        path: PathBuf,
        /// Total bytes written.
        bytes: u64,
    },
    /// A file download failed.
    DownloadFailed {
        /// Decoded file name.
        file_name: String,
        /// Source URL.
        url: String,
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// A directory could not be created or listed; its subtree is abandoned.
    DirectoryFailed {
        /// Listing URL.
        url: String,
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// Every file and subdirectory of a directory reached a terminal state.
    DirectoryFinished {
        /// Local folder of the directory.
        path: PathBuf,
    },
}

impl MirrorEvent {
    /// Error category for skips and failures, `None` for progress events.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Skip { .. } => Some(ErrorKind::ClassificationSkip),
            Self::DownloadFailed { kind, .. } | Self::DirectoryFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Receives events from the core. Implementations must be cheap and
/// non-blocking; they are called from download workers.
pub trait EventReporter: Send + Sync {
    /// Handles one event.
    fn report(&self, event: &MirrorEvent);
}

impl<R: EventReporter + ?Sized> EventReporter for Arc<R> {
    fn report(&self, event: &MirrorEvent) {
        (**self).report(event);
    }
}

/// Reporter that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl EventReporter for NoopReporter {
    fn report(&self, _event: &MirrorEvent) {}
}

/// Forwards each event to every wrapped reporter in order.
#[derive(Default)]
pub struct FanoutReporter {
    reporters: Vec<Arc<dyn EventReporter>>,
}

impl FanoutReporter {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reporter.
    #[must_use]
    pub fn with(mut self, reporter: Arc<dyn EventReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl EventReporter for FanoutReporter {
    fn report(&self, event: &MirrorEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl fmt::Debug for FanoutReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutReporter")
            .field("reporters", &self.reporters.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<MirrorEvent>>);

    impl EventReporter for Recorder {
        fn report(&self, event: &MirrorEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_fanout_forwards_to_every_reporter() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let fanout = FanoutReporter::new()
            .with(first.clone())
            .with(second.clone());

        let event = MirrorEvent::DirectoryFinished {
            path: PathBuf::from("downloads/linux"),
        };
        fanout.report(&event);

        assert_eq!(first.0.lock().unwrap().as_slice(), [event.clone()]);
        assert_eq!(second.0.lock().unwrap().as_slice(), [event]);
    }

    #[test]
    fn test_event_kind_classifies_skips_and_failures() {
        let skip = MirrorEvent::Skip {
            reason: SkipReason::ParentOrSelf,
            target: "../".to_string(),
        };
        assert_eq!(skip.kind(), Some(ErrorKind::ClassificationSkip));

        let failed = MirrorEvent::DownloadFailed {
            file_name: "a.pdf".to_string(),
            url: "https://example.org/a.pdf".to_string(),
            kind: ErrorKind::Http { status: 404 },
            message: "HTTP 404".to_string(),
        };
        assert_eq!(failed.kind(), Some(ErrorKind::Http { status: 404 }));

        let progress = MirrorEvent::DownloadProgress {
            file_name: "a.pdf".to_string(),
            bytes: 10,
        };
        assert_eq!(progress.kind(), None);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::DisallowedExtension {
                extension: "html".to_string()
            }
            .to_string(),
            "extension .html not in allowed list"
        );
        assert_eq!(
            SkipReason::DisallowedExtension {
                extension: String::new()
            }
            .to_string(),
            "no extension"
        );
        assert_eq!(
            SkipReason::Restricted {
                token: "Cursos".to_string()
            }
            .to_string(),
            "restricted path token Cursos"
        );
    }
}
