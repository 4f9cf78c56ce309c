//! Download engine for bounded-concurrency file batches.
//!
//! The engine runs one [`DownloadTask`] at a time through existence checks,
//! a HEAD probe and a streaming GET, and runs a directory's batch of tasks
//! under a semaphore sized to the configured worker cap.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use autoindex_mirror::{DownloadEngine, HttpClient, MirrorConfig, NoopReporter};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(MirrorConfig::default());
//! let client = HttpClient::new(&config)?;
//! let engine = DownloadEngine::new(client, config, Arc::new(NoopReporter), CancellationToken::new());
//! let url = Url::parse("https://example.org/courses/slides.pdf")?;
//! let outcome = engine.download_url(&url, Path::new("./downloads")).await;
//! println!("{:?}", outcome.result);
//! # Ok(())
//! # }
//! ```

mod error_mapping;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use self::error_mapping::failure_event;
use super::client::until_cancelled;
use super::constants::PARTIAL_SUFFIX;
use super::error::{DownloadError, ErrorKind};
use super::filename::{extension_of, file_name_from_url};
use super::HttpClient;
use crate::config::MirrorConfig;
use crate::events::{EventReporter, MirrorEvent, SkipReason};

/// One file to fetch into one destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Absolute file URL.
    pub url: Url,
    /// Local folder the file lands in.
    pub destination: PathBuf,
    /// Decoded, sanitized file name (empty when the URL has none).
    pub file_name: String,
}

impl DownloadTask {
    /// Builds a task, deriving the file name from the URL's last path segment.
    #[must_use]
    pub fn new(url: Url, destination: impl Into<PathBuf>) -> Self {
        let file_name = file_name_from_url(&url).unwrap_or_default();
        Self {
            url,
            destination: destination.into(),
            file_name,
        }
    }

    /// Final path of the downloaded file.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        self.destination.join(&self.file_name)
    }

    /// Temporary path the body is streamed into.
    #[must_use]
    pub fn partial_path(&self) -> PathBuf {
        self.destination
            .join(format!("{}{PARTIAL_SUFFIX}", self.file_name))
    }
}

/// Terminal result of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    /// The file was written; carries the byte count.
    Success {
        /// Bytes written to disk.
        bytes: u64,
    },
    /// A file already exists at the target path.
    SkippedExisting,
    /// The extension is not on the allow-list.
    SkippedDisallowedExtension {
        /// Lower-cased extension, empty when absent.
        extension: String,
    },
    /// The URL has no usable file name.
    SkippedNoFileName,
    /// The download failed or was cancelled.
    Failed {
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
}

/// A task paired with its terminal result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The task that was run.
    pub task: DownloadTask,
    /// How it ended.
    pub result: DownloadResult,
}

impl DownloadOutcome {
    fn failed(task: DownloadTask, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            task,
            result: DownloadResult::Failed {
                kind,
                message: message.into(),
            },
        }
    }

    /// Returns true when the file was written during this attempt.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.result, DownloadResult::Success { .. })
    }

    /// Returns true for failures other than cancellation.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(&self.result, DownloadResult::Failed { kind, .. } if kind.is_failure())
    }
}

/// Download engine shared by every directory batch of a run.
///
/// Cloning is cheap: the client, configuration and reporter are shared.
#[derive(Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    config: Arc<MirrorConfig>,
    reporter: Arc<dyn EventReporter>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("concurrency", &self.config.concurrency())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        client: HttpClient,
        config: Arc<MirrorConfig>,
        reporter: Arc<dyn EventReporter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            reporter,
            cancel,
        }
    }

    /// Downloads `url` into `destination`, deriving the file name from the URL.
    pub async fn download_url(&self, url: &Url, destination: &Path) -> DownloadOutcome {
        self.download(DownloadTask::new(url.clone(), destination))
            .await
    }

    /// Downloads every task with at most `concurrency` transfers in flight and
    /// waits for all of them. Outcomes are returned in task order.
    ///
    /// A failing task never affects its siblings.
    #[instrument(skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn download_batch(&self, tasks: Vec<DownloadTask>) -> Vec<DownloadOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency().max(1)));
        let mut workers = JoinSet::new();

        for (index, task) in tasks.iter().cloned().enumerate() {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        index,
                        DownloadOutcome::failed(task, ErrorKind::Unexpected, "worker pool closed"),
                    );
                };
                (index, engine.download(task).await)
            });
        }

        let mut slots: Vec<Option<DownloadOutcome>> = vec![None; tasks.len()];
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "download worker terminated abnormally"),
            }
        }

        slots
            .into_iter()
            .zip(tasks)
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| {
                    let outcome =
                        DownloadOutcome::failed(task, ErrorKind::Unexpected, "download worker panicked");
                    if let DownloadResult::Failed { kind, message } = &outcome.result {
                        self.reporter
                            .report(&failure_event(&outcome.task, *kind, message.clone()));
                    }
                    outcome
                })
            })
            .collect()
    }

    /// Runs one task to a terminal outcome and reports it.
    #[instrument(skip(self, task), fields(url = %task.url))]
    pub async fn download(&self, task: DownloadTask) -> DownloadOutcome {
        if task.file_name.is_empty() {
            self.skip(SkipReason::NoFileName, task.url.as_str());
            return DownloadOutcome {
                task,
                result: DownloadResult::SkippedNoFileName,
            };
        }

        let extension = extension_of(&task.file_name);
        if !self.config.is_allowed_extension(&extension) {
            self.skip(
                SkipReason::DisallowedExtension {
                    extension: extension.clone(),
                },
                &task.file_name,
            );
            return DownloadOutcome {
                task,
                result: DownloadResult::SkippedDisallowedExtension { extension },
            };
        }

        let target = task.target_path();
        match tokio::fs::try_exists(&target).await {
            Ok(true) => {
                debug!(path = %target.display(), "file already exists");
                self.skip(SkipReason::AlreadyExists, &task.file_name);
                return DownloadOutcome {
                    task,
                    result: DownloadResult::SkippedExisting,
                };
            }
            Ok(false) => {}
            Err(e) => {
                let error = DownloadError::io(target, e);
                return self.fail(task, &error);
            }
        }

        match self.transfer(&task, &target).await {
            Ok(bytes) => {
                info!(path = %target.display(), bytes, "download complete");
                self.reporter.report(&MirrorEvent::DownloadSucceeded {
                    file_name: task.file_name.clone(),
                    path: target,
                    bytes,
                });
                DownloadOutcome {
                    task,
                    result: DownloadResult::Success { bytes },
                }
            }
            Err(error) => self.fail(task, &error),
        }
    }

    async fn transfer(&self, task: &DownloadTask, target: &Path) -> Result<u64, DownloadError> {
        let url = task.url.as_str();
        let total_bytes = until_cancelled(&self.cancel, url, self.client.probe_length(url)).await?;
        let response = until_cancelled(&self.cancel, url, self.client.get_stream(url)).await?;

        self.reporter.report(&MirrorEvent::DownloadStarted {
            file_name: task.file_name.clone(),
            total_bytes,
        });

        let partial = task.partial_path();
        let streamed = self.stream_to_file(task, response, &partial).await;
        let result = match streamed {
            Ok(bytes) => tokio::fs::rename(&partial, target)
                .await
                .map(|()| bytes)
                .map_err(|e| DownloadError::io(target, e)),
            Err(e) => Err(e),
        };

        if result.is_err() {
            debug!(path = %partial.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }

    /// Streams the response body into `partial`, reporting progress once per
    /// filled write buffer.
    async fn stream_to_file(
        &self,
        task: &DownloadTask,
        response: reqwest::Response,
        partial: &Path,
    ) -> Result<u64, DownloadError> {
        let url = task.url.as_str();
        let chunk_size = self.config.chunk_size();
        let file = File::create(partial)
            .await
            .map_err(|e| DownloadError::io(partial, e))?;
        let mut writer = BufWriter::with_capacity(chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;
        let mut unreported: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(DownloadError::cancelled(url)),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(partial, e))?;
            bytes_written += chunk.len() as u64;
            unreported += chunk.len() as u64;
            if unreported >= chunk_size as u64 {
                self.progress(task, unreported);
                unreported = 0;
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(partial, e))?;
        if unreported > 0 {
            self.progress(task, unreported);
        }
        Ok(bytes_written)
    }

    fn progress(&self, task: &DownloadTask, bytes: u64) {
        self.reporter.report(&MirrorEvent::DownloadProgress {
            file_name: task.file_name.clone(),
            bytes,
        });
    }

    fn skip(&self, reason: SkipReason, target: &str) {
        debug!(%reason, item = target, "skipping download");
        self.reporter.report(&MirrorEvent::Skip {
            reason,
            target: target.to_string(),
        });
    }

    fn fail(&self, task: DownloadTask, error: &DownloadError) -> DownloadOutcome {
        let kind = error.kind();
        let message = error.to_string();
        if kind.is_failure() {
            warn!(url = %task.url, error = %message, "download failed");
            self.reporter
                .report(&failure_event(&task, kind, message.clone()));
        } else {
            debug!(url = %task.url, "download cancelled");
        }
        DownloadOutcome::failed(task, kind, message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<MirrorEvent>>);

    impl EventReporter for Recorder {
        fn report(&self, event: &MirrorEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn engine_with(config: MirrorConfig, reporter: Arc<Recorder>) -> DownloadEngine {
        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        DownloadEngine::new(client, Arc::new(config), reporter, CancellationToken::new())
    }

    #[test]
    fn test_task_derives_decoded_file_name() {
        let url = Url::parse("https://example.org/courses/My%20Notes.pdf").unwrap();
        let task = DownloadTask::new(url, "downloads/courses");
        assert_eq!(task.file_name, "My Notes.pdf");
        assert_eq!(
            task.target_path(),
            PathBuf::from("downloads/courses/My Notes.pdf")
        );
        assert_eq!(
            task.partial_path(),
            PathBuf::from("downloads/courses/My Notes.pdf.part")
        );
    }

    #[tokio::test]
    async fn test_download_refuses_disallowed_extension_without_request() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let engine = engine_with(MirrorConfig::default(), Arc::clone(&recorder));

        // Unroutable host: any request attempt would fail instead of skipping.
        let url = Url::parse("http://127.0.0.1:9/index.html").unwrap();
        let outcome = engine.download_url(&url, temp_dir.path()).await;

        assert_eq!(
            outcome.result,
            DownloadResult::SkippedDisallowedExtension {
                extension: "html".to_string()
            }
        );
        let events = recorder.0.lock().unwrap();
        assert!(matches!(
            events.as_slice(),
            [MirrorEvent::Skip {
                reason: SkipReason::DisallowedExtension { .. },
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_download_skips_url_without_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_with(MirrorConfig::default(), Arc::new(Recorder::default()));
        let url = Url::parse("http://127.0.0.1:9/courses/").unwrap();
        let outcome = engine.download_url(&url, temp_dir.path()).await;
        assert_eq!(outcome.result, DownloadResult::SkippedNoFileName);
    }

    #[tokio::test]
    async fn test_download_skips_existing_file_without_overwriting() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("slides.pdf"), b"local copy").unwrap();
        let engine = engine_with(MirrorConfig::default(), Arc::new(Recorder::default()));

        let url = Url::parse("http://127.0.0.1:9/slides.pdf").unwrap();
        let outcome = engine.download_url(&url, temp_dir.path()).await;

        assert_eq!(outcome.result, DownloadResult::SkippedExisting);
        assert_eq!(
            std::fs::read(temp_dir.path().join("slides.pdf")).unwrap(),
            b"local copy"
        );
    }

    #[tokio::test]
    async fn test_download_streams_body_and_reports_progress() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let body = vec![7u8; 300 * 1024];
        Mock::given(method("HEAD"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&mock_server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let engine = engine_with(MirrorConfig::default(), Arc::clone(&recorder));
        let url = Url::parse(&format!("{}/video.mp4", mock_server.uri())).unwrap();
        let outcome = engine.download_url(&url, temp_dir.path()).await;

        assert_eq!(
            outcome.result,
            DownloadResult::Success {
                bytes: body.len() as u64
            }
        );
        assert_eq!(std::fs::read(temp_dir.path().join("video.mp4")).unwrap(), body);
        assert!(!temp_dir.path().join("video.mp4.part").exists());

        let events = recorder.0.lock().unwrap();
        let progressed: u64 = events
            .iter()
            .filter_map(|event| match event {
                MirrorEvent::DownloadProgress { bytes, .. } => Some(*bytes),
                _ => None,
            })
            .sum();
        assert_eq!(progressed, body.len() as u64);
        assert!(matches!(events.first(), Some(MirrorEvent::DownloadStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(MirrorEvent::DownloadSucceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_download_head_failure_skips_get() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        Mock::given(method("HEAD"))
            .and(path("/gone.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"never".to_vec()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let engine = engine_with(MirrorConfig::default(), Arc::new(Recorder::default()));
        let url = Url::parse(&format!("{}/gone.pdf", mock_server.uri())).unwrap();
        let outcome = engine.download_url(&url, temp_dir.path()).await;

        assert!(matches!(
            outcome.result,
            DownloadResult::Failed {
                kind: ErrorKind::Http { status: 404 },
                ..
            }
        ));
        assert!(!temp_dir.path().join("gone.pdf").exists());
    }

    #[tokio::test]
    async fn test_download_cancelled_token_reports_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let engine = DownloadEngine::new(
            client,
            Arc::new(MirrorConfig::default()),
            Arc::clone(&recorder) as Arc<dyn EventReporter>,
            cancel,
        );

        let url = Url::parse("http://127.0.0.1:9/slides.pdf").unwrap();
        let outcome = engine.download_url(&url, temp_dir.path()).await;

        assert!(matches!(
            outcome.result,
            DownloadResult::Failed {
                kind: ErrorKind::Cancelled,
                ..
            }
        ));
        assert!(!outcome.is_failure());
        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
