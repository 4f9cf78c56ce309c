//! Depth-first traversal of a remote listing tree.
//!
//! The traverser walks the tree with an explicit stack instead of recursion.
//! Each directory is listed, its anchors classified, and all of its files
//! downloaded under the configured worker cap before any of its
//! subdirectories is visited. Subdirectories are visited one at a time in
//! listing order. A `Finish` frame pushed beneath a directory's children
//! emits [`MirrorEvent::DirectoryFinished`] once the whole subtree is done.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ConfigError, MirrorConfig};
use crate::download::filename::{directory_name_from_url, sanitize_filename};
use crate::download::{
    DownloadEngine, DownloadError, DownloadOutcome, DownloadResult, DownloadTask, ErrorKind,
    HttpClient,
};
use crate::events::{EventReporter, MirrorEvent, SkipReason};
use crate::listing::{AnchorKind, ListingFetcher, classify};

/// A directory scheduled for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    /// Listing URL, always ending in `/`.
    pub url: Url,
    /// Local folder mirroring `url`.
    pub local_path: PathBuf,
    /// Distance from the root listing (the root is 0).
    pub depth: usize,
}

/// Lifecycle of one directory node, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Scheduled, not yet started.
    Pending,
    /// Fetching the listing page.
    Listing,
    /// Classifying anchors.
    Classifying,
    /// Waiting for the file batch.
    Downloading,
    /// Visiting subdirectories.
    Recursing,
    /// Subtree finished.
    Done,
    /// Folder creation or listing failed; subtree abandoned.
    Failed,
    /// Never processed (invalid name, depth cap, duplicate).
    Skipped,
}

/// Aggregate counters for one traversal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TraversalSummary {
    /// Directories whose subtree finished.
    pub directories_completed: usize,
    /// Directories whose folder or listing failed.
    pub directories_failed: usize,
    /// Subdirectories rejected before processing.
    pub directories_skipped: usize,
    /// Files written during this run.
    pub files_downloaded: usize,
    /// Files already present locally.
    pub files_existing: usize,
    /// Files refused by extension or name.
    pub files_skipped: usize,
    /// Files whose download failed.
    pub files_failed: usize,
    /// Files interrupted by cancellation.
    pub files_cancelled: usize,
    /// Bytes written during this run.
    pub bytes_written: u64,
    /// True when the run stopped because the token was cancelled.
    pub cancelled: bool,
}

impl TraversalSummary {
    /// Folds one download outcome into the counters.
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match &outcome.result {
            DownloadResult::Success { bytes } => {
                self.files_downloaded += 1;
                self.bytes_written += bytes;
            }
            DownloadResult::SkippedExisting => self.files_existing += 1,
            DownloadResult::SkippedDisallowedExtension { .. } | DownloadResult::SkippedNoFileName => {
                self.files_skipped += 1;
            }
            DownloadResult::Failed {
                kind: ErrorKind::Cancelled,
                ..
            } => self.files_cancelled += 1,
            DownloadResult::Failed { .. } => self.files_failed += 1,
        }
    }

    /// Returns true when any file or directory failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0 || self.directories_failed > 0
    }

    /// Files present locally after the run (written now or earlier).
    #[must_use]
    pub fn files_present(&self) -> usize {
        self.files_downloaded + self.files_existing
    }
}

/// Errors that prevent a traversal from starting.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// The root URL is not an absolute HTTP(S) URL.
    #[error("invalid root URL {url}: expected an absolute http or https URL")]
    InvalidRootUrl {
        /// The rejected input.
        url: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to initialize HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

enum Frame {
    Visit(DirectoryNode),
    Finish(PathBuf),
}

enum VisitResult {
    Children(Vec<DirectoryNode>),
    Failed,
    Cancelled,
}

/// Mirrors a remote listing tree onto a local folder.
pub struct Traverser {
    config: Arc<MirrorConfig>,
    fetcher: ListingFetcher,
    engine: DownloadEngine,
    reporter: Arc<dyn EventReporter>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Traverser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traverser")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Traverser {
    /// Validates `config` and builds the shared HTTP client, fetcher and engine.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Config`] for out-of-range settings and
    /// [`TraversalError::HttpClient`] if the client cannot be built.
    pub fn new(
        config: MirrorConfig,
        reporter: Arc<dyn EventReporter>,
        cancel: CancellationToken,
    ) -> Result<Self, TraversalError> {
        config.validate()?;
        let config = Arc::new(config);
        let client = HttpClient::new(&config)?;
        let fetcher = ListingFetcher::new(client.clone(), cancel.clone());
        let engine = DownloadEngine::new(
            client,
            Arc::clone(&config),
            Arc::clone(&reporter),
            cancel.clone(),
        );
        Ok(Self {
            config,
            fetcher,
            engine,
            reporter,
            cancel,
        })
    }

    /// Mirrors the tree under `root_url` into `root_folder`.
    ///
    /// The root listing maps onto `root_folder/<decoded last segment>`, like
    /// every directory below it. A root whose name is blank (a host root),
    /// `.`, `..` or restricted is skipped without creating a folder. Failures of single
    /// files or directories are reported and counted; they never stop the run.
    /// Cancellation stops the run promptly and returns the partial summary with
    /// `cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::InvalidRootUrl`] if `root_url` is not an
    /// absolute HTTP(S) URL.
    #[instrument(skip(self, root_folder), fields(root = %root_folder.display()))]
    pub async fn traverse(
        &self,
        root_url: &str,
        root_folder: &Path,
    ) -> Result<TraversalSummary, TraversalError> {
        let url = normalize_root_url(root_url)?;
        let mut summary = TraversalSummary::default();
        let name = directory_name_from_url(&url);
        if !self.is_valid_directory_name(&name) {
            warn!(url = %url, name = %name, "root listing has no usable folder name, nothing mirrored");
            self.skip_directory(&mut summary, SkipReason::InvalidDirectoryName { name }, &url);
            return Ok(summary);
        }
        let root = DirectoryNode {
            local_path: root_folder.join(sanitize_filename(&name)),
            url,
            depth: 0,
        };
        info!(url = %root.url, path = %root.local_path.display(), "starting traversal");

        let mut visited: HashSet<Url> = HashSet::new();
        let mut stack = vec![Frame::Visit(root)];

        while let Some(frame) = stack.pop() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            match frame {
                Frame::Finish(path) => {
                    summary.directories_completed += 1;
                    self.reporter
                        .report(&MirrorEvent::DirectoryFinished { path });
                }
                Frame::Visit(node) => {
                    if !visited.insert(node.url.clone()) {
                        self.skip_directory(&mut summary, SkipReason::AlreadyVisited, &node.url);
                        continue;
                    }
                    match self.visit(&node, &mut summary).await {
                        VisitResult::Children(children) => {
                            stack.push(Frame::Finish(node.local_path));
                            stack.extend(children.into_iter().rev().map(Frame::Visit));
                        }
                        VisitResult::Failed => {}
                        VisitResult::Cancelled => {
                            summary.cancelled = true;
                            break;
                        }
                    }
                }
            }
        }

        if summary.cancelled {
            warn!(?summary, "traversal cancelled");
        } else {
            info!(?summary, "traversal complete");
        }
        Ok(summary)
    }

    #[instrument(skip(self, node, summary), fields(url = %node.url, depth = node.depth))]
    async fn visit(&self, node: &DirectoryNode, summary: &mut TraversalSummary) -> VisitResult {
        log_state(node, NodeState::Pending);
        if let Err(e) = tokio::fs::create_dir_all(&node.local_path).await {
            let error = DownloadError::io(&node.local_path, e);
            return self.fail_directory(node, summary, &error);
        }

        log_state(node, NodeState::Listing);
        let listing = match self.fetcher.fetch_listing(&node.url).await {
            Ok(listing) => listing,
            Err(error) if error.kind() == ErrorKind::Cancelled => return VisitResult::Cancelled,
            Err(error) => return self.fail_directory(node, summary, &error),
        };

        log_state(node, NodeState::Classifying);
        let mut seen: HashSet<Url> = HashSet::new();
        let mut file_names: HashSet<String> = HashSet::new();
        let mut tasks = Vec::new();
        let mut subdirectories = Vec::new();
        for entry in &listing.entries {
            let record = classify(&self.config, &listing.url, &entry.href, entry.type_hint.as_deref());
            match (record.kind, record.resolved_url) {
                (AnchorKind::Skip(reason), _) => self.skip(reason, &record.href),
                (AnchorKind::File { allowed: false }, _) => {
                    summary.files_skipped += 1;
                    self.skip(
                        SkipReason::DisallowedExtension {
                            extension: record.extension,
                        },
                        &record.href,
                    );
                }
                (AnchorKind::File { allowed: true }, Some(url)) => {
                    if !seen.insert(url.clone()) {
                        continue;
                    }
                    let task = DownloadTask::new(url, node.local_path.clone());
                    if file_names.insert(task.file_name.clone()) {
                        tasks.push(task);
                    } else {
                        // Two links in one listing would land on the same local file.
                        summary.files_skipped += 1;
                        self.skip(
                            SkipReason::DuplicateFileName {
                                name: task.file_name,
                            },
                            &record.href,
                        );
                    }
                }
                (AnchorKind::Directory, Some(url)) => {
                    if seen.insert(url.clone()) {
                        subdirectories.push(url);
                    }
                }
                (_, None) => self.skip(SkipReason::InvalidUrl, &record.href),
            }
        }
        debug!(
            anchors = listing.entries.len(),
            files = tasks.len(),
            subdirectories = subdirectories.len(),
            "listing classified"
        );

        log_state(node, NodeState::Downloading);
        let outcomes = self.engine.download_batch(tasks).await;
        let mut interrupted = false;
        for outcome in &outcomes {
            summary.record(outcome);
            interrupted |= matches!(
                outcome.result,
                DownloadResult::Failed {
                    kind: ErrorKind::Cancelled,
                    ..
                }
            );
        }
        if interrupted {
            return VisitResult::Cancelled;
        }

        log_state(node, NodeState::Recursing);
        let children = subdirectories
            .into_iter()
            .filter_map(|url| self.child_node(node, url, summary))
            .collect();
        VisitResult::Children(children)
    }

    /// Builds the node for a subdirectory, or reports why it is not visited.
    fn child_node(
        &self,
        parent: &DirectoryNode,
        url: Url,
        summary: &mut TraversalSummary,
    ) -> Option<DirectoryNode> {
        let name = directory_name_from_url(&url);
        if !self.is_valid_directory_name(&name) {
            self.skip_directory(summary, SkipReason::InvalidDirectoryName { name }, &url);
            return None;
        }

        let depth = parent.depth + 1;
        if depth > self.config.max_depth() {
            let reason = SkipReason::DepthLimit {
                max_depth: self.config.max_depth(),
            };
            self.skip_directory(summary, reason, &url);
            return None;
        }

        Some(DirectoryNode {
            local_path: parent.local_path.join(sanitize_filename(&name)),
            url,
            depth,
        })
    }

    /// A decoded directory name may become a local folder unless it is blank,
    /// `.`, `..` or a restricted token.
    fn is_valid_directory_name(&self, name: &str) -> bool {
        let blank_or_dots = name.trim().is_empty() || name == "." || name == "..";
        !blank_or_dots && !self.config.is_restricted_name(name)
    }

    fn fail_directory(
        &self,
        node: &DirectoryNode,
        summary: &mut TraversalSummary,
        error: &DownloadError,
    ) -> VisitResult {
        log_state(node, NodeState::Failed);
        warn!(url = %node.url, error = %error, "directory abandoned");
        summary.directories_failed += 1;
        self.reporter.report(&MirrorEvent::DirectoryFailed {
            url: node.url.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
        VisitResult::Failed
    }

    fn skip_directory(&self, summary: &mut TraversalSummary, reason: SkipReason, url: &Url) {
        debug!(url = %url, state = ?NodeState::Skipped, %reason, "directory not visited");
        summary.directories_skipped += 1;
        self.skip(reason, url.as_str());
    }

    fn skip(&self, reason: SkipReason, target: &str) {
        self.reporter.report(&MirrorEvent::Skip {
            reason,
            target: target.to_string(),
        });
    }
}

fn log_state(node: &DirectoryNode, state: NodeState) {
    debug!(url = %node.url, ?state, "directory state");
}

/// Parses the root URL, drops its fragment and query, and makes sure it
/// names a directory.
fn normalize_root_url(input: &str) -> Result<Url, TraversalError> {
    let invalid = || TraversalError::InvalidRootUrl {
        url: input.to_string(),
    };
    let mut url = Url::parse(input.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(invalid());
    }
    url.set_fragment(None);
    url.set_query(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
