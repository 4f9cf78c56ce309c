//! Autoindex Mirror Core Library
//!
//! This library mirrors a remote directory tree published as linked HTML index
//! pages (Apache/Nginx "autoindex" style) onto local storage, downloading only
//! files whose extension is on an allow-list.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Immutable run configuration (allow-list, worker cap, timeouts)
//! - [`listing`] - Listing page fetch/parse and anchor classification
//! - [`download`] - HTTP download engine with streaming support
//! - [`traverse`] - Depth-first traversal scheduler over the remote tree
//! - [`events`] - Structured events emitted to reporters
//! - [`report`] - Logging and error-log reporters

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod events;
pub mod listing;
pub mod report;
#[cfg(test)]
pub mod test_support;
pub mod traverse;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, MirrorConfig};
pub use download::{
    DownloadEngine, DownloadError, DownloadOutcome, DownloadResult, DownloadTask, ErrorKind,
    HttpClient,
};
pub use events::{EventReporter, FanoutReporter, MirrorEvent, NoopReporter, SkipReason};
pub use listing::{
    AnchorKind, AnchorRecord, Listing, ListingEntry, ListingFetcher, classify, parse_listing,
};
pub use report::{DEFAULT_ERROR_LOG, ErrorLogReporter, TracingReporter};
pub use traverse::{DirectoryNode, NodeState, TraversalError, TraversalSummary, Traverser};
