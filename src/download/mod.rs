//! HTTP transfer layer: client, per-file engine and failure taxonomy.
//!
//! Files are streamed to a `.part` sibling and renamed into place only after
//! the body has been fully written, so an interrupted run never leaves a
//! truncated file under its final name.

mod client;
mod constants;
mod engine;
mod error;
pub(crate) mod filename;

pub use client::HttpClient;
pub(crate) use client::until_cancelled;
pub use constants::PARTIAL_SUFFIX;
pub use engine::{DownloadEngine, DownloadOutcome, DownloadResult, DownloadTask};
pub use error::{DownloadError, ErrorKind};

// No module-local Result alias: signatures spell out `Result<T, DownloadError>`.
