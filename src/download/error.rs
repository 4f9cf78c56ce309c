//! Error types for listing fetches and file downloads.
//!
//! [`DownloadError`] carries the URL or path context of a failure;
//! [`ErrorKind`] is the closed category the scheduler and reporters match on.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a listing or downloading a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server answered a file request with a redirect, which is never followed.
    #[error("HTTP {status} redirect refused for {url} (location: {})", .location.as_deref().unwrap_or("none"))]
    Redirect {
        /// The URL that redirected.
        url: String,
        /// The 3xx status code.
        status: u16,
        /// The Location header, if present.
        location: Option<String>,
    },

    /// File system error (create folder, create file, write, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled before the operation finished.
    #[error("cancelled while fetching {url}")]
    Cancelled {
        /// The URL being fetched.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a refused-redirect error.
    pub fn redirect(url: impl Into<String>, status: u16, location: Option<String>) -> Self {
        Self::Redirect {
            url: url.into(),
            status,
            location,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Maps the error onto its failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HttpStatus { status, .. } | Self::Redirect { status, .. } => {
                ErrorKind::Http { status: *status }
            }
            Self::Io { .. } => ErrorKind::Filesystem,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Closed failure taxonomy shared by outcomes, events and the error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// DNS or connection failure.
    Network,
    /// Non-2xx response, including refused redirects.
    Http {
        /// The HTTP status code.
        status: u16,
    },
    /// Request or read timeout.
    Timeout,
    /// Folder creation or file write failure.
    Filesystem,
    /// Deliberate exclusion; not a failure.
    ClassificationSkip,
    /// Anything not anticipated.
    Unexpected,
    /// Stopped by the cancellation token.
    Cancelled,
}

impl ErrorKind {
    /// Returns true for kinds that end up in the error log: everything except
    /// deliberate skips and cancellation.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::ClassificationSkip | Self::Cancelled)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("Connection Error"),
            Self::Http { status } => write!(f, "HTTP Error {status}"),
            Self::Timeout => f.write_str("Timeout"),
            Self::Filesystem => f.write_str("Filesystem Error"),
            Self::ClassificationSkip => f.write_str("Skipped"),
            Self::Unexpected => f.write_str("Unexpected Error"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs a URL or
// path that the source error does not carry.
