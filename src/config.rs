//! Run configuration for the mirror.
//!
//! [`MirrorConfig`] is built once at startup and shared read-only (behind an
//! `Arc`) by the classifier, the download engine and the traversal scheduler.
//! Values come from built-in defaults, an optional TOML file ([`FileConfig`]),
//! and CLI flags, in increasing precedence.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default maximum number of concurrent downloads per directory batch.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default streaming write buffer size (128 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Default maximum traversal depth below the root listing.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default local folder name when none is supplied.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Extensions eligible for download unless overridden.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "mp4", "wmv", "pdf", "zip", "bat", "sh", "sql", "plb", "jpg", "gif", "png", "doc", "mht",
];

/// Directory names (and href substrings) that are never traversed by default.
pub const DEFAULT_RESTRICTED_TOKENS: &[&str] = &["Cursos"];

/// Icon alt-text markers autoindex generators place before directory entries.
pub const DEFAULT_DIRECTORY_MARKERS: &[&str] = &["[DIR]", "[Directorio]"];

const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 64;
const MAX_TIMEOUT_SECS: u64 = 3600;
const MIN_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;
const MAX_DEPTH_LIMIT: usize = 1024;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Concurrency outside the supported range.
    #[error(
        "invalid concurrency value {value}: must be between {} and {}",
        MIN_CONCURRENCY,
        MAX_CONCURRENCY
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Timeout outside the supported range.
    #[error("invalid timeout {secs}s: must be between 1 and {} seconds", MAX_TIMEOUT_SECS)]
    InvalidTimeout {
        /// The rejected value in seconds.
        secs: u64,
    },

    /// Chunk size outside the supported range.
    #[error(
        "invalid chunk size {value}: must be between {} and {} bytes",
        MIN_CHUNK_SIZE,
        MAX_CHUNK_SIZE
    )]
    InvalidChunkSize {
        /// The rejected value in bytes.
        value: usize,
    },

    /// Depth cap outside the supported range.
    #[error("invalid max depth {value}: must be between 1 and {}", MAX_DEPTH_LIMIT)]
    InvalidMaxDepth {
        /// The rejected value.
        value: usize,
    },

    /// The allow-list ended up empty after normalization.
    #[error("allowed extension list is empty")]
    EmptyAllowList,

    /// Reading the config file failed.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Immutable configuration threaded through every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    allowed_extensions: BTreeSet<String>,
    concurrency: usize,
    request_timeout: Duration,
    chunk_size: usize,
    max_depth: usize,
    restricted_tokens: Vec<String>,
    directory_markers: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            restricted_tokens: DEFAULT_RESTRICTED_TOKENS
                .iter()
                .map(ToString::to_string)
                .collect(),
            directory_markers: DEFAULT_DIRECTORY_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl MirrorConfig {
    /// Creates a configuration with the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the allow-list. Entries may carry a leading dot and any case.
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    /// Sets the per-directory download worker cap.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the streaming write buffer size in bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the maximum traversal depth below the root listing.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Replaces the restricted directory tokens. An empty list disables the rule.
    #[must_use]
    pub fn with_restricted_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted_tokens = tokens
            .into_iter()
            .map(Into::into)
            .filter(|token: &String| !token.trim().is_empty())
            .collect();
        self
    }

    /// Replaces the directory icon markers.
    #[must_use]
    pub fn with_directory_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directory_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Overlays the values present in a config file.
    #[must_use]
    pub fn merge_file(mut self, file: &FileConfig) -> Self {
        if let Some(extensions) = &file.allowed_extensions {
            self = self.with_allowed_extensions(extensions);
        }
        if let Some(concurrency) = file.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(secs) = file.timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(chunk_size) = file.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(max_depth) = file.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(tokens) = &file.restricted_tokens {
            self = self.with_restricted_tokens(tokens.iter().cloned());
        }
        if let Some(markers) = &file.directory_markers {
            self = self.with_directory_markers(markers.iter().cloned());
        }
        self
    }

    /// Checks every value against its supported range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        let secs = self.request_timeout.as_secs();
        if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
            return Err(ConfigError::InvalidTimeout { secs });
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize {
                value: self.chunk_size,
            });
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(ConfigError::InvalidMaxDepth {
                value: self.max_depth,
            });
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::EmptyAllowList);
        }
        Ok(())
    }

    /// Returns true when `extension` (with or without a leading dot, any case)
    /// is on the allow-list.
    ///
    /// Both the classifier and the download engine consult this so the two
    /// checks can never disagree.
    #[must_use]
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let normalized = normalize_extension(extension);
        !normalized.is_empty() && self.allowed_extensions.contains(&normalized)
    }

    /// Returns the restricted token contained in `value`, if any (case-insensitive).
    #[must_use]
    pub fn restricted_token_in(&self, value: &str) -> Option<&str> {
        let lowered = value.to_lowercase();
        self.restricted_tokens
            .iter()
            .find(|token| lowered.contains(&token.to_lowercase()))
            .map(String::as_str)
    }

    /// Returns true when `name` equals a restricted token (case-insensitive).
    #[must_use]
    pub fn is_restricted_name(&self, name: &str) -> bool {
        self.restricted_tokens
            .iter()
            .any(|token| token.eq_ignore_ascii_case(name))
    }

    /// Returns true when an icon alt text marks a directory entry.
    #[must_use]
    pub fn is_directory_marker(&self, alt: &str) -> bool {
        let alt = alt.trim();
        self.directory_markers
            .iter()
            .any(|marker| marker.eq_ignore_ascii_case(alt))
    }

    /// Allowed extensions, lower-cased and without leading dots.
    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    /// Maximum concurrent downloads per directory batch.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Streaming write buffer size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maximum traversal depth below the root listing.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Restricted directory tokens.
    #[must_use]
    pub fn restricted_tokens(&self) -> &[String] {
        &self.restricted_tokens
    }
}

/// Optional TOML config file. Every field overrides the matching default.
///
/// ```toml
/// allowed_extensions = ["pdf", "zip"]
/// concurrency = 8
/// timeout_secs = 20
/// restricted_tokens = []
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Allowed extensions.
    pub allowed_extensions: Option<Vec<String>>,
    /// Worker cap.
    pub concurrency: Option<usize>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Streaming write buffer size in bytes.
    pub chunk_size: Option<usize>,
    /// Maximum traversal depth.
    pub max_depth: Option<usize>,
    /// Restricted directory tokens.
    pub restricted_tokens: Option<Vec<String>>,
    /// Directory icon markers.
    pub directory_markers: Option<Vec<String>>,
    /// Default output folder.
    pub output_dir: Option<PathBuf>,
    /// Error log path.
    pub error_log: Option<PathBuf>,
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Lower-cases an extension and strips any leading dots.
pub(crate) fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MirrorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.chunk_size(), 131_072);
    }

    #[test]
    fn test_allowed_extension_is_case_and_dot_insensitive() {
        let config = MirrorConfig::default();
        assert!(config.is_allowed_extension("pdf"));
        assert!(config.is_allowed_extension(".PDF"));
        assert!(config.is_allowed_extension("Mp4"));
        assert!(!config.is_allowed_extension("html"));
        assert!(!config.is_allowed_extension(""));
    }

    #[test]
    fn test_with_allowed_extensions_normalizes_entries() {
        let config = MirrorConfig::default().with_allowed_extensions([".ISO", "Txt", ""]);
        assert_eq!(config.allowed_extensions().collect::<Vec<_>>(), ["iso", "txt"]);
        assert!(!config.is_allowed_extension("pdf"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        assert!(matches!(
            MirrorConfig::default().with_concurrency(0).validate(),
            Err(ConfigError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            MirrorConfig::default().with_concurrency(65).validate(),
            Err(ConfigError::InvalidConcurrency { value: 65 })
        ));
        assert!(matches!(
            MirrorConfig::default()
                .with_request_timeout(Duration::from_millis(10))
                .validate(),
            Err(ConfigError::InvalidTimeout { secs: 0 })
        ));
        assert!(matches!(
            MirrorConfig::default().with_chunk_size(16).validate(),
            Err(ConfigError::InvalidChunkSize { value: 16 })
        ));
        assert!(matches!(
            MirrorConfig::default().with_max_depth(0).validate(),
            Err(ConfigError::InvalidMaxDepth { value: 0 })
        ));
        assert!(matches!(
            MirrorConfig::default()
                .with_allowed_extensions(Vec::<String>::new())
                .validate(),
            Err(ConfigError::EmptyAllowList)
        ));
    }

    #[test]
    fn test_restricted_token_matching_ignores_case() {
        let config = MirrorConfig::default();
        assert_eq!(config.restricted_token_in("/cursos/linux/"), Some("Cursos"));
        assert!(config.is_restricted_name("CURSOS"));
        assert!(!config.is_restricted_name("Linux"));

        let config = config.with_restricted_tokens(Vec::<String>::new());
        assert_eq!(config.restricted_token_in("/Cursos/"), None);
    }

    #[test]
    fn test_directory_marker_matching() {
        let config = MirrorConfig::default();
        assert!(config.is_directory_marker("[DIR]"));
        assert!(config.is_directory_marker(" [dir] "));
        assert!(config.is_directory_marker("[Directorio]"));
        assert!(!config.is_directory_marker("[   ]"));
    }

    #[test]
    fn test_file_config_parses_and_merges() {
        let file = FileConfig::parse(
            r#"
allowed_extensions = [".ISO"]
concurrency = 8
timeout_secs = 30
restricted_tokens = []
output_dir = "mirror"
"#,
            Path::new("config.toml"),
        )
        .unwrap();
        assert_eq!(file.output_dir, Some(PathBuf::from("mirror")));

        let config = MirrorConfig::default().merge_file(&file);
        assert!(config.is_allowed_extension("iso"));
        assert!(!config.is_allowed_extension("pdf"));
        assert_eq!(config.concurrency(), 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.restricted_tokens().is_empty());
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let result = FileConfig::parse("workers = 3", Path::new("bad.toml"));
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_file_config_load_missing_file_reports_path() {
        let err = FileConfig::load(Path::new("/nonexistent/mirror.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/mirror.toml"));
    }
}
