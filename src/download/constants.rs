//! Constants for the download module.

/// Suffix of the temporary file a body is streamed into before the final rename.
pub const PARTIAL_SUFFIX: &str = ".part";
