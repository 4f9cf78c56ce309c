//! Local names derived from remote URL path segments.

use std::path::{Component, Path};

use tracing::debug;
use url::Url;

/// URL-decodes a single path segment, keeping the raw segment when the
/// escape sequences do not decode to UTF-8.
pub(crate) fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment).map_or_else(
        |e| {
            debug!(segment = %segment, error = %e, "URL decoding failed, using raw segment");
            segment.to_string()
        },
        std::borrow::Cow::into_owned,
    )
}

/// Decoded, filesystem-safe file name from the last path segment of `url`.
///
/// Returns `None` when the path ends in `/` or the decoded name is blank.
pub(crate) fn file_name_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let decoded = decode_segment(last);
    if decoded.trim().is_empty() {
        return None;
    }
    Some(sanitize_filename(&decoded))
}

/// Decoded last non-empty path segment of a directory URL (`""` for a host root).
///
/// The result is not sanitized so callers can reject `.`/`..` before mapping
/// it onto a local folder.
pub(crate) fn directory_name_from_url(url: &Url) -> String {
    url.path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(decode_segment)
        .unwrap_or_default()
}

/// Lower-cased extension of a file name without the dot (`""` when absent).
pub(crate) fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Sanitizes a decoded name for use as a single local path component.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
