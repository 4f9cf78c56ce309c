//! Anchor classification: file, directory or skip.
//!
//! Classification is a pure function of the configuration, the listing URL and
//! the anchor; it performs no I/O and holds no state.

use url::Url;

use crate::config::MirrorConfig;
use crate::download::filename::{decode_segment, extension_of, file_name_from_url};
use crate::events::SkipReason;

/// Hrefs that point at the listing itself, its parent or the server root.
const PARENT_OR_SELF_MARKERS: &[&str] = &["..", "../", ".", "./", "/"];

/// What an anchor refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorKind {
    /// A file. `allowed` is false when its extension is not on the allow-list.
    File {
        /// Whether the extension is on the allow-list.
        allowed: bool,
    },
    /// A subdirectory strictly beneath the listing.
    Directory,
    /// Not processed.
    Skip(SkipReason),
}

/// A classified anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRecord {
    /// Raw href as found in the listing.
    pub href: String,
    /// Absolute target without fragment; directories always end in `/`.
    /// `None` for anchors skipped before resolution.
    pub resolved_url: Option<Url>,
    /// Classification result.
    pub kind: AnchorKind,
    /// Lower-cased file extension, empty for directories and skips.
    pub extension: String,
}

impl AnchorRecord {
    fn skip(href: &str, resolved_url: Option<Url>, reason: SkipReason) -> Self {
        Self {
            href: href.to_string(),
            resolved_url,
            kind: AnchorKind::Skip(reason),
            extension: String::new(),
        }
    }

    /// Decoded local file name for file anchors.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        match self.kind {
            AnchorKind::File { .. } => self.resolved_url.as_ref().and_then(file_name_from_url),
            _ => None,
        }
    }
}

/// Classifies `href` found on the listing at `base`.
///
/// `type_hint` is the alt text of the icon rendered before the anchor; a
/// configured directory marker there makes the anchor a directory even
/// without a trailing slash.
///
/// Rules, first match wins:
///
/// 1. parent/self/root markers and `../`-prefixed hrefs are skipped
/// 2. empty, query-only and fragment-only hrefs are navigation links
/// 3. hrefs containing a restricted token (raw or decoded, any case) are skipped
/// 4. hrefs that do not resolve, or resolve to a non-HTTP scheme, are skipped
/// 5. directories must lie strictly beneath `base`
/// 6. files must share `base`'s origin and have a name; the extension decides
///    whether they are allowed
#[must_use]
pub fn classify(
    config: &MirrorConfig,
    base: &Url,
    href: &str,
    type_hint: Option<&str>,
) -> AnchorRecord {
    let trimmed = href.trim();

    if PARENT_OR_SELF_MARKERS.contains(&trimmed) || trimmed.starts_with("../") {
        return AnchorRecord::skip(href, None, SkipReason::ParentOrSelf);
    }
    if trimmed.is_empty() || trimmed.starts_with('?') || trimmed.starts_with('#') {
        return AnchorRecord::skip(href, None, SkipReason::Navigation);
    }
    let restricted = config
        .restricted_token_in(trimmed)
        .or_else(|| config.restricted_token_in(&decode_segment(trimmed)));
    if let Some(token) = restricted {
        return AnchorRecord::skip(
            href,
            None,
            SkipReason::Restricted {
                token: token.to_string(),
            },
        );
    }

    let Ok(mut resolved) = base.join(trimmed) else {
        return AnchorRecord::skip(href, None, SkipReason::InvalidUrl);
    };
    resolved.set_fragment(None);

    if !matches!(resolved.scheme(), "http" | "https") {
        let scheme = resolved.scheme().to_string();
        return AnchorRecord::skip(href, Some(resolved), SkipReason::UnsupportedScheme { scheme });
    }

    let hinted_directory = type_hint.is_some_and(|hint| config.is_directory_marker(hint));
    if hinted_directory || resolved.path().ends_with('/') {
        return classify_directory(href, base, resolved);
    }

    if resolved.origin() != base.origin() {
        return AnchorRecord::skip(href, Some(resolved), SkipReason::ExternalOrigin);
    }
    let Some(name) = file_name_from_url(&resolved) else {
        return AnchorRecord::skip(href, Some(resolved), SkipReason::NoFileName);
    };
    let extension = extension_of(&name);
    AnchorRecord {
        href: href.to_string(),
        resolved_url: Some(resolved),
        kind: AnchorKind::File {
            allowed: config.is_allowed_extension(&extension),
        },
        extension,
    }
}

fn classify_directory(href: &str, base: &Url, mut resolved: Url) -> AnchorRecord {
    resolved.set_query(None);
    if !resolved.path().ends_with('/') {
        let path = format!("{}/", resolved.path());
        resolved.set_path(&path);
    }

    if resolved.origin() != base.origin() {
        return AnchorRecord::skip(href, Some(resolved), SkipReason::OutsideTree);
    }

    let base_dir = listing_directory(base);
    let path = resolved.path();
    if path.len() > base_dir.len() && path.starts_with(base_dir) {
        AnchorRecord {
            href: href.to_string(),
            resolved_url: Some(resolved),
            kind: AnchorKind::Directory,
            extension: String::new(),
        }
    } else if base_dir.starts_with(path) {
        AnchorRecord::skip(href, Some(resolved), SkipReason::ParentOrSelf)
    } else {
        AnchorRecord::skip(href, Some(resolved), SkipReason::OutsideTree)
    }
}

/// Path of the directory a listing URL describes, including the trailing `/`.
fn listing_directory(base: &Url) -> &str {
    let path = base.path();
    path.rfind('/').map_or(path, |index| &path[..=index])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.org/courses/").unwrap()
    }

    fn kind_of(href: &str) -> AnchorKind {
        classify(&MirrorConfig::default(), &base(), href, None).kind
    }

    #[test]
    fn test_resolves_relative_file_href() {
        let record = classify(&MirrorConfig::default(), &base(), "2021/slides.pdf", None);
        assert_eq!(
            record.resolved_url.unwrap().as_str(),
            "https://example.org/courses/2021/slides.pdf"
        );
        assert_eq!(record.kind, AnchorKind::File { allowed: true });
        assert_eq!(record.extension, "pdf");
    }

    #[test]
    fn test_parent_self_and_root_markers_are_skipped() {
        for href in ["..", "../", ".", "./", "/", " ../ ", "../index.html", "../../up/"] {
            assert_eq!(
                kind_of(href),
                AnchorKind::Skip(SkipReason::ParentOrSelf),
                "href {href:?}"
            );
        }
    }

    #[test]
    fn test_absolute_links_up_the_tree_are_parent_or_self() {
        assert_eq!(kind_of("/courses/"), AnchorKind::Skip(SkipReason::ParentOrSelf));
        assert_eq!(
            kind_of("https://example.org/"),
            AnchorKind::Skip(SkipReason::ParentOrSelf)
        );
    }

    #[test]
    fn test_restricted_token_is_case_insensitive() {
        for href in ["Cursos/", "cursos/", "CURSOS", "old-cursos/notes.pdf", "%43ursos/"] {
            assert_eq!(
                kind_of(href),
                AnchorKind::Skip(SkipReason::Restricted {
                    token: "Cursos".to_string()
                }),
                "href {href:?}"
            );
        }
    }

    #[test]
    fn test_restriction_can_be_disabled() {
        let config = MirrorConfig::default().with_restricted_tokens(Vec::<String>::new());
        let record = classify(&config, &base(), "Cursos/", None);
        assert_eq!(record.kind, AnchorKind::Directory);
    }

    #[test]
    fn test_disallowed_extension_is_flagged_not_dropped() {
        let record = classify(&MirrorConfig::default(), &base(), "index.HTML", None);
        assert_eq!(record.kind, AnchorKind::File { allowed: false });
        assert_eq!(record.extension, "html");

        let record = classify(&MirrorConfig::default(), &base(), "README", None);
        assert_eq!(record.kind, AnchorKind::File { allowed: false });
        assert_eq!(record.extension, "");
    }

    #[test]
    fn test_percent_encoded_file_name_is_decoded() {
        let record = classify(&MirrorConfig::default(), &base(), "My%20Notes.pdf", None);
        assert_eq!(record.file_name().as_deref(), Some("My Notes.pdf"));
        assert_eq!(record.kind, AnchorKind::File { allowed: true });
    }

    #[test]
    fn test_directory_from_trailing_slash_or_icon_hint() {
        let record = classify(&MirrorConfig::default(), &base(), "2021/", None);
        assert_eq!(record.kind, AnchorKind::Directory);

        let record = classify(&MirrorConfig::default(), &base(), "Linux", Some("[DIR]"));
        assert_eq!(record.kind, AnchorKind::Directory);
        assert_eq!(
            record.resolved_url.unwrap().as_str(),
            "https://example.org/courses/Linux/"
        );

        let record = classify(&MirrorConfig::default(), &base(), "Linux", Some(" [directorio] "));
        assert_eq!(record.kind, AnchorKind::Directory);
        assert_eq!(record.file_name(), None);
    }

    #[test]
    fn test_directory_query_is_dropped() {
        let record = classify(&MirrorConfig::default(), &base(), "2021/?C=M;O=A", None);
        assert_eq!(record.kind, AnchorKind::Directory);
        assert_eq!(
            record.resolved_url.unwrap().as_str(),
            "https://example.org/courses/2021/"
        );
    }

    #[test]
    fn test_navigation_links_are_skipped() {
        for href in ["?C=N;O=D", "#top", "", "   "] {
            assert_eq!(
                kind_of(href),
                AnchorKind::Skip(SkipReason::Navigation),
                "href {href:?}"
            );
        }
    }

    #[test]
    fn test_unsupported_scheme_is_skipped() {
        assert_eq!(
            kind_of("mailto:admin@example.org"),
            AnchorKind::Skip(SkipReason::UnsupportedScheme {
                scheme: "mailto".to_string()
            })
        );
    }

    #[test]
    fn test_protocol_relative_and_fragment_hrefs() {
        let record = classify(
            &MirrorConfig::default(),
            &base(),
            "//example.org/courses/a.zip#part",
            None,
        );
        assert_eq!(record.kind, AnchorKind::File { allowed: true });
        assert_eq!(
            record.resolved_url.unwrap().as_str(),
            "https://example.org/courses/a.zip"
        );
    }

    #[test]
    fn test_links_leaving_the_tree_are_skipped() {
        assert_eq!(kind_of("/other/"), AnchorKind::Skip(SkipReason::OutsideTree));
        assert_eq!(
            kind_of("https://mirror.example.net/courses/2021/"),
            AnchorKind::Skip(SkipReason::OutsideTree)
        );
        assert_eq!(
            kind_of("https://cdn.example.net/video.mp4"),
            AnchorKind::Skip(SkipReason::ExternalOrigin)
        );
    }

    #[test]
    fn test_files_elsewhere_on_same_origin_are_allowed() {
        let record = classify(&MirrorConfig::default(), &base(), "/shared/setup.sh", None);
        assert_eq!(record.kind, AnchorKind::File { allowed: true });
    }

    #[test]
    fn test_base_without_trailing_slash_uses_containing_directory() {
        let base = Url::parse("https://example.org/courses/index.html").unwrap();
        let record = classify(&MirrorConfig::default(), &base, "2021/", None);
        assert_eq!(record.kind, AnchorKind::Directory);
    }
}
