//! Anchor extraction from autoindex HTML.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector is valid"));

#[allow(clippy::expect_used)]
static ICON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[alt]").expect("static selector is valid"));

/// One anchor of a listing page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Raw `href` attribute value.
    pub href: String,
    /// Alt text of the icon rendered in front of the anchor, if any.
    pub type_hint: Option<String>,
}

/// Extracts every `<a href>` of a listing page together with its icon hint.
///
/// Markup that html5ever cannot make sense of simply yields fewer (or no)
/// entries; this never fails.
#[must_use]
pub fn parse_listing(html: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            Some(ListingEntry {
                href: href.trim().to_string(),
                type_hint: icon_hint(anchor),
            })
        })
        .collect()
}

/// Finds the icon belonging to the same listing row as `anchor`.
///
/// Pre-formatted listings put `<img alt="[DIR]"> <a ...>` on one line, so the
/// walk back stops at a line break or at the previous anchor. Table listings
/// put the icon in an earlier cell of the same row.
fn icon_hint(anchor: ElementRef<'_>) -> Option<String> {
    for sibling in anchor.prev_siblings() {
        match sibling.value() {
            Node::Text(text) if text.contains('\n') => break,
            Node::Element(element) => match element.name() {
                "a" | "br" | "tr" | "li" => break,
                "img" => return element.attr("alt").map(str::to_string),
                _ => {
                    if let Some(alt) = ElementRef::wrap(sibling).and_then(first_icon_alt) {
                        return Some(alt);
                    }
                }
            },
            _ => {}
        }
    }

    let cell = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|element| element.value().name() != "tr")
        .find(|element| matches!(element.value().name(), "td" | "th"))?;
    cell.prev_siblings()
        .filter_map(ElementRef::wrap)
        .find_map(first_icon_alt)
}

fn first_icon_alt(element: ElementRef<'_>) -> Option<String> {
    element
        .select(&ICON)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const APACHE_PRE: &str = r#"<html><body><h1>Index of /courses</h1><pre><img src="/icons/blank.gif" alt="Icon "> <a href="?C=N;O=D">Name</a>                    <a href="?C=M;O=A">Last modified</a>      <a href="?C=S;O=A">Size</a><hr><img src="/icons/back.gif" alt="[PARENTDIR]"> <a href="/">Parent Directory</a>                             -
<img src="/icons/folder.gif" alt="[DIR]"> <a href="2021/">2021/</a>                   2021-03-01 10:00    -
<img src="/icons/layout.gif" alt="[   ]"> <a href="My%20Notes.pdf">My Notes.pdf</a>          2021-03-01 10:00  12K
<a href="plain.zip">plain.zip</a>
</pre></body></html>"#;

    const APACHE_TABLE: &str = r#"<html><body><table>
<tr><th valign="top"><img src="/icons/blank.gif" alt="[ICO]"></th><th><a href="?C=N;O=D">Name</a></th></tr>
<tr><td valign="top"><img src="/icons/folder.gif" alt="[Directorio]"></td><td><a href="Linux/">Linux/</a></td><td>-</td></tr>
<tr><td valign="top"><img src="/icons/movie.gif" alt="[VID]"></td><td><a href="intro.mp4">intro.mp4</a></td><td>2M</td></tr>
<tr><td></td><td><a href="readme.txt">readme.txt</a></td></tr>
</table></body></html>"#;

    fn entry(href: &str, hint: Option<&str>) -> ListingEntry {
        ListingEntry {
            href: href.to_string(),
            type_hint: hint.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_pre_listing_keeps_document_order_and_hints() {
        let entries = parse_listing(APACHE_PRE);
        assert_eq!(
            entries,
            vec![
                entry("?C=N;O=D", Some("Icon ")),
                entry("?C=M;O=A", None),
                entry("?C=S;O=A", None),
                entry("/", Some("[PARENTDIR]")),
                entry("2021/", Some("[DIR]")),
                entry("My%20Notes.pdf", Some("[   ]")),
                entry("plain.zip", None),
            ]
        );
    }

    #[test]
    fn test_parse_table_listing_reads_icon_from_previous_cell() {
        let entries = parse_listing(APACHE_TABLE);
        assert_eq!(
            entries,
            vec![
                entry("?C=N;O=D", Some("[ICO]")),
                entry("Linux/", Some("[Directorio]")),
                entry("intro.mp4", Some("[VID]")),
                entry("readme.txt", None),
            ]
        );
    }

    #[test]
    fn test_parse_nginx_listing_without_icons() {
        let html = "<html><body><h1>Index of /pub/</h1><hr><pre><a href=\"../\">../</a>\n<a href=\"docs/\">docs/</a>  01-Jan-2024 00:00  -\n<a href=\"a.sql\">a.sql</a>  01-Jan-2024 00:00  10\n</pre><hr></body></html>";
        let entries = parse_listing(html);
        assert_eq!(
            entries,
            vec![
                entry("../", None),
                entry("docs/", None),
                entry("a.sql", None)
            ]
        );
    }

    #[test]
    fn test_parse_garbage_yields_no_entries() {
        assert!(parse_listing("").is_empty());
        assert!(parse_listing("<<<not html at all >>> <a>no href</a>").is_empty());
    }
}
