//! Directory listing pages: fetch, parse and classify.
//!
//! A listing is fetched for exactly one directory level; the traverser decides
//! what to do with the classified anchors.

mod classify;
mod parse;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::download::{DownloadError, HttpClient, until_cancelled};

pub use classify::{AnchorKind, AnchorRecord, classify};
pub use parse::{ListingEntry, parse_listing};

/// A fetched listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// URL the page was served from after redirects; hrefs resolve against it.
    pub url: Url,
    /// Anchors in document order.
    pub entries: Vec<ListingEntry>,
}

/// Fetches and parses listing pages.
#[derive(Debug, Clone)]
pub struct ListingFetcher {
    client: HttpClient,
    cancel: CancellationToken,
}

impl ListingFetcher {
    /// Creates a fetcher sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: HttpClient, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }

    /// Fetches the listing at `url` and returns its anchors in document order,
    /// along with the URL the page was finally served from.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failure, timeout, non-2xx status,
    /// or cancellation. Unparseable markup is not an error; it yields an
    /// empty list.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_listing(&self, url: &Url) -> Result<Listing, DownloadError> {
        let (final_url, body) =
            until_cancelled(&self.cancel, url.as_str(), self.client.get_page(url.as_str())).await?;
        let entries = parse_listing(&body);
        debug!(anchors = entries.len(), "listing parsed");
        Ok(Listing {
            url: final_url,
            entries,
        })
    }
}
