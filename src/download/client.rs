//! HTTP client wrapper for listing fetches and file transfers.
//!
//! Two reqwest clients share one [`HttpClient`]: listing pages follow
//! redirects under the transport's default policy, while file probes and
//! transfers never follow redirects so a download cannot silently switch
//! origin.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, LOCATION};
use reqwest::{Client, ClientBuilder, redirect};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;
use crate::config::MirrorConfig;
use crate::user_agent;

/// HTTP client for listing pages and streaming file downloads.
///
/// Created once per run and cloned into download workers; clones share the
/// underlying connection pools.
#[derive(Debug, Clone)]
pub struct HttpClient {
    listing: Client,
    transfer: Client,
}

impl HttpClient {
    /// Creates a client using the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new(config: &MirrorConfig) -> Result<Self, reqwest::Error> {
        Self::with_timeout(config.request_timeout())
    }

    /// Creates a client with an explicit per-request timeout.
    ///
    /// Listing requests are bounded end to end. Transfers bound the connect
    /// phase and each body read, so large files are not cut off mid-stream.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let listing = base_client_builder(timeout)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        let transfer = base_client_builder(timeout)
            .read_timeout(timeout)
            .redirect(redirect::Policy::none())
            .no_gzip()
            .build()?;
        Ok(Self { listing, transfer })
    }

    /// Fetches a listing page and returns the URL it was finally served from
    /// (after redirects) together with its body.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failure, timeout, or non-2xx status.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_page(&self, url: &str) -> Result<(Url, String), DownloadError> {
        let response = self
            .listing
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        let response = check_status(url, response)?;
        let final_url = response.url().clone();
        if final_url.as_str() != url {
            debug!(from = url, to = %final_url, "listing redirected");
        }
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        Ok((final_url, body))
    }

    /// Issues a HEAD probe and returns the announced content length.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failure, timeout, redirect, or
    /// non-2xx status.
    #[instrument(level = "debug", skip(self))]
    pub async fn probe_length(&self, url: &str) -> Result<Option<u64>, DownloadError> {
        let response = self
            .transfer
            .head(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        let response = check_status(url, response)?;
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        debug!(?length, "HEAD probe complete");
        Ok(length)
    }

    /// Opens a streaming GET for a file. The body is not read.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failure, timeout, redirect, or
    /// non-2xx status.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_stream(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .transfer
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        check_status(url, response)
    }
}

fn base_client_builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(timeout)
        .user_agent(user_agent::default_user_agent())
}

/// Converts redirect and non-2xx responses into errors.
fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response, DownloadError> {
    let status = response.status();
    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        return Err(DownloadError::redirect(url, status.as_u16(), location));
    }
    if !status.is_success() {
        return Err(DownloadError::http_status(url, status.as_u16()));
    }
    Ok(response)
}

/// Runs `operation` unless `cancel` fires first.
///
/// The token is checked before the operation starts and raced against it
/// while it is pending.
pub(crate) async fn until_cancelled<T, F>(
    cancel: &CancellationToken,
    url: &str,
    operation: F,
) -> Result<T, DownloadError>
where
    F: Future<Output = Result<T, DownloadError>>,
{
    if cancel.is_cancelled() {
        return Err(DownloadError::cancelled(url));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DownloadError::cancelled(url)),
        result = operation => result,
    }
}
