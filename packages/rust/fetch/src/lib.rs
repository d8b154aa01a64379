//! Remote document fetching for job sources.
//!
//! The ingestion pipeline only needs "give me the document at this locator,
//! or fail in bounded time". [`Fetcher`] is that contract; [`HttpFetcher`] is
//! the reqwest-backed implementation used in production.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use jobdigest_shared::{JobDigestError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for a fetch.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum response size we accept (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("jobdigest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Retrieves the raw document behind a source locator.
///
/// Implementations fail with [`JobDigestError::Fetch`]; nothing is cached or
/// retried here.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> impl Future<Output = Result<String>> + Send;
}

impl<F: Fetcher> Fetcher for Arc<F> {
    fn fetch(&self, locator: &str) -> impl Future<Output = Result<String>> + Send {
        (**self).fetch(locator)
    }
}

// ---------------------------------------------------------------------------
// Fetch options
// ---------------------------------------------------------------------------

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for the whole request in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// HTTP(S) fetcher with a request timeout and response size cap.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given options.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| JobDigestError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<String> {
        let url = Url::parse(locator)
            .map_err(|e| JobDigestError::Fetch(format!("invalid locator '{locator}': {e}")))?;

        debug!(%url, "fetching source document");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| JobDigestError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobDigestError::Fetch(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(JobDigestError::Fetch(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| JobDigestError::Fetch(format!("{url}: failed to read body: {e}")))?;

        if body.len() as u64 > MAX_RESPONSE_SIZE {
            return Err(JobDigestError::Fetch(format!(
                "{url}: response too large ({} bytes, max {MAX_RESPONSE_SIZE})",
                body.len()
            )));
        }

        info!(%url, bytes = body.len(), "fetched source document");
        Ok(body)
    }
}
