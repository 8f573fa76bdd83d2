use std::sync::Arc;
use std::time::Duration;

use pricewatch_core::config::CrawlSettings;
use pricewatch_core::error::AppError;
use pricewatch_core::traits::Fetcher;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderValue};

use crate::resolver::CachingResolver;

/// Desktop browser User-Agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_GB: &str = "en-GB,en;q=0.5";

/// HTTP fetcher using reqwest.
///
/// Performs a single attempt per call with browser-like headers; wrap it in
/// a [`RetryingFetcher`](pricewatch_core::retry::RetryingFetcher) for the
/// retry policy. All clones share one keep-alive pool and DNS cache.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::from_settings(&CrawlSettings::default())
    }

    pub fn from_settings(settings: &CrawlSettings) -> Result<Self, AppError> {
        let timeout = settings.request_timeout();
        let resolver = CachingResolver::new(Duration::from_secs(settings.dns_cache_ttl_secs));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers())
            .timeout(timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host())
            .pool_idle_timeout(Duration::from_secs(settings.pool_idle_timeout_secs))
            .tcp_keepalive(Duration::from_secs(settings.pool_idle_timeout_secs))
            .dns_resolver(Arc::new(resolver))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_GB));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "Non-success response");
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}
