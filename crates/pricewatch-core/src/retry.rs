//! Retrying wrapper for any [`Fetcher`].
//!
//! Every failure (non-success status, timeout, connection error) is retried
//! after a randomized backoff until the attempt budget is spent. The last
//! error is returned to the caller, which treats it as "no data".

use crate::error::AppError;
use crate::pacing::{self, DelayRange};
use crate::traits::Fetcher;

/// Attempt budget and backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub backoff: DelayRange,
}

impl Default for RetryPolicy {
    /// 3 attempts, 1-2 s apart.
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: DelayRange::new(1.0, 2.0),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: DelayRange) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// A [`Fetcher`] wrapper that retries failed attempts.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(%url, attempt, max = attempts, error = %e, "Fetch attempt failed");
                    if attempt >= attempts {
                        return Err(e);
                    }
                }
            }
            pacing::pause(self.policy.backoff).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetcher;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, DelayRange::ZERO)
    }

    #[tokio::test]
    async fn retries_until_success() {
        let inner = MockFetcher::with_responses(vec![
            Err(AppError::Timeout(10)),
            Err(AppError::HttpStatus {
                status: 503,
                url: "https://shop.example.com".into(),
            }),
            Ok("<html>ok</html>".into()),
        ]);
        let fetcher = RetryingFetcher::new(inner.clone(), policy(3));

        let body = fetcher.fetch("https://shop.example.com").await.unwrap();
        assert_eq!(body, "<html>ok</html>");
        assert_eq!(inner.call_count(), 3);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let inner = MockFetcher::new("<html>first</html>");
        let fetcher = RetryingFetcher::new(inner.clone(), policy(3));

        fetcher.fetch("https://shop.example.com").await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let inner = MockFetcher::with_responses(vec![
            Err(AppError::NetworkError("reset".into())),
            Err(AppError::NetworkError("reset".into())),
            Err(AppError::NetworkError("reset".into())),
            Ok("<html>too late</html>".into()),
        ]);
        let fetcher = RetryingFetcher::new(inner.clone(), policy(3));

        let err = fetcher.fetch("https://shop.example.com").await.unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)));
        assert_eq!(inner.call_count(), 3);
    }

    #[tokio::test]
    async fn non_success_status_is_retried() {
        let inner = MockFetcher::with_responses(vec![
            Err(AppError::HttpStatus {
                status: 404,
                url: "https://shop.example.com".into(),
            }),
            Ok("<html>back</html>".into()),
        ]);
        let fetcher = RetryingFetcher::new(inner.clone(), policy(3));

        assert!(fetcher.fetch("https://shop.example.com").await.is_ok());
        assert_eq!(inner.call_count(), 2);
    }

    #[tokio::test]
    async fn zero_budget_still_tries_once() {
        let inner = MockFetcher::with_error(AppError::Timeout(10));
        let fetcher = RetryingFetcher::new(inner.clone(), policy(0));

        assert!(fetcher.fetch("https://shop.example.com").await.is_err());
        assert_eq!(inner.call_count(), 1);
    }
}
