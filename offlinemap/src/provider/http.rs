//! HTTP fetch abstraction for testability

use std::time::Duration;

use bytes::Bytes;

use super::types::FetchError;
use crate::BoxFuture;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Capability to fetch the body of a URL.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock fetchers in tests.
pub trait Fetcher: Send + Sync {
    /// Performs an HTTP GET request bounded by `timeout`.
    ///
    /// Non-success statuses are errors.
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration)
        -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// Real fetcher implementation using the async reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a fetcher whose client-level timeout is `timeout`.
    ///
    /// Each request may still carry a shorter timeout of its own.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("offlinemap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::ClientInit(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let map_err = |e: reqwest::Error| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                        timeout_secs: timeout.as_secs(),
                    }
                } else {
                    FetchError::Transport {
                        url: url.to_string(),
                        cause: e.to_string(),
                    }
                }
            };

            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(map_err)?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response.bytes().await.map_err(map_err)
        })
    }
}
