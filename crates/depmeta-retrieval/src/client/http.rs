//! HTTP layer: status mapping and retry.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::time::Duration;

use tracing::warn;

use crate::error::{FetchError, FetchResult};

/// HTTP backend for making requests (holds reqwest client and retry budget).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) max_retries: u32,
}

impl HttpBackend {
    /// GET with retry on transient failures (connect errors, timeouts, 429, 5xx).
    pub(crate) async fn request(&self, url: &str) -> FetchResult<reqwest::Response> {
        use rand::Rng;

        let mut retries = 0;
        let max_retries = self.max_retries;

        loop {
            match self.request_once(url).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let base_backoff = Duration::from_secs(1 << retries);
                    let base_backoff = base_backoff.min(Duration::from_secs(30));
                    let jittered_ms =
                        rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                    let backoff = Duration::from_millis(jittered_ms.max(10));

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(&self, url: &str) -> FetchResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}
