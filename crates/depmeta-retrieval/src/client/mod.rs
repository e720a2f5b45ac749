//! Shared HTTP client for all upstream calls.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::types::RetrievalConfig;

mod http;

use http::HttpBackend;

/// User agent sent with every request.
pub const USER_AGENT_VALUE: &str = concat!("depmeta-retrieval/", env!("CARGO_PKG_VERSION"));

/// HTTP client with bounded timeout and retry for transient failures.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: HttpBackend,
}

impl HttpClient {
    pub fn new(config: &RetrievalConfig) -> FetchResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| FetchError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                max_retries: config.max_retries,
            },
        })
    }

    /// GET `url`, returning the response once it has a 2xx status.
    ///
    /// The body is not read; callers stream it with [`reqwest::Response::chunk`].
    pub async fn get(&self, url: &str) -> FetchResult<reqwest::Response> {
        debug!(url = %url, "GET");
        self.http.request(url).await
    }

    /// GET `url` and read the body as text.
    pub async fn get_text(&self, url: &str) -> FetchResult<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> FetchResult<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
