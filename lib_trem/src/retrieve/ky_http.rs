//! # HTTP Retrieval Utilities
//!
//! A thin wrapper around `reqwest` shared by the pull transport. It carries
//! two clients built from the same settings: a plain one for the
//! notification poll, where every failure must reach the coordinator
//! untouched, and one behind `reqwest-retry` for the report endpoints, where
//! a transient hiccup is not worth surfacing.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

use crate::configs::constants::CLIENT_USER_AGENT;
use crate::configs::TremConfig;
use crate::error::{Result, TremError};

/// A decoded response together with its transaction metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The decoded body on success.
    pub data: Option<T>,
    /// The raw body of a non-2xx response.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// True for 2xx.
    pub success: bool,
}

/// Timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Whole request.
    pub total: Duration,
    /// TCP/TLS connect.
    pub connect: Duration,
    /// Gap between two reads.
    pub read: Duration,
}

impl From<&TremConfig> for HttpTimeouts {
    fn from(config: &TremConfig) -> Self {
        Self {
            total: Duration::from_secs(config.request_timeout_secs),
            connect: Duration::from_secs(config.connect_timeout_secs),
            read: Duration::from_secs(config.read_timeout_secs),
        }
    }
}

/// JSON-over-HTTP client with fixed headers and timeouts.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Client without retries.
    plain: reqwest::Client,
    /// The same client behind the retry middleware.
    retrying: ClientWithMiddleware,
}

impl ApiClient {
    /// Builds both clients. Every request carries `Accept` and
    /// `Content-Type: application/json` and the client `User-Agent`.
    pub fn new(timeouts: HttpTimeouts, max_retries: u32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let plain = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeouts.total)
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .map_err(|e| TremError::Config(format!("cannot build HTTP client: {}", e)))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let retrying = ClientBuilder::new(plain.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { plain, retrying })
    }

    /// Single-shot GET. Send and body-read failures map to
    /// [`TremError::Transport`] tagged with `node`; a non-2xx status is
    /// returned in the response, not as an error.
    pub async fn get<T>(&self, node: &str, url: Url, query: &[(String, String)]) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        // 1. Build and send without retries
        let response = self
            .plain
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| TremError::Transport { node: node.to_string(), source })?;

        // 2. Read the body and decode
        Self::finish(node, response).await
    }

    /// GET through the retry middleware.
    pub async fn get_with_retry<T>(&self, url: Url, query: &[(String, String)]) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let node = url.host_str().unwrap_or_default().to_string();
        let response = self.retrying.get(url).query(query).send().await?;
        Self::finish(&node, response).await
    }

    async fn finish<T>(node: &str, response: reqwest::Response) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| TremError::Transport { node: node.to_string(), source })?;

        if status.is_success() {
            Ok(ApiResponse {
                data: Some(serde_json::from_slice::<T>(&body)?),
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            Ok(ApiResponse {
                data: None,
                error_body: Some(String::from_utf8_lossy(&body).into_owned()),
                status: status.as_u16(),
                success: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_follow_config() {
        let timeouts = HttpTimeouts::from(&TremConfig::default());
        assert_eq!(timeouts.total, Duration::from_secs(15));
        assert_eq!(timeouts.connect, Duration::from_secs(10));
        assert_eq!(timeouts.read, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let client = ApiClient::new(
            HttpTimeouts {
                total: Duration::from_secs(2),
                connect: Duration::from_secs(1),
                read: Duration::from_secs(1),
            },
            0,
        )
        .unwrap();
        let url = Url::parse("http://127.0.0.1:9/api/v2/eq/eew").unwrap();

        let err = client.get::<serde_json::Value>("local", url, &[]).await.unwrap_err();
        assert!(err.is_network(), "got {:?}", err);
        assert!(err.is_retryable());
    }
}
