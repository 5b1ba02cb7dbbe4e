//! # ExpTech HTTP Client
//!
//! Pull transport against the ExpTech node pool. The notification poll goes
//! out without retries so the coordinator sees every failure and can decide
//! between retrying and rotating; report summaries and details go through the
//! retry middleware and degrade to "nothing new" on failure.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use super::transport::{PullTransport, ReportSource};
use crate::configs::constants::BASE_URLS;
use crate::configs::TremConfig;
use crate::error::{Result, TremError};
use crate::models::{NotificationRecord, ReportRecord};
use crate::retrieve::{resolve_route, ApiClient, EndpointPool, HttpTimeouts, ResolvedRoute, RouteRequest};

/// Retries for the report endpoints.
const REPORT_RETRIES: u32 = 2;

/// HTTP pull transport.
pub struct ExpTechHttpClient {
    api: ApiClient,
    pool: EndpointPool,
    api_version: u8,
    params: Vec<(String, String)>,
    report_url: String,
    route: Option<ResolvedRoute>,
    unavailable: Vec<String>,
    latency: Option<Duration>,
}

impl ExpTechHttpClient {
    /// Builds a client over the built-in node table.
    pub fn new(config: &TremConfig) -> Result<Self> {
        Self::with_pool(config, EndpointPool::new(BASE_URLS)?)
    }

    /// Builds a client over a custom node table.
    pub fn with_pool(config: &TremConfig, pool: EndpointPool) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(HttpTimeouts::from(config), REPORT_RETRIES)?,
            pool,
            api_version: config.api_version,
            params: config.poll_params(),
            report_url: config.report_url.trim_end_matches('/').to_string(),
            route: None,
            unavailable: Vec::new(),
            latency: None,
        })
    }

    fn resolve(&mut self, request: &RouteRequest) -> Result<ResolvedRoute> {
        let version = self.api_version;
        let route = resolve_route(&mut self.pool, request, &self.unavailable, |base| {
            format!("{}/api/v{}/eq/eew", base.trim_end_matches('/'), version)
        })?;
        if !route.endpoint.is_http() {
            return Err(TremError::UnsupportedScheme(route.endpoint.url().scheme().to_string()));
        }
        if !route.rotated {
            self.unavailable.clear();
        }
        debug!("HTTP route: {} -> {}", route.node, route.endpoint);
        self.route = Some(route.clone());
        Ok(route)
    }

    /// Decodes each element on its own; malformed entries are dropped.
    fn decode_each<T: serde::de::DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<T>(item) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Skipping malformed {}: {}", what, e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ReportSource for ExpTechHttpClient {
    async fn fetch_report_summaries(&self, limit: usize) -> Vec<ReportRecord> {
        let url = match Url::parse(&self.report_url) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid report URL {}: {}", self.report_url, e);
                return Vec::new();
            }
        };
        let query = [("limit".to_string(), limit.to_string())];

        match self.api.get_with_retry::<Vec<Value>>(url, &query).await {
            Ok(resp) if resp.success => Self::decode_each(resp.data.unwrap_or_default(), "report summary"),
            Ok(resp) => {
                error!("Failed fetching data from report server, (HTTP Status Code = {})", resp.status);
                Vec::new()
            }
            Err(e) => {
                error!("Failed fetching data from report server, {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_report_detail(&self, report_id: &str) -> Option<ReportRecord> {
        let url = Url::parse(&format!("{}/{}", self.report_url, report_id))
            .inspect_err(|e| error!("Invalid report detail URL for {}: {}", report_id, e))
            .ok()?;

        match self.api.get_with_retry::<ReportRecord>(url, &[]).await {
            Ok(resp) if resp.success => resp.data,
            Ok(resp) => {
                error!(
                    "Failed fetching report {} from report server, (HTTP Status Code = {})",
                    report_id, resp.status
                );
                None
            }
            Err(e) => {
                error!("Failed fetching report {} from report server, {}", report_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl PullTransport for ExpTechHttpClient {
    fn initialize_route(&mut self, request: &RouteRequest, excluded: &[String]) -> Result<ResolvedRoute> {
        self.unavailable = excluded.to_vec();
        self.resolve(request)
    }

    fn rotate(&mut self) -> Result<ResolvedRoute> {
        if let Some(current) = self.route.as_ref().filter(|r| r.rotated) {
            if !self.unavailable.contains(&current.node) {
                self.unavailable.push(current.node.clone());
            }
        }
        self.resolve(&RouteRequest::rotate())
    }

    fn route(&self) -> Option<&ResolvedRoute> {
        self.route.as_ref()
    }

    fn unavailable(&self) -> &[String] {
        &self.unavailable
    }

    async fn fetch_notifications(&mut self) -> Result<Vec<NotificationRecord>> {
        let route = self.route.clone().ok_or(TremError::RouteUnset("HTTP"))?;
        let start = Instant::now();

        let resp = self
            .api
            .get::<Vec<Value>>(&route.node, route.endpoint.url().clone(), &self.params)
            .await
            .inspect_err(|e| error!("Failed fetching data from HTTP API({}), {}", route.node, e))?;

        if !resp.success {
            error!(
                "Failed fetching data from HTTP API({}), (HTTP Status Code = {})",
                route.node, resp.status
            );
            return Err(TremError::Status { node: route.node, status: resp.status });
        }

        self.unavailable.clear();
        self.latency = Some(start.elapsed());
        Ok(Self::decode_each(resp.data.unwrap_or_default(), "notification"))
    }

    fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ExpTechHttpClient {
        ExpTechHttpClient::new(&TremConfig::default()).unwrap()
    }

    #[test]
    fn node_routes_get_the_versioned_path() {
        let mut http = client();
        let route = http
            .initialize_route(&RouteRequest { node: Some("taipei".into()), url: None }, &[])
            .unwrap();
        assert_eq!(route.endpoint.as_str(), "https://lb-1.exptech.dev/api/v2/eq/eew");
    }

    #[test]
    fn rotation_accumulates_unavailable_nodes() {
        let mut http = client();
        assert_eq!(http.initialize_route(&RouteRequest::rotate(), &[]).unwrap().node, "tainan_cache");
        assert_eq!(http.rotate().unwrap().node, "taipei_cache");
        assert_eq!(http.rotate().unwrap().node, "taipei");
        assert_eq!(http.unavailable(), ["tainan_cache", "taipei_cache"]);
        assert_eq!(http.rotate().unwrap().node, "pingtung");
        assert!(matches!(http.rotate(), Err(TremError::NoAvailableNodes)));
    }

    #[test]
    fn pinned_url_clears_exclusions() {
        let mut http = client();
        http.initialize_route(&RouteRequest::rotate(), &["taipei".into()]).unwrap();
        let route = http
            .initialize_route(
                &RouteRequest { node: None, url: Some("http://127.0.0.1:8080/eew".into()) },
                &["taipei".into()],
            )
            .unwrap();
        assert!(!route.rotated);
        assert!(http.unavailable().is_empty());
    }

    #[test]
    fn websocket_url_is_rejected() {
        let mut http = client();
        let request = RouteRequest { node: None, url: Some("wss://127.0.0.1:8080/websocket".into()) };
        assert!(matches!(http.initialize_route(&request, &[]), Err(TremError::UnsupportedScheme(s)) if s == "wss"));
        assert!(http.route().is_none());
    }

    #[tokio::test]
    async fn unrouted_fetch_fails() {
        let mut http = client();
        assert!(matches!(http.fetch_notifications().await, Err(TremError::RouteUnset("HTTP"))));
    }
}
