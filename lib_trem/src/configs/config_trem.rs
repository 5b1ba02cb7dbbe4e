//! # Runtime Configuration
//!
//! `TremConfig` carries every tunable of a session. It deserialises from a
//! camelCase JSON file, can be overlaid with another partial file through
//! `merge`, and falls back to the constants in `configs::constants`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants::*;
use crate::error::{Result, TremError};

/// Settings for one acquisition session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TremConfig {
    /// Provider filter sent as `?type=`; empty adopts every author.
    pub provider: String,
    /// Streaming credential. Streaming is disabled when absent.
    pub access_token: Option<String>,
    /// Streaming service ids to subscribe to.
    pub services: Vec<String>,
    /// Version segment of the notification path.
    pub api_version: u8,
    /// Pinned HTTP node name.
    pub http_node: Option<String>,
    /// Pinned HTTP URL, wins over `http_node`.
    pub http_url: Option<String>,
    /// Pinned streaming node name.
    pub ws_node: Option<String>,
    /// Pinned streaming URL, wins over `ws_node`.
    pub ws_url: Option<String>,
    /// Report summary endpoint.
    pub report_url: String,
    /// Poll interval in seconds.
    pub base_interval_secs: u64,
    /// Poll interval in seconds while a custom HTTP URL is pinned.
    pub fast_interval_secs: u64,
    /// Back-off ceiling in seconds.
    pub max_interval_secs: u64,
    /// Failure counter value that escalates to a reload.
    pub retry_ceiling: u32,
    /// Minimum seconds between two report refreshes.
    pub report_refresh_secs: u64,
    /// Number of summaries requested per report refresh.
    pub report_fetch_limit: usize,
    /// Total HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Heartbeat period in seconds.
    pub heartbeat_secs: u64,
    /// Directory holding the persisted documents.
    pub store_dir: PathBuf,
}

impl Default for TremConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            access_token: None,
            services: WebSocketService::defaults()
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            api_version: API_VERSION,
            http_node: None,
            http_url: None,
            ws_node: None,
            ws_url: None,
            report_url: REPORT_URL.to_string(),
            base_interval_secs: BASE_INTERVAL.as_secs(),
            fast_interval_secs: FAST_INTERVAL.as_secs(),
            max_interval_secs: MAX_INTERVAL.as_secs(),
            retry_ceiling: RETRY_CEILING,
            report_refresh_secs: REPORT_REFRESH_WINDOW.as_secs(),
            report_fetch_limit: REPORT_FETCH_LIMIT,
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            connect_timeout_secs: CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: READ_TIMEOUT.as_secs(),
            heartbeat_secs: HEARTBEAT_INTERVAL.as_secs(),
            store_dir: PathBuf::from("./trem_store"),
        }
    }
}

impl TremConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<TremConfig>(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays the optional settings of `other` onto `self`.
    ///
    /// Only the pinned-route fields and the token are optional; scalar fields
    /// are taken from `other` when they differ from the defaults.
    pub fn merge(self, other: TremConfig) -> TremConfig {
        let defaults = TremConfig::default();
        macro_rules! pick {
            ($field:ident) => {
                if other.$field != defaults.$field {
                    other.$field
                } else {
                    self.$field
                }
            };
        }
        TremConfig {
            access_token: other.access_token.or(self.access_token),
            http_node: other.http_node.or(self.http_node),
            http_url: other.http_url.or(self.http_url),
            ws_node: other.ws_node.or(self.ws_node),
            ws_url: other.ws_url.or(self.ws_url),
            provider: pick!(provider),
            services: pick!(services),
            api_version: pick!(api_version),
            report_url: pick!(report_url),
            base_interval_secs: pick!(base_interval_secs),
            fast_interval_secs: pick!(fast_interval_secs),
            max_interval_secs: pick!(max_interval_secs),
            retry_ceiling: pick!(retry_ceiling),
            report_refresh_secs: pick!(report_refresh_secs),
            report_fetch_limit: pick!(report_fetch_limit),
            request_timeout_secs: pick!(request_timeout_secs),
            connect_timeout_secs: pick!(connect_timeout_secs),
            read_timeout_secs: pick!(read_timeout_secs),
            heartbeat_secs: pick!(heartbeat_secs),
            store_dir: pick!(store_dir),
        }
    }

    /// Rejects settings the coordinator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.base_interval_secs == 0 {
            return Err(TremError::Config("baseIntervalSecs must be positive".into()));
        }
        if self.max_interval_secs < self.base_interval_secs {
            return Err(TremError::Config(
                "maxIntervalSecs must not be below baseIntervalSecs".into(),
            ));
        }
        if self.retry_ceiling < 2 {
            return Err(TremError::Config("retryCeiling must be at least 2".into()));
        }
        Ok(())
    }

    /// True when a streaming credential is configured.
    pub fn streaming_enabled(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Query parameters attached to every notification poll.
    pub fn poll_params(&self) -> Vec<(String, String)> {
        if self.provider.is_empty() {
            Vec::new()
        } else {
            vec![("type".to_string(), self.provider.clone())]
        }
    }

    /// Poll interval.
    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_secs)
    }

    /// Poll interval for a pinned custom URL.
    pub fn fast_interval(&self) -> Duration {
        Duration::from_secs(self.fast_interval_secs)
    }

    /// Back-off ceiling.
    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    /// Minimum gap between report refreshes.
    pub fn report_refresh_window(&self) -> Duration {
        Duration::from_secs(self.report_refresh_secs)
    }

    /// Heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"provider": "cwa", "accessToken": "abc"}}"#).unwrap();

        let config = TremConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider, "cwa");
        assert!(config.streaming_enabled());
        assert_eq!(config.base_interval(), BASE_INTERVAL);
        assert_eq!(config.poll_params(), vec![("type".to_string(), "cwa".to_string())]);
    }

    #[test]
    fn merge_prefers_explicit_values() {
        let file = TremConfig { http_node: Some("taipei".into()), ..Default::default() };
        let cli = TremConfig { base_interval_secs: 2, ..Default::default() };

        let merged = file.merge(cli);
        assert_eq!(merged.http_node.as_deref(), Some("taipei"));
        assert_eq!(merged.base_interval_secs, 2);
        assert_eq!(merged.retry_ceiling, RETRY_CEILING);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = TremConfig { base_interval_secs: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
