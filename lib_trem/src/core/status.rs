//! Which transport is authoritative right now, and how fast it answers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::configs::constants::LATENCY_SATURATION;

/// Transport currently feeding the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// Streaming with a confirmed subscription.
    #[serde(rename = "websocket")]
    WebSocket,
    /// Streaming configured but currently polled over HTTP.
    #[serde(rename = "http (fallback)")]
    HttpFallback,
    /// Streaming not configured.
    #[serde(rename = "http")]
    Http,
}

impl ConnectionMode {
    /// Display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::WebSocket => "websocket",
            ConnectionMode::HttpFallback => "http (fallback)",
            ConnectionMode::Http => "http",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency label: seconds with millisecond precision, or `6s+` once saturated.
pub fn latency_label(latency: Duration) -> String {
    if latency >= LATENCY_SATURATION {
        "6s+".to_string()
    } else {
        format!("{:.3}", latency.as_secs_f64())
    }
}

/// HTTP latency estimate: measured round trip, plus the poll interval when
/// that exceeds one second.
pub fn http_latency(measured: Duration, interval: Duration) -> Duration {
    if interval > Duration::from_secs(1) {
        measured + interval
    } else {
        measured
    }
}

/// Snapshot published with every `HostEvent::ServerStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Authoritative transport.
    pub protocol: ConnectionMode,
    /// Node currently in use.
    pub current_node: Option<String>,
    /// Nodes excluded from rotation.
    pub unavailable: Vec<String>,
    /// Formatted latency, absent before the first measurement.
    pub latency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(ConnectionMode::HttpFallback.to_string(), "http (fallback)");
        assert_eq!(latency_label(Duration::from_millis(1234)), "1.234");
        assert_eq!(latency_label(Duration::from_secs(6)), "6s+");
    }

    #[test]
    fn poll_interval_only_counts_above_one_second() {
        let rtt = Duration::from_millis(200);
        assert_eq!(http_latency(rtt, Duration::from_secs(1)), rtt);
        assert_eq!(http_latency(rtt, Duration::from_secs(5)), Duration::from_millis(5200));
    }
}
