//! Static tables and tunables shared by the transports and the coordinator.

use std::time::Duration;

/// Identifying `User-Agent` sent with every HTTP request and the WebSocket upgrade.
pub const CLIENT_USER_AGENT: &str = concat!(
    "lib_trem/",
    env!("CARGO_PKG_VERSION"),
    " (earthquake early-warning client)"
);

/// HTTP pull nodes, in rotation order.
pub const BASE_URLS: &[(&str, &str)] = &[
    ("tainan_cache", "https://api-1.exptech.dev"),
    ("taipei_cache", "https://api-2.exptech.dev"),
    ("taipei", "https://lb-1.exptech.dev"),
    ("pingtung", "https://lb-2.exptech.dev"),
];

/// Streaming nodes, in rotation order.
pub const WS_URLS: &[(&str, &str)] = &[
    ("taipei_ws", "wss://lb-1.exptech.dev/websocket"),
    ("pingtung_ws", "wss://lb-2.exptech.dev/websocket"),
    ("taipei_ws_2", "wss://lb-3.exptech.dev/websocket"),
    ("pingtung_ws_2", "wss://lb-4.exptech.dev/websocket"),
];

/// Report summary endpoint; detail lives at `{REPORT_URL}/{id}`.
pub const REPORT_URL: &str = "https://api-2.exptech.dev/api/v2/eq/report";

/// Version segment of the notification path `/api/v{n}/eq/eew`.
pub const API_VERSION: u8 = 2;

/// Close code for an intentional local disconnect. Never auto-reconnected.
pub const INTENTIONAL_CLOSE_CODE: u16 = 999;

/// Notification revisions kept in the recent cache.
pub const RECENT_CACHE_LIMIT: usize = 10;
/// Reports kept in the report cache.
pub const REPORT_CACHE_LIMIT: usize = 5;

/// Store key of the notification document.
pub const STORE_KEY_RECENT: &str = "recent_data";
/// Store key of the report document.
pub const STORE_KEY_REPORT: &str = "report";

/// Author assigned to reports whose id normalises to the official form.
pub const OFFICIAL_REPORT_AUTHOR: &str = "cwa";
/// Author assigned to every other report.
pub const FALLBACK_REPORT_AUTHOR: &str = "ExpTechTW";

/// Default poll interval.
pub const BASE_INTERVAL: Duration = Duration::from_secs(5);
/// Poll interval when a custom HTTP URL is pinned.
pub const FAST_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound of the back-off interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Consecutive-failure counter value that escalates to a session reload.
pub const RETRY_CEILING: u32 = 10;
/// Minimum gap between two full report refreshes.
pub const REPORT_REFRESH_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Number of report summaries requested per refresh.
pub const REPORT_FETCH_LIMIT: usize = 5;

/// Total HTTP request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// HTTP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// HTTP read timeout.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between two heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Delay between receive retries after a transport error.
pub const STREAM_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Receive retries before the listener gives up.
pub const STREAM_MAX_RETRIES: u32 = 5;
/// Pause requested by an `info` frame with code 503.
pub const SERVER_BUSY_BACKOFF: Duration = Duration::from_secs(5);

/// Latency at or above which the status reads "6s+".
pub const LATENCY_SATURATION: Duration = Duration::from_secs(6);

/// Upstream streaming services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebSocketService {
    /// Real-time station ground motion.
    RealtimeStation,
    /// Real-time station waveforms.
    RealtimeWave,
    /// Earthquake early warnings.
    Eew,
    /// TREM-issued early warnings.
    TremEew,
    /// Official earthquake reports.
    Report,
    /// Official tsunami information.
    Tsunami,
    /// Official intensity flash reports.
    CwaIntensity,
    /// TREM intensity flash reports.
    TremIntensity,
}

impl WebSocketService {
    /// Wire identifier used in the `start` handshake.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebSocketService::RealtimeStation => "trem.rts",
            WebSocketService::RealtimeWave => "trem.rtw",
            WebSocketService::Eew => "websocket.eew",
            WebSocketService::TremEew => "trem.eew",
            WebSocketService::Report => "websocket.report",
            WebSocketService::Tsunami => "websocket.tsunami",
            WebSocketService::CwaIntensity => "cwa.intensity",
            WebSocketService::TremIntensity => "trem.intensity",
        }
    }

    /// Services subscribed when the configuration does not name any.
    pub fn defaults() -> Vec<WebSocketService> {
        vec![
            WebSocketService::CwaIntensity,
            WebSocketService::Eew,
            WebSocketService::Report,
            WebSocketService::TremIntensity,
            WebSocketService::Tsunami,
        ]
    }
}
