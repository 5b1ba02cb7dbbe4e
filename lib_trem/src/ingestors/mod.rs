//! # Ingestors Module
//!
//! Upstream feeds of earthquake notifications, reports and intensity messages.
//!
//! ## Contained Modules:
//!
//! - **`transport`**: the `PullTransport`, `PushTransport` and `ReportSource`
//!   traits the coordinator is generic over, plus the streaming
//!   `ConnectionState`.
//! - **`exptech_http`**: polls `/api/v{n}/eq/eew` on a rotating node and
//!   fetches report summaries and details.
//! - **`exptech_wss`**: the streaming client with its supervised listener
//!   and heartbeat tasks.

/// Transport contracts.
pub mod transport;
/// HTTP pull client.
pub mod exptech_http;
/// WebSocket push client.
pub mod exptech_wss;

pub use exptech_http::ExpTechHttpClient;
pub use exptech_wss::{decode_frame, ExpTechWsClient, Frame};
pub use transport::{ConnectionState, PullTransport, PushTransport, ReportSource};
