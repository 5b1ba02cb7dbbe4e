//! # Data Retrieval Module
//!
//! Everything needed to reach a remote node before any payload is decoded.
//!
//! ## Contained Modules:
//!
//! - **`endpoint`**: a URL restricted to `http`, `https`, `ws` and `wss`.
//! - **`endpoint_pool`**: round-robin over named nodes with a runtime
//!   exclusion set; bounded to one lap per call.
//! - **`route`**: the pinned-URL / pinned-node / rotation precedence shared
//!   by both transports.
//! - **`ky_http`**: the `reqwest` client with fixed headers and timeouts, and
//!   a `reqwest-retry` variant for the report endpoints.

/// Scheme-validated URL.
pub mod endpoint;
/// Cyclable node registry.
pub mod endpoint_pool;
/// Route precedence.
pub mod route;
/// HTTP client.
pub mod ky_http;

pub use endpoint::Endpoint;
pub use endpoint_pool::EndpointPool;
pub use ky_http::{ApiClient, ApiResponse, HttpTimeouts};
pub use route::{resolve_route, ResolvedRoute, RouteRequest};
