//! # Configuration Modules
//!
//! This module aggregates the runtime configuration of a session and the
//! static tables (node pools, service ids, intervals) it defaults to.

/// Node tables, service ids, intervals and timeouts.
pub mod constants;

/// The serde-backed session configuration.
pub mod config_trem;

pub use config_trem::TremConfig;
pub use constants::WebSocketService;
