//! # Error Types
//!
//! A single error enum shared by every layer of the acquisition client. The
//! variants are split along the lines the coordinator cares about: transient
//! transport failures that are retried or rotated away from, and escalating
//! failures (handshake, authentication) that are handed back to the host.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised by the acquisition client.
#[derive(Error, Debug)]
pub enum TremError {
    /// The HTTP request never produced a response (connect failure, timeout).
    #[error("HTTP transport to node '{node}' failed: {source}")]
    Transport {
        /// Node the request was sent to.
        node: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The node answered with a non-2xx status.
    #[error("HTTP node '{node}' answered with status {status}")]
    Status {
        /// Node the request was sent to.
        node: String,
        /// Returned status code.
        status: u16,
    },

    /// A request through the retry middleware failed.
    #[error("HTTP request failed after retries: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// A payload could not be decoded.
    #[error("JSON decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The string could not be parsed as a URL.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// Offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The URL parsed but uses a scheme outside http/https/ws/wss.
    #[error("Unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    /// An endpoint pool was built from an empty table.
    #[error("Endpoint pool cannot be empty")]
    EmptyPool,

    /// Every node in the pool is excluded.
    #[error("No available nodes")]
    NoAvailableNodes,

    /// A transport was used before a route was resolved.
    #[error("{0} client base URL is not set")]
    RouteUnset(&'static str),

    /// The streaming server rejected or failed the opening handshake.
    #[error("WebSocket handshake with node '{node}' failed: {source}")]
    Handshake {
        /// Node the handshake was attempted against.
        node: String,
        /// Underlying tungstenite error.
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// A frame could not be sent or received on an open stream.
    #[error("WebSocket transport error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// The streaming client has no live connection.
    #[error("WebSocket connection is not established")]
    NotConnected,

    /// The streaming client is connected but has not produced a payload yet.
    #[error("No message has been received on the WebSocket yet")]
    NoMessage,

    /// The persistent store failed to load or save a document.
    #[error("Store error for key '{key}': {reason}")]
    Store {
        /// Document key.
        key: String,
        /// Failure description.
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or service-call arguments.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tungstenite::Error> for TremError {
    fn from(err: tungstenite::Error) -> Self {
        TremError::WebSocket(Box::new(err))
    }
}

impl TremError {
    /// True for failures that the coordinator absorbs with retry and node rotation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TremError::Transport { .. }
                | TremError::Status { .. }
                | TremError::Middleware(_)
                | TremError::Decode(_)
                | TremError::WebSocket(_)
                | TremError::NotConnected
                | TremError::NoMessage
        )
    }

    /// True when the HTTP request failed before a status line was read.
    pub fn is_network(&self) -> bool {
        matches!(self, TremError::Transport { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TremError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_are_retryable_but_not_network() {
        let err = TremError::Status { node: "taipei".into(), status: 502 };
        assert!(err.is_retryable());
        assert!(!err.is_network());
        assert_eq!(err.to_string(), "HTTP node 'taipei' answered with status 502");
    }

    #[test]
    fn route_and_config_errors_escalate() {
        assert!(!TremError::NoAvailableNodes.is_retryable());
        assert!(!TremError::Config("missing".into()).is_retryable());
        assert_eq!(TremError::RouteUnset("HTTP").to_string(), "HTTP client base URL is not set");
    }
}
