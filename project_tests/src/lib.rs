//! # Project Test Support
//!
//! Local stand-ins for the ExpTech upstream, used by the integration tests
//! under `tests/`.
//!
//! ## Contained Modules:
//! - **`mock_api`**: axum server answering the notification and report endpoints.
//! - **`mock_stream`**: WebSocket node that answers the `start` handshake and
//!   pushes scripted frames.

use std::time::Duration;

/// Mock HTTP API.
pub mod mock_api;
/// Mock streaming node.
pub mod mock_stream;

pub use mock_api::MockApi;
pub use mock_stream::{MockStream, StreamReply};

/// Polls `check` every 20 ms until it holds, panicking after 5 s.
pub async fn eventually<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
