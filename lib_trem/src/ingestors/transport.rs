//! Transport contracts the coordinator drives. The ExpTech clients implement
//! them; tests substitute in-memory doubles.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{NotificationRecord, ReportRecord, StreamPayload};
use crate::retrieve::{ResolvedRoute, RouteRequest};

/// Lifecycle of a streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Dialling.
    Connecting,
    /// Handshake sent, waiting for the subscription list.
    Subscribing,
    /// Subscription confirmed.
    Streaming,
    /// Connected, but credential or subscription lost.
    Degraded,
}

/// Source of official reports.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Latest `limit` summaries, newest first. Empty on any failure.
    async fn fetch_report_summaries(&self, limit: usize) -> Vec<ReportRecord>;

    /// Detail of one report, `None` on any failure.
    async fn fetch_report_detail(&self, report_id: &str) -> Option<ReportRecord>;
}

/// Pull transport.
#[async_trait]
pub trait PullTransport: ReportSource {
    /// Resolves and stores the route. `excluded` only applies to rotation.
    fn initialize_route(&mut self, request: &RouteRequest, excluded: &[String]) -> Result<ResolvedRoute>;

    /// Marks the current node unavailable and rotates to the next one.
    fn rotate(&mut self) -> Result<ResolvedRoute>;

    /// Current route.
    fn route(&self) -> Option<&ResolvedRoute>;

    /// Nodes currently excluded from rotation.
    fn unavailable(&self) -> &[String];

    /// One poll of the notification endpoint.
    async fn fetch_notifications(&mut self) -> Result<Vec<NotificationRecord>>;

    /// Round-trip time of the last successful poll.
    fn latency(&self) -> Option<Duration>;
}

/// Push transport.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Resolves and stores the route. `excluded` only applies to rotation.
    fn initialize_route(&mut self, request: &RouteRequest, excluded: &[String]) -> Result<ResolvedRoute>;

    /// Marks the current node unavailable and rotates to the next one.
    fn rotate(&mut self) -> Result<ResolvedRoute>;

    /// Current route.
    fn route(&self) -> Option<&ResolvedRoute>;

    /// Nodes currently excluded from rotation.
    fn unavailable(&self) -> &[String];

    /// Opens the connection, replacing any running one.
    async fn connect(&mut self) -> Result<()>;

    /// Closes with the intentional-close code and stops the background work.
    async fn disconnect(&mut self);

    /// `disconnect` followed by `connect`.
    async fn reconnect(&mut self) -> Result<()>;

    /// True while the receive loop is alive.
    fn is_running(&self) -> bool;

    /// Services confirmed by the server.
    fn subscriptions(&self) -> Vec<String>;

    /// True once the server rejected the credential or confirmed an empty
    /// subscription list.
    fn auth_revoked(&self) -> bool;

    /// Connection lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Latest decoded payload.
    fn recv(&self) -> Result<StreamPayload>;

    /// Gap between the last ping and the last pong.
    fn heartbeat_latency(&self) -> Option<Duration>;
}
