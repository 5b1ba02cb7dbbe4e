//! # Upstream Manager
//!
//! The acquisition coordinator. It owns both transports and the reconciler,
//! and on every scheduled tick decides which transport is authoritative.
//!
//! Streaming is preferred whenever it is running with a confirmed
//! subscription; otherwise the HTTP node is polled. Each transport keeps its
//! own failure counter: an elevated counter stretches the poll interval and
//! rotates that transport to another node, a counter at the ceiling asks the
//! host for a full reload. A rejected credential suspends the session and
//! asks the host to re-authenticate.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::backoff::RetryCounter;
use super::dispatcher::{Dispatcher, HostEvent};
use super::reconciler::DataReconciler;
use super::status::{http_latency, latency_label, ConnectionMode, ServerStatus};
use super::store::KeyValueStore;
use crate::configs::constants::OFFICIAL_REPORT_AUTHOR;
use crate::configs::TremConfig;
use crate::error::{Result, TremError};
use crate::ingestors::{PullTransport, PushTransport};
use crate::models::{CanonicalEew, NotificationRecord, StreamPayload};
use crate::retrieve::RouteRequest;

/// Operational states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Streaming is authoritative (or HTTP-only when no stream is configured).
    UsingStream,
    /// The stream failed; HTTP polling substitutes until it recovers.
    UsingHttpFallback,
    /// A reload was requested; ticks are no-ops until the host rebuilds.
    Reinitializing,
    /// Credential lost; ticks are no-ops until the host re-authenticates.
    Suspended,
}

/// Drives one session over a pull transport `H`, an optional push
/// transport `W` and a document store `S`.
pub struct AcquisitionCoordinator<H, W, S> {
    config: TremConfig,
    http: H,
    ws: Option<W>,
    reconciler: DataReconciler<S>,
    dispatcher: Dispatcher,
    mode: OperationMode,
    http_retry: RetryCounter,
    ws_retry: RetryCounter,
    resting_interval: Duration,
    update_interval: Duration,
    fetch_report: bool,
    report_attempt: Option<Instant>,
}

impl<H, W, S> AcquisitionCoordinator<H, W, S>
where
    H: PullTransport,
    W: PushTransport,
    S: KeyValueStore,
{
    /// Wires a session. Nothing is dialled until [`initialize`](Self::initialize).
    pub fn new(config: TremConfig, http: H, ws: Option<W>, store: S, dispatcher: Dispatcher) -> Self {
        let resting_interval = if config.http_url.is_some() {
            config.fast_interval()
        } else {
            config.base_interval()
        };
        Self {
            http_retry: RetryCounter::new(config.retry_ceiling),
            ws_retry: RetryCounter::new(config.retry_ceiling),
            reconciler: DataReconciler::new(store, config.provider.clone()),
            resting_interval,
            update_interval: resting_interval,
            mode: OperationMode::UsingStream,
            fetch_report: false,
            report_attempt: None,
            config,
            http,
            ws,
            dispatcher,
        }
    }

    /// Restores the documents, resolves both routes and opens the stream.
    ///
    /// A failed stream handshake leaves the session `Reinitializing`; the
    /// streaming client has already asked the host for a reload.
    pub async fn initialize(&mut self) -> Result<()> {
        // 1. Persisted state
        self.reconciler.load().await;

        // 2. HTTP route
        let request = RouteRequest {
            node: self.config.http_node.clone(),
            url: self.config.http_url.clone(),
        };
        let route = self.http.initialize_route(&request, &[])?;
        info!("HTTP node: {} ({})", route.node, route.endpoint);

        // 3. Stream
        if let Some(ws) = self.ws.as_mut() {
            let request = RouteRequest {
                node: self.config.ws_node.clone(),
                url: self.config.ws_url.clone(),
            };
            let route = ws.initialize_route(&request, &[])?;
            info!("WebSocket node: {} ({})", route.node, route.endpoint);
            if let Err(e) = ws.connect().await {
                self.mode = OperationMode::Reinitializing;
                return Err(e);
            }
        }
        Ok(())
    }

    /// One scheduled update. Returns the mode after the tick; sleep for
    /// [`update_interval`](Self::update_interval) before the next one.
    pub async fn tick(&mut self) -> OperationMode {
        if matches!(self.mode, OperationMode::Reinitializing | OperationMode::Suspended) {
            return self.mode;
        }

        // 1. Credential loss is not retried
        if self.check_authentication().await {
            return self.mode;
        }

        // 2. Streaming receive, HTTP poll when the stream is not authoritative
        let streamed = match self.ws.as_ref() {
            Some(ws) if !ws.is_running() => Some(Err(TremError::NotConnected)),
            Some(ws) if !ws.subscriptions().is_empty() => match ws.recv() {
                Err(TremError::NoMessage) => None,
                other => Some(other),
            },
            _ => None,
        };

        match streamed {
            Some(Ok(payload)) => {
                self.ws_retry.reset();
                if self.mode == OperationMode::UsingHttpFallback {
                    info!("WebSocket recovered, leaving HTTP fallback");
                    self.mode = OperationMode::UsingStream;
                    self.publish_status();
                }
                self.apply_payload(payload).await;
            }
            Some(Err(e)) => {
                warn!("WebSocket unavailable ({}), polling over HTTP", e);
                self.ws_retry.fail();
                if self.mode != OperationMode::UsingHttpFallback {
                    self.mode = OperationMode::UsingHttpFallback;
                    self.publish_status();
                }
                self.poll_http().await;
            }
            None => self.poll_http().await,
        }

        // 3. Escalation, back-off and rotation
        if self.mode == OperationMode::Reinitializing {
            return self.mode;
        }
        if self.http_retry.is_exhausted() || self.ws_retry.is_exhausted() {
            error!("The ExpTech server is not responding, requesting a reload");
            self.request_reload("retry ceiling reached");
            return self.mode;
        }
        self.recompute_interval();
        if self.http_retry.is_elevated() {
            self.rotate_http();
        }
        if self.ws_retry.is_elevated() {
            self.rotate_ws().await;
            if self.mode == OperationMode::Reinitializing {
                return self.mode;
            }
        }

        // 4. Report refresh
        self.refresh_reports().await;
        self.mode
    }

    async fn check_authentication(&mut self) -> bool {
        let Some(ws) = self.ws.as_mut() else {
            return false;
        };
        if !ws.auth_revoked() {
            return false;
        }

        error!("WebSocket credential rejected, re-authentication required");
        ws.disconnect().await;
        self.mode = OperationMode::Suspended;
        self.dispatcher.publish(HostEvent::ReauthenticationRequired {
            reason: "access token rejected or subscription list empty".into(),
        });
        true
    }

    async fn poll_http(&mut self) {
        match self.http.fetch_notifications().await {
            Ok(records) => {
                self.http_retry.reset();
                // Oldest first so the newest ends up at the head of the cache.
                for record in records.into_iter().rev() {
                    self.apply_notification(record).await;
                }
            }
            Err(e) if !e.is_retryable() => {
                error!("HTTP poll cannot continue: {}", e);
                self.request_reload(&e.to_string());
            }
            Err(e) => {
                let count = self.http_retry.fail();
                if e.is_network() {
                    warn!("HTTP poll failed on the network (attempt {}): {}", count, e);
                } else {
                    warn!("HTTP poll failed (attempt {}): {}", count, e);
                }
            }
        }
    }

    async fn apply_notification(&mut self, record: NotificationRecord) {
        let newly_official = record.author == OFFICIAL_REPORT_AUTHOR
            && !self.reconciler.recent().cache.iter().any(|r| r.id == record.id);
        let id = record.id.clone();

        match self.reconciler.load_recent_data(Some(record)).await {
            Ok(true) => {
                if newly_official {
                    self.fetch_report = true;
                }
                self.dispatcher.publish(HostEvent::EarthquakeUpdated { id });
            }
            Ok(false) => {}
            Err(e) => error!("Failed to store notification {}: {}", id, e),
        }
    }

    async fn apply_payload(&mut self, payload: StreamPayload) {
        match payload {
            StreamPayload::Eew(record) => self.apply_notification(record).await,
            StreamPayload::Report(report) => {
                match self.reconciler.load_report_data(Some(report), &self.http).await {
                    Ok(true) => {
                        let count = self.reconciler.report().cache.len();
                        self.dispatcher.publish(HostEvent::ReportsRefreshed { count });
                    }
                    Ok(false) => {}
                    Err(e) => error!("Failed to store report: {}", e),
                }
            }
            StreamPayload::Intensity(message) => {
                if let Err(e) = self.reconciler.store_intensity(message).await {
                    error!("Failed to store intensity message: {}", e);
                }
            }
            StreamPayload::Tsunami(bulletin) => {
                if let Err(e) = self.reconciler.store_tsunami(bulletin).await {
                    error!("Failed to store tsunami bulletin: {}", e);
                }
            }
            StreamPayload::Ntp(_) => debug!("(tick) ntp"),
        }
    }

    fn recompute_interval(&mut self) {
        let worst = if self.http_retry.count() >= self.ws_retry.count() {
            self.http_retry
        } else {
            self.ws_retry
        };
        self.update_interval = if worst.is_elevated() {
            worst.interval(self.config.base_interval(), self.config.max_interval())
        } else {
            self.resting_interval
        };
    }

    fn rotate_http(&mut self) {
        if self.http.route().is_some_and(|r| !r.rotated) {
            return;
        }
        let route = match self.http.rotate() {
            Ok(route) => route,
            Err(TremError::NoAvailableNodes) => {
                warn!("Every HTTP node failed once, starting a new lap");
                match self.http.initialize_route(&RouteRequest::rotate(), &[]) {
                    Ok(route) => route,
                    Err(e) => {
                        error!("HTTP rotation failed: {}", e);
                        return;
                    }
                }
            }
            Err(e) => {
                error!("HTTP rotation failed: {}", e);
                return;
            }
        };
        info!("Switched HTTP node to {}", route.node);
        self.publish_status();
    }

    async fn rotate_ws(&mut self) {
        let Some(ws) = self.ws.as_mut() else {
            return;
        };
        if ws.route().is_some_and(|r| r.rotated) {
            if let Err(e) = ws.rotate() {
                warn!("WebSocket rotation failed: {}", e);
                if ws.initialize_route(&RouteRequest::rotate(), &[]).is_err() {
                    return;
                }
            }
        }
        if let Err(e) = ws.reconnect().await {
            warn!("WebSocket reconnect failed: {}", e);
            self.mode = OperationMode::Reinitializing;
        }
    }

    async fn refresh_reports(&mut self) {
        let window = self.config.report_refresh_window();
        let wanted = self.fetch_report || self.reconciler.report().cache.is_empty();
        if !wanted || !self.reconciler.report_refresh_due(window) {
            return;
        }
        // Failed or empty attempts wait out the same window.
        if self.report_attempt.is_some_and(|at| at.elapsed() < window) {
            return;
        }

        match self.refresh_reports_now().await {
            Ok(true) => {}
            Ok(false) => debug!("Report server returned nothing"),
            Err(e) => error!("Failed to store refreshed reports: {}", e),
        }
    }

    /// Replaces the report cache right away, ignoring the refresh window.
    /// Returns `false` when the report server had nothing.
    pub async fn refresh_reports_now(&mut self) -> Result<bool> {
        self.report_attempt = Some(Instant::now());
        if !self.reconciler.fetch_report(&self.http, self.config.report_fetch_limit).await? {
            return Ok(false);
        }
        self.fetch_report = false;
        let count = self.reconciler.report().cache.len();
        self.dispatcher.publish(HostEvent::ReportsRefreshed { count });
        Ok(true)
    }

    fn request_reload(&mut self, reason: &str) {
        self.mode = OperationMode::Reinitializing;
        self.dispatcher.publish(HostEvent::ReloadRequested { reason: reason.to_string() });
    }

    fn publish_status(&self) {
        self.dispatcher.publish(HostEvent::ServerStatus(self.server_status()));
    }

    /// Transport currently authoritative.
    pub fn connection_mode(&self) -> ConnectionMode {
        match self.ws.as_ref() {
            Some(_) if self.mode == OperationMode::UsingHttpFallback => ConnectionMode::HttpFallback,
            Some(ws) if ws.is_running() => ConnectionMode::WebSocket,
            _ => ConnectionMode::Http,
        }
    }

    /// Protocol, node, exclusions and latency of the authoritative transport.
    pub fn server_status(&self) -> ServerStatus {
        let protocol = self.connection_mode();
        match (protocol, self.ws.as_ref()) {
            (ConnectionMode::WebSocket, Some(ws)) => ServerStatus {
                protocol,
                current_node: ws.route().map(|r| r.node.clone()),
                unavailable: ws.unavailable().to_vec(),
                latency: ws.heartbeat_latency().map(latency_label),
            },
            _ => ServerStatus {
                protocol,
                current_node: self.http.route().map(|r| r.node.clone()),
                unavailable: self.http.unavailable().to_vec(),
                latency: self
                    .http
                    .latency()
                    .map(|measured| latency_label(http_latency(measured, self.update_interval))),
            },
        }
    }

    /// Pins the HTTP transport to a node or URL. A URL switches to the fast
    /// poll interval, a node restores the base interval.
    pub fn set_http_node(&mut self, node: Option<String>, url: Option<String>) -> Result<ServerStatus> {
        if node.is_none() && url.is_none() {
            return Err(TremError::Config("a node or a URL is required".into()));
        }
        let custom_url = url.is_some();
        let route = self.http.initialize_route(&RouteRequest { node, url }, &[])?;
        info!("HTTP node set to {} ({})", route.node, route.endpoint);

        self.resting_interval = if custom_url {
            self.config.fast_interval()
        } else {
            self.config.base_interval()
        };
        self.http_retry.reset();
        self.recompute_interval();

        let status = self.server_status();
        self.dispatcher.publish(HostEvent::ServerStatus(status.clone()));
        Ok(status)
    }

    /// Pins the streaming transport to a node or URL and reconnects.
    pub async fn set_ws_node(&mut self, node: Option<String>, url: Option<String>) -> Result<ServerStatus> {
        if node.is_none() && url.is_none() {
            return Err(TremError::Config("a node or a URL is required".into()));
        }
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| TremError::Config("streaming is not configured".into()))?;
        let route = ws.initialize_route(&RouteRequest { node, url }, &[])?;
        info!("WebSocket node set to {} ({})", route.node, route.endpoint);

        if let Err(e) = ws.reconnect().await {
            self.mode = OperationMode::Reinitializing;
            return Err(e);
        }
        self.ws_retry.reset();

        let status = self.server_status();
        self.dispatcher.publish(HostEvent::ServerStatus(status.clone()));
        Ok(status)
    }

    /// Sets or clears the simulation override.
    pub async fn simulate(&mut self, record: Option<NotificationRecord>) -> Result<()> {
        let active = record.is_some();
        self.reconciler.set_simulation(record).await?;
        self.dispatcher.publish(HostEvent::SimulationChanged { active });
        Ok(())
    }

    /// Canonical record for display.
    pub fn load_eew_data(&self, selector: Option<&str>) -> Option<CanonicalEew> {
        self.reconciler.load_eew_data(selector)
    }

    /// Closes the stream and flushes both documents.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(ws) = self.ws.as_mut() {
            if ws.is_running() {
                ws.disconnect().await;
            }
        }
        self.reconciler.flush().await?;
        info!("Session shut down");
        Ok(())
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Delay before the next tick.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn reconciler(&self) -> &DataReconciler<S> {
        &self.reconciler
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn ws(&self) -> Option<&W> {
        self.ws.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
