//! # ExpTech WebSocket Client
//!
//! Push transport against the ExpTech streaming nodes.
//!
//! ## Lifecycle
//! `connect` dials the resolved node with the client `User-Agent`, sends the
//! `start` handshake straight away and spawns two supervised tasks sharing
//! one `CancellationToken`:
//!
//! - **listener**: reads frames, answers pings, decodes text frames and keeps
//!   the latest data payload for `recv`. A close with any code other than
//!   999 re-dials the same node in place; if that fails the host is asked for
//!   a reload. Read errors are retried a bounded number of times.
//! - **heartbeat**: pings every `heartbeat_secs`.
//!
//! `disconnect` cancels the token, joins both tasks and then closes the
//! socket with code 999. A failed opening handshake is not retried locally:
//! it publishes a reload request and fails the call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::transport::{ConnectionState, PushTransport};
use crate::configs::constants::{
    CLIENT_USER_AGENT, INTENTIONAL_CLOSE_CODE, SERVER_BUSY_BACKOFF, STREAM_MAX_RETRIES,
    STREAM_RETRY_DELAY, WS_URLS,
};
use crate::configs::TremConfig;
use crate::core::dispatcher::{Dispatcher, HostEvent};
use crate::error::{Result, TremError};
use crate::models::StreamPayload;
use crate::retrieve::{resolve_route, Endpoint, EndpointPool, ResolvedRoute, RouteRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server asks for the handshake again.
    Verify,
    /// `info` 200 with the confirmed services.
    Subscribed(Vec<String>),
    /// `info` 401: credential rejected.
    Unauthorized,
    /// `info` 503: server busy.
    Busy,
    /// Any other `info` code.
    Info(i64),
    /// A data payload.
    Payload(StreamPayload),
    /// Unknown type, logged and dropped.
    Ignored(String),
}

/// Decodes one text frame of the `{type, data, time}` envelope.
pub fn decode_frame(text: &str) -> Result<Frame> {
    let envelope: Value = serde_json::from_str(text)?;
    let kind = envelope.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let data = envelope.get("data").cloned().unwrap_or_else(|| json!({}));

    let frame = match kind.as_str() {
        "verify" => Frame::Verify,
        "info" => match data.get("code").and_then(Value::as_i64) {
            Some(200) => Frame::Subscribed(
                data.get("list")
                    .and_then(Value::as_array)
                    .map(|list| list.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                    .unwrap_or_default(),
            ),
            Some(401) => Frame::Unauthorized,
            Some(503) => Frame::Busy,
            other => Frame::Info(other.unwrap_or_default()),
        },
        "data" => {
            let inner = data.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
            match StreamPayload::from_tagged(&inner, data)? {
                Some(payload) => Frame::Payload(payload),
                None => Frame::Ignored(inner),
            }
        }
        _ => match StreamPayload::from_tagged(&kind, data)? {
            Some(payload) => Frame::Payload(payload),
            None => Frame::Ignored(kind),
        },
    };
    Ok(frame)
}

#[derive(Debug, Default)]
struct WsState {
    connection: ConnectionState,
    running: bool,
    credentials_sent: bool,
    auth_revoked: bool,
    subscriptions: Vec<String>,
    message: Option<StreamPayload>,
    last_ping: Option<Instant>,
    last_pong: Option<Instant>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<WsState>,
    sink: tokio::sync::Mutex<Option<WsSink>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, WsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn send(&self, message: Message) -> Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TremError::NotConnected)?;
        sink.send(message).await?;
        Ok(())
    }

    async fn send_handshake(&self, handshake: &str) -> Result<()> {
        self.send(Message::text(handshake.to_string())).await?;
        let mut state = self.state();
        state.credentials_sent = true;
        if state.connection != ConnectionState::Streaming {
            state.connection = ConnectionState::Subscribing;
        }
        debug!("(verify) > start handshake");
        Ok(())
    }
}

/// Everything needed to open a connection, cloneable into the listener.
#[derive(Debug, Clone)]
struct Dialer {
    node: String,
    endpoint: Endpoint,
    handshake: String,
}

impl Dialer {
    async fn dial(&self) -> Result<WsStream> {
        let handshake_err = |source| TremError::Handshake {
            node: self.node.clone(),
            source: Box::new(source),
        };
        let mut request = self.endpoint.as_str().into_client_request().map_err(handshake_err)?;
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let (stream, _) = connect_async(request).await.map_err(handshake_err)?;
        info!("Connected to WebSocket node {} ({})", self.node, self.endpoint);
        Ok(stream)
    }

    /// Dials, installs the new sink and sends the handshake.
    async fn open(&self, shared: &Shared) -> Result<WsSource> {
        shared.state().connection = ConnectionState::Connecting;
        let (sink, source) = self.dial().await?.split();
        *shared.sink.lock().await = Some(sink);
        shared.send_handshake(&self.handshake).await?;
        Ok(source)
    }
}

struct WsTasks {
    cancel: CancellationToken,
    listener: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

/// WebSocket push transport.
pub struct ExpTechWsClient {
    pool: EndpointPool,
    route: Option<ResolvedRoute>,
    unavailable: Vec<String>,
    access_token: String,
    services: Vec<String>,
    heartbeat_interval: Duration,
    dispatcher: Dispatcher,
    shared: Arc<Shared>,
    tasks: Option<WsTasks>,
}

impl ExpTechWsClient {
    /// Builds a client over the built-in node table.
    pub fn new(config: &TremConfig, dispatcher: Dispatcher) -> Result<Self> {
        Self::with_pool(config, dispatcher, EndpointPool::new(WS_URLS)?)
    }

    /// Builds a client over a custom node table.
    pub fn with_pool(config: &TremConfig, dispatcher: Dispatcher, pool: EndpointPool) -> Result<Self> {
        Ok(Self {
            pool,
            route: None,
            unavailable: Vec::new(),
            access_token: config.access_token.clone().unwrap_or_default(),
            services: config.services.clone(),
            heartbeat_interval: config.heartbeat_interval(),
            dispatcher,
            shared: Arc::new(Shared::default()),
            tasks: None,
        })
    }

    fn handshake(&self) -> String {
        json!({
            "type": "start",
            "key": self.access_token,
            "service": self.services,
        })
        .to_string()
    }

    fn resolve(&mut self, request: &RouteRequest) -> Result<ResolvedRoute> {
        let route = resolve_route(&mut self.pool, request, &self.unavailable, str::to_string)?;
        if !route.rotated {
            self.unavailable.clear();
        }
        if !route.endpoint.is_websocket() {
            warn!("WebSocket route {} does not use a ws scheme", route.endpoint);
        }
        debug!("WS route: {} -> {}", route.node, route.endpoint);
        self.route = Some(route.clone());
        Ok(route)
    }

    async fn stop_tasks(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.cancel.cancel();
            for (name, handle) in [("listener", tasks.listener), ("heartbeat", tasks.heartbeat)] {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        error!("WebSocket {} task panicked: {}", name, e);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PushTransport for ExpTechWsClient {
    fn initialize_route(&mut self, request: &RouteRequest, excluded: &[String]) -> Result<ResolvedRoute> {
        self.unavailable = excluded.to_vec();
        self.resolve(request)
    }

    fn rotate(&mut self) -> Result<ResolvedRoute> {
        if let Some(current) = self.route.as_ref().filter(|r| r.rotated) {
            if !self.unavailable.contains(&current.node) {
                self.unavailable.push(current.node.clone());
            }
        }
        self.resolve(&RouteRequest::rotate())
    }

    fn route(&self) -> Option<&ResolvedRoute> {
        self.route.as_ref()
    }

    fn unavailable(&self) -> &[String] {
        &self.unavailable
    }

    async fn connect(&mut self) -> Result<()> {
        if self.tasks.is_some() {
            self.disconnect().await;
        }

        let route = self.route.clone().ok_or(TremError::RouteUnset("WS"))?;
        let dialer = Dialer {
            node: route.node,
            endpoint: route.endpoint,
            handshake: self.handshake(),
        };

        // 1. Dial and handshake; failure here is escalated, not retried
        let source = match dialer.open(&self.shared).await {
            Ok(source) => source,
            Err(e) => {
                self.shared.state().connection = ConnectionState::Disconnected;
                error!("The ExpTech server is not responding: {}", e);
                self.dispatcher.publish(HostEvent::ReloadRequested {
                    reason: format!("WebSocket handshake with {} failed", dialer.node),
                });
                return Err(e);
            }
        };
        self.shared.state().running = true;

        // 2. Spawn the supervised background tasks
        let cancel = CancellationToken::new();
        let listener = tokio::spawn(listen(
            Arc::clone(&self.shared),
            source,
            dialer,
            cancel.clone(),
            self.dispatcher.clone(),
        ));
        let heartbeat = tokio::spawn(keepalive(
            Arc::clone(&self.shared),
            self.heartbeat_interval,
            cancel.clone(),
        ));
        self.tasks = Some(WsTasks { cancel, listener, heartbeat });
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stop_tasks().await;

        if let Some(mut sink) = self.shared.sink.lock().await.take() {
            let frame = CloseFrame {
                code: CloseCode::from(INTENTIONAL_CLOSE_CODE),
                reason: Utf8Bytes::from_static("disconnect"),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!("Close frame not delivered: {}", e);
            }
            if let Err(e) = sink.close().await {
                debug!("WebSocket sink did not close cleanly: {}", e);
            }
        }

        let mut state = self.shared.state();
        state.connection = ConnectionState::Disconnected;
        state.running = false;
        state.credentials_sent = false;
        state.subscriptions.clear();
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.disconnect().await;
        self.connect().await
    }

    fn is_running(&self) -> bool {
        self.shared.state().running
    }

    fn subscriptions(&self) -> Vec<String> {
        self.shared.state().subscriptions.clone()
    }

    fn auth_revoked(&self) -> bool {
        self.shared.state().auth_revoked
    }

    fn state(&self) -> ConnectionState {
        self.shared.state().connection
    }

    fn recv(&self) -> Result<StreamPayload> {
        if self.tasks.is_none() {
            return Err(TremError::NotConnected);
        }
        self.shared.state().message.clone().ok_or(TremError::NoMessage)
    }

    fn heartbeat_latency(&self) -> Option<Duration> {
        let state = self.shared.state();
        match (state.last_ping, state.last_pong) {
            (Some(ping), Some(pong)) if pong >= ping => Some(pong - ping),
            (Some(ping), Some(pong)) => Some(ping - pong),
            _ => None,
        }
    }
}

async fn listen(
    shared: Arc<Shared>,
    mut source: WsSource,
    dialer: Dialer,
    cancel: CancellationToken,
    dispatcher: Dispatcher,
) {
    let mut retries = 0u32;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = source.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                retries = 0;
                handle_text(&shared, &dialer, &cancel, text.as_str()).await;
            }
            Some(Ok(Message::Ping(data))) => {
                shared.state().last_ping = Some(Instant::now());
                debug!("(handle) < PING");
                if let Err(e) = shared.send(Message::Pong(data)).await {
                    warn!("(handle) pong failed: {}", e);
                }
                shared.state().last_pong = Some(Instant::now());
            }
            Some(Ok(Message::Pong(_))) => {
                shared.state().last_pong = Some(Instant::now());
                debug!("(handle) < PONG");
            }
            Some(Ok(Message::Close(frame))) => {
                let code = frame.as_ref().map(|f| u16::from(f.code));
                if code == Some(INTENTIONAL_CLOSE_CODE) {
                    debug!("(listener) WebSocket connection closed, disconnecting");
                    break;
                }
                warn!("(handle) WebSocket failing connection with code {:?}", code);
                match redial(&shared, &dialer, &dispatcher).await {
                    Some(fresh) => source = fresh,
                    None => break,
                }
            }
            None => {
                warn!("(listener) WebSocket stream ended by remote host");
                match redial(&shared, &dialer, &dispatcher).await {
                    Some(fresh) => source = fresh,
                    None => break,
                }
            }
            Some(Ok(other)) => debug!("(handle) ignoring frame {:?}", other),
            Some(Err(e)) => {
                retries += 1;
                warn!("(listener) receive failed ({}/{}): {}", retries, STREAM_MAX_RETRIES, e);
                if retries >= STREAM_MAX_RETRIES {
                    error!("Max retries reached, WebSocket connection failures");
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(STREAM_RETRY_DELAY) => {}
                }
            }
        }
    }

    let mut state = shared.state();
    state.running = false;
    if !cancel.is_cancelled() {
        state.connection = ConnectionState::Disconnected;
    }
}

async fn redial(shared: &Shared, dialer: &Dialer, dispatcher: &Dispatcher) -> Option<WsSource> {
    shared.sink.lock().await.take();
    {
        let mut state = shared.state();
        state.credentials_sent = false;
        state.subscriptions.clear();
    }
    match dialer.open(shared).await {
        Ok(source) => Some(source),
        Err(e) => {
            error!("WebSocket re-dial to {} failed: {}", dialer.node, e);
            dispatcher.publish(HostEvent::ReloadRequested {
                reason: format!("WebSocket node {} dropped and could not be re-dialled", dialer.node),
            });
            None
        }
    }
}

async fn handle_text(shared: &Shared, dialer: &Dialer, cancel: &CancellationToken, text: &str) {
    let frame = match decode_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Dropping undecodable frame: {}", e);
            return;
        }
    };

    match frame {
        Frame::Verify => {
            if let Err(e) = shared.send_handshake(&dialer.handshake).await {
                warn!("(verify) handshake re-send failed: {}", e);
            }
        }
        Frame::Subscribed(list) => {
            let mut state = shared.state();
            if list.is_empty() {
                warn!("Server confirmed an empty subscription list");
                state.auth_revoked = true;
                state.connection = ConnectionState::Degraded;
            } else {
                info!("Subscribed services: {:?}", list);
                state.connection = ConnectionState::Streaming;
            }
            state.subscriptions = list;
        }
        Frame::Unauthorized => {
            warn!("Server rejected the access token");
            let mut state = shared.state();
            state.credentials_sent = false;
            state.auth_revoked = true;
            state.connection = ConnectionState::Degraded;
        }
        Frame::Busy => {
            info!("Server busy, pausing {:?}", SERVER_BUSY_BACKOFF);
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(SERVER_BUSY_BACKOFF) => {}
            }
        }
        Frame::Info(code) => debug!("(handle) info code {}", code),
        Frame::Payload(payload) => {
            debug!("(handle) < {}", payload.kind());
            shared.state().message = Some(payload);
        }
        Frame::Ignored(kind) => warn!("Unhandled event: {}", kind),
    }
}

async fn keepalive(shared: Arc<Shared>, interval: Duration, cancel: CancellationToken) {
    loop {
        if !shared.state().running {
            break;
        }

        shared.state().last_ping = Some(Instant::now());
        let delay = match shared.send(Message::Ping(Vec::<u8>::new().into())).await {
            Ok(()) => {
                debug!("(heartbeat) > PING");
                interval
            }
            Err(e) => {
                debug!("(heartbeat) ping failed: {}", e);
                STREAM_RETRY_DELAY
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frames() {
        assert_eq!(decode_frame(r#"{"type":"verify"}"#).unwrap(), Frame::Verify);
        assert_eq!(
            decode_frame(r#"{"type":"info","data":{"code":200,"list":["websocket.eew","trem.intensity"]}}"#).unwrap(),
            Frame::Subscribed(vec!["websocket.eew".into(), "trem.intensity".into()])
        );
        assert_eq!(decode_frame(r#"{"type":"info","data":{"code":401}}"#).unwrap(), Frame::Unauthorized);
        assert_eq!(decode_frame(r#"{"type":"info","data":{"code":503}}"#).unwrap(), Frame::Busy);
        assert_eq!(decode_frame(r#"{"type":"info","data":{"code":418}}"#).unwrap(), Frame::Info(418));
    }

    #[test]
    fn data_frames_dispatch_on_inner_type() {
        let frame = decode_frame(
            r#"{"type":"data","time":1,"data":{"type":"eew","author":"cwa","id":"114081","serial":1,"eq":{"mag":4.3}}}"#,
        )
        .unwrap();
        match frame {
            Frame::Payload(StreamPayload::Eew(eew)) => assert_eq!(eew.revision_key(), ("114081", Some(1))),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            decode_frame(r#"{"type":"ntp","time":1,"data":{}}"#).unwrap(),
            Frame::Payload(StreamPayload::Ntp(_))
        ));
        assert_eq!(
            decode_frame(r#"{"type":"data","data":{"type":"rts"}}"#).unwrap(),
            Frame::Ignored("rts".into())
        );
        assert_eq!(decode_frame(r#"{"type":"mystery"}"#).unwrap(), Frame::Ignored("mystery".into()));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"type":"data","data":{"type":"eew","serial":1}}"#).is_err());
    }

    #[test]
    fn handshake_carries_token_and_services() {
        let config = TremConfig { access_token: Some("secret".into()), ..Default::default() };
        let client = ExpTechWsClient::new(&config, Dispatcher::default()).unwrap();
        let handshake: Value = serde_json::from_str(&client.handshake()).unwrap();

        assert_eq!(handshake["type"], "start");
        assert_eq!(handshake["key"], "secret");
        assert_eq!(handshake["service"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn recv_before_connect_is_not_connected() {
        let client = ExpTechWsClient::new(&TremConfig::default(), Dispatcher::default()).unwrap();
        assert!(matches!(client.recv(), Err(TremError::NotConnected)));
        assert!(!client.is_running());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_without_route_fails() {
        let mut client = ExpTechWsClient::new(&TremConfig::default(), Dispatcher::default()).unwrap();
        assert!(matches!(client.connect().await, Err(TremError::RouteUnset("WS"))));
    }

    #[tokio::test]
    async fn failed_handshake_requests_reload() {
        let dispatcher = Dispatcher::default();
        let mut events = dispatcher.subscribe();
        let mut client = ExpTechWsClient::new(&TremConfig::default(), dispatcher).unwrap();
        client
            .initialize_route(&RouteRequest { node: None, url: Some("ws://127.0.0.1:9/websocket".into()) }, &[])
            .unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, TremError::Handshake { .. }));
        assert!(matches!(*events.recv().await.unwrap(), HostEvent::ReloadRequested { .. }));
        assert!(!client.is_running());
    }
}
