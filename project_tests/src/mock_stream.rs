//! A streaming node on an ephemeral local port.
//!
//! Every accepted connection waits for the `start` handshake, records it and
//! answers with the configured [`StreamReply`]. Frames pushed through the
//! handle are fanned out to every open connection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Answer to a `start` handshake.
#[derive(Debug, Clone)]
pub enum StreamReply {
    /// `info` 200 with these services.
    Subscribe(Vec<String>),
    /// `info` 401.
    Reject,
    /// Nothing.
    Silent,
}

impl StreamReply {
    fn frame(&self) -> Option<Value> {
        match self {
            StreamReply::Subscribe(list) => Some(json!({"type": "info", "data": {"code": 200, "list": list}})),
            StreamReply::Reject => Some(json!({"type": "info", "data": {"code": 401}})),
            StreamReply::Silent => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
    Close(u16),
    Shutdown,
}

struct StreamState {
    reply: Mutex<StreamReply>,
    handshakes: Mutex<Vec<Value>>,
    close_codes: Mutex<Vec<u16>>,
    connections: AtomicUsize,
    stopped: AtomicBool,
}

/// Handle on a running mock node.
#[derive(Clone)]
pub struct MockStream {
    /// `ws://127.0.0.1:<port>/websocket`
    pub url: String,
    state: Arc<StreamState>,
    outbound: broadcast::Sender<Outbound>,
}

impl MockStream {
    /// Binds an ephemeral port and accepts until the runtime stops.
    pub async fn start(reply: StreamReply) -> Self {
        let state = Arc::new(StreamState {
            reply: Mutex::new(reply),
            handshakes: Mutex::new(Vec::new()),
            close_codes: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        });
        let (outbound, _) = broadcast::channel(64);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock stream");
        let addr = listener.local_addr().expect("mock stream address");

        let accept_state = Arc::clone(&state);
        let accept_outbound = outbound.clone();
        let mut control = outbound.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((socket, _)) = accepted else { break };
                        let frames = accept_outbound.subscribe();
                        if accept_state.stopped.load(Ordering::SeqCst) {
                            break;
                        }
                        tokio::spawn(serve(socket, Arc::clone(&accept_state), frames));
                    }
                    message = control.recv() => {
                        if matches!(message, Ok(Outbound::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                            break;
                        }
                    }
                }
            }
        });

        Self { url: format!("ws://{addr}/websocket"), state, outbound }
    }

    /// Pushes one text frame to every open connection.
    pub fn push(&self, frame: Value) {
        let _ = self.outbound.send(Outbound::Text(frame.to_string()));
    }

    /// Closes every open connection with `code`.
    pub fn close_all(&self, code: u16) {
        let _ = self.outbound.send(Outbound::Close(code));
    }

    /// Closes every connection with 1001 and stops listening, so re-dials
    /// are refused.
    pub fn shutdown(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Shutdown);
    }

    /// Changes the answer for later handshakes.
    pub fn set_reply(&self, reply: StreamReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    /// Handshakes received so far.
    pub fn handshakes(&self) -> Vec<Value> {
        self.state.handshakes.lock().unwrap().clone()
    }

    /// Close codes sent by clients.
    pub fn close_codes(&self) -> Vec<u16> {
        self.state.close_codes.lock().unwrap().clone()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

async fn serve(socket: TcpStream, state: Arc<StreamState>, mut frames: broadcast::Receiver<Outbound>) {
    let Ok(ws) = accept_async(socket).await else {
        return;
    };
    state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                    if value["type"] != "start" {
                        continue;
                    }
                    state.handshakes.lock().unwrap().push(value);
                    let reply = state.reply.lock().unwrap().frame();
                    if let Some(reply) = reply {
                        if sink.send(Message::text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        state.close_codes.lock().unwrap().push(u16::from(frame.code));
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            outgoing = frames.recv() => match outgoing {
                Ok(Outbound::Text(text)) => {
                    if sink.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(Outbound::Close(code)) => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: Utf8Bytes::from_static("bye") };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                Ok(Outbound::Shutdown) => {
                    let frame = CloseFrame { code: CloseCode::Away, reason: Utf8Bytes::from_static("shutdown") };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
