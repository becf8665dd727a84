//! WebSocket transport.
//!
//! Frames travel as JSON text messages. Inbound messages that do not decode
//! as a [`Frame`] are logged and skipped rather than failing the connection.

use super::config::Browser;
use super::frame::Frame;
use super::traits::*;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, ORIGIN, USER_AGENT};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub const DEFAULT_URL: &str = "wss://web.whatsapp.com/ws";
pub const DEFAULT_ORIGIN: &str = "https://web.whatsapp.com";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Transport over a WebSocket connection
pub struct WebSocketTransport {
    url: String,
    origin: String,
    user_agent: String,
    sink: Mutex<Option<WsSink>>,
    writable: Arc<AtomicBool>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, origin: impl Into<String>, browser: &Browser) -> Self {
        Self {
            url: url.into(),
            origin: origin.into(),
            user_agent: browser.user_agent(),
            sink: Mutex::new(None),
            writable: Arc::new(AtomicBool::new(false)),
            reader: std::sync::Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Handshake request carrying `Origin` and `User-Agent`
    fn request(&self) -> TransportResult<Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(ORIGIN, header_value(&self.origin)?);
        headers.insert(USER_AGENT, header_value(&self.user_agent)?);
        Ok(request)
    }

    fn replace_reader(&self, handle: Option<JoinHandle<()>>) {
        let mut reader = self
            .reader
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(old) = std::mem::replace(&mut *reader, handle) {
            old.abort();
        }
    }
}

fn header_value(value: &str) -> TransportResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| TransportError::Connect(e.to_string()))
}

/// Decode one inbound WebSocket message; `None` for anything that is not a
/// frame
fn decode(message: &Message) -> Option<Frame> {
    let parsed = match message {
        Message::Text(text) => serde_json::from_str::<Frame>(text.as_str()),
        Message::Binary(bytes) => serde_json::from_slice::<Frame>(bytes),
        _ => return None,
    };
    match parsed {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "undecodable frame skipped");
            None
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: TransportEventSender,
    writable: Arc<AtomicBool>,
) {
    let terminal = loop {
        match stream.next().await {
            Some(Ok(Message::Close(close))) => {
                debug!(?close, "close frame received");
                break TransportEvent::Closed;
            }
            Some(Ok(message)) => {
                if let Some(frame) = decode(&message) {
                    debug!(kind = frame.kind(), "frame received");
                    if !events.send(TransportEvent::Frame(frame)) {
                        break TransportEvent::Closed;
                    }
                }
            }
            Some(Err(e)) => break TransportEvent::Error(e.to_string()),
            None => break TransportEvent::Closed,
        }
    };

    writable.store(false, Ordering::SeqCst);
    events.send(terminal);
}

#[async_trait]
impl TransportChannel for WebSocketTransport {
    async fn connect(&self) -> TransportResult<TransportEvents> {
        let request = self.request()?;
        info!(url = %self.url, "opening websocket");

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = ws.split();

        let (events, sender) = TransportEvents::channel();
        *self.sink.lock().await = Some(sink);
        self.writable.store(true, Ordering::SeqCst);
        sender.send(TransportEvent::Opened);

        let handle = tokio::spawn(read_loop(stream, sender, Arc::clone(&self.writable)));
        self.replace_reader(Some(handle));
        Ok(events)
    }

    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        if !self.is_writable() {
            return Err(TransportError::NotWritable);
        }
        let text = serde_json::to_string(frame).map_err(|e| TransportError::Send(e.to_string()))?;

        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(TransportError::Closed);
        };
        if let Err(e) = sink.send(Message::text(text)).await {
            self.writable.store(false, Ordering::SeqCst);
            return Err(TransportError::Send(e.to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.writable.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "websocket close failed");
            }
        }
        self.replace_reader(None);
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }
}
