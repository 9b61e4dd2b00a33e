//! Realtime transport: the WebSocket link to the conversational service.
//!
//! The session core only sees the two narrow traits below, so tests swap
//! in channel-backed fakes. The real implementation splits the socket the
//! usual way: one half sends client messages, the other surfaces inbound
//! events.
//!
//! There is deliberately no reconnect/backoff here: a terminal transport
//! failure ends the call, and the user re-dials.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::config::Config;
use crate::error::CallError;
use crate::protocol::{ClientMessage, ServerMessage};

type WsStreamInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound transport events, already parsed off the wire.
#[derive(Debug)]
pub enum TransportEvent {
    Message(ServerMessage),
    /// Transport-level fault. Reported, but does not by itself end the
    /// session; the remote may recover.
    Error(String),
    Closed,
}

#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, msg: &ClientMessage) -> Result<(), CallError>;
    async fn close(&mut self);
}

#[async_trait]
pub trait TransportStream: Send {
    /// Next inbound event. Keeps returning `Closed` once the stream ended.
    async fn recv(&mut self) -> TransportEvent;
}

// ======================== WebSocket implementation ========================

pub struct WsSink {
    write: SplitSink<WsStreamInner, Message>,
}

pub struct WsStream {
    read: SplitStream<WsStreamInner>,
}

/// Dial the service. The API key travels as a query parameter.
pub async fn connect(config: &Config) -> Result<(WsSink, WsStream), CallError> {
    let api_key = config.api_key()?;
    let url = format!("{}?key={}", config.endpoint, api_key);
    Url::parse(&url).map_err(|e| CallError::Connection(format!("bad endpoint: {e}")))?;

    log::info!("Connecting to {}...", config.endpoint);
    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|e| CallError::Connection(e.to_string()))?;
    log::info!("Connected");

    let (write, read) = ws.split();
    Ok((WsSink { write }, WsStream { read }))
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, msg: &ClientMessage) -> Result<(), CallError> {
        let text =
            serde_json::to_string(msg).map_err(|e| CallError::Connection(e.to_string()))?;
        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| CallError::Connection(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.write.send(Message::Close(None)).await;
        let _ = self.write.close().await;
    }
}

#[async_trait]
impl TransportStream for WsStream {
    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.read.next().await {
                // The service delivers JSON in either text or binary frames.
                Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                    Ok(msg) => return TransportEvent::Message(msg),
                    Err(e) => log::warn!("Unparseable server message: {e}"),
                },
                Some(Ok(Message::Binary(data))) => match serde_json::from_slice(&data) {
                    Ok(msg) => return TransportEvent::Message(msg),
                    Err(e) => log::warn!("Unparseable binary server message: {e}"),
                },
                Some(Ok(Message::Close(frame))) => {
                    log::info!("Server closed connection: {frame:?}");
                    return TransportEvent::Closed;
                }
                Some(Ok(_)) => {} // ping/pong
                Some(Err(e)) => return TransportEvent::Error(e.to_string()),
                None => return TransportEvent::Closed,
            }
        }
    }
}
