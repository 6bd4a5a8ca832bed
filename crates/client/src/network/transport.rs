//! Message transports a [`Session`](super::Session) can run over.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::ORIGIN};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::SessionError;

/// A message-oriented, bidirectional connection.
///
/// The transport guarantees framing: every `recv` yields exactly one
/// message as the server sent it.
pub trait Transport: Send {
    fn send(&mut self, data: Bytes) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Next inbound message, or `None` once the connection is closed.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Bytes>, SessionError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Turn `host:port` into a WebSocket URL; full URLs pass through.
pub fn websocket_url(address: &str) -> String {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{}/", address)
    }
}

/// WebSocket connection to a game server.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Connect to `address` (`host:port` or a `ws://` URL).
    pub async fn connect(address: &str, origin: &str) -> Result<Self, SessionError> {
        let url = websocket_url(address);
        let mut request = url.as_str().into_client_request()?;
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
        request.headers_mut().insert(ORIGIN, origin);

        info!("Connecting to: {}", url);
        let (stream, _response) = connect_async(request).await?;
        Ok(Self { stream })
    }
}

fn is_closed(error: &tungstenite::Error) -> bool {
    matches!(
        error,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

impl Transport for WsTransport {
    async fn send(&mut self, data: Bytes) -> Result<(), SessionError> {
        match self.stream.send(Message::Binary(data)).await {
            Ok(()) => Ok(()),
            Err(e) if is_closed(&e) => Err(SessionError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, SessionError> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Binary(data)) => return Ok(Some(data)),
                Ok(Message::Text(text)) => debug!("Ignoring text frame: {}", text.as_str()),
                Ok(Message::Close(frame)) => {
                    debug!("Server closed the connection: {:?}", frame);
                    return Ok(None);
                }
                // Ping/pong are answered by tungstenite.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) if is_closed(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) if is_closed(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory transport backed by channels, for replaying captured traffic
/// or driving a session without a server.
pub struct ChannelTransport {
    incoming: mpsc::UnboundedReceiver<Bytes>,
    outgoing: mpsc::UnboundedSender<Bytes>,
}

/// The far end of a [`ChannelTransport`].
pub struct ChannelPeer {
    /// Messages pushed here are received by the session.
    pub to_client: mpsc::UnboundedSender<Bytes>,
    /// Messages the session sent.
    pub from_client: mpsc::UnboundedReceiver<Bytes>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, ChannelPeer) {
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        (
            ChannelTransport { incoming, outgoing },
            ChannelPeer {
                to_client,
                from_client,
            },
        )
    }
}

impl ChannelPeer {
    /// Queue a message for the session. Returns false once the session is gone.
    pub fn push(&self, data: impl Into<Bytes>) -> bool {
        self.to_client.send(data.into()).is_ok()
    }

    /// Everything the session has sent so far.
    pub fn drain_sent(&mut self) -> Vec<Bytes> {
        let mut sent = Vec::new();
        while let Ok(data) = self.from_client.try_recv() {
            sent.push(data);
        }
        sent
    }
}

impl Transport for ChannelTransport {
    async fn send(&mut self, data: Bytes) -> Result<(), SessionError> {
        self.outgoing.send(data).map_err(|_| SessionError::Closed)
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, SessionError> {
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.incoming.close();
        Ok(())
    }
}
