// Game server session: handshake, receive-decode-apply ticks, outbound commands
use bytes::Bytes;
use glam::DVec2;
use protocol::packets::{self, ServerPacket};
use protocol::{BinaryWriter, ProtocolError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{info, trace, warn};

use crate::config::SessionConfig;
use crate::game::World;
use crate::SessionError;

mod transport;

pub use transport::{ChannelPeer, ChannelTransport, Transport, WsTransport, websocket_url};

/// Closes a [`Session`] from another task, unblocking a pending `tick`.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    closed: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// One connection to a game server and the world it describes.
pub struct Session<T: Transport> {
    transport: T,
    world: Arc<RwLock<World>>,
    poll_timeout: Duration,
    read_timeout: Option<Duration>,
    strict_unknown: bool,
    close_handle: CloseHandle,
    closed: watch::Receiver<bool>,
}

impl Session<WsTransport> {
    /// Open a WebSocket to `address` and perform the handshake.
    pub async fn connect(address: &str, config: &SessionConfig) -> Result<Self, SessionError> {
        let transport = WsTransport::connect(address, &config.origin).await?;
        Self::open(transport, config).await
    }
}

impl<T: Transport> Session<T> {
    /// Start a session over an already connected transport. The two
    /// handshake messages are sent before this returns.
    pub async fn open(transport: T, config: &SessionConfig) -> Result<Self, SessionError> {
        let (closed_tx, closed) = watch::channel(false);
        let mut session = Self {
            transport,
            world: Arc::new(RwLock::new(World::new())),
            poll_timeout: config.poll_timeout(),
            read_timeout: config.read_timeout(),
            strict_unknown: config.strict_unknown_messages,
            close_handle: CloseHandle {
                closed: Arc::new(closed_tx),
            },
            closed,
        };

        session.send(packets::build_protocol_version()).await?;
        session.send(packets::build_handshake_key()).await?;
        info!("Handshake sent");

        Ok(session)
    }

    /// Shared world state. Hold the read guard for a consistent snapshot;
    /// a tick applies a whole packet under the write guard.
    pub fn world(&self) -> Arc<RwLock<World>> {
        Arc::clone(&self.world)
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close_handle.clone()
    }

    /// Deadline for blocking ticks; `None` waits forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Receive, decode and apply at most one message.
    ///
    /// Returns `Ok(false)` when no message arrived before the deadline: the
    /// poll timeout when `blocking` is false, the read timeout otherwise.
    /// A decode error leaves the world untouched.
    pub async fn tick(&mut self, blocking: bool) -> Result<bool, SessionError> {
        let deadline = if blocking {
            self.read_timeout
        } else {
            Some(self.poll_timeout)
        };

        let data = match deadline {
            Some(limit) => match tokio::time::timeout(limit, self.receive()).await {
                Ok(result) => result?,
                Err(_) => return Ok(false),
            },
            None => self.receive().await?,
        };

        self.process(data).await
    }

    async fn receive(&mut self) -> Result<Bytes, SessionError> {
        if *self.closed.borrow() {
            return Err(SessionError::Closed);
        }

        let received = tokio::select! {
            biased;
            _ = self.closed.wait_for(|closed| *closed) => None,
            message = self.transport.recv() => Some(message),
        };

        match received {
            Some(Ok(Some(data))) => Ok(data),
            Some(Ok(None)) => {
                info!("Server closed the connection");
                Err(SessionError::Closed)
            }
            Some(Err(e)) => Err(e),
            None => {
                self.transport.close().await?;
                Err(SessionError::Closed)
            }
        }
    }

    async fn process(&mut self, data: Bytes) -> Result<bool, SessionError> {
        let packet = match ServerPacket::decode(data) {
            Ok(packet) => packet,
            Err(ProtocolError::UnknownMessage(opcode)) if !self.strict_unknown => {
                warn!("Skipping unknown message: {:#04x}", opcode);
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };

        trace!("Applying {:?}", packet.opcode());
        self.world.write().await.apply(&packet);
        Ok(true)
    }

    async fn send(&mut self, packet: BinaryWriter) -> Result<(), SessionError> {
        self.transport.send(packet.finish()).await
    }

    /// Steer the local player's cells toward `(x, y)`. Repeating the last
    /// target sends nothing.
    pub async fn set_target(&mut self, x: f64, y: f64) -> Result<(), SessionError> {
        let target = DVec2::new(x, y);
        if self.world.read().await.target() == target {
            return Ok(());
        }

        self.send(packets::build_target(x, y)).await?;
        self.world.write().await.set_target(target);
        Ok(())
    }

    pub async fn split(&mut self) -> Result<(), SessionError> {
        self.send(packets::build_split()).await
    }

    /// Set the nickname; the server spawns the player with it.
    pub async fn set_nickname(&mut self, nickname: &str) -> Result<(), SessionError> {
        self.send(packets::build_nickname(nickname)).await
    }

    /// Close the transport. Further ticks fail with [`SessionError::Closed`].
    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.close_handle.close();
        self.transport.close().await
    }
}
