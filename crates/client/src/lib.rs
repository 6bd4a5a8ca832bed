//! Client library for the cell game.
//!
//! - [`Session`] speaks the binary protocol to one game server and keeps a
//!   [`World`] in sync with it.
//! - [`Directory`] finds a game server for a region.

mod config;
mod error;
pub mod directory;
pub mod game;
pub mod network;

pub use config::{Config, DirectoryConfig, PlayerConfig, SessionConfig, WatchConfig};
pub use directory::{Directory, Info, Region};
pub use error::{DirectoryError, SessionError};
pub use game::{Cell, World};
pub use network::{
    ChannelPeer, ChannelTransport, CloseHandle, Session, Transport, WsTransport, websocket_url,
};

pub use protocol;
