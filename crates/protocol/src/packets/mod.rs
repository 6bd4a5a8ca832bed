//! Packet definitions for the game protocol.
//!
//! This module contains both client->server and server->client packet types.

mod client;
mod server;

pub use client::*;
pub use server::*;

/// Opcodes for client -> server packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOpcode {
    /// Set nickname (and spawn).
    Nickname = 0x00,
    /// Target (mouse) position.
    Target = 0x10,
    /// Split (Space key).
    Split = 0x11,
    /// Protocol version handshake.
    Protocol = 0xFE,
    /// Handshake key.
    HandshakeKey = 0xFF,
}

/// Opcodes for server -> client packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOpcode {
    /// World update (destroyed/updated/cleaned cells).
    UpdateNodes = 0x10,
    /// Add owned node.
    AddNode = 0x20,
    /// Leaderboard (FFA).
    LeaderboardFFA = 0x31,
    /// Leaderboard (teams/pie chart).
    LeaderboardPie = 0x32,
    /// Set world border.
    SetBorder = 0x40,
    /// First byte of the "HelloHelloHello" greeting.
    Hello = 0x48,
    /// Legacy prefix: 4 bytes follow, then the real opcode.
    CompatPrefix = 0xF0,
}

impl ServerOpcode {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0x10 => Self::UpdateNodes,
            0x20 => Self::AddNode,
            0x31 => Self::LeaderboardFFA,
            0x32 => Self::LeaderboardPie,
            0x40 => Self::SetBorder,
            0x48 => Self::Hello,
            0xF0 => Self::CompatPrefix,
            _ => return None,
        })
    }
}
