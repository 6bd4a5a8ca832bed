//! Client -> Server packet building and parsing.

use crate::{BinaryReader, BinaryWriter, ProtocolError};

use super::ClientOpcode;

/// Protocol version announced in the first handshake message.
pub const PROTOCOL_VERSION: u32 = 4;

/// Handshake key; the four bytes are all 0x28.
pub const HANDSHAKE_KEY: u32 = 0x2828_2828;

/// Build the protocol version packet (0xFE), always `FE 04 00 00 00`.
pub fn build_protocol_version() -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(5);
    w.put_u8(ClientOpcode::Protocol as u8);
    w.put_u32(PROTOCOL_VERSION);
    w
}

/// Build the handshake key packet (0xFF), always `FF 28 28 28 28`.
pub fn build_handshake_key() -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(5);
    w.put_u8(ClientOpcode::HandshakeKey as u8);
    w.put_u32(HANDSHAKE_KEY);
    w
}

/// Build a nickname packet (0x00). UTF-16LE, no terminator.
pub fn build_nickname(nickname: &str) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(1 + 2 * nickname.len());
    w.put_u8(ClientOpcode::Nickname as u8);
    w.put_unicode(nickname);
    w
}

/// Build a target packet (0x10).
///
/// The trailing u32 is the cell id the target applies to; 0 means all of
/// the local player's cells.
pub fn build_target(x: f64, y: f64) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(21);
    w.put_u8(ClientOpcode::Target as u8);
    w.put_f64(x);
    w.put_f64(y);
    w.put_u32(0);
    w
}

/// Build a split packet (0x11).
pub fn build_split() -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(1);
    w.put_u8(ClientOpcode::Split as u8);
    w
}

/// Parsed client packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    /// Protocol version (0xFE).
    Protocol(u32),
    /// Handshake key (0xFF).
    HandshakeKey(u32),
    /// Set nickname (0x00).
    Nickname { name: String },
    /// Target position (0x10).
    Target { x: f64, y: f64, cell_id: u32 },
    /// Split (0x11).
    Split,
}

impl ClientPacket {
    /// Parse an outbound packet from raw bytes, e.g. when replaying captured
    /// client traffic.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(data.to_vec());
        let opcode = reader.get_u8()?;

        match opcode {
            0xFE => {
                if data.len() != 5 {
                    return Err(ProtocolError::InvalidOpcode(opcode));
                }
                Ok(ClientPacket::Protocol(reader.get_u32()?))
            }
            0xFF => {
                if data.len() != 5 {
                    return Err(ProtocolError::InvalidOpcode(opcode));
                }
                Ok(ClientPacket::HandshakeKey(reader.get_u32()?))
            }
            0x00 => {
                let name = reader.get_string_unicode_to_end()?;
                Ok(ClientPacket::Nickname { name })
            }
            0x10 => {
                if data.len() != 21 {
                    return Err(ProtocolError::InvalidOpcode(opcode));
                }
                let x = reader.get_f64()?;
                let y = reader.get_f64()?;
                let cell_id = reader.get_u32()?;
                Ok(ClientPacket::Target { x, y, cell_id })
            }
            0x11 => Ok(ClientPacket::Split),
            _ => Err(ProtocolError::InvalidOpcode(opcode)),
        }
    }
}
