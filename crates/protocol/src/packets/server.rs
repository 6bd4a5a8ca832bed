//! Server -> Client packet decoding.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::{BinaryReader, Color, ProtocolError};

use super::ServerOpcode;

/// Bytes following the leading 'H' of the greeting message.
const HELLO_TAIL: &[u8; 14] = b"elloHelloHello";

/// Flag bits that carry meaning for small cells; anything else on a cell of
/// this size or below is reported.
const SMALL_CELL_SIZE: i16 = 16;
const KNOWN_FLAGS: u8 = 0x01 | 0x10;

/// Cell flags for the UpdateNodes packet.
///
/// Bits 1-3 announce reserved fields of 4, 8 and 16 bytes that follow the
/// flag byte. Their contents are undocumented and are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellFlags {
    pub bits: u8,
}

impl CellFlags {
    pub const VIRUS: u8 = 0x01;
    pub const RESERVED_4: u8 = 0x02;
    pub const RESERVED_8: u8 = 0x04;
    pub const RESERVED_16: u8 = 0x08;
    pub const AGITATED: u8 = 0x10;

    pub const fn new(bits: u8) -> Self {
        Self { bits }
    }

    #[inline]
    pub fn is_virus(&self) -> bool {
        self.bits & Self::VIRUS != 0
    }

    #[inline]
    pub fn is_agitated(&self) -> bool {
        self.bits & Self::AGITATED != 0
    }

    /// Total length of the reserved fields announced by these flags.
    pub fn reserved_len(&self) -> usize {
        let mut len = 0;
        if self.bits & Self::RESERVED_4 != 0 {
            len += 4;
        }
        if self.bits & Self::RESERVED_8 != 0 {
            len += 8;
        }
        if self.bits & Self::RESERVED_16 != 0 {
            len += 16;
        }
        len
    }
}

/// Eat record: `attacker` consumed `victim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EatRecord {
    pub attacker_id: u32,
    pub victim_id: u32,
}

/// One cell record from the UpdateNodes packet.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCell {
    pub node_id: u32,
    pub x: i16,
    pub y: i16,
    pub size: i16,
    pub color: Color,
    pub flags: CellFlags,
    /// Empty when the server did not (re)send the name.
    pub name: String,
}

/// A world diff batch (0x10).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldUpdate {
    pub destroyed: Vec<EatRecord>,
    pub updated: Vec<UpdateCell>,
    pub cleaned: Vec<u32>,
}

/// One FFA leaderboard row. Rank is the position in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub id: u32,
    pub name: String,
}

/// Team leaderboard shares.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TeamScores {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

/// World bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Border {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Border {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Parsed server packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    /// World update (0x10).
    UpdateNodes(WorldUpdate),
    /// The local player now owns this cell (0x20).
    AddNode { node_id: u32 },
    /// FFA leaderboard (0x31).
    Leaderboard(Vec<LeaderboardEntry>),
    /// Team leaderboard (0x32).
    TeamLeaderboard(TeamScores),
    /// World border (0x40).
    SetBorder(Border),
    /// "HelloHelloHello" greeting (0x48).
    Hello,
}

impl ServerPacket {
    /// Decode one complete message.
    ///
    /// Unread trailing bytes are logged and otherwise ignored so that newer
    /// servers may append fields.
    pub fn decode(data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(data);

        let mut opcode = reader.get_u8()?;
        if opcode == ServerOpcode::CompatPrefix as u8 {
            reader.skip(4)?;
            opcode = reader.get_u8()?;
        }

        let packet = match ServerOpcode::from_u8(opcode) {
            Some(ServerOpcode::UpdateNodes) => Self::UpdateNodes(decode_update_nodes(&mut reader)?),
            Some(ServerOpcode::AddNode) => Self::AddNode {
                node_id: reader.get_u32()?,
            },
            Some(ServerOpcode::LeaderboardFFA) => {
                Self::Leaderboard(decode_leaderboard_ffa(&mut reader)?)
            }
            Some(ServerOpcode::LeaderboardPie) => {
                Self::TeamLeaderboard(decode_leaderboard_pie(&mut reader)?)
            }
            Some(ServerOpcode::SetBorder) => Self::SetBorder(Border {
                left: reader.get_f64()?,
                top: reader.get_f64()?,
                right: reader.get_f64()?,
                bottom: reader.get_f64()?,
            }),
            Some(ServerOpcode::Hello) => {
                let tail = reader.get_bytes(HELLO_TAIL.len())?;
                if tail.as_ref() != HELLO_TAIL {
                    return Err(ProtocolError::UnknownMessage(opcode));
                }
                Self::Hello
            }
            Some(ServerOpcode::CompatPrefix) | None => {
                return Err(ProtocolError::UnknownMessage(opcode));
            }
        };

        if reader.remaining() > 0 {
            warn!(
                "Not all bytes read in message {:#04x}: {} left over",
                opcode,
                reader.remaining()
            );
        }

        Ok(packet)
    }

    /// Wire opcode of this packet.
    pub fn opcode(&self) -> ServerOpcode {
        match self {
            Self::UpdateNodes(_) => ServerOpcode::UpdateNodes,
            Self::AddNode { .. } => ServerOpcode::AddNode,
            Self::Leaderboard(_) => ServerOpcode::LeaderboardFFA,
            Self::TeamLeaderboard(_) => ServerOpcode::LeaderboardPie,
            Self::SetBorder(_) => ServerOpcode::SetBorder,
            Self::Hello => ServerOpcode::Hello,
        }
    }
}

/// Capacity hint that a hostile count cannot inflate past the message size.
#[inline]
fn capacity_for(count: usize, reader: &BinaryReader, record_len: usize) -> usize {
    count.min(reader.remaining() / record_len)
}

/// Parse 0x10 UpdateNodes packet.
///
/// Wire format:
///   u16  destroyed_count
///   [u32 attacker_id, u32 victim_id] × destroyed_count
///   loop:
///     u32  node_id          ; 0 terminates the loop
///     i16  x
///     i16  y
///     i16  size
///     u8   r, u8 g, u8 b
///     u8   flags
///     [4]  reserved         ; only if flags & 0x02
///     [8]  reserved         ; only if flags & 0x04
///     [16] reserved         ; only if flags & 0x08
///     string_unicode name
///   u32  clean_count
///   [u32 node_id] × clean_count
fn decode_update_nodes(reader: &mut BinaryReader) -> Result<WorldUpdate, ProtocolError> {
    let destroyed_count = reader.get_u16()? as usize;
    let mut destroyed = Vec::with_capacity(capacity_for(destroyed_count, reader, 8));
    for _ in 0..destroyed_count {
        destroyed.push(EatRecord {
            attacker_id: reader.get_u32()?,
            victim_id: reader.get_u32()?,
        });
    }

    let mut updated = Vec::new();
    loop {
        let node_id = reader.get_u32()?;
        if node_id == 0 {
            break;
        }

        let x = reader.get_i16()?;
        let y = reader.get_i16()?;
        let size = reader.get_i16()?;
        let color = Color::new(reader.get_u8()?, reader.get_u8()?, reader.get_u8()?);
        let flags = CellFlags::new(reader.get_u8()?);

        if size <= SMALL_CELL_SIZE && flags.bits & !KNOWN_FLAGS != 0 {
            debug!(
                "Unusual flags for small cell {} (size {}): {:#010b}",
                node_id, size, flags.bits
            );
        }

        let reserved = flags.reserved_len();
        if reserved > 0 {
            trace!("Skipping {} reserved bytes for cell {}", reserved, node_id);
            reader.skip(reserved)?;
        }

        let name = reader.get_string_unicode()?;

        updated.push(UpdateCell {
            node_id,
            x,
            y,
            size,
            color,
            flags,
            name,
        });
    }

    let clean_count = reader.get_u32()? as usize;
    let mut cleaned = Vec::with_capacity(capacity_for(clean_count, reader, 4));
    for _ in 0..clean_count {
        cleaned.push(reader.get_u32()?);
    }

    Ok(WorldUpdate {
        destroyed,
        updated,
        cleaned,
    })
}

/// Parse 0x31 LeaderboardFFA.
/// Format: u32 count, then [u32 id, string_unicode name] × count
fn decode_leaderboard_ffa(reader: &mut BinaryReader) -> Result<Vec<LeaderboardEntry>, ProtocolError> {
    let count = reader.get_u32()? as usize;
    let mut entries = Vec::with_capacity(capacity_for(count, reader, 6));
    for _ in 0..count {
        let id = reader.get_u32()?;
        let name = reader.get_string_unicode()?;
        entries.push(LeaderboardEntry { id, name });
    }
    Ok(entries)
}

/// Parse 0x32 LeaderboardPie. Only the three-team form is valid.
fn decode_leaderboard_pie(reader: &mut BinaryReader) -> Result<TeamScores, ProtocolError> {
    let count = reader.get_u32()?;
    if count != 3 {
        return Err(ProtocolError::MalformedPayload {
            tag: ServerOpcode::LeaderboardPie as u8,
            reason: format!("expected 3 teams, got {}", count),
        });
    }
    Ok(TeamScores {
        red: reader.get_f32()?,
        green: reader.get_f32()?,
        blue: reader.get_f32()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryWriter;

    fn put_cell(w: &mut BinaryWriter, id: u32, x: i16, y: i16, size: i16, rgb: (u8, u8, u8), flags: u8, name: &str) {
        w.put_u32(id);
        w.put_i16(x);
        w.put_i16(y);
        w.put_i16(size);
        w.put_u8(rgb.0);
        w.put_u8(rgb.1);
        w.put_u8(rgb.2);
        w.put_u8(flags);
        let reserved = CellFlags::new(flags).reserved_len();
        w.put_slice(&vec![0xAA; reserved]);
        w.put_string_unicode(name);
    }

    #[test]
    fn test_decode_update_nodes() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x10);
        w.put_u16(1);
        w.put_u32(1);
        w.put_u32(2);
        put_cell(&mut w, 1, 10, -10, 50, (1, 2, 3), 0x11, "A");
        put_cell(&mut w, 7, 0, 0, 200, (9, 9, 9), 0x0E, "");
        w.put_u32(0);
        w.put_u32(2);
        w.put_u32(5);
        w.put_u32(6);

        let packet = ServerPacket::decode(w.finish()).expect("valid update");
        let ServerPacket::UpdateNodes(update) = packet else {
            panic!("expected UpdateNodes");
        };
        assert_eq!(update.destroyed, vec![EatRecord { attacker_id: 1, victim_id: 2 }]);
        assert_eq!(update.updated.len(), 2);

        let first = &update.updated[0];
        assert_eq!((first.node_id, first.x, first.y, first.size), (1, 10, -10, 50));
        assert_eq!(first.color, Color::new(1, 2, 3));
        assert!(first.flags.is_virus());
        assert!(first.flags.is_agitated());
        assert_eq!(first.name, "A");

        let second = &update.updated[1];
        assert_eq!(second.node_id, 7);
        assert!(!second.flags.is_virus());
        assert_eq!(second.name, "");

        assert_eq!(update.cleaned, vec![5, 6]);
    }

    #[test]
    fn test_reserved_field_lengths() {
        assert_eq!(CellFlags::new(0x00).reserved_len(), 0);
        assert_eq!(CellFlags::new(0x02).reserved_len(), 4);
        assert_eq!(CellFlags::new(0x04).reserved_len(), 8);
        assert_eq!(CellFlags::new(0x08).reserved_len(), 16);
        assert_eq!(CellFlags::new(0xFF).reserved_len(), 28);
    }

    #[test]
    fn test_empty_update() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x10);
        w.put_u16(0);
        w.put_u32(0);
        w.put_u32(0);
        assert_eq!(
            ServerPacket::decode(w.finish()),
            Ok(ServerPacket::UpdateNodes(WorldUpdate::default()))
        );
    }

    #[test]
    fn test_missing_sentinel_is_end_of_message() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x10);
        w.put_u16(0);
        put_cell(&mut w, 3, 1, 1, 30, (0, 0, 0), 0, "x");
        assert_eq!(
            ServerPacket::decode(w.finish()),
            Err(ProtocolError::UnexpectedEndOfMessage)
        );
    }

    #[test]
    fn test_truncated_reserved_field() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x10);
        w.put_u16(0);
        w.put_u32(3);
        w.put_i16(0);
        w.put_i16(0);
        w.put_i16(10);
        w.put_slice(&[0, 0, 0]);
        w.put_u8(0x08);
        w.put_slice(&[0; 10]);
        assert_eq!(
            ServerPacket::decode(w.finish()),
            Err(ProtocolError::UnexpectedEndOfMessage)
        );
    }

    #[test]
    fn test_compat_prefix_is_transparent() {
        let plain = [0x20, 0x39, 0x05, 0x00, 0x00];
        let prefixed = [0xF0, 0xDE, 0xAD, 0xBE, 0xEF, 0x20, 0x39, 0x05, 0x00, 0x00];
        let expected = Ok(ServerPacket::AddNode { node_id: 0x539 });
        assert_eq!(ServerPacket::decode(plain.to_vec()), expected);
        assert_eq!(ServerPacket::decode(prefixed.to_vec()), expected);
    }

    #[test]
    fn test_truncated_compat_prefix() {
        assert_eq!(
            ServerPacket::decode(vec![0xF0, 1, 2]),
            Err(ProtocolError::UnexpectedEndOfMessage)
        );
    }

    #[test]
    fn test_decode_leaderboard_keeps_wire_order() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x31);
        w.put_u32(3);
        for (id, name) in [(9, "first"), (4, "second"), (12, "")] {
            w.put_u32(id);
            w.put_string_unicode(name);
        }
        let packet = ServerPacket::decode(w.finish()).expect("valid leaderboard");
        let ServerPacket::Leaderboard(entries) = packet else {
            panic!("expected Leaderboard");
        };
        let ids: Vec<u32> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![9, 4, 12]);
        assert_eq!(entries[1].name, "second");
    }

    #[test]
    fn test_team_leaderboard_requires_three_teams() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x32);
        w.put_u32(3);
        w.put_f32(0.5);
        w.put_f32(0.25);
        w.put_f32(0.25);
        assert_eq!(
            ServerPacket::decode(w.finish()),
            Ok(ServerPacket::TeamLeaderboard(TeamScores { red: 0.5, green: 0.25, blue: 0.25 }))
        );

        for count in [0u32, 2, 4, 100] {
            let mut w = BinaryWriter::new();
            w.put_u8(0x32);
            w.put_u32(count);
            for _ in 0..count.min(4) {
                w.put_f32(1.0);
            }
            assert!(matches!(
                ServerPacket::decode(w.finish()),
                Err(ProtocolError::MalformedPayload { tag: 0x32, .. })
            ));
        }
    }

    #[test]
    fn test_decode_border() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x40);
        for v in [-100.0, -50.0, 100.0, 50.0] {
            w.put_f64(v);
        }
        let border = Border { left: -100.0, top: -50.0, right: 100.0, bottom: 50.0 };
        assert_eq!(ServerPacket::decode(w.finish()), Ok(ServerPacket::SetBorder(border)));
        assert_eq!(border.width(), 200.0);
        assert_eq!(border.height(), 100.0);
    }

    #[test]
    fn test_hello_greeting() {
        assert_eq!(
            ServerPacket::decode(b"HelloHelloHello".to_vec()),
            Ok(ServerPacket::Hello)
        );
        assert_eq!(
            ServerPacket::decode(b"HelloHelloHellx".to_vec()),
            Err(ProtocolError::UnknownMessage(0x48))
        );
        assert_eq!(
            ServerPacket::decode(b"Hello".to_vec()),
            Err(ProtocolError::UnexpectedEndOfMessage)
        );
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(ServerPacket::decode(vec![0x63, 1, 2]), Err(ProtocolError::UnknownMessage(0x63)));
        assert_eq!(ServerPacket::decode(Vec::new()), Err(ProtocolError::UnexpectedEndOfMessage));
    }

    #[test]
    fn test_trailing_bytes_are_tolerated() {
        let packet = ServerPacket::decode(vec![0x20, 1, 0, 0, 0, 0xFF, 0xFF]);
        assert_eq!(packet, Ok(ServerPacket::AddNode { node_id: 1 }));
    }

    #[test]
    fn test_huge_count_fails_cleanly() {
        let mut w = BinaryWriter::new();
        w.put_u8(0x31);
        w.put_u32(u32::MAX);
        w.put_u32(1);
        assert_eq!(
            ServerPacket::decode(w.finish()),
            Err(ProtocolError::UnexpectedEndOfMessage)
        );
    }
}
