//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding a message.
///
/// Every variant is fatal to the message being decoded; nothing is
/// partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A read ran past the end of the message buffer.
    #[error("Unexpected end of message")]
    UnexpectedEndOfMessage,

    /// The leading tag is not one this client understands.
    #[error("Unknown message type: {0:#04x}")]
    UnknownMessage(u8),

    /// Structurally readable, semantically invalid.
    #[error("Malformed payload for message {tag:#04x}: {reason}")]
    MalformedPayload { tag: u8, reason: String },

    /// Outbound command with an opcode or length this client never sends.
    #[error("Invalid packet opcode: {0:#04x}")]
    InvalidOpcode(u8),
}
