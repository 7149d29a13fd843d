use bytes::Buf;
use rangehost_primitives::ClientId;

use crate::CodecError;

/// Length of the `[type, client_id]` header.
pub const HEADER_LEN: usize = 2;

/// Packet type, the first byte of every datagram.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::FromRepr, strum::EnumIter,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Heartbeat = 0x01,
    LedCommand = 0x02,
    BuzzerCommand = 0x03,
    EffectCommand = 0x04,
    StatusRequest = 0x05,
    ConfigUpdate = 0x06,
    ErrorReport = 0x07,
    Broadcast = 0xFF,
}

impl MessageType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(CodecError::UnknownMessageType(value))
    }
}

/// Decoded packet header.
///
/// `kind` stays raw so that callers can tell an unrecognized type from a
/// packet too short to carry a header at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: u8,
    pub client_id: ClientId,
}

impl Header {
    pub fn parse(packet: &[u8]) -> Result<Self, CodecError> {
        if packet.len() < HEADER_LEN {
            return Err(CodecError::MissingHeader(packet.len()));
        }
        let mut buf = packet;
        Ok(Self {
            kind: buf.get_u8(),
            client_id: ClientId::new(buf.get_u8()),
        })
    }

    pub fn message_type(&self) -> Result<MessageType, CodecError> {
        MessageType::try_from(self.kind)
    }
}
