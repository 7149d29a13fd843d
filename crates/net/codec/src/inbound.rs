//! Node to host packets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rangehost_errors::ErrorCode;
use rangehost_primitives::ClientId;

use crate::{CodecError, HEADER_LEN, Header, MessageType};

const STATUS_LEN: usize = HEADER_LEN + 4;
const STATUS_WITH_REACTION_LEN: usize = STATUS_LEN + 2;
const ERROR_REPORT_LEN: usize = HEADER_LEN + 1;

/// Running counters reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub hits: u16,
    pub misses: u16,
    /// Present only when the node appends it after the counters.
    pub avg_reaction_time_ms: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Heartbeat,
    Status(StatusReport),
    Error(ErrorCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundPacket {
    pub client_id: ClientId,
    pub message: Inbound,
}

impl InboundPacket {
    pub fn message_type(&self) -> MessageType {
        match self.message {
            Inbound::Heartbeat => MessageType::Heartbeat,
            Inbound::Status(_) => MessageType::StatusRequest,
            Inbound::Error(_) => MessageType::ErrorReport,
        }
    }

    /// Encodes the packet as a node would send it.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(STATUS_WITH_REACTION_LEN);
        buf.put_u8(self.message_type().as_u8());
        buf.put_u8(self.client_id.get());
        match self.message {
            Inbound::Heartbeat => {}
            Inbound::Status(report) => {
                buf.put_u16(report.hits);
                buf.put_u16(report.misses);
                if let Some(avg) = report.avg_reaction_time_ms {
                    buf.put_u16(avg);
                }
            }
            Inbound::Error(code) => buf.put_u8(code.as_u8()),
        }
        buf.freeze()
    }
}

/// Decodes a datagram received from a node.
///
/// Types a node never sends fail with [`CodecError::UnsupportedInbound`];
/// check [`CodecError::is_unrecognized`] to tell them from malformed packets.
pub fn decode_inbound(packet: &[u8]) -> Result<InboundPacket, CodecError> {
    let header = Header::parse(packet)?;
    let kind = header.message_type()?;
    if header.client_id.is_broadcast() {
        return Err(CodecError::BroadcastSource);
    }

    let actual = packet.len();
    let require = |expected: usize| {
        if actual < expected {
            Err(CodecError::Truncated {
                kind,
                expected,
                actual,
            })
        } else {
            Ok(())
        }
    };
    let mut body = packet.get(HEADER_LEN..).unwrap_or_default();

    let message = match kind {
        MessageType::Heartbeat => Inbound::Heartbeat,
        MessageType::StatusRequest => {
            require(STATUS_LEN)?;
            let hits = body.get_u16();
            let misses = body.get_u16();
            let avg_reaction_time_ms = (body.remaining() >= 2).then(|| body.get_u16());
            Inbound::Status(StatusReport {
                hits,
                misses,
                avg_reaction_time_ms,
            })
        }
        MessageType::ErrorReport => {
            require(ERROR_REPORT_LEN)?;
            Inbound::Error(ErrorCode::try_from(body.get_u8())?)
        }
        other => return Err(CodecError::UnsupportedInbound(other)),
    };

    Ok(InboundPacket {
        client_id: header.client_id,
        message,
    })
}
