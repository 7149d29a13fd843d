//! Datagram codec between the host and the remote target nodes.
//!
//! Every packet starts with a two byte header `[type, client_id]`; multi-byte
//! fields are big-endian. Decoding checks the remaining length before every
//! field read and fails with a [`CodecError`] instead of interpreting a
//! truncated packet.
//!
//! Outbound packets are modelled as [`Command`]s, inbound packets as
//! [`Inbound`] messages. Both are decoded once at the boundary so nothing
//! downstream re-reads raw bytes.

mod command;
mod error;
mod inbound;
mod message;

pub use command::{
    BUZZER_MAX_DURATION_MS, BUZZER_MAX_FREQUENCY_HZ, BUZZER_MIN_FREQUENCY_HZ, Command,
    CommandError, TRAINING_STOP_SENTINEL, TrainingStart,
};
pub use error::CodecError;
pub use inbound::{Inbound, InboundPacket, StatusReport, decode_inbound};
pub use message::{HEADER_LEN, Header, MessageType};
