use rangehost_errors::UnknownErrorCode;
use rangehost_training::InvalidTrainingField;

use crate::{CommandError, MessageType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("packet of {0} bytes has no header")]
    MissingHeader(usize),
    #[error("{kind} packet truncated: need {expected} bytes, got {actual}")]
    Truncated {
        kind: MessageType,
        expected: usize,
        actual: usize,
    },
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),
    #[error("{0} is not accepted from nodes")]
    UnsupportedInbound(MessageType),
    #[error("{0} does not carry a command")]
    NotACommand(MessageType),
    #[error("node reported from the broadcast address")]
    BroadcastSource,
    #[error(transparent)]
    UnknownErrorCode(#[from] UnknownErrorCode),
    #[error(transparent)]
    InvalidField(#[from] InvalidTrainingField),
    #[error("unknown effect {0}")]
    UnknownEffect(u8),
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl CodecError {
    /// The packet was well formed but of a type the receiver does not handle.
    ///
    /// Such packets are dropped; every other error marks a malformed packet.
    pub fn is_unrecognized(&self) -> bool {
        matches!(
            self,
            Self::UnknownMessageType(_) | Self::UnsupportedInbound(_)
        )
    }
}
