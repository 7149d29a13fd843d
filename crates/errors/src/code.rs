//! Closed fault taxonomy shared with the remote nodes.

use serde::{Deserialize, Serialize};

/// Fault category. The numeric values are part of the datagram protocol:
/// nodes report them verbatim in `ERROR_REPORT` packets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
    strum::FromRepr,
    strum::EnumIter,
)]
#[repr(u8)]
#[serde(into = "u8", try_from = "u8")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    #[default]
    None = 0,
    /// Access point bring-up failed.
    WifiConnectionFailed = 1,
    /// Datagram socket could not be opened.
    UdpInitFailed = 2,
    /// Push channel failure.
    WebsocketError = 3,
    /// Malformed inbound message.
    InvalidMessage = 4,
    /// Hardware or command failure.
    HardwareError = 5,
    AuthenticationFailed = 6,
    /// Resource exhaustion (registry or queue full).
    MemoryError = 7,
    TaskCreateFailed = 8,
    TrainingError = 9,
    CommunicationError = 10,
}

impl ErrorCode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A node reported a code outside the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown error code {0}")]
pub struct UnknownErrorCode(pub u8);

impl TryFrom<u8> for ErrorCode {
    type Error = UnknownErrorCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(UnknownErrorCode(value))
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        code.as_u8()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_wire_values_are_stable() {
        assert_eq!(ErrorCode::InvalidMessage.as_u8(), 4);
        assert_eq!(ErrorCode::MemoryError.as_u8(), 7);
        assert_eq!(ErrorCode::CommunicationError.as_u8(), 10);
    }

    #[test]
    fn test_try_from_u8() {
        for code in ErrorCode::iter() {
            assert_eq!(ErrorCode::try_from(code.as_u8()), Ok(code));
        }
        assert_eq!(ErrorCode::try_from(11), Err(UnknownErrorCode(11)));
    }

    #[test]
    fn test_names() {
        assert_eq!(ErrorCode::UdpInitFailed.name(), "udp_init_failed");
        assert_eq!(ErrorCode::TrainingError.to_string(), "training_error");
    }

    #[test]
    fn test_serde_numeric() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::HardwareError).unwrap(),
            "5"
        );
        let code: ErrorCode = serde_json::from_str("6").unwrap();
        assert_eq!(code, ErrorCode::AuthenticationFailed);
        assert!(serde_json::from_str::<ErrorCode>("99").is_err());
    }
}
