//! Remote node identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a remote target node.
///
/// Ids are assigned by the nodes themselves, never by the host. The value
/// `0xFF` is the broadcast pseudo-address and is never stored as a client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(u8);

impl ClientId {
    /// Pseudo-address meaning "all remote nodes".
    pub const BROADCAST: Self = Self(0xFF);

    /// Id used in error records for host-level faults.
    pub const HOST: Self = Self(0);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }
}

impl From<u8> for ClientId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<ClientId> for u8 {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_sentinel() {
        assert!(ClientId::BROADCAST.is_broadcast());
        assert!(!ClientId::new(3).is_broadcast());
        assert_eq!(ClientId::BROADCAST.get(), 0xFF);
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&ClientId::new(7)).unwrap();
        assert_eq!(json, "7");
        let id: ClientId = serde_json::from_str("42").unwrap();
        assert_eq!(id, ClientId::new(42));
    }
}
