use std::net::SocketAddr;

use rangehost_errors::ErrorCode;
use rangehost_primitives::{ClientId, Effect, Rgb, Timestamp};
use rangehost_training::{DEFAULT_BRIGHTNESS, SessionSnapshot, TrainingResult, TrainingSession};
use serde::Serialize;

/// A remote target node as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub last_seen: Timestamp,
    pub active: bool,
    pub color: Rgb,
    pub effect: Effect,
    pub brightness: u8,
    pub training: TrainingSession,
    pub last_error: Option<ErrorCode>,
    /// Final result of the most recently completed session.
    pub last_result: Option<TrainingResult>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, now: Timestamp) -> Self {
        Self {
            id,
            addr,
            last_seen: now,
            active: true,
            color: Rgb::default(),
            effect: Effect::default(),
            brightness: DEFAULT_BRIGHTNESS,
            training: TrainingSession::default(),
            last_error: None,
            last_result: None,
        }
    }

    pub fn is_stale(&self, now: Timestamp, timeout_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) > timeout_ms
    }

    pub fn snapshot(&self, now: Timestamp) -> ClientSnapshot {
        ClientSnapshot {
            client_id: self.id,
            address: self.addr,
            last_seen: self.last_seen,
            active: self.active,
            color: self.color.to_string(),
            effect: self.effect,
            brightness: self.brightness,
            training: self
                .training
                .is_running()
                .then(|| self.training.snapshot(now)),
            last_error: self.last_error,
            last_result: self.last_result.clone(),
        }
    }
}

/// Immutable view of a [`Client`] for supervisors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    pub client_id: ClientId,
    pub address: SocketAddr,
    pub last_seen: Timestamp,
    pub active: bool,
    pub color: String,
    pub effect: Effect,
    pub brightness: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<SessionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<TrainingResult>,
}

#[cfg(test)]
mod tests {
    use rangehost_training::TrainingConfig;

    use super::*;

    fn client() -> Client {
        Client::new(ClientId::new(3), "192.168.4.3:4210".parse().unwrap(), 1_000)
    }

    #[test]
    fn test_staleness_is_strict() {
        let client = client();
        assert!(!client.is_stale(11_000, 10_000));
        assert!(client.is_stale(11_001, 10_000));
        assert!(!client.is_stale(500, 10_000));
    }

    #[test]
    fn test_snapshot_json() {
        let mut client = client();
        client.color = Rgb::new(255, 0, 0);
        client.effect = Effect::Wave;
        let json = serde_json::to_value(client.snapshot(2_000)).unwrap();
        assert_eq!(json["clientId"], 3);
        assert_eq!(json["address"], "192.168.4.3:4210");
        assert_eq!(json["color"], "255,0,0");
        assert_eq!(json["effect"], "wave");
        assert_eq!(json["brightness"], 128);
        assert!(json.get("training").is_none());
        assert!(json.get("lastError").is_none());
    }

    #[test]
    fn test_snapshot_includes_running_session() {
        let mut client = client();
        client.training.begin(TrainingConfig::default(), 1_500);
        let snapshot = client.snapshot(4_000);
        let training = snapshot.training.unwrap();
        assert!(training.running);
        assert_eq!(training.elapsed_ms, 2_500);
    }
}
