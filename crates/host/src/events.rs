//! Host events and non-blocking broadcast emitter.

use rangehost_clients::ClientSnapshot;
use rangehost_primitives::ClientId;
use rangehost_training::{TrainingConfig, TrainingResult};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::DEFAULT_EVENT_CHANNEL_CAPACITY;

/// Notifications pushed to supervisors, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Sent once to a supervisor when it connects.
    InitialState { clients: Vec<ClientSnapshot> },
    /// Periodic status broadcast.
    ClientList { clients: Vec<ClientSnapshot> },
    #[serde(rename_all = "camelCase")]
    TrainingStarted {
        client_id: ClientId,
        config: TrainingConfig,
    },
    #[serde(rename_all = "camelCase")]
    TrainingStatus {
        client_id: ClientId,
        elapsed_ms: u64,
        result: TrainingResult,
    },
    #[serde(rename_all = "camelCase")]
    TrainingCompleted {
        client_id: ClientId,
        result: TrainingResult,
    },
}

impl HostEvent {
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::InitialState { .. } | Self::ClientList { .. } => None,
            Self::TrainingStarted { client_id, .. }
            | Self::TrainingStatus { client_id, .. }
            | Self::TrainingCompleted { client_id, .. } => Some(*client_id),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<HostEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: HostEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn training_started(&self, client_id: ClientId, config: TrainingConfig) {
        self.emit(HostEvent::TrainingStarted { client_id, config });
    }

    pub fn training_status(&self, client_id: ClientId, elapsed_ms: u64, result: TrainingResult) {
        self.emit(HostEvent::TrainingStatus {
            client_id,
            elapsed_ms,
            result,
        });
    }

    pub fn training_completed(&self, client_id: ClientId, result: TrainingResult) {
        self.emit(HostEvent::TrainingCompleted { client_id, result });
    }

    pub fn client_list(&self, clients: Vec<ClientSnapshot>) {
        self.emit(HostEvent::ClientList { clients });
    }
}
