//! Host-side orchestration.
//!
//! Transport callbacks hand raw datagrams to the [`Host`], which queues them
//! on the [`Dispatcher`]. The dispatch activity drains the queue in arrival
//! order and turns every message into a registry or [`TrainingEngine`]
//! mutation. Results flow back out as [`HostEvent`]s and outbound
//! [`Command`](rangehost_net_codec::Command)s.
//!
//! No component holds two locks at once: registry closures return plain
//! values, and sends, error records and events happen after the lock is
//! released.

mod config;
mod dispatch;
mod engine;
mod error;
mod events;
mod host;
mod outbound;
mod scheduler;
mod transport;

pub use config::{
    DEFAULT_CLIENT_TIMEOUT, DEFAULT_DISPATCH_INTERVAL, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_STATUS_BROADCAST_INTERVAL,
    DEFAULT_TRAINING_MONITOR_INTERVAL, HostConfig, ScheduleConfig,
};
pub use dispatch::{Action, DispatchError, Dispatcher, QueuedMessage, route};
pub use engine::TrainingEngine;
pub use error::HostError;
pub use events::{EventEmitter, HostEvent};
pub use host::{Host, TrainingStatus};
pub use outbound::Outbound;
pub use scheduler::spawn_activities;
pub use transport::{
    DatagramSink, DatagramSource, Destination, MemorySink, SentPacket, UdpTransport, receive_loop,
};
