//! Inbound message queue.
//!
//! Any number of transport callbacks [`enqueue`](Dispatcher::enqueue); one
//! consumer takes the whole queue with [`take_batch`](Dispatcher::take_batch)
//! and processes it outside the lock, so producers wait at most one short
//! critical section. A full queue rejects the newest message.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use metrics::Counter;
use parking_lot::{Mutex, MutexGuard};
use rangehost_errors::ErrorCode;
use rangehost_net_codec::{CodecError, Header, Inbound, MessageType, StatusReport, decode_inbound};
use rangehost_primitives::{ClientId, Timestamp};
use tracing::trace;

/// A received datagram waiting for the dispatch activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// `None` when the type byte is not a known [`MessageType`].
    pub kind: Option<MessageType>,
    pub source_client_id: ClientId,
    /// The whole datagram, header included.
    pub payload: Bytes,
    pub enqueued_at: Timestamp,
    /// Sender address, used to register the client.
    pub source: Option<SocketAddr>,
}

impl QueuedMessage {
    /// Reads the header of a datagram. Only a missing header is rejected
    /// here; the body is validated when the message is routed.
    pub fn from_datagram(
        payload: Bytes,
        source: Option<SocketAddr>,
        now: Timestamp,
    ) -> Result<Self, DispatchError> {
        let header = Header::parse(&payload)?;
        Ok(Self {
            kind: header.message_type().ok(),
            source_client_id: header.client_id,
            payload,
            enqueued_at: now,
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch queue full ({capacity} messages)")]
    QueueFull { capacity: usize },
    #[error("dispatch queue lock timed out")]
    LockTimeout,
    #[error("malformed datagram: {0}")]
    Malformed(#[from] CodecError),
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::QueueFull { .. } | Self::LockTimeout => ErrorCode::CommunicationError,
            Self::Malformed(_) => ErrorCode::InvalidMessage,
        }
    }
}

/// Effect of one drained message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Refresh the sender.
    Touch {
        client_id: ClientId,
        source: Option<SocketAddr>,
    },
    /// Refresh the sender and apply its counters.
    ReportStatus {
        client_id: ClientId,
        source: Option<SocketAddr>,
        report: StatusReport,
    },
    /// Refresh the sender and log the fault it reported.
    RecordError {
        client_id: ClientId,
        source: Option<SocketAddr>,
        code: ErrorCode,
    },
    /// Well-formed but not handled by the host.
    Drop { client_id: ClientId, kind: u8 },
    Malformed {
        client_id: ClientId,
        error: CodecError,
    },
}

/// Decodes a queued message once and decides what it does.
pub fn route(message: &QueuedMessage) -> Action {
    let client_id = message.source_client_id;
    let source = message.source;
    match decode_inbound(&message.payload) {
        Ok(packet) => match packet.message {
            Inbound::Heartbeat => Action::Touch { client_id, source },
            Inbound::Status(report) => Action::ReportStatus {
                client_id,
                source,
                report,
            },
            Inbound::Error(code) => Action::RecordError {
                client_id,
                source,
                code,
            },
        },
        Err(error) if error.is_unrecognized() => Action::Drop {
            client_id,
            kind: message.payload.first().copied().unwrap_or_default(),
        },
        Err(error) => Action::Malformed { client_id, error },
    }
}

#[derive(Debug, Clone)]
struct DispatchMetrics {
    enqueued_total: Counter,
    rejected_total: Counter,
    dropped_total: Counter,
    processed_total: Counter,
    malformed_total: Counter,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self {
            enqueued_total: metrics::counter!("dispatch.enqueued_total"),
            rejected_total: metrics::counter!("dispatch.rejected_total"),
            dropped_total: metrics::counter!("dispatch.dropped_total"),
            processed_total: metrics::counter!("dispatch.processed_total"),
            malformed_total: metrics::counter!("dispatch.malformed_total"),
        }
    }
}

/// Bounded FIFO between transport callbacks and the dispatch activity.
#[derive(Debug)]
pub struct Dispatcher {
    queue: Mutex<VecDeque<QueuedMessage>>,
    capacity: usize,
    lock_timeout: Duration,
    metrics: DispatchMetrics,
}

impl Dispatcher {
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            lock_timeout,
            metrics: DispatchMetrics::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<QueuedMessage>>, DispatchError> {
        self.queue
            .try_lock_for(self.lock_timeout)
            .ok_or(DispatchError::LockTimeout)
    }

    /// Appends `message`, or rejects it when the queue is full. Queued
    /// messages are never displaced.
    pub fn enqueue(&self, message: QueuedMessage) -> Result<(), DispatchError> {
        let mut queue = self.lock().inspect_err(|_| self.metrics.rejected_total.increment(1))?;
        if queue.len() >= self.capacity {
            drop(queue);
            self.metrics.rejected_total.increment(1);
            return Err(DispatchError::QueueFull {
                capacity: self.capacity,
            });
        }
        trace!(client_id = %message.source_client_id, kind = ?message.kind, "message queued");
        queue.push_back(message);
        drop(queue);
        self.metrics.enqueued_total.increment(1);
        Ok(())
    }

    /// Takes every queued message in arrival order, leaving the queue empty.
    pub fn take_batch(&self) -> Result<VecDeque<QueuedMessage>, DispatchError> {
        let mut queue = self.lock()?;
        Ok(std::mem::replace(
            &mut *queue,
            VecDeque::with_capacity(self.capacity),
        ))
    }

    pub fn len(&self) -> Result<usize, DispatchError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, DispatchError> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn count(&self, action: &Action) {
        match action {
            Action::Drop { .. } => self.metrics.dropped_total.increment(1),
            Action::Malformed { .. } => self.metrics.malformed_total.increment(1),
            _ => {}
        }
        self.metrics.processed_total.increment(1);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn message(packet: &'static [u8]) -> QueuedMessage {
        QueuedMessage::from_datagram(
            Bytes::from_static(packet),
            Some("192.168.4.3:4210".parse().unwrap()),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_from_datagram_reads_header() {
        let msg = message(&[0x05, 3, 0, 2, 0, 1]);
        assert_eq!(msg.kind, Some(MessageType::StatusRequest));
        assert_eq!(msg.source_client_id, ClientId::new(3));

        assert_eq!(message(&[0x99, 3]).kind, None);
        assert_matches!(
            QueuedMessage::from_datagram(Bytes::from_static(&[0x05]), None, 0),
            Err(DispatchError::Malformed(CodecError::MissingHeader(1)))
        );
    }

    #[test]
    fn test_route_table() {
        assert_matches!(route(&message(&[0x01, 3])), Action::Touch { .. });
        assert_matches!(
            route(&message(&[0x05, 3, 0, 2, 0, 1])),
            Action::ReportStatus {
                report: StatusReport {
                    hits: 2,
                    misses: 1,
                    ..
                },
                ..
            }
        );
        assert_matches!(
            route(&message(&[0x07, 3, 9])),
            Action::RecordError {
                code: ErrorCode::TrainingError,
                ..
            }
        );
        assert_matches!(
            route(&message(&[0x06, 3, 1])),
            Action::Drop { kind: 0x06, .. }
        );
        assert_matches!(route(&message(&[0x42, 3])), Action::Drop { kind: 0x42, .. });
        assert_matches!(
            route(&message(&[0x05, 3, 0])),
            Action::Malformed {
                error: CodecError::Truncated { .. },
                ..
            }
        );
    }

    #[test]
    fn test_overflow_rejects_newest_and_keeps_order() {
        let dispatcher = Dispatcher::new(2, Duration::from_millis(10));
        dispatcher.enqueue(message(&[0x01, 1])).unwrap();
        dispatcher.enqueue(message(&[0x01, 2])).unwrap();
        assert_eq!(
            dispatcher.enqueue(message(&[0x01, 3])),
            Err(DispatchError::QueueFull { capacity: 2 })
        );

        let ids: Vec<u8> = dispatcher
            .take_batch()
            .unwrap()
            .into_iter()
            .map(|msg| msg.source_client_id.get())
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(dispatcher.is_empty(), Ok(true));
    }

    #[test]
    fn test_contended_queue_skips() {
        let dispatcher = Dispatcher::new(4, Duration::from_millis(10));
        let _guard = dispatcher.queue.lock();
        assert_eq!(
            dispatcher.enqueue(message(&[0x01, 1])),
            Err(DispatchError::LockTimeout)
        );
        assert_matches!(dispatcher.take_batch(), Err(DispatchError::LockTimeout));
    }
}
