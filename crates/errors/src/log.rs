//! Ring-buffer fault log.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rangehost_primitives::{ClientId, Clock, Timestamp};
use serde::Serialize;
use tracing::warn;

use crate::ErrorCode;

/// Default number of records kept.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// One logged fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub code: ErrorCode,
    /// Snake-case name of `code`.
    pub kind: &'static str,
    pub message: String,
    pub timestamp: Timestamp,
    /// Reporting client, [`ClientId::HOST`] for host-level faults.
    pub client_id: ClientId,
}

/// Bounded append-only fault log.
///
/// Recording never fails: at capacity the oldest record is evicted first.
#[derive(Debug)]
pub struct ErrorLog {
    entries: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl ErrorLog {
    /// Creates a log holding at most `capacity` records (at least one).
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a record stamped with the current time.
    pub fn record(&self, code: ErrorCode, message: impl Into<String>, client_id: ClientId) {
        let message = message.into();
        warn!(%code, %client_id, %message, "fault recorded");

        let record = ErrorRecord {
            code,
            kind: code.name(),
            message,
            timestamp: self.clock.now_ms(),
            client_id,
        };

        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Records a host-level fault.
    pub fn record_host(&self, code: ErrorCode, message: impl Into<String>) {
        self.record(code, message, ClientId::HOST);
    }

    /// Copy of all records, oldest first.
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
