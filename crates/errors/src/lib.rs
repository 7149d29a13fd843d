//! Categorized fault log.
//!
//! Every runtime fault the host survives (malformed packets, lock timeouts,
//! sends to unknown clients, authentication failures) ends up here instead of
//! being propagated. The log is bounded: once [`ErrorLog::capacity`] records
//! are held, the oldest is evicted for each new one.

mod code;
mod log;

pub use code::{ErrorCode, UnknownErrorCode};
pub use log::{DEFAULT_LOG_CAPACITY, ErrorLog, ErrorRecord};
