//! Defaults used by the node CLI and configuration.
//!
//! Host-internal defaults (intervals, capacities) live next to the types
//! they configure and are re-exported here where the node needs them.

use std::net::{IpAddr, Ipv4Addr};

pub use rangehost_clients::{DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_CLIENTS};
pub use rangehost_errors::DEFAULT_LOG_CAPACITY;
pub use rangehost_host::{
    DEFAULT_CLIENT_TIMEOUT, DEFAULT_DISPATCH_INTERVAL, DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_STATUS_BROADCAST_INTERVAL, DEFAULT_TRAINING_MONITOR_INTERVAL,
};
pub use rangehost_rpc_server::{
    DEFAULT_LOCKOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_PUSH_CLIENTS, DEFAULT_USERNAME,
};

// =============================================================================
// Datagram transport
// =============================================================================

/// Port the remote nodes send to and listen on.
pub const DEFAULT_UDP_PORT: u16 = 4210;

/// Largest datagram read in one receive.
pub const DEFAULT_UDP_BUFFER_SIZE: usize = 256;

/// Listen address for both transports (all interfaces).
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

pub const DEFAULT_BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

// =============================================================================
// Supervisor API
// =============================================================================

pub const DEFAULT_HTTP_PORT: u16 = 80;

// =============================================================================
// Configuration
// =============================================================================

/// Prefix of configuration environment variables. Nested keys are split on
/// `__`, e.g. `RANGEHOST_SECURITY__PASSWORD`.
pub const ENV_PREFIX: &str = "RANGEHOST_";

/// Separator between nested keys in environment variables.
pub const ENV_SEPARATOR: &str = "__";

/// Environment key (after the prefix) naming the config file, read by the CLI
/// rather than merged into the config.
pub const CONFIG_ENV_KEY: &str = "config";
