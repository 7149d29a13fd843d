use std::time::Duration;

use rangehost_clients::RegistryConfig;
use rangehost_errors::DEFAULT_LOG_CAPACITY;

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_STATUS_BROADCAST_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_TRAINING_MONITOR_INTERVAL: Duration = Duration::from_millis(1_000);

/// Periods of the four host activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Registry pruning.
    pub heartbeat: Duration,
    /// Dispatch queue draining.
    pub dispatch: Duration,
    /// Client list push to supervisors.
    pub status_broadcast: Duration,
    /// Training timeout scan.
    pub training_monitor: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            heartbeat: DEFAULT_HEARTBEAT_INTERVAL,
            dispatch: DEFAULT_DISPATCH_INTERVAL,
            status_broadcast: DEFAULT_STATUS_BROADCAST_INTERVAL,
            training_monitor: DEFAULT_TRAINING_MONITOR_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub registry: RegistryConfig,
    /// Clients unseen for longer than this are evicted.
    pub client_timeout: Duration,
    /// Dispatch queue bound. The newest message is rejected when full.
    pub queue_capacity: usize,
    pub error_log_capacity: usize,
    pub event_channel_capacity: usize,
    pub schedule: ScheduleConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            error_log_capacity: DEFAULT_LOG_CAPACITY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            schedule: ScheduleConfig::default(),
        }
    }
}
