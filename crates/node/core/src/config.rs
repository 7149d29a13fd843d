//! Layered node configuration.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments (applied after loading, see [`NodeArgs::apply`](crate::args::NodeArgs::apply))
//! 2. Config file (TOML)
//! 3. Environment variables (`RANGEHOST_` prefix, nested keys split on `__`)
//! 4. Defaults

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use eyre::{Result, WrapErr, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rangehost_clients::RegistryConfig;
use rangehost_host::{DEFAULT_EVENT_CHANNEL_CAPACITY, HostConfig, ScheduleConfig};
use rangehost_rpc_server::{ApiConfig, Credentials, LockoutPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::*;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub clients: ClientsConfig,
    pub tasks: TasksConfig,
    pub dispatch: DispatchConfig,
    pub errors: ErrorsConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen address of the datagram socket.
    pub bind_addr: IpAddr,
    pub udp_port: u16,
    pub udp_buffer_size: usize,
    /// Destination of broadcast commands.
    pub broadcast_addr: Ipv4Addr,
    pub http_addr: IpAddr,
    pub http_port: u16,
    /// Concurrent push channel supervisors.
    pub max_push_clients: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            udp_port: DEFAULT_UDP_PORT,
            udp_buffer_size: DEFAULT_UDP_BUFFER_SIZE,
            broadcast_addr: DEFAULT_BROADCAST_ADDR,
            http_addr: DEFAULT_BIND_ADDR,
            http_port: DEFAULT_HTTP_PORT,
            max_push_clients: DEFAULT_MAX_PUSH_CLIENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientsConfig {
    pub max_clients: usize,
    pub timeout_ms: u64,
    pub lock_timeout_ms: u64,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            timeout_ms: millis(DEFAULT_CLIENT_TIMEOUT),
            lock_timeout_ms: millis(DEFAULT_LOCK_TIMEOUT),
        }
    }
}

/// Periods of the host activities, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub heartbeat_ms: u64,
    pub dispatch_ms: u64,
    pub status_broadcast_ms: u64,
    pub training_monitor_ms: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: millis(DEFAULT_HEARTBEAT_INTERVAL),
            dispatch_ms: millis(DEFAULT_DISPATCH_INTERVAL),
            status_broadcast_ms: millis(DEFAULT_STATUS_BROADCAST_INTERVAL),
            training_monitor_ms: millis(DEFAULT_TRAINING_MONITOR_INTERVAL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    pub capacity: usize,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// API credentials and login lockout.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub username: String,
    /// Has no default and must be configured.
    pub password: String,
    pub max_failed_attempts: u32,
    pub lockout_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            max_failed_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_secs: DEFAULT_LOCKOUT.as_secs(),
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("lockout_secs", &self.lockout_secs)
            .finish()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl NodeConfig {
    /// Loads defaults, environment and, when given, the config file.
    /// CLI overrides are applied separately.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&[CONFIG_ENV_KEY])
                    .split(ENV_SEPARATOR),
            );

        if let Some(path) = config_path {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }

        figment.extract().wrap_err("failed to load configuration")
    }

    /// Rejects settings the host cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.security.password.is_empty() {
            bail!("security.password must be set (e.g. RANGEHOST_SECURITY__PASSWORD)");
        }
        if self.security.max_failed_attempts == 0 {
            bail!("security.max_failed_attempts must be at least 1");
        }
        if self.clients.max_clients == 0 {
            bail!("clients.max_clients must be at least 1");
        }
        if self.dispatch.queue_capacity == 0 || self.errors.capacity == 0 {
            bail!("dispatch.queue_capacity and errors.capacity must be at least 1");
        }
        if self.network.udp_buffer_size < 2 {
            bail!("network.udp_buffer_size must hold at least a packet header");
        }
        let periods = [
            self.tasks.heartbeat_ms,
            self.tasks.dispatch_ms,
            self.tasks.status_broadcast_ms,
            self.tasks.training_monitor_ms,
        ];
        if periods.contains(&0) {
            bail!("task periods must be non-zero");
        }
        Ok(())
    }

    pub fn udp_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.bind_addr, self.network.udp_port)
    }

    /// Broadcast destination; remote nodes listen on the same port.
    pub fn broadcast_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.network.broadcast_addr), self.network.udp_port)
    }

    pub fn http_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.http_addr, self.network.http_port)
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            registry: RegistryConfig {
                max_clients: self.clients.max_clients,
                lock_timeout: Duration::from_millis(self.clients.lock_timeout_ms),
            },
            client_timeout: Duration::from_millis(self.clients.timeout_ms),
            queue_capacity: self.dispatch.queue_capacity,
            error_log_capacity: self.errors.capacity,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            schedule: ScheduleConfig {
                heartbeat: Duration::from_millis(self.tasks.heartbeat_ms),
                dispatch: Duration::from_millis(self.tasks.dispatch_ms),
                status_broadcast: Duration::from_millis(self.tasks.status_broadcast_ms),
                training_monitor: Duration::from_millis(self.tasks.training_monitor_ms),
            },
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            credentials: Credentials::new(&self.security.username, &self.security.password),
            lockout: LockoutPolicy {
                max_attempts: self.security.max_failed_attempts,
                lockout: Duration::from_secs(self.security.lockout_secs),
            },
            max_push_clients: self.network.max_push_clients,
        }
    }
}
