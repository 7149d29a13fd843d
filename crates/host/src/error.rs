use std::io;
use std::net::SocketAddr;

use rangehost_errors::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to bind datagram socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable broadcast on datagram socket: {0}")]
    Broadcast(#[source] io::Error),
}

impl HostError {
    /// Error log category of this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Bind { .. } | Self::Broadcast(_) => ErrorCode::UdpInitFailed,
        }
    }
}
