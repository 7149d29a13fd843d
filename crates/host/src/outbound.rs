use std::net::SocketAddr;
use std::sync::Arc;

use rangehost_clients::ClientRegistry;
use rangehost_errors::{ErrorCode, ErrorLog};
use rangehost_net_codec::Command;
use rangehost_primitives::ClientId;
use tracing::{trace, warn};

use crate::DatagramSink;

/// Encodes commands and routes them to a unicast address or the broadcast
/// address.
///
/// Failures never propagate: they are recorded in the error log and the
/// send reports `false`.
#[derive(Debug)]
pub struct Outbound {
    sink: Arc<dyn DatagramSink>,
    registry: Arc<ClientRegistry>,
    errors: Arc<ErrorLog>,
}

impl Outbound {
    pub fn new(
        sink: Arc<dyn DatagramSink>,
        registry: Arc<ClientRegistry>,
        errors: Arc<ErrorLog>,
    ) -> Self {
        Self {
            sink,
            registry,
            errors,
        }
    }

    /// Sends to the command's target, resolving unicast ids through the
    /// registry. Unknown or inactive ids are reported and skipped.
    pub fn send(&self, command: &Command) -> bool {
        let target = command.target();
        if target.is_broadcast() {
            let Some(packet) = self.encode(command) else {
                return false;
            };
            return match self.sink.broadcast(&packet) {
                Ok(()) => {
                    trace!(kind = %command.message_type(), "broadcast sent");
                    true
                }
                Err(err) => {
                    self.errors.record_host(
                        ErrorCode::CommunicationError,
                        format!("broadcast failed: {err}"),
                    );
                    false
                }
            };
        }

        match self.registry.resolve(target) {
            Ok(Some(addr)) => self.send_to(addr, command),
            Ok(None) => {
                self.errors.record(
                    ErrorCode::CommunicationError,
                    format!("no active client for {}", command.message_type()),
                    target,
                );
                false
            }
            Err(err) => {
                self.errors
                    .record(ErrorCode::CommunicationError, err.to_string(), target);
                false
            }
        }
    }

    /// Sends to an already resolved address. A socket failure deactivates the
    /// target so the next prune evicts it.
    pub fn send_to(&self, addr: SocketAddr, command: &Command) -> bool {
        let target = command.target();
        let Some(packet) = self.encode(command) else {
            return false;
        };
        match self.sink.unicast(addr, &packet) {
            Ok(()) => {
                trace!(client_id = %target, %addr, kind = %command.message_type(), "command sent");
                true
            }
            Err(err) => {
                warn!(client_id = %target, %addr, %err, "unicast failed");
                self.errors.record(
                    ErrorCode::CommunicationError,
                    format!("send to {addr} failed: {err}"),
                    target,
                );
                self.deactivate(target);
                false
            }
        }
    }

    fn encode(&self, command: &Command) -> Option<bytes::Bytes> {
        match command.encode() {
            Ok(packet) => Some(packet),
            Err(err) => {
                self.errors
                    .record(ErrorCode::HardwareError, err.to_string(), command.target());
                None
            }
        }
    }

    fn deactivate(&self, id: ClientId) {
        if let Err(err) = self.registry.deactivate(id) {
            trace!(client_id = %id, %err, "deactivate skipped");
        }
    }
}
