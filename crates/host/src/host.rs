//! Host facade.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use rangehost_clients::{Client, ClientRegistry, ClientSnapshot, RegistryError};
use rangehost_errors::{ErrorCode, ErrorLog, ErrorRecord};
use rangehost_net_codec::{Command, CommandError};
use rangehost_primitives::{ClientId, Clock, Effect, Rgb, Timestamp};
use rangehost_training::{
    DefaultScoring, ScoringPolicy, SessionSnapshot, TrainingConfig, TrainingResult,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{debug, trace};

use crate::{
    Action, DatagramSink, DispatchError, Dispatcher, EventEmitter, HostConfig, HostEvent,
    Outbound, QueuedMessage, TrainingEngine, route,
};

/// Training state of one client as reported to supervisors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub client_id: ClientId,
    #[serde(flatten)]
    pub session: SessionSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<TrainingResult>,
}

/// Owns every host component and exposes the command surface used by the
/// API and push channel.
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    clock: Arc<dyn Clock>,
    registry: Arc<ClientRegistry>,
    errors: Arc<ErrorLog>,
    outbound: Arc<Outbound>,
    dispatcher: Dispatcher,
    engine: TrainingEngine,
    events: EventEmitter,
}

impl Host {
    pub fn new(config: HostConfig, sink: Arc<dyn DatagramSink>, clock: Arc<dyn Clock>) -> Self {
        Self::with_scoring(config, sink, clock, Arc::new(DefaultScoring))
    }

    pub fn with_scoring(
        config: HostConfig,
        sink: Arc<dyn DatagramSink>,
        clock: Arc<dyn Clock>,
        scoring: Arc<dyn ScoringPolicy>,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::new(config.registry));
        let errors = Arc::new(ErrorLog::new(config.error_log_capacity, clock.clone()));
        let outbound = Arc::new(Outbound::new(sink, registry.clone(), errors.clone()));
        let events = EventEmitter::new(config.event_channel_capacity);
        let dispatcher = Dispatcher::new(config.queue_capacity, config.registry.lock_timeout);
        let engine = TrainingEngine::new(
            registry.clone(),
            errors.clone(),
            outbound.clone(),
            events.clone(),
            clock.clone(),
            scoring,
        );

        Self {
            config,
            clock,
            registry,
            errors,
            outbound,
            dispatcher,
            engine,
            events,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn engine(&self) -> &TrainingEngine {
        &self.engine
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Runs `f` against the host on the blocking pool.
    ///
    /// Registry and queue access may wait up to the configured lock timeout.
    /// Async callers go through here so that wait never parks a runtime
    /// worker. Fails only if `f` panics.
    pub async fn run_blocking<F, R>(self: &Arc<Self>, f: F) -> Result<R, JoinError>
    where
        F: FnOnce(&Self) -> R + Send + 'static,
        R: Send + 'static,
    {
        let host = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&host)).await
    }

    // --- inbound ---------------------------------------------------------

    /// Transport callback: queues a raw datagram from `source`.
    pub fn on_datagram(&self, datagram: &[u8], source: SocketAddr) -> bool {
        let now = self.clock.now_ms();
        match QueuedMessage::from_datagram(Bytes::copy_from_slice(datagram), Some(source), now) {
            Ok(message) => self.enqueue(message).is_ok(),
            Err(err) => {
                self.errors.record_host(err.code(), format!("{err} from {source}"));
                false
            }
        }
    }

    /// Queues a message, recording a rejection in the error log.
    pub fn enqueue(&self, message: QueuedMessage) -> Result<(), DispatchError> {
        let client_id = message.source_client_id;
        self.dispatcher.enqueue(message).inspect_err(|err| {
            self.errors.record(err.code(), err.to_string(), client_id);
        })
    }

    /// Drains the dispatch queue and applies every message in arrival order.
    /// Returns the number of messages processed.
    pub fn drain_dispatch(&self) -> usize {
        let batch = match self.dispatcher.take_batch() {
            Ok(batch) => batch,
            Err(err) => {
                trace!(%err, "dispatch drain skipped");
                return 0;
            }
        };

        let processed = batch.len();
        for message in batch {
            let action = route(&message);
            self.dispatcher.count(&action);
            self.apply(action, message.enqueued_at);
        }
        processed
    }

    fn apply(&self, action: Action, received_at: Timestamp) {
        match action {
            Action::Touch { client_id, source } => {
                self.touch(client_id, source, received_at);
            }
            Action::ReportStatus {
                client_id,
                source,
                report,
            } => {
                if self.touch(client_id, source, received_at) {
                    self.engine.report_status(client_id, report);
                }
            }
            Action::RecordError {
                client_id,
                source,
                code,
            } => {
                self.touch(client_id, source, received_at);
                if let Err(err) = self
                    .registry
                    .with_client_mut(client_id, |client| client.last_error = Some(code))
                {
                    trace!(%client_id, %err, "last error not stored");
                }
                self.errors.record(code, "client error reported", client_id);
            }
            Action::Drop { client_id, kind } => {
                debug!(%client_id, kind, "unhandled message type dropped");
            }
            Action::Malformed { client_id, error } => {
                self.errors
                    .record(ErrorCode::InvalidMessage, error.to_string(), client_id);
            }
        }
    }

    /// Registers or refreshes the sender of an accepted packet. Returns
    /// whether the client is now known.
    fn touch(&self, id: ClientId, source: Option<SocketAddr>, received_at: Timestamp) -> bool {
        let Some(addr) = source else {
            return matches!(self.registry.with_client(id, |_| ()), Ok(Some(())));
        };
        match self.registry.upsert(id, addr, received_at) {
            Ok(_) => true,
            Err(RegistryError::Full { capacity }) => {
                self.errors.record(
                    ErrorCode::MemoryError,
                    format!("client registry full ({capacity})"),
                    id,
                );
                false
            }
            Err(err) => {
                self.errors
                    .record(ErrorCode::CommunicationError, err.to_string(), id);
                false
            }
        }
    }

    // --- periodic activities ---------------------------------------------

    /// Evicts stale and inactive clients.
    pub fn heartbeat(&self) -> usize {
        let now = self.clock.now_ms();
        match self.registry.prune(now, self.config.client_timeout) {
            Ok(pruned) => {
                if pruned > 0 {
                    debug!(pruned, "stale clients pruned");
                }
                pruned
            }
            Err(err) => {
                trace!(%err, "heartbeat skipped");
                0
            }
        }
    }

    /// Pushes the client list to supervisors.
    pub fn broadcast_status(&self) {
        if self.events.subscriber_count() == 0 {
            return;
        }
        match self.registry.snapshot(self.clock.now_ms()) {
            Ok(clients) => self.events.client_list(clients),
            Err(err) => trace!(%err, "status broadcast skipped"),
        }
    }

    /// Stops sessions whose duration has elapsed.
    pub fn monitor_training(&self) -> usize {
        self.engine.stop_expired()
    }

    // --- command surface -------------------------------------------------

    pub fn start_training(&self, id: ClientId, config: TrainingConfig) -> bool {
        self.engine.start(id, config)
    }

    pub fn stop_training(&self, id: ClientId) -> Option<TrainingResult> {
        self.engine.stop(id)
    }

    /// Sets the color of one client, or of all clients on broadcast.
    pub fn send_led(&self, id: ClientId, color: Rgb) -> bool {
        self.update_clients(id, |client| client.color = color);
        self.outbound.send(&Command::Led { target: id, color })
    }

    /// Sets the effect of one client, or of all clients on broadcast.
    pub fn send_effect(&self, id: ClientId, effect: Effect) -> bool {
        self.update_clients(id, |client| client.effect = effect);
        self.outbound.send(&Command::Effect { target: id, effect })
    }

    pub fn send_buzzer(
        &self,
        id: ClientId,
        frequency_hz: u16,
        duration_ms: u16,
    ) -> Result<bool, CommandError> {
        let command = Command::buzzer(id, frequency_hz, duration_ms).inspect_err(|err| {
            self.errors
                .record(ErrorCode::HardwareError, err.to_string(), id);
        })?;
        Ok(self.outbound.send(&command))
    }

    fn update_clients(&self, id: ClientId, mut update: impl FnMut(&mut Client)) {
        let outcome = if id.is_broadcast() {
            self.registry
                .filter_map_mut(|client| {
                    update(client);
                    None::<()>
                })
                .map(drop)
        } else {
            self.registry.with_client_mut(id, update).map(drop)
        };
        if let Err(err) = outcome {
            trace!(client_id = %id, %err, "client state not updated");
        }
    }

    pub fn clients(&self) -> Result<Vec<ClientSnapshot>, RegistryError> {
        self.registry.snapshot(self.clock.now_ms())
    }

    /// Training state of one client, or of every client when `id` is `None`.
    pub fn training_status(
        &self,
        id: Option<ClientId>,
    ) -> Result<Vec<TrainingStatus>, RegistryError> {
        let now = self.clock.now_ms();
        let status = |client: &Client| TrainingStatus {
            client_id: client.id,
            session: client.training.snapshot(now),
            last_result: client.last_result.clone(),
        };
        match id {
            Some(id) => Ok(self.registry.with_client(id, status)?.into_iter().collect()),
            None => self.registry.filter_map_mut(|client| Some(status(client))),
        }
    }

    pub fn initial_state(&self) -> Result<HostEvent, RegistryError> {
        Ok(HostEvent::InitialState {
            clients: self.clients()?,
        })
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.snapshot()
    }

    pub fn clear_errors(&self) {
        self.errors.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}
