//! Training session state machine.
//!
//! Each client's session is `Idle -> Running -> Idle`. Every transition for a
//! client runs inside that client's registry closure, so a status report and
//! a stop for the same client never interleave. Sends, error records and
//! events happen after the closure returns.

use std::sync::Arc;

use rangehost_clients::{ClientRegistry, RegistryError};
use rangehost_errors::{ErrorCode, ErrorLog};
use rangehost_net_codec::{Command, StatusReport};
use rangehost_primitives::{ClientId, Clock};
use rangehost_training::{ScoringPolicy, TrainingConfig, TrainingResult};
use tracing::{debug, info, trace};

use crate::{EventEmitter, Outbound};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopWhen {
    Running,
    Expired,
}

#[derive(Debug)]
pub struct TrainingEngine {
    registry: Arc<ClientRegistry>,
    errors: Arc<ErrorLog>,
    outbound: Arc<Outbound>,
    events: EventEmitter,
    clock: Arc<dyn Clock>,
    scoring: Arc<dyn ScoringPolicy>,
}

impl TrainingEngine {
    pub fn new(
        registry: Arc<ClientRegistry>,
        errors: Arc<ErrorLog>,
        outbound: Arc<Outbound>,
        events: EventEmitter,
        clock: Arc<dyn Clock>,
        scoring: Arc<dyn ScoringPolicy>,
    ) -> Self {
        Self {
            registry,
            errors,
            outbound,
            events,
            clock,
            scoring,
        }
    }

    pub fn scoring(&self) -> &dyn ScoringPolicy {
        &*self.scoring
    }

    /// Starts (or restarts) a session on an active client.
    ///
    /// An unknown or inactive client is a logged no-op; returns whether the
    /// session started.
    pub fn start(&self, id: ClientId, config: TrainingConfig) -> bool {
        let now = self.clock.now_ms();
        let started = self.registry.with_client_mut(id, |client| {
            if !client.active {
                return None;
            }
            if client.training.is_running() {
                debug!(client_id = %id, "restarting running session");
            }
            client.training.begin(config, now);
            client.brightness = config.brightness;
            Some(client.addr)
        });

        let addr = match started {
            Ok(Some(Some(addr))) => addr,
            Ok(_) => {
                self.errors.record(
                    ErrorCode::TrainingError,
                    "training start for unknown or inactive client",
                    id,
                );
                return false;
            }
            Err(err) => {
                self.registry_busy(id, err);
                return false;
            }
        };

        self.outbound
            .send_to(addr, &Command::training_start(id, &config));
        metrics::counter!("training.started_total").increment(1);
        info!(client_id = %id, mode = %config.mode, difficulty = %config.difficulty, duration_s = config.duration, "training started");
        self.events.training_started(id, config);
        true
    }

    /// Applies a node's counters and rescores. Ignored for unknown or
    /// inactive clients.
    pub fn report_status(&self, id: ClientId, report: StatusReport) -> bool {
        let now = self.clock.now_ms();
        let scoring = &*self.scoring;
        let updated = self.registry.with_client_mut(id, |client| {
            if !client.active {
                return None;
            }
            let training = &mut client.training;
            training.result.apply_report(
                report.hits,
                report.misses,
                report.avg_reaction_time_ms,
                scoring,
            );
            Some((training.elapsed_ms(now), training.result.clone()))
        });

        match updated {
            Ok(Some(Some((elapsed_ms, result)))) => {
                trace!(client_id = %id, hits = result.hits, misses = result.misses, score = result.score(), "status applied");
                self.events.training_status(id, elapsed_ms, result);
                true
            }
            Ok(_) => {
                trace!(client_id = %id, "status from unknown or inactive client");
                false
            }
            Err(err) => {
                self.registry_busy(id, err);
                false
            }
        }
    }

    /// Finalizes a running session: stamps the total time, rescores, tells
    /// the node to stop, and emits the final result before the session
    /// returns to idle.
    pub fn stop(&self, id: ClientId) -> Option<TrainingResult> {
        self.finish(id, StopWhen::Running)
    }

    /// Stops the session only if it is still active and past its duration
    /// when the client's closure runs. A session restarted after the monitor
    /// scanned is left alone.
    pub fn stop_if_expired(&self, id: ClientId) -> Option<TrainingResult> {
        self.finish(id, StopWhen::Expired)
    }

    /// Stops every active session whose duration has run out. Returns the
    /// number stopped.
    pub fn stop_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let expired = self.registry.filter_map_mut(|client| {
            (client.active && client.training.is_expired(now)).then_some(client.id)
        });

        match expired {
            Ok(ids) => ids
                .into_iter()
                .filter(|&id| self.stop_if_expired(id).is_some())
                .count(),
            Err(err) => {
                trace!(%err, "training monitor skipped");
                0
            }
        }
    }

    fn finish(&self, id: ClientId, when: StopWhen) -> Option<TrainingResult> {
        let now = self.clock.now_ms();
        let scoring = &*self.scoring;
        let finished = self.registry.with_client_mut(id, |client| {
            if when == StopWhen::Expired && !(client.active && client.training.is_expired(now)) {
                return Err(());
            }
            let result = client.training.finish(now, scoring).ok_or(())?;
            client.last_result = Some(result.clone());
            Ok((client.active.then_some(client.addr), result))
        });

        let (addr, result) = match finished {
            Ok(Some(Ok(finished))) => finished,
            Ok(Some(Err(()))) => {
                match when {
                    StopWhen::Running => debug!(client_id = %id, "stop without running session"),
                    StopWhen::Expired => trace!(client_id = %id, "session no longer expired"),
                }
                return None;
            }
            Ok(None) => {
                if when == StopWhen::Running {
                    self.errors
                        .record(ErrorCode::TrainingError, "training stop for unknown client", id);
                }
                return None;
            }
            Err(err) => {
                self.registry_busy(id, err);
                return None;
            }
        };

        if when == StopWhen::Expired {
            debug!(client_id = %id, "training duration elapsed");
        }
        if let Some(addr) = addr {
            self.outbound
                .send_to(addr, &Command::TrainingStop { target: id });
        }
        metrics::counter!("training.completed_total").increment(1);
        info!(client_id = %id, hits = result.hits, misses = result.misses, total_time_ms = result.total_time_ms, score = result.score(), "training completed");
        self.events.training_completed(id, result.clone());
        Some(result)
    }

    fn registry_busy(&self, id: ClientId, err: RegistryError) {
        self.errors
            .record(ErrorCode::CommunicationError, err.to_string(), id);
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use rangehost_net_codec::MessageType;
    use rangehost_primitives::ManualClock;
    use rangehost_training::{DefaultScoring, Difficulty, TrainingMode};

    use super::*;
    use crate::{Destination, HostEvent, MemorySink};

    const CLIENT: ClientId = ClientId::new(3);

    struct Fixture {
        clock: Arc<ManualClock>,
        sink: Arc<MemorySink>,
        registry: Arc<ClientRegistry>,
        errors: Arc<ErrorLog>,
        events: EventEmitter,
        engine: TrainingEngine,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let sink = Arc::new(MemorySink::new());
        let registry = Arc::new(ClientRegistry::default());
        let errors = Arc::new(ErrorLog::new(16, clock.clone()));
        let outbound = Arc::new(Outbound::new(
            sink.clone(),
            registry.clone(),
            errors.clone(),
        ));
        let events = EventEmitter::new(16);
        let engine = TrainingEngine::new(
            registry.clone(),
            errors.clone(),
            outbound,
            events.clone(),
            clock.clone(),
            Arc::new(DefaultScoring),
        );
        Fixture {
            clock,
            sink,
            registry,
            errors,
            events,
            engine,
        }
    }

    fn addr() -> SocketAddr {
        "192.168.4.3:4210".parse().unwrap()
    }

    fn config(secs: u16) -> TrainingConfig {
        TrainingConfig::new(TrainingMode::ReactionTraining, Difficulty::Medium).with_duration(secs)
    }

    #[test]
    fn test_start_unknown_client_logs_once() {
        let f = fixture();
        assert!(!f.engine.start(CLIENT, config(5)));

        assert_eq!(f.registry.is_empty(), Ok(true));
        let errors = f.errors.snapshot();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::TrainingError);
        assert_eq!(errors[0].client_id, CLIENT);
        assert!(f.sink.sent().is_empty());
    }

    #[test]
    fn test_start_inactive_client_is_noop() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        f.registry.deactivate(CLIENT).unwrap();

        assert!(!f.engine.start(CLIENT, config(5)));
        let running = f
            .registry
            .with_client(CLIENT, |client| client.training.is_running())
            .unwrap();
        assert_eq!(running, Some(false));
        assert_eq!(f.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_start_sends_command_and_notifies() {
        let f = fixture();
        let mut rx = f.events.subscribe();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();

        let mut cfg = config(5);
        cfg.brightness = 40;
        assert!(f.engine.start(CLIENT, cfg));

        let sent = f.sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, Destination::Unicast(addr()));
        assert_eq!(
            Command::decode(&sent[0].bytes).unwrap(),
            Command::training_start(CLIENT, &cfg)
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            HostEvent::TrainingStarted {
                client_id: CLIENT,
                config: cfg
            }
        );
        let brightness = f
            .registry
            .with_client(CLIENT, |client| client.brightness)
            .unwrap();
        assert_eq!(brightness, Some(40));
    }

    #[test]
    fn test_status_updates_counters_and_score() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        f.engine.start(CLIENT, config(60));

        assert!(f.engine.report_status(
            CLIENT,
            StatusReport {
                hits: 2,
                misses: 1,
                avg_reaction_time_ms: Some(800),
            }
        ));
        let result = f
            .registry
            .with_client(CLIENT, |client| client.training.result.clone())
            .unwrap()
            .unwrap();
        assert_eq!((result.hits, result.misses), (2, 1));
        assert_eq!(result.score(), DefaultScoring.score(2, 1, 800));
    }

    #[tokio::test]
    async fn test_monitor_stops_expired_session() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        assert!(f.engine.start(CLIENT, config(5)));
        f.sink.take();
        let mut rx = f.events.subscribe();

        f.clock.advance(Duration::from_millis(4_999));
        assert_eq!(f.engine.stop_expired(), 0);

        f.clock.advance(Duration::from_millis(1));
        assert_eq!(f.engine.stop_expired(), 1);

        let HostEvent::TrainingCompleted { client_id, result } = rx.recv().await.unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(client_id, CLIENT);
        assert_eq!(result.total_time_ms, 5_000);

        let sent = f.sink.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bytes, vec![MessageType::EffectCommand.as_u8(), 3, 0xFF]);

        let (running, last) = f
            .registry
            .with_client(CLIENT, |client| {
                (client.training.is_running(), client.last_result.clone())
            })
            .unwrap()
            .unwrap();
        assert!(!running);
        assert_eq!(last, Some(result));
        assert_eq!(f.engine.stop_expired(), 0);
    }

    #[test]
    fn test_stop_idle_and_unknown() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        assert_eq!(f.engine.stop(CLIENT), None);
        assert!(f.errors.is_empty());

        assert_eq!(f.engine.stop(ClientId::new(8)), None);
        assert_eq!(f.errors.len(), 1);
    }

    #[test]
    fn test_final_score_from_counters() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        f.engine.start(CLIENT, config(60));
        f.engine.report_status(
            CLIENT,
            StatusReport {
                hits: 10,
                misses: 0,
                avg_reaction_time_ms: Some(500),
            },
        );
        f.clock.advance(Duration::from_millis(12_345));

        let result = f.engine.stop(CLIENT).unwrap();
        assert_eq!(result.total_time_ms, 12_345);
        assert_eq!(result.score(), 1_650);
    }

    #[test]
    fn test_restart_resets_expiry() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        assert!(f.engine.start(CLIENT, config(5)));

        f.clock.advance(Duration::from_millis(4_000));
        assert!(f.engine.start(CLIENT, config(5)));

        f.clock.advance(Duration::from_millis(2_000));
        assert_eq!(f.engine.stop_expired(), 0);
        f.clock.advance(Duration::from_millis(3_000));
        assert_eq!(f.engine.stop_expired(), 1);
    }

    #[test]
    fn test_session_restarted_after_scan_survives() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        assert!(f.engine.start(CLIENT, config(5)));
        f.clock.advance(Duration::from_millis(5_000));

        // the scan saw an expired session, then a restart lands before the stop
        let expired = f
            .registry
            .filter_map_mut(|client| client.training.is_expired(6_000).then_some(client.id))
            .unwrap();
        assert_eq!(expired, vec![CLIENT]);
        assert!(f.engine.start(CLIENT, config(60)));
        f.sink.take();

        assert_eq!(f.engine.stop_if_expired(CLIENT), None);
        let (running, last) = f
            .registry
            .with_client(CLIENT, |client| {
                (client.training.is_running(), client.last_result.clone())
            })
            .unwrap()
            .unwrap();
        assert!(running);
        assert_eq!(last, None);
        assert!(f.sink.sent().is_empty());
        assert!(f.errors.is_empty());
    }

    #[test]
    fn test_monitor_skips_inactive_client() {
        let f = fixture();
        f.registry.upsert(CLIENT, addr(), 1_000).unwrap();
        assert!(f.engine.start(CLIENT, config(5)));
        f.registry.deactivate(CLIENT).unwrap();
        f.clock.advance(Duration::from_millis(10_000));

        assert_eq!(f.engine.stop_expired(), 0);
        assert_eq!(f.engine.stop_if_expired(CLIENT), None);
        let running = f
            .registry
            .with_client(CLIENT, |client| client.training.is_running())
            .unwrap();
        assert_eq!(running, Some(true));
    }
}
