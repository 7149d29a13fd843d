//! Periodic host activities.
//!
//! Each activity runs on its own interval and only touches the component
//! it drives; none of them waits on another. Ticks run on the blocking pool
//! since they take the registry and queue locks.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use rangehost_tasks::TaskExecutor;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::{Host, ScheduleConfig};

/// Spawns heartbeat, dispatch, status broadcast and training monitor.
pub fn spawn_activities(
    host: Arc<Host>,
    schedule: ScheduleConfig,
    executor: &TaskExecutor,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_periodic(executor, "heartbeat", schedule.heartbeat, host.clone(), |host| {
            host.heartbeat();
        }),
        spawn_periodic(executor, "dispatch", schedule.dispatch, host.clone(), |host| {
            host.drain_dispatch();
        }),
        spawn_periodic(
            executor,
            "status_broadcast",
            schedule.status_broadcast,
            host.clone(),
            Host::broadcast_status,
        ),
        spawn_periodic(
            executor,
            "training_monitor",
            schedule.training_monitor,
            host,
            |host| {
                host.monitor_training();
            },
        ),
    ]
}

fn spawn_periodic(
    executor: &TaskExecutor,
    name: &'static str,
    period: Duration,
    host: Arc<Host>,
    tick: fn(&Host),
) -> JoinHandle<()> {
    executor.spawn_critical_with_graceful_shutdown_signal(name, move |mut shutdown| async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    debug!(task = name, "activity shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = host.run_blocking(tick).await {
                        error!(task = name, %err, "activity tick panicked");
                    }
                }
            }
        }
        Ok::<(), Infallible>(())
    })
}

#[cfg(test)]
mod tests {
    use rangehost_primitives::{ClientId, ManualClock};
    use rangehost_tasks::TaskManager;
    use rangehost_training::TrainingConfig;

    use super::*;
    use crate::{HostConfig, HostEvent, MemorySink};

    fn host(clock: Arc<ManualClock>) -> Arc<Host> {
        Arc::new(Host::new(
            HostConfig::default(),
            Arc::new(MemorySink::new()),
            clock,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_activities_drive_host() {
        let clock = Arc::new(ManualClock::new(0));
        let host = host(clock.clone());
        let manager = TaskManager::current();
        let handles = spawn_activities(host.clone(), ScheduleConfig::default(), &manager.executor());
        assert_eq!(handles.len(), 4);

        host.on_datagram(&[0x01, 3], "192.168.4.3:4210".parse().unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(host.clients().unwrap().len(), 1);

        let mut rx = host.subscribe();
        assert!(host.start_training(ClientId::new(3), TrainingConfig::default().with_duration(5)));
        assert!(matches!(rx.recv().await.unwrap(), HostEvent::TrainingStarted { .. }));

        // keep the node alive while the session runs out
        clock.set(5_000);
        host.on_datagram(&[0x01, 3], "192.168.4.3:4210".parse().unwrap());
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let mut completed = None;
        while let Ok(event) = rx.try_recv() {
            if let HostEvent::TrainingCompleted { result, .. } = event {
                completed = Some(result);
            }
        }
        assert_eq!(completed.map(|result| result.total_time_ms), Some(5_000));

        clock.set(20_000);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert!(host.clients().unwrap().is_empty());

        assert!(manager.graceful_shutdown_with_timeout(Duration::from_secs(1)).await);
    }
}
