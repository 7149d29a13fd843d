//! WebSocket push channel.
//!
//! Each connected supervisor receives `initial_state` on connect and then
//! every host event as a JSON text frame. Supervisors may send
//! `getClients`, `startTraining` and `stopTraining` commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{Sink, SinkExt, StreamExt};
use rangehost_errors::ErrorCode;
use rangehost_host::{Host, HostEvent};
use rangehost_primitives::ClientId;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};

use crate::routes::TrainingRequest;
use crate::{ApiError, ApiState, Authorized};

pub const DEFAULT_MAX_PUSH_CLIENTS: usize = 8;

/// Counts open push connections against a fixed limit.
#[derive(Debug)]
pub struct PushLimiter {
    open: Arc<AtomicUsize>,
    max: usize,
}

impl PushLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            open: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Reserves a slot, released when the permit drops.
    pub fn try_acquire(&self) -> Option<PushPermit> {
        self.open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < self.max).then_some(open + 1)
            })
            .ok()
            .map(|_| PushPermit(self.open.clone()))
    }
}

#[derive(Debug)]
pub struct PushPermit(Arc<AtomicUsize>);

impl Drop for PushPermit {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Commands accepted from supervisors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PushCommand {
    GetClients,
    StartTraining(TrainingRequest),
    #[serde(rename_all = "camelCase")]
    StopTraining {
        client_id: ClientId,
    },
}

impl PushCommand {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

pub(crate) async fn upgrade(
    State(state): State<ApiState>,
    Authorized(user): Authorized,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let Some(permit) = state.push.try_acquire() else {
        let err = ApiError::PushLimit(state.push.max);
        state
            .host
            .error_log()
            .record_host(ErrorCode::WebsocketError, err.to_string());
        return Err(err);
    };
    debug!(%user, open = state.push.open(), "supervisor connected");
    Ok(ws.on_upgrade(move |socket| session(socket, state, permit)))
}

async fn session(socket: WebSocket, state: ApiState, _permit: PushPermit) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.host.subscribe();

    match state.host.run_blocking(Host::initial_state).await {
        Ok(Ok(initial)) => {
            if send_event(&mut sender, &initial).await.is_err() {
                return;
            }
        }
        Ok(Err(err)) => trace!(%err, "initial state skipped"),
        Err(err) => warn!(%err, "initial state failed"),
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(err) = send_event(&mut sender, &event).await {
                        debug!(%err, "supervisor send failed");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "supervisor lagging, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => handle_command(&state, text.as_str()).await,
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    state
                        .host
                        .error_log()
                        .record_host(ErrorCode::WebsocketError, err.to_string());
                    break;
                }
            },
        }
    }
    debug!("supervisor disconnected");
}

async fn send_event<S>(sender: &mut S, event: &HostEvent) -> Result<(), axum::Error>
where
    S: Sink<WsMessage, Error = axum::Error> + Unpin,
{
    match event.to_json() {
        Ok(json) => sender.send(WsMessage::Text(json.into())).await,
        Err(err) => {
            warn!(%err, "event not serializable");
            Ok(())
        }
    }
}

async fn handle_command(state: &ApiState, text: &str) {
    let command = match PushCommand::parse(text) {
        Ok(command) => command,
        Err(err) => {
            state
                .host
                .error_log()
                .record_host(ErrorCode::InvalidMessage, format!("invalid push command: {err}"));
            return;
        }
    };
    trace!(?command, "push command");

    let outcome = state
        .host
        .run_blocking(move |host| match command {
            PushCommand::GetClients => match host.clients() {
                Ok(clients) => host.events().client_list(clients),
                Err(err) => trace!(%err, "client list skipped"),
            },
            PushCommand::StartTraining(TrainingRequest { client_id, config }) => {
                host.start_training(client_id, config);
            }
            PushCommand::StopTraining { client_id } => {
                host.stop_training(client_id);
            }
        })
        .await;
    if let Err(err) = outcome {
        warn!(%err, "push command failed");
    }
}

#[cfg(test)]
mod tests {
    use rangehost_training::{Difficulty, TrainingMode};

    use super::*;

    #[test]
    fn test_limiter_caps_and_releases() {
        let limiter = PushLimiter::new(2);
        let first = limiter.try_acquire().unwrap();
        let _second = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.open(), 2);

        drop(first);
        assert_eq!(limiter.open(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            PushCommand::parse(r#"{"command":"getClients"}"#).unwrap(),
            PushCommand::GetClients
        );
        assert_eq!(
            PushCommand::parse(r#"{"command":"stopTraining","clientId":4}"#).unwrap(),
            PushCommand::StopTraining {
                client_id: ClientId::new(4)
            }
        );

        let PushCommand::StartTraining(request) = PushCommand::parse(
            r#"{"command":"startTraining","clientId":3,"mode":1,"difficulty":2,"duration":60}"#,
        )
        .unwrap() else {
            panic!("expected start");
        };
        assert_eq!(request.client_id, ClientId::new(3));
        assert_eq!(request.config.mode, TrainingMode::ReactionTraining);
        assert_eq!(request.config.difficulty, Difficulty::Hard);
        assert_eq!(request.config.duration, 60);
        assert_eq!(request.config.target_count, 20);
        assert_eq!(request.config.react_time, 350);
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        assert!(PushCommand::parse(r#"{"command":"reboot"}"#).is_err());
        assert!(PushCommand::parse("not json").is_err());
    }
}
