//! Request/response handlers.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use rangehost_clients::ClientSnapshot;
use rangehost_errors::ErrorRecord;
use rangehost_host::{Host, TrainingStatus};
use rangehost_primitives::{ClientId, Effect, Rgb};
use rangehost_training::{TrainingConfig, TrainingResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ApiError, ApiJson, ApiState, Authorized, Message};

/// Start request: the target plus any session fields to override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    pub client_id: ClientId,
    #[serde(flatten)]
    pub config: TrainingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedRequest {
    pub client_id: ClientId,
    /// `#RRGGBB`
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzerRequest {
    pub client_id: ClientId,
    pub frequency: u16,
    pub duration: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRequest {
    pub client_id: ClientId,
    pub effect: Effect,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub client_id: Option<ClientId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub message: String,
    pub result: TrainingResult,
}

pub(crate) async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub(crate) async fn start_training(
    State(state): State<ApiState>,
    Authorized(user): Authorized,
    ApiJson(request): ApiJson<TrainingRequest>,
) -> Result<Json<Message>, ApiError> {
    let TrainingRequest { client_id, config } = request;
    let started = state
        .host
        .run_blocking(move |host| host.start_training(client_id, config))
        .await?;
    if !started {
        return Err(ApiError::NotFound(format!(
            "client {client_id} is not connected"
        )));
    }
    info!(%user, %client_id, "training started via api");
    Ok(Json(Message::new("Training started")))
}

pub(crate) async fn stop_training(
    State(state): State<ApiState>,
    Authorized(_): Authorized,
    ApiJson(ClientRequest { client_id }): ApiJson<ClientRequest>,
) -> Result<Json<StopResponse>, ApiError> {
    let result = state
        .host
        .run_blocking(move |host| host.stop_training(client_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no running session for client {client_id}")))?;
    Ok(Json(StopResponse {
        message: "Training stopped".to_string(),
        result,
    }))
}

pub(crate) async fn training_status(
    State(state): State<ApiState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<TrainingStatus>>, ApiError> {
    let Query(StatusQuery { client_id }) = query?;
    let status = state
        .host
        .run_blocking(move |host| host.training_status(client_id))
        .await??;
    Ok(Json(status))
}

pub(crate) async fn send_led(
    State(state): State<ApiState>,
    Authorized(_): Authorized,
    ApiJson(request): ApiJson<LedRequest>,
) -> Result<Json<Message>, ApiError> {
    let color = request
        .color
        .parse::<Rgb>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let client_id = request.client_id;
    let sent = state
        .host
        .run_blocking(move |host| host.send_led(client_id, color))
        .await?;
    delivered(client_id, sent)
}

pub(crate) async fn send_buzzer(
    State(state): State<ApiState>,
    Authorized(_): Authorized,
    ApiJson(request): ApiJson<BuzzerRequest>,
) -> Result<Json<Message>, ApiError> {
    let BuzzerRequest {
        client_id,
        frequency,
        duration,
    } = request;
    let sent = state
        .host
        .run_blocking(move |host| host.send_buzzer(client_id, frequency, duration))
        .await?
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    delivered(client_id, sent)
}

pub(crate) async fn send_effect(
    State(state): State<ApiState>,
    Authorized(_): Authorized,
    ApiJson(request): ApiJson<EffectRequest>,
) -> Result<Json<Message>, ApiError> {
    let EffectRequest { client_id, effect } = request;
    let sent = state
        .host
        .run_blocking(move |host| host.send_effect(client_id, effect))
        .await?;
    delivered(client_id, sent)
}

fn delivered(client_id: ClientId, sent: bool) -> Result<Json<Message>, ApiError> {
    if sent {
        Ok(Json(Message::new("Command sent")))
    } else {
        Err(ApiError::NotDelivered(client_id.get()))
    }
}

pub(crate) async fn clients(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ClientSnapshot>>, ApiError> {
    let clients = state.host.run_blocking(Host::clients).await??;
    Ok(Json(clients))
}

pub(crate) async fn errors(State(state): State<ApiState>) -> Json<Vec<ErrorRecord>> {
    Json(state.host.errors())
}

pub(crate) async fn clear_errors(
    State(state): State<ApiState>,
    Authorized(user): Authorized,
) -> Json<Message> {
    state.host.clear_errors();
    info!(%user, "error log cleared");
    Json(Message::new("Errors cleared"))
}
