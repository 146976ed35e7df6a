//! `/simulation/*` and `/interruptions`

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use ossim_core::{
    ExecutionSlice, IoSettings, ProcessId, SimulationMode, SimulationSnapshot, TickReport,
    TimelineEvent,
};
use ossim_runtime::Controller;

use crate::dto::{InterruptionRequest, ModeBody, SchedulerRequest, TimelineQuery};
use crate::error::ApiResult;

pub(super) async fn start(
    State(controller): State<Controller>,
    Json(req): Json<SchedulerRequest>,
) -> ApiResult<StatusCode> {
    controller
        .start_with(|current| req.into_config(current))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub(super) async fn pause(State(controller): State<Controller>) -> ApiResult<StatusCode> {
    controller.pause().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn resume(State(controller): State<Controller>) -> ApiResult<StatusCode> {
    controller.resume().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn stop(State(controller): State<Controller>) -> ApiResult<StatusCode> {
    controller.stop().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn reset(State(controller): State<Controller>) -> StatusCode {
    controller.reset().await;
    StatusCode::NO_CONTENT
}

pub(super) async fn step(State(controller): State<Controller>) -> ApiResult<Json<TickReport>> {
    Ok(Json(controller.step().await?))
}

pub(super) async fn state(State(controller): State<Controller>) -> Json<SimulationSnapshot> {
    Json(controller.snapshot().await)
}

pub(super) async fn timeline(
    State(controller): State<Controller>,
    Query(query): Query<TimelineQuery>,
) -> Json<Vec<TimelineEvent>> {
    Json(controller.timeline(query.since).await)
}

pub(super) async fn gantt(State(controller): State<Controller>) -> Json<Vec<ExecutionSlice>> {
    Json(controller.gantt().await)
}

pub(super) async fn set_algorithm(
    State(controller): State<Controller>,
    Json(req): Json<SchedulerRequest>,
) -> ApiResult<StatusCode> {
    controller
        .set_scheduler_with(|current| req.into_config(current))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn io_settings(
    State(controller): State<Controller>,
    Json(settings): Json<IoSettings>,
) -> ApiResult<StatusCode> {
    controller.set_io_settings(settings).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn set_mode(
    State(controller): State<Controller>,
    Json(body): Json<ModeBody>,
) -> StatusCode {
    controller
        .set_mode(SimulationMode::from_automatic(body.automatic))
        .await;
    StatusCode::NO_CONTENT
}

pub(super) async fn get_mode(State(controller): State<Controller>) -> Json<ModeBody> {
    Json(controller.mode().await.into())
}

pub(super) async fn interrupt(
    State(controller): State<Controller>,
    Json(req): Json<InterruptionRequest>,
) -> ApiResult<StatusCode> {
    let kind = req.kind()?;
    controller
        .interrupt(ProcessId(req.pid), kind, req.reason)
        .await?;
    Ok(StatusCode::ACCEPTED)
}
