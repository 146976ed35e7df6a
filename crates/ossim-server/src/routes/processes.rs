//! `/processes`

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ossim_core::{Process, ProcessSpec};
use ossim_runtime::Controller;

use crate::error::ApiResult;

pub(super) async fn create(
    State(controller): State<Controller>,
    Json(spec): Json<ProcessSpec>,
) -> ApiResult<(StatusCode, Json<Process>)> {
    let process = controller.create_process(spec).await?;
    Ok((StatusCode::CREATED, Json(process)))
}

pub(super) async fn list(State(controller): State<Controller>) -> Json<Vec<Process>> {
    Json(controller.processes().await)
}

pub(super) async fn clear(State(controller): State<Controller>) -> StatusCode {
    controller.clear_processes().await;
    StatusCode::NO_CONTENT
}
