//! `/memory/*`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ossim_core::{MemoryAlgorithm, MemoryBlock, MemorySnapshot, ProcessId};
use ossim_runtime::Controller;

use crate::dto::{
    memory_algorithm, AllocateRequest, InitializeMemoryRequest, MemoryAlgorithmRequest,
    MemoryQuery,
};
use crate::error::ApiResult;

pub(super) async fn initialize(
    State(controller): State<Controller>,
    Json(req): Json<InitializeMemoryRequest>,
) -> ApiResult<(StatusCode, Json<MemorySnapshot>)> {
    controller.initialize_memory(req.total_size).await?;
    Ok((StatusCode::CREATED, Json(controller.memory(None).await)))
}

pub(super) async fn allocate(
    State(controller): State<Controller>,
    Json(req): Json<AllocateRequest>,
) -> ApiResult<Json<MemoryBlock>> {
    let algorithm = memory_algorithm(req.algorithm.as_deref())?;
    let block = controller
        .allocate(ProcessId(req.process_id), req.size, algorithm)
        .await?;
    Ok(Json(block))
}

pub(super) async fn deallocate(
    State(controller): State<Controller>,
    Path(process_id): Path<u64>,
) -> ApiResult<StatusCode> {
    controller.deallocate(ProcessId(process_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn state(
    State(controller): State<Controller>,
    Query(query): Query<MemoryQuery>,
) -> Json<MemorySnapshot> {
    Json(controller.memory(query.pending).await)
}

pub(super) async fn set_algorithm(
    State(controller): State<Controller>,
    Json(req): Json<MemoryAlgorithmRequest>,
) -> ApiResult<StatusCode> {
    let algorithm = MemoryAlgorithm::parse(&req.algorithm)?;
    controller.set_memory_algorithm(algorithm).await;
    Ok(StatusCode::NO_CONTENT)
}
