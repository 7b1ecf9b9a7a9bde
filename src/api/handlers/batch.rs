//! Batch endpoints: fan a topic list out into member jobs and observe them
//! as one logical request.

use crate::{
    types::{
        BatchResearchRequest, BatchResults, BatchStatus, BatchStatusResponse,
        BatchSubmitResponse, Result,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// Submit a batch of research topics. One member job is created per topic;
/// a failing member never aborts its siblings.
#[utoipa::path(
    post,
    path = "/batch-research",
    request_body = BatchResearchRequest,
    responses(
        (status = 202, description = "Batch accepted", body = BatchSubmitResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "batch"
)]
pub async fn submit_batch_research(
    State(state): State<AppState>,
    Json(payload): Json<BatchResearchRequest>,
) -> Result<(StatusCode, Json<BatchSubmitResponse>)> {
    let record = state.batches.submit_batch(payload).await?;
    for job_id in &record.member_job_ids {
        state.jobs.spawn_execution(job_id.clone());
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchSubmitResponse {
            batch_id: record.batch_id,
            status: BatchStatus::Queued,
        }),
    ))
}

/// Get the derived status and progress of a batch.
#[utoipa::path(
    get,
    path = "/batch-research/{batch_id}/status",
    params(("batch_id" = String, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch status", body = BatchStatusResponse),
        (status = 404, description = "Batch not found")
    ),
    tag = "batch"
)]
pub async fn get_batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchStatusResponse>> {
    Ok(Json(state.status.batch_status(&batch_id).await?))
}

/// Get the aggregated per-topic outcomes of a batch. Requested early it
/// reports the current partial snapshot rather than erroring.
#[utoipa::path(
    get,
    path = "/batch-research/{batch_id}/results",
    params(("batch_id" = String, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Aggregated batch results", body = BatchResults),
        (status = 404, description = "Batch not found")
    ),
    tag = "batch"
)]
pub async fn get_batch_results(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchResults>> {
    Ok(Json(state.status.batch_results(&batch_id).await?))
}
