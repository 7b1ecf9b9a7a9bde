//! Single-job endpoints: submit, poll, fetch, cancel, delete.

use crate::{
    types::{
        CancelResponse, JobStatusResponse, JobSubmitResponse, ResearchRequest, ResearchResult,
        Result,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// Submit a new research request. Returns immediately with the queued job;
/// execution runs on a background task.
#[utoipa::path(
    post,
    path = "/research",
    request_body = ResearchRequest,
    responses(
        (status = 202, description = "Job accepted", body = JobSubmitResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "research"
)]
pub async fn submit_research_job(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<(StatusCode, Json<JobSubmitResponse>)> {
    let job = state.jobs.submit(payload).await?;
    state.jobs.spawn_execution(job.id.clone());

    Ok((
        StatusCode::ACCEPTED,
        Json(JobSubmitResponse {
            job_id: job.id,
            status: job.status,
            estimated_duration_minutes: Some(state.config.orchestrator.estimated_duration_minutes),
        }),
    ))
}

/// Get the current status and progress of a research job.
#[utoipa::path(
    get,
    path = "/research/{job_id}/status",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job status", body = JobStatusResponse),
        (status = 404, description = "Job not found")
    ),
    tag = "research"
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>> {
    Ok(Json(state.status.job_status(&job_id).await?))
}

/// Retrieve the original request details for a research job.
#[utoipa::path(
    get,
    path = "/research/{job_id}/details",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Original request", body = ResearchRequest),
        (status = 404, description = "Job not found")
    ),
    tag = "research"
)]
pub async fn get_job_details(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ResearchRequest>> {
    Ok(Json(state.status.job_details(&job_id).await?))
}

/// Get the result of a completed research job.
#[utoipa::path(
    get,
    path = "/research/{job_id}/result",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Research result", body = ResearchResult),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job not completed yet")
    ),
    tag = "research"
)]
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ResearchResult>> {
    Ok(Json(state.status.job_result(&job_id).await?))
}

/// Request cancellation of a queued or in-progress job.
#[utoipa::path(
    post,
    path = "/research/{job_id}/cancel",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cancellation accepted", body = CancelResponse),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job already terminal")
    ),
    tag = "research"
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CancelResponse>> {
    let accepted = state.jobs.cancel(&job_id).await?;
    Ok(Json(CancelResponse { accepted }))
}

/// Delete a terminal job record.
#[utoipa::path(
    delete,
    path = "/research/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job not terminal")
    ),
    tag = "research"
)]
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode> {
    state.jobs.delete(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
