use crate::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Single research jobs
        .route(
            "/research",
            post(crate::api::handlers::jobs::submit_research_job),
        )
        .route(
            "/research/{job_id}/status",
            get(crate::api::handlers::jobs::get_job_status),
        )
        .route(
            "/research/{job_id}/details",
            get(crate::api::handlers::jobs::get_job_details),
        )
        .route(
            "/research/{job_id}/result",
            get(crate::api::handlers::jobs::get_job_result),
        )
        .route(
            "/research/{job_id}/cancel",
            post(crate::api::handlers::jobs::cancel_job),
        )
        .route(
            "/research/{job_id}",
            delete(crate::api::handlers::jobs::delete_job),
        )
        // Batch research
        .route(
            "/batch-research",
            post(crate::api::handlers::batch::submit_batch_research),
        )
        .route(
            "/batch-research/{batch_id}/status",
            get(crate::api::handlers::batch::get_batch_status),
        )
        .route(
            "/batch-research/{batch_id}/results",
            get(crate::api::handlers::batch::get_batch_results),
        )
        // Live sessions
        .route(
            "/live-research/start",
            post(crate::api::handlers::live::start_live_session),
        )
        .route(
            "/live-research/{session_id}/status",
            get(crate::api::handlers::live::get_live_session_status),
        )
        .route(
            "/live-research/{session_id}/end",
            post(crate::api::handlers::live::end_live_session),
        )
        .route(
            "/live-research/{session_id}/ws",
            get(crate::api::handlers::live::session_channel),
        )
        // Health
        .route("/health", get(crate::api::handlers::health::health_check))
}
