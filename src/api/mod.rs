//! HTTP API: route table, handlers and the OpenAPI document.

pub mod handlers;
pub mod routes;

use utoipa::OpenApi;

/// OpenAPI documentation for the orchestration surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::jobs::submit_research_job,
        handlers::jobs::get_job_status,
        handlers::jobs::get_job_details,
        handlers::jobs::get_job_result,
        handlers::jobs::cancel_job,
        handlers::jobs::delete_job,
        handlers::batch::submit_batch_research,
        handlers::batch::get_batch_status,
        handlers::batch::get_batch_results,
        handlers::live::start_live_session,
        handlers::live::get_live_session_status,
        handlers::live::end_live_session,
        handlers::health::health_check,
    ),
    components(schemas(
        crate::types::ResearchRequest,
        crate::types::ResearchResult,
        crate::types::Reference,
        crate::types::SourceBreakdown,
        crate::types::SourceKind,
        crate::types::OutputFormat,
        crate::types::JobStatus,
        crate::types::JobSubmitResponse,
        crate::types::JobStatusResponse,
        crate::types::CancelResponse,
        crate::types::BatchResearchRequest,
        crate::types::BatchSubmitResponse,
        crate::types::BatchStatus,
        crate::types::BatchStatusResponse,
        crate::types::BatchResults,
        crate::types::TopicOutcome,
        crate::types::Modality,
        crate::types::MessageType,
        crate::types::Sender,
        crate::types::SessionState,
        crate::types::LogEntry,
        crate::types::StartSessionRequest,
        crate::types::StartSessionResponse,
        crate::types::SessionSummary,
    )),
    tags(
        (name = "research", description = "Single research job lifecycle"),
        (name = "batch", description = "Batched research jobs"),
        (name = "live", description = "Live interactive research sessions"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
