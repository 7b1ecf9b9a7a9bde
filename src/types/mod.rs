//! Core types for the orchestration server: the job data model, batch and
//! live-session wire types, and the crate-wide error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ============= Job Data Model =============

/// Lifecycle state of a research job.
///
/// Transitions: `Queued -> InProgress -> {Completed, Failed}`, with
/// `Cancelled` reachable from both non-terminal states. Terminal states are
/// permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Requested shape of the research output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Bullets,
    FullReport,
}

/// Category of a cited source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Arxiv,
    Pubmed,
    Web,
}

/// A research request as submitted by the client. Immutable once a job is
/// created from it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    /// The research topic or question.
    pub topic: String,
    /// The desired output format.
    pub output_format: OutputFormat,
    /// Preferred source categories, in priority order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceKind>>,
    /// Optional deadline for the research job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// A cited source in a research result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reference {
    /// Title of the source.
    pub title: String,
    /// URL of the source, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// When the source was accessed.
    pub accessed_date: DateTime<Utc>,
    /// Brief snippet or description from the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Source category, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
}

/// Per-category counts of the references backing a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SourceBreakdown {
    pub arxiv_papers: usize,
    pub pubmed_papers: usize,
    pub web_sources: usize,
    pub total_sources: usize,
}

impl SourceBreakdown {
    /// Tally references by source category.
    pub fn from_references(references: &[Reference]) -> Self {
        let mut breakdown = SourceBreakdown {
            total_sources: references.len(),
            ..Default::default()
        };
        for reference in references {
            match reference.source {
                Some(SourceKind::Arxiv) => breakdown.arxiv_papers += 1,
                Some(SourceKind::Pubmed) => breakdown.pubmed_papers += 1,
                Some(SourceKind::Web) | None => breakdown.web_sources += 1,
            }
        }
        breakdown
    }
}

/// The final payload of a completed research job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchResult {
    /// The research topic.
    pub topic: String,
    /// The main research content, formatted per `output_format`.
    pub content: String,
    /// Cited sources.
    pub references: Vec<Reference>,
    /// The format of `content`.
    pub output_format: OutputFormat,
    /// When the research was completed.
    pub generated_at: DateTime<Utc>,
    /// Word count of `content`.
    pub word_count: usize,
    /// Confidence score of the research quality, in [0, 1].
    pub confidence_score: f32,
    /// Per-category source counts.
    pub source_breakdown: SourceBreakdown,
}

/// One unit of requested research work with a tracked lifecycle.
///
/// The `JobLifecycleManager` is the only component that mutates `status`,
/// `progress`, `result` and `error`; everything else reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Opaque unique identifier, assigned at creation.
    pub id: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Immutable snapshot of the originating request.
    pub request: ResearchRequest,
    /// Progress in [0, 1], monotonically non-decreasing while in progress.
    pub progress: f32,
    /// Result payload, present only when `status` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResearchResult>,
    /// Error description, present only when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job record was created.
    pub created_at: DateTime<Utc>,
    /// When execution was dispatched, set exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state, set exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a fresh queued job for `request`.
    pub fn new(id: String, request: ResearchRequest) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            request,
            progress: 0.0,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

// ============= Job API Types =============

/// Response to a job submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobSubmitResponse {
    /// Unique ID for the submitted research job.
    pub job_id: String,
    /// Initial status of the job (always `queued`).
    pub status: JobStatus,
    /// Advertised estimate of how long the research will take.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_minutes: Option<u32>,
}

/// Polling view of a single job.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobStatusResponse {
    /// Unique ID for the research job.
    pub job_id: String,
    /// Current status of the job.
    pub status: JobStatus,
    /// Progress in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    /// Error message, present only when the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response to a cancellation request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    /// Whether the cancellation was accepted. Acceptance does not guarantee
    /// the job ends `cancelled`: a completion racing the cancel may win.
    pub accepted: bool,
}

// ============= Batch Types =============

/// Derived state of a batch, computed from member job statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Queued,
    InProgress,
    Completed,
}

/// A batch submission: one job per topic, sharing the remaining parameters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchResearchRequest {
    /// Topics to research, one member job each.
    pub topics: Vec<String>,
    /// Output format shared by every member.
    pub output_format: OutputFormat,
    /// Source preferences shared by every member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceKind>>,
    /// Deadline shared by every member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl BatchResearchRequest {
    /// Build the member request for one topic by merging in the shared
    /// configuration.
    pub fn member_request(&self, topic: &str) -> ResearchRequest {
        ResearchRequest {
            topic: topic.to_string(),
            output_format: self.output_format,
            sources: self.sources.clone(),
            deadline: self.deadline,
        }
    }
}

/// Response to a batch submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchSubmitResponse {
    /// Unique ID for the submitted batch.
    pub batch_id: String,
    /// Initial derived status (always `queued`).
    pub status: BatchStatus,
}

/// Polling view of a batch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchStatusResponse {
    /// Unique ID for the batch.
    pub batch_id: String,
    /// Derived batch status.
    pub status: BatchStatus,
    /// Mean of member progress values, in [0, 1].
    pub progress: f32,
    /// Members that completed successfully so far.
    pub completed_count: usize,
    /// Members that failed so far.
    pub failed_count: usize,
    /// Members that were cancelled so far.
    pub cancelled_count: usize,
}

/// Terminal (or pending) outcome of one batch member.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TopicOutcome {
    /// The member completed; carries its result payload.
    Completed { result: ResearchResult },
    /// The member failed; carries its error description.
    Failed { error: String },
    /// The member was cancelled.
    Cancelled,
    /// The member has not reached a terminal state yet.
    Pending { status: JobStatus },
}

/// Aggregated view of a batch. Never blocks: requested before every member is
/// terminal, it carries the current partial snapshot with `status` still
/// `queued`/`in_progress`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchResults {
    /// Unique ID for the batch.
    pub batch_id: String,
    /// Derived batch status at aggregation time.
    pub status: BatchStatus,
    /// Number of member topics.
    pub total_topics: usize,
    /// Members that completed successfully.
    pub completed_count: usize,
    /// Members that failed.
    pub failed_count: usize,
    /// Members that were cancelled.
    pub cancelled_count: usize,
    /// Mean confidence of the completed members, or 0 if none completed.
    pub overall_confidence: f32,
    /// Per-topic outcome, keyed by topic.
    pub outcomes: BTreeMap<String, TopicOutcome>,
}

// ============= Live Session Types =============

/// Interaction modality offered by a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

/// Payload kind of a single session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Audio,
}

/// Who produced a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

/// Lifecycle state of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Ended,
    Errored,
}

impl SessionState {
    /// Whether the session admits no further messages.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Errored)
    }
}

/// One entry in a session's append-only message log. Also the outbound frame
/// shape on the duplex channel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    /// Position in the session log, starting at 0.
    pub seq: u64,
    /// Who produced the entry.
    pub sender: Sender,
    /// Entry payload.
    pub content: String,
    /// Payload kind.
    pub message_type: MessageType,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

/// Request to start a live research session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// The initiating research topic.
    pub topic: String,
    /// Requested modalities; defaults to text only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<Modality>>,
}

/// Response to starting a live session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartSessionResponse {
    /// Unique ID for the session.
    pub session_id: String,
    /// The initiating topic.
    pub topic: String,
    /// Session state (always `active`).
    pub status: SessionState,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// Granted modalities.
    pub modalities: Vec<Modality>,
}

/// Summary of a live session, derived at query or end time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    /// Unique ID for the session.
    pub session_id: String,
    /// The initiating topic.
    pub topic: String,
    /// Session state at summary time.
    pub status: SessionState,
    /// Elapsed duration in whole minutes, at least 1.
    pub duration_minutes: i64,
    /// Number of user turns processed.
    pub total_interactions: usize,
    /// Key findings accumulated by the executor; opaque pass-through.
    pub key_findings: Vec<serde_json::Value>,
    /// Closing report line, present once the session ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_report: Option<String>,
}

// ============= Error Types =============

/// Crate-wide error taxonomy. Entity-level failures (executor errors,
/// transport drops, grace-period expiries) are recorded on the entity and
/// logged; only lookup and state-validation failures surface to callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Executor failure: {0}")]
    Executor(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout exceeded: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg),
            AppError::SessionClosed(msg) => (StatusCode::CONFLICT, msg),
            AppError::Executor(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Transport(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Timeout(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
