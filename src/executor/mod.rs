//! The research-executor boundary.
//!
//! The executor is the external collaborator that performs the actual
//! content-generation work. The orchestration core hands it an immutable
//! request plus a [`JobContext`] for progress reporting and cooperative
//! cancellation, and receives either a result or an error back through the
//! lifecycle manager's completion entry points. Live sessions drive the same
//! collaborator one turn at a time through [`ResearchExecutor::respond`].

mod offline;

pub use offline::OfflineExecutor;

use crate::types::{LogEntry, MessageType, ResearchRequest, ResearchResult, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sink for progress updates emitted by a running executor.
///
/// The lifecycle manager implements this; updates arriving after the job is
/// terminal are discarded there, so executors may report without checking
/// state first.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, job_id: &str, value: f32);
}

/// Advisory cancellation flag shared between the lifecycle manager and one
/// executing job.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed by the executor at its next checkpoint.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-job execution context handed to the executor.
pub struct JobContext {
    job_id: String,
    cancel: CancelFlag,
    progress: Arc<dyn ProgressSink>,
}

impl JobContext {
    pub fn new(job_id: String, cancel: CancelFlag, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            job_id,
            cancel,
            progress,
        }
    }

    /// The id of the job being executed.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Whether cancellation has been requested. Executors should check this
    /// at their checkpoints and bail out with an error when it is set; the
    /// runner records the job as cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    /// Report execution progress in [0, 1].
    pub async fn report_progress(&self, value: f32) {
        self.progress.report(&self.job_id, value).await;
    }
}

/// One assistant turn produced for a live session.
#[derive(Debug, Clone)]
pub struct SessionReply {
    /// The assistant's message content.
    pub content: String,
    /// Findings extracted during this turn; passed through opaquely into the
    /// session summary.
    pub key_findings: Vec<serde_json::Value>,
}

/// The external collaborator that performs research work.
///
/// Implementations wrap whatever content-generation pipeline is available;
/// the crate ships [`OfflineExecutor`] as a self-contained placeholder.
#[async_trait]
pub trait ResearchExecutor: Send + Sync {
    /// Execute one research job to completion. Long-running; should report
    /// progress through `ctx` and observe `ctx.is_cancelled()` at its
    /// checkpoints.
    async fn run(&self, request: &ResearchRequest, ctx: &JobContext) -> Result<ResearchResult>;

    /// Produce the assistant reply for one live-session user turn. Calls for
    /// a given session are serialized by the session manager; `history` is
    /// the log up to and including the user message being answered.
    async fn respond(
        &self,
        topic: &str,
        history: &[LogEntry],
        content: &str,
        message_type: MessageType,
    ) -> Result<SessionReply>;
}
