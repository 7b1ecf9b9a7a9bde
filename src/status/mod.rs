//! Read-only status projections.
//!
//! Polling clients observe job, batch and session state through this service
//! without touching any mutation path: it reads the latest persisted
//! snapshots, so arbitrarily many concurrent pollers never contend with the
//! executing side.

use crate::batch::BatchCoordinator;
use crate::live::LiveSessionManager;
use crate::store::JobStore;
use crate::types::{
    AppError, BatchResults, BatchStatusResponse, JobStatus, JobStatusResponse, ResearchRequest,
    ResearchResult, Result, SessionSummary,
};
use std::sync::Arc;

/// Pure read path over the orchestration state. Never mutates.
pub struct StatusQueryService {
    store: Arc<dyn JobStore>,
    batches: Arc<BatchCoordinator>,
    sessions: Arc<LiveSessionManager>,
}

impl StatusQueryService {
    pub fn new(
        store: Arc<dyn JobStore>,
        batches: Arc<BatchCoordinator>,
        sessions: Arc<LiveSessionManager>,
    ) -> Self {
        Self {
            store,
            batches,
            sessions,
        }
    }

    /// Current status and progress of a job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let job = self.fetch_job(job_id).await?;

        let error_message = match job.status {
            JobStatus::Failed => job.error.clone(),
            _ => None,
        };

        Ok(JobStatusResponse {
            job_id: job.id,
            status: job.status,
            progress: Some(job.progress),
            error_message,
        })
    }

    /// The immutable request snapshot a job was created from.
    pub async fn job_details(&self, job_id: &str) -> Result<ResearchRequest> {
        Ok(self.fetch_job(job_id).await?.request)
    }

    /// The result payload of a completed job.
    pub async fn job_result(&self, job_id: &str) -> Result<ResearchResult> {
        let job = self.fetch_job(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(AppError::InvalidTransition(format!(
                "job '{job_id}' is {:?}, not completed",
                job.status
            )));
        }
        job.result.ok_or_else(|| {
            AppError::Internal(format!("completed job '{job_id}' has no result payload"))
        })
    }

    /// Derived batch status snapshot.
    pub async fn batch_status(&self, batch_id: &str) -> Result<BatchStatusResponse> {
        self.batches.status(batch_id).await
    }

    /// Aggregated batch outcome snapshot.
    pub async fn batch_results(&self, batch_id: &str) -> Result<BatchResults> {
        self.batches.aggregate(batch_id).await
    }

    /// Current live-session summary.
    pub fn session_summary(&self, session_id: &str) -> Result<SessionSummary> {
        self.sessions.summary(session_id)
    }

    async fn fetch_job(&self, job_id: &str) -> Result<crate::types::Job> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job with ID '{job_id}' not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::OfflineExecutor;
    use crate::jobs::JobLifecycleManager;
    use crate::store::MemoryJobStore;
    use crate::types::{OutputFormat, ResearchRequest};
    use std::time::Duration;

    fn service() -> (Arc<JobLifecycleManager>, StatusQueryService) {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let executor = Arc::new(OfflineExecutor::new());
        let jobs = JobLifecycleManager::new(store.clone(), executor.clone(), Duration::from_secs(3));
        let batches = Arc::new(BatchCoordinator::new(jobs.clone()));
        let sessions = Arc::new(LiveSessionManager::new(executor, 64));
        (jobs, StatusQueryService::new(store, batches, sessions))
    }

    fn request(topic: &str) -> ResearchRequest {
        ResearchRequest {
            topic: topic.to_string(),
            output_format: OutputFormat::Bullets,
            sources: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn test_job_status_projection() {
        let (jobs, status) = service();
        let job = jobs.submit(request("graph databases")).await.unwrap();

        let view = status.job_status(&job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.progress, Some(0.0));
        assert!(view.error_message.is_none());

        assert!(matches!(
            status.job_status("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_error_message_only_on_failed_jobs() {
        let (jobs, status) = service();
        let job = jobs.submit(request("graph databases")).await.unwrap();
        jobs.dispatch(&job.id).await.unwrap();
        jobs.fail(&job.id, "ran out of sources".to_string())
            .await
            .unwrap();

        let view = status.job_status(&job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error_message.as_deref(), Some("ran out of sources"));
    }

    #[tokio::test]
    async fn test_result_requires_completion() {
        let (jobs, status) = service();
        let job = jobs.submit(request("graph databases")).await.unwrap();

        assert!(matches!(
            status.job_result(&job.id).await,
            Err(AppError::InvalidTransition(_))
        ));

        let details = status.job_details(&job.id).await.unwrap();
        assert_eq!(details.topic, "graph databases");
    }
}
