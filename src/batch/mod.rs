//! Batch coordination: treat a list of topics as one logical request while
//! reusing the single-job machinery.
//!
//! The coordinator owns batch membership and aggregation only. It never
//! mutates a member job directly; all member state flows through the
//! `JobLifecycleManager`. A failed member never aborts its siblings: the
//! batch always drains to completion over however many members succeed.

use crate::jobs::JobLifecycleManager;
use crate::types::{
    AppError, BatchResearchRequest, BatchResults, BatchStatus, BatchStatusResponse, Job,
    JobStatus, Result, TopicOutcome,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Membership record for one batch. The member list is fixed at creation;
/// batch status is always derived from member job state, never stored.
#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub batch_id: String,
    /// Topics in submission order, parallel to `member_job_ids`.
    pub topics: Vec<String>,
    pub member_job_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fans a batch request out into N individual jobs and aggregates their
/// terminal outcomes.
pub struct BatchCoordinator {
    jobs: Arc<JobLifecycleManager>,
    batches: RwLock<HashMap<String, BatchRecord>>,
}

impl BatchCoordinator {
    pub fn new(jobs: Arc<JobLifecycleManager>) -> Self {
        Self {
            jobs,
            batches: RwLock::new(HashMap::new()),
        }
    }

    /// Create one member job per topic through the lifecycle manager and
    /// record the membership. Returns immediately; execution is scheduled by
    /// the caller per member, exactly as for individually submitted jobs.
    pub async fn submit_batch(&self, request: BatchResearchRequest) -> Result<BatchRecord> {
        if request.topics.is_empty() {
            return Err(AppError::InvalidInput(
                "a batch needs at least one topic".to_string(),
            ));
        }

        let mut member_job_ids = Vec::with_capacity(request.topics.len());
        for topic in &request.topics {
            let job = self.jobs.submit(request.member_request(topic)).await?;
            member_job_ids.push(job.id);
        }

        let record = BatchRecord {
            batch_id: Uuid::new_v4().to_string(),
            topics: request.topics.clone(),
            member_job_ids,
            created_at: Utc::now(),
        };
        tracing::info!(
            batch_id = %record.batch_id,
            members = record.topics.len(),
            "batch created"
        );
        self.batches
            .write()
            .insert(record.batch_id.clone(), record.clone());
        Ok(record)
    }

    /// Membership snapshot for a batch.
    pub fn get_record(&self, batch_id: &str) -> Result<BatchRecord> {
        self.batches
            .read()
            .get(batch_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Batch with ID '{batch_id}' not found")))
    }

    /// Derived polling view: status, mean progress and terminal counts.
    pub async fn status(&self, batch_id: &str) -> Result<BatchStatusResponse> {
        let record = self.get_record(batch_id)?;
        let members = self.member_jobs(&record).await?;

        let statuses: Vec<JobStatus> = members.iter().map(|job| job.status).collect();
        let progress =
            members.iter().map(|job| job.progress).sum::<f32>() / members.len() as f32;

        Ok(BatchStatusResponse {
            batch_id: record.batch_id,
            status: derive_status(&statuses),
            progress,
            completed_count: count(&statuses, JobStatus::Completed),
            failed_count: count(&statuses, JobStatus::Failed),
            cancelled_count: count(&statuses, JobStatus::Cancelled),
        })
    }

    /// Aggregate member outcomes into one batch result.
    ///
    /// Never blocks on execution: invoked before every member is terminal it
    /// reports the current partial snapshot, with `status` still
    /// `queued`/`in_progress` and pending members marked as such.
    pub async fn aggregate(&self, batch_id: &str) -> Result<BatchResults> {
        let record = self.get_record(batch_id)?;
        let members = self.member_jobs(&record).await?;

        let statuses: Vec<JobStatus> = members.iter().map(|job| job.status).collect();
        let mut outcomes = BTreeMap::new();
        let mut confidences = Vec::new();

        for (topic, job) in record.topics.iter().zip(&members) {
            let outcome = match job.status {
                JobStatus::Completed => {
                    let result = job.result.clone().ok_or_else(|| {
                        AppError::Internal(format!(
                            "completed job '{}' has no result payload",
                            job.id
                        ))
                    })?;
                    confidences.push(result.confidence_score);
                    TopicOutcome::Completed { result }
                }
                JobStatus::Failed => TopicOutcome::Failed {
                    error: job
                        .error
                        .clone()
                        .unwrap_or_else(|| "unspecified failure".to_string()),
                },
                JobStatus::Cancelled => TopicOutcome::Cancelled,
                status => TopicOutcome::Pending { status },
            };
            outcomes.insert(topic.clone(), outcome);
        }

        let overall_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };

        Ok(BatchResults {
            batch_id: record.batch_id,
            status: derive_status(&statuses),
            total_topics: record.topics.len(),
            completed_count: count(&statuses, JobStatus::Completed),
            failed_count: count(&statuses, JobStatus::Failed),
            cancelled_count: count(&statuses, JobStatus::Cancelled),
            overall_confidence,
            outcomes,
        })
    }

    async fn member_jobs(&self, record: &BatchRecord) -> Result<Vec<Job>> {
        let mut members = Vec::with_capacity(record.member_job_ids.len());
        for job_id in &record.member_job_ids {
            members.push(self.jobs.get(job_id).await?);
        }
        Ok(members)
    }
}

/// Pure derivation of batch status from member statuses: `queued` while no
/// member has left `queued`, `completed` once every member is terminal
/// (regardless of individual outcome), `in_progress` otherwise.
fn derive_status(statuses: &[JobStatus]) -> BatchStatus {
    if statuses.iter().all(|status| *status == JobStatus::Queued) {
        BatchStatus::Queued
    } else if statuses.iter().all(|status| status.is_terminal()) {
        BatchStatus::Completed
    } else {
        BatchStatus::InProgress
    }
}

fn count(statuses: &[JobStatus], wanted: JobStatus) -> usize {
    statuses.iter().filter(|status| **status == wanted).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{JobContext, ResearchExecutor, SessionReply};
    use crate::store::MemoryJobStore;
    use crate::types::{
        LogEntry, MessageType, OutputFormat, ResearchRequest, ResearchResult, SourceBreakdown,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    struct InertExecutor;

    #[async_trait]
    impl ResearchExecutor for InertExecutor {
        async fn run(
            &self,
            _request: &ResearchRequest,
            _ctx: &JobContext,
        ) -> Result<ResearchResult> {
            Err(AppError::Executor("not used in these tests".to_string()))
        }

        async fn respond(
            &self,
            _topic: &str,
            _history: &[LogEntry],
            _content: &str,
            _message_type: MessageType,
        ) -> Result<SessionReply> {
            Err(AppError::Executor("not used in these tests".to_string()))
        }
    }

    fn coordinator() -> (Arc<JobLifecycleManager>, BatchCoordinator) {
        let jobs = JobLifecycleManager::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(InertExecutor),
            Duration::from_secs(3),
        );
        let batches = BatchCoordinator::new(jobs.clone());
        (jobs, batches)
    }

    fn batch_request(topics: &[&str]) -> BatchResearchRequest {
        BatchResearchRequest {
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
            output_format: OutputFormat::Bullets,
            sources: None,
            deadline: None,
        }
    }

    fn result_with_confidence(topic: &str, confidence_score: f32) -> ResearchResult {
        ResearchResult {
            topic: topic.to_string(),
            content: "findings".to_string(),
            references: Vec::new(),
            output_format: OutputFormat::Bullets,
            generated_at: Utc::now(),
            word_count: 1,
            confidence_score,
            source_breakdown: SourceBreakdown::default(),
        }
    }

    #[rstest::rstest]
    #[case(&[JobStatus::Queued, JobStatus::Queued], BatchStatus::Queued)]
    #[case(&[JobStatus::Queued, JobStatus::InProgress], BatchStatus::InProgress)]
    #[case(&[JobStatus::Completed, JobStatus::InProgress], BatchStatus::InProgress)]
    // Terminal everywhere counts as completed regardless of outcome mix.
    #[case(&[JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled], BatchStatus::Completed)]
    // A terminal member next to a queued one means work is still moving.
    #[case(&[JobStatus::Completed, JobStatus::Queued], BatchStatus::InProgress)]
    fn test_derive_status(#[case] statuses: &[JobStatus], #[case] expected: BatchStatus) {
        assert_eq!(derive_status(statuses), expected);
    }

    #[tokio::test]
    async fn test_submit_batch_creates_one_member_per_topic() {
        let (jobs, batches) = coordinator();
        let record = batches
            .submit_batch(batch_request(&["topic a", "topic b", "topic c"]))
            .await
            .unwrap();

        assert_eq!(record.member_job_ids.len(), 3);
        for (topic, job_id) in record.topics.iter().zip(&record.member_job_ids) {
            let job = jobs.get(job_id).await.unwrap();
            assert_eq!(&job.request.topic, topic);
            assert_eq!(job.status, JobStatus::Queued);
        }

        let status = batches.status(&record.batch_id).await.unwrap();
        assert_eq!(status.status, BatchStatus::Queued);
        assert_eq!(status.progress, 0.0);
    }

    #[tokio::test]
    async fn test_submit_batch_rejects_empty_topic_list() {
        let (_jobs, batches) = coordinator();
        assert!(matches!(
            batches.submit_batch(batch_request(&[])).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_success_aggregation() {
        let (jobs, batches) = coordinator();
        let record = batches
            .submit_batch(batch_request(&["topic a", "topic b"]))
            .await
            .unwrap();
        let (job_a, job_b) = (&record.member_job_ids[0], &record.member_job_ids[1]);

        jobs.dispatch(job_a).await.unwrap();
        jobs.succeed(job_a, result_with_confidence("topic a", 0.8))
            .await
            .unwrap();
        jobs.dispatch(job_b).await.unwrap();
        jobs.fail(job_b, "no sources found".to_string()).await.unwrap();

        let status = batches.status(&record.batch_id).await.unwrap();
        assert_eq!(status.status, BatchStatus::Completed);
        assert_eq!(status.completed_count, 1);
        assert_eq!(status.failed_count, 1);
        assert_eq!(status.cancelled_count, 0);

        let results = batches.aggregate(&record.batch_id).await.unwrap();
        assert_eq!(results.status, BatchStatus::Completed);
        assert_eq!(results.total_topics, 2);
        assert_eq!(results.overall_confidence, 0.8);
        assert!(matches!(
            results.outcomes.get("topic a"),
            Some(TopicOutcome::Completed { .. })
        ));
        match results.outcomes.get("topic b") {
            Some(TopicOutcome::Failed { error }) => assert_eq!(error, "no sources found"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_members_count_separately() {
        let (jobs, batches) = coordinator();
        let record = batches
            .submit_batch(batch_request(&["topic a", "topic b", "topic c"]))
            .await
            .unwrap();

        let job_a = &record.member_job_ids[0];
        jobs.dispatch(job_a).await.unwrap();
        jobs.succeed(job_a, result_with_confidence("topic a", 0.6))
            .await
            .unwrap();

        let job_b = &record.member_job_ids[1];
        jobs.dispatch(job_b).await.unwrap();
        jobs.fail(job_b, "boom".to_string()).await.unwrap();

        jobs.cancel(&record.member_job_ids[2]).await.unwrap();

        let results = batches.aggregate(&record.batch_id).await.unwrap();
        assert_eq!(results.completed_count, 1);
        assert_eq!(results.failed_count, 1);
        assert_eq!(results.cancelled_count, 1);
        assert_eq!(
            results.completed_count + results.failed_count + results.cancelled_count,
            results.total_topics
        );
        assert!(matches!(
            results.outcomes.get("topic c"),
            Some(TopicOutcome::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_early_aggregate_reports_partial_snapshot() {
        let (jobs, batches) = coordinator();
        let record = batches
            .submit_batch(batch_request(&["topic a", "topic b"]))
            .await
            .unwrap();

        let job_a = &record.member_job_ids[0];
        jobs.dispatch(job_a).await.unwrap();
        jobs.succeed(job_a, result_with_confidence("topic a", 1.0))
            .await
            .unwrap();

        // Member b has not even been dispatched; aggregation must not error.
        let results = batches.aggregate(&record.batch_id).await.unwrap();
        assert_eq!(results.status, BatchStatus::InProgress);
        assert_eq!(results.completed_count, 1);
        assert!(matches!(
            results.outcomes.get("topic b"),
            Some(TopicOutcome::Pending {
                status: JobStatus::Queued
            })
        ));
    }

    #[tokio::test]
    async fn test_no_completed_members_means_zero_confidence() {
        let (jobs, batches) = coordinator();
        let record = batches.submit_batch(batch_request(&["topic a"])).await.unwrap();

        let job_a = &record.member_job_ids[0];
        jobs.dispatch(job_a).await.unwrap();
        jobs.fail(job_a, "boom".to_string()).await.unwrap();

        let results = batches.aggregate(&record.batch_id).await.unwrap();
        assert_eq!(results.overall_confidence, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_batch_is_not_found() {
        let (_jobs, batches) = coordinator();
        assert!(matches!(
            batches.status("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            batches.aggregate("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
