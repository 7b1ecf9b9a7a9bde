//! The job state machine.
//!
//! `JobLifecycleManager` is the only writer of job status. Every mutation of
//! a given job is serialized through a per-job async lock, so transitions are
//! race-free even though executions, cancellations and the grace-period
//! watchdog all run concurrently. Once a job reaches a terminal state it
//! never leaves it: terminal entry points are idempotent no-ops on a job
//! that is already terminal.

use crate::executor::{CancelFlag, JobContext, ProgressSink, ResearchExecutor};
use crate::store::JobStore;
use crate::types::{AppError, Job, JobStatus, ResearchRequest, ResearchResult, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Per-entity async lock registry. Lock handles are created on demand and
/// dropped with the record.
#[derive(Default)]
struct EntityLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityLocks {
    fn handle(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    fn remove(&self, id: &str) {
        self.inner.lock().remove(id);
    }
}

/// Owns the per-job state machine described in the crate docs:
///
/// ```text
/// queued --dispatch--> in_progress --succeed--> completed
///    |                      |---------fail----> failed
///    |--cancel--------------+-------cancel----> cancelled
/// ```
///
/// Cancellation of an in-progress job is cooperative: the executor observes
/// an advisory flag at its checkpoints, and a watchdog force-cancels after a
/// bounded grace period so the state machine never hangs on an uncooperative
/// executor.
pub struct JobLifecycleManager {
    store: Arc<dyn JobStore>,
    executor: Arc<dyn ResearchExecutor>,
    cancel_grace: Duration,
    locks: EntityLocks,
    running: Mutex<HashMap<String, CancelFlag>>,
    // Handle to self for spawning runner and watchdog tasks.
    weak_self: Weak<JobLifecycleManager>,
}

impl JobLifecycleManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<dyn ResearchExecutor>,
        cancel_grace: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            store,
            executor,
            cancel_grace,
            locks: EntityLocks::default(),
            running: Mutex::new(HashMap::new()),
            weak_self: weak_self.clone(),
        })
    }

    /// Create a job in `queued` state and persist it. Returns immediately;
    /// execution is scheduled separately via [`spawn_execution`].
    ///
    /// [`spawn_execution`]: JobLifecycleManager::spawn_execution
    pub async fn submit(&self, request: ResearchRequest) -> Result<Job> {
        let topic = request.topic.trim();
        if topic.len() < 3 {
            return Err(AppError::InvalidInput(
                "topic must be at least 3 characters".to_string(),
            ));
        }
        if topic.len() > 255 {
            return Err(AppError::InvalidInput(
                "topic must be at most 255 characters".to_string(),
            ));
        }

        let job = Job::new(Uuid::new_v4().to_string(), request);
        self.store.insert(job.clone()).await?;
        tracing::info!(job_id = %job.id, topic = %job.request.topic, "job created");
        Ok(job)
    }

    /// Transition `queued -> in_progress` and record `started_at`.
    pub async fn dispatch(&self, job_id: &str) -> Result<Job> {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        let mut job = self.fetch(job_id).await?;
        if job.status != JobStatus::Queued {
            return Err(AppError::InvalidTransition(format!(
                "job '{job_id}' cannot be dispatched from {:?}",
                job.status
            )));
        }

        job.status = JobStatus::InProgress;
        job.started_at = Some(Utc::now());
        self.store.put(job.clone()).await?;
        tracing::info!(job_id, "job dispatched");
        Ok(job)
    }

    /// Record an executor progress update.
    ///
    /// Valid only while `in_progress`. Values are clamped to [0, 1];
    /// decreasing values are rejected (logged, value retained); updates on a
    /// job that is already terminal are discarded, since a terminal call may
    /// legitimately overtake queued progress reports.
    pub async fn report_progress(&self, job_id: &str, value: f32) -> Result<()> {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        let mut job = self.fetch(job_id).await?;
        if job.status.is_terminal() {
            tracing::debug!(job_id, value, "discarding progress update on terminal job");
            return Ok(());
        }
        if job.status != JobStatus::InProgress {
            return Err(AppError::InvalidTransition(format!(
                "job '{job_id}' is not in progress"
            )));
        }

        let value = value.clamp(0.0, 1.0);
        if value < job.progress {
            tracing::warn!(
                job_id,
                reported = value,
                current = job.progress,
                "ignoring decreasing progress update"
            );
            return Ok(());
        }

        job.progress = value;
        self.store.put(job).await?;
        Ok(())
    }

    /// Terminal transition `in_progress -> completed`.
    ///
    /// Idempotent: called on a job that is already terminal it returns the
    /// existing record untouched, because the executor's completion callback
    /// and a client-initiated cancel can race.
    pub async fn succeed(&self, job_id: &str, result: ResearchResult) -> Result<Job> {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        let mut job = self.fetch(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        if job.status != JobStatus::InProgress {
            return Err(AppError::InvalidTransition(format!(
                "job '{job_id}' cannot complete from {:?}",
                job.status
            )));
        }

        job.status = JobStatus::Completed;
        job.result = Some(result);
        job.progress = 1.0;
        job.completed_at = Some(Utc::now());
        self.store.put(job.clone()).await?;
        tracing::info!(job_id, "job completed");
        Ok(job)
    }

    /// Terminal transition `in_progress -> failed`. Idempotent like
    /// [`succeed`](JobLifecycleManager::succeed). A failed job always carries
    /// a non-empty error description.
    pub async fn fail(&self, job_id: &str, error: String) -> Result<Job> {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        let mut job = self.fetch(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        if job.status != JobStatus::InProgress {
            return Err(AppError::InvalidTransition(format!(
                "job '{job_id}' cannot fail from {:?}",
                job.status
            )));
        }

        let error = if error.trim().is_empty() {
            "executor reported an unspecified failure".to_string()
        } else {
            error
        };

        job.status = JobStatus::Failed;
        job.error = Some(error);
        job.completed_at = Some(Utc::now());
        self.store.put(job.clone()).await?;
        tracing::warn!(job_id, error = %job.error.as_deref().unwrap_or_default(), "job failed");
        Ok(job)
    }

    /// Request cancellation.
    ///
    /// From `queued` the job transitions to `cancelled` synchronously. From
    /// `in_progress` the executor's advisory flag is set and a watchdog is
    /// armed: if the executor does not acknowledge within the grace period,
    /// the job is force-cancelled regardless. Returns whether the request
    /// was accepted.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        let mut job = self.fetch(job_id).await?;
        match job.status {
            JobStatus::Queued => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                self.store.put(job).await?;
                tracing::info!(job_id, "queued job cancelled");
                Ok(true)
            }
            JobStatus::InProgress => {
                if let Some(flag) = self.running.lock().get(job_id) {
                    flag.set();
                }
                tracing::info!(job_id, "cancellation requested, awaiting executor checkpoint");

                if let Some(manager) = self.weak_self.upgrade() {
                    let watched = job_id.to_string();
                    let grace = self.cancel_grace;
                    tokio::spawn(async move {
                        tokio::time::sleep(grace).await;
                        manager.force_cancel(&watched).await;
                    });
                }
                Ok(true)
            }
            _ => Err(AppError::InvalidTransition(format!(
                "job '{job_id}' is already {:?}",
                job.status
            ))),
        }
    }

    /// Read-only snapshot of a job.
    pub async fn get(&self, job_id: &str) -> Result<Job> {
        self.fetch(job_id).await
    }

    /// Explicitly delete a job record. Only terminal jobs can be deleted so
    /// an executing task never loses its record mid-flight.
    pub async fn delete(&self, job_id: &str) -> Result<()> {
        let lock = self.locks.handle(job_id);
        {
            let _guard = lock.lock().await;

            let job = self.fetch(job_id).await?;
            if !job.status.is_terminal() {
                return Err(AppError::InvalidTransition(format!(
                    "job '{job_id}' is {:?}; only terminal jobs can be deleted",
                    job.status
                )));
            }
            self.store.delete(job_id).await?;
        }
        self.locks.remove(job_id);
        tracing::info!(job_id, "job deleted");
        Ok(())
    }

    /// Dispatch the job and drive the executor to a terminal state on a
    /// background task. The caller returns immediately.
    pub fn spawn_execution(&self, job_id: String) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            manager.run_job(job_id).await;
        });
    }

    async fn run_job(self: Arc<Self>, job_id: String) {
        let flag = CancelFlag::new();
        self.running.lock().insert(job_id.clone(), flag.clone());

        let job = match self.dispatch(&job_id).await {
            Ok(job) => job,
            Err(err) => {
                // Typically a cancel that won the race while the job was
                // still queued.
                tracing::debug!(job_id, %err, "job no longer dispatchable");
                self.running.lock().remove(&job_id);
                return;
            }
        };

        let ctx = JobContext::new(
            job_id.clone(),
            flag.clone(),
            Arc::clone(&self) as Arc<dyn ProgressSink>,
        );

        match self.executor.run(&job.request, &ctx).await {
            Ok(result) => {
                if let Err(err) = self.succeed(&job_id, result).await {
                    tracing::error!(job_id, %err, "failed to record job completion");
                }
            }
            Err(err) if flag.is_set() => {
                tracing::info!(job_id, %err, "executor acknowledged cancellation");
                self.acknowledge_cancel(&job_id).await;
            }
            Err(err) => {
                if let Err(record_err) = self.fail(&job_id, err.to_string()).await {
                    tracing::error!(job_id, %record_err, "failed to record job failure");
                }
            }
        }

        self.running.lock().remove(&job_id);
    }

    /// Executor stopped at a cancellation checkpoint: `in_progress ->
    /// cancelled`. No-op if the watchdog got there first.
    async fn acknowledge_cancel(&self, job_id: &str) {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        match self.fetch(job_id).await {
            Ok(mut job) if job.status == JobStatus::InProgress => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                if let Err(err) = self.store.put(job).await {
                    tracing::error!(job_id, %err, "failed to record cancellation");
                }
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(job_id, %err, "cancelled job no longer present"),
        }
    }

    /// Grace period elapsed without executor acknowledgment: force the
    /// terminal transition so the state machine never blocks on a hung
    /// executor. Logged as a warning, not surfaced as a failure.
    async fn force_cancel(&self, job_id: &str) {
        let lock = self.locks.handle(job_id);
        let _guard = lock.lock().await;

        match self.fetch(job_id).await {
            Ok(mut job) if job.status == JobStatus::InProgress => {
                tracing::warn!(
                    job_id,
                    grace_secs = self.cancel_grace.as_secs_f64(),
                    "cancellation grace period elapsed without executor acknowledgment"
                );
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                if let Err(err) = self.store.put(job).await {
                    tracing::error!(job_id, %err, "failed to record forced cancellation");
                }
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(job_id, %err, "cancelled job no longer present"),
        }
    }

    async fn fetch(&self, job_id: &str) -> Result<Job> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job with ID '{job_id}' not found")))
    }
}

#[async_trait]
impl ProgressSink for JobLifecycleManager {
    async fn report(&self, job_id: &str, value: f32) {
        if let Err(err) = self.report_progress(job_id, value).await {
            tracing::debug!(job_id, %err, "progress update dropped");
        }
    }
}
