//! In-memory job store backed by a hash map.

use super::JobStore;
use crate::types::{AppError, Job, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Ephemeral job store. Reads take a shared lock and never contend with each
/// other; each write replaces one record under the exclusive lock.
#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&job.id) {
            return Err(AppError::Internal(format!(
                "job record '{}' already exists",
                job.id
            )));
        }
        records.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.records.read().get(job_id).cloned())
    }

    async fn put(&self, job: Job) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "job record '{}' does not exist",
                job.id
            ))),
        }
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        match self.records.write().remove(job_id) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!(
                "job record '{}' does not exist",
                job_id
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<Job>> {
        Ok(self.records.read().values().cloned().collect())
    }
}
