//! Job record storage.
//!
//! The store is pure data access: it persists whatever the lifecycle manager
//! tells it to and enforces no policy of its own. All writes to a given
//! record are funneled through the owning manager, so the store only needs
//! per-record atomicity, not cross-entity locking.

mod memory;

pub use memory::MemoryJobStore;

use crate::types::{Job, Result};
use async_trait::async_trait;

/// Store backend configuration.
#[derive(Debug, Clone, Default)]
pub enum StoreProvider {
    /// In-memory store (ephemeral, lost on restart).
    #[default]
    Memory,
}

impl StoreProvider {
    /// Create a job store from this provider configuration.
    pub fn create_store(&self) -> std::sync::Arc<dyn JobStore> {
        match self {
            StoreProvider::Memory => std::sync::Arc::new(MemoryJobStore::new()),
        }
    }
}

/// Abstract trait for job record persistence.
///
/// Implementations can use different backends; the reference backend is the
/// in-memory map. `put` is a whole-record replace: the caller owns
/// read-modify-write sequencing.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record. Fails if the id already exists.
    async fn insert(&self, job: Job) -> Result<()>;

    /// Fetch a snapshot of a job record.
    async fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// Replace an existing job record. Fails if the id is unknown.
    async fn put(&self, job: Job) -> Result<()>;

    /// Remove a job record. Fails if the id is unknown.
    async fn delete(&self, job_id: &str) -> Result<()>;

    /// Snapshot every stored record.
    async fn list(&self) -> Result<Vec<Job>>;
}
