//! # A.R.G.O.S - Asynchronous Research & General Orchestration Server
//!
//! An orchestration core for asynchronous research work: it accepts research
//! requests over HTTP, tracks each job through an explicit lifecycle, fans
//! batches out into individual jobs and aggregates their outcomes, and hosts
//! live interactive research sessions over a duplex WebSocket channel.
//!
//! ## Overview
//!
//! A.R.G.O.S can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `argos-server` binary
//! 2. **As a library** - Wire the managers into your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use argos::{AppState, Config, OfflineExecutor};
//! use std::sync::Arc;
//!
//! let config = Config::from_env()?;
//! let state = AppState::new(config, Arc::new(OfflineExecutor::new()));
//! let app = argos::api::routes::create_router().with_state(state);
//! ```
//!
//! ## Architecture
//!
//! The core is built from small, single-owner components:
//!
//! - [`jobs::JobLifecycleManager`] - the only writer of job state; owns the
//!   `queued -> in_progress -> terminal` state machine, background execution
//!   and cooperative cancellation with a bounded grace period.
//! - [`batch::BatchCoordinator`] - fans a topic list out into member jobs
//!   and aggregates their terminal outcomes; partial success is allowed.
//! - [`live::LiveSessionManager`] - ordered, replayable conversations with
//!   strictly sequential turns, independent of the job state machine.
//! - [`live::gateway`] - the WebSocket boundary that relays session frames.
//! - [`status::StatusQueryService`] - the read-only path polling clients use.
//! - [`store::JobStore`] - dumb keyed persistence behind the managers'
//!   exclusive-write contract.
//! - [`executor::ResearchExecutor`] - the boundary to the external
//!   content-generation pipeline; [`executor::OfflineExecutor`] is the
//!   built-in placeholder.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Batch fan-out and aggregation.
pub mod batch;
/// The research-executor boundary and the offline placeholder.
pub mod executor;
/// Job lifecycle state machine.
pub mod jobs;
/// Live sessions and the WebSocket gateway.
pub mod live;
/// Read-only status projections.
pub mod status;
/// Job record storage.
pub mod store;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use batch::BatchCoordinator;
pub use executor::{OfflineExecutor, ResearchExecutor};
pub use jobs::JobLifecycleManager;
pub use live::LiveSessionManager;
pub use status::StatusQueryService;
pub use store::{JobStore, MemoryJobStore, StoreProvider};
pub use types::{AppError, Result};
pub use utils::config::Config;

use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server and orchestrator configuration.
    pub config: Arc<Config>,
    /// Job record storage.
    pub store: Arc<dyn JobStore>,
    /// Job lifecycle manager.
    pub jobs: Arc<JobLifecycleManager>,
    /// Batch coordinator.
    pub batches: Arc<BatchCoordinator>,
    /// Live session manager.
    pub sessions: Arc<LiveSessionManager>,
    /// Read-only status projections.
    pub status: Arc<StatusQueryService>,
}

impl AppState {
    /// Wire up the orchestration core around the given executor.
    pub fn new(config: Config, executor: Arc<dyn ResearchExecutor>) -> Self {
        let store = StoreProvider::Memory.create_store();
        let jobs = JobLifecycleManager::new(
            store.clone(),
            executor.clone(),
            config.orchestrator.cancel_grace(),
        );
        let batches = Arc::new(BatchCoordinator::new(jobs.clone()));
        let sessions = Arc::new(LiveSessionManager::new(
            executor,
            config.orchestrator.session_channel_capacity,
        ));
        let status = Arc::new(StatusQueryService::new(
            store.clone(),
            batches.clone(),
            sessions.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            jobs,
            batches,
            sessions,
            status,
        }
    }
}
