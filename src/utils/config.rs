//! Environment-driven server configuration.

use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Tuning knobs for the orchestration core.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// How long a cancelled in-progress job waits for the executor to
    /// acknowledge before it is force-cancelled.
    pub cancel_grace_secs: u64,
    /// Buffer size of the per-session outbound log-entry channel.
    pub session_channel_capacity: usize,
    /// Duration estimate advertised on job submission.
    pub estimated_duration_minutes: u32,
}

impl OrchestratorConfig {
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cancel_grace_secs: 5,
            session_channel_capacity: 64,
            estimated_duration_minutes: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
            },
            orchestrator: OrchestratorConfig {
                cancel_grace_secs: env::var("CANCEL_GRACE_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                session_channel_capacity: env::var("SESSION_CHANNEL_CAPACITY")
                    .unwrap_or_else(|_| "64".to_string())
                    .parse()?,
                estimated_duration_minutes: env::var("ESTIMATED_DURATION_MINUTES")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            },
        })
    }
}
