//! API module for the chapter generation service
//!
//! Exposes the job-based generation flow, the synchronous-compatibility
//! route, job polling, and a read-only credit balance view.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::IdentityResolver;
use crate::config::Config;
use crate::jobs::JobOrchestrator;

pub mod handlers;
pub mod models;
pub mod server;

pub use server::AppState;

/// API server for the generation pipeline
pub struct ApiServer {
    state: AppState,
    port: u16,
}

impl ApiServer {
    pub fn new(
        orchestrator: Arc<JobOrchestrator>,
        resolver: Arc<dyn IdentityResolver>,
        config: Arc<Config>,
    ) -> Self {
        let port = config.server.port;
        Self {
            state: AppState {
                orchestrator,
                resolver,
                config,
            },
            port,
        }
    }

    /// Start the API server in the background
    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.port);

        // Keep job metadata bounded while the server runs
        let sweep_every =
            Duration::from_secs(self.state.config.jobs.eviction_interval_seconds.max(1));
        self.state.orchestrator.spawn_eviction_sweep(sweep_every);

        server::start_http_server(self.state, self.port).await
    }
}
