//! Application state for the pdfforge API

use std::sync::Arc;

use anyhow::Result;
use pdfforge_core::{Retention, Workspace};
use tokio::sync::Semaphore;

use crate::config::Config;

pub struct AppState {
    pub config: Config,
    pub workspace: Workspace,
    /// Bounds the number of jobs running on the blocking pool
    pub job_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        tracing::info!(
            "Using workspace {} ({} concurrent jobs)",
            config.workspace_root.display(),
            config.max_concurrent_jobs
        );

        let workspace = Workspace::open(&config.workspace_root)?;
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        Ok(Self {
            config,
            workspace,
            job_slots,
        })
    }

    pub fn retention(&self) -> Retention {
        if self.config.retain_artifacts {
            Retention::KeepArtifact
        } else {
            Retention::Dispose
        }
    }
}
