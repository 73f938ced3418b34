use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_store::fs::atomic_write;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Error,
}

/// Contents of `worker_status.json`, polled by external health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub last_update: DateTime<Utc>,
    pub worker_started_at: DateTime<Utc>,
    pub last_successful_run: Option<DateTime<Utc>>,
    pub status: Health,
    pub message: String,
}

pub struct StatusWriter {
    path: PathBuf,
    started_at: DateTime<Utc>,
    last_successful_run: Mutex<Option<DateTime<Utc>>>,
}

impl StatusWriter {
    pub fn new(path: impl Into<PathBuf>, started_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            started_at,
            last_successful_run: Mutex::new(None),
        }
    }

    /// Worker lifecycle event; leaves `last_successful_run` alone.
    pub async fn lifecycle(&self, message: &str) -> QuarryResult<WorkerStatus> {
        self.write(Health::Healthy, message, false).await
    }

    pub async fn job_finished(&self, success: bool, message: &str) -> QuarryResult<WorkerStatus> {
        let health = if success {
            Health::Healthy
        } else {
            Health::Error
        };
        self.write(health, message, success).await
    }

    async fn write(
        &self,
        status: Health,
        message: &str,
        mark_success: bool,
    ) -> QuarryResult<WorkerStatus> {
        let now = Utc::now();
        let last_successful_run = {
            let mut last = self
                .last_successful_run
                .lock()
                .map_err(|_| QuarryError::Internal("status lock poisoned".to_string()))?;
            if mark_success {
                *last = Some(now);
            }
            *last
        };

        let doc = WorkerStatus {
            last_update: now,
            worker_started_at: self.started_at,
            last_successful_run,
            status,
            message: message.to_string(),
        };
        let body = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.path, &body).await?;
        tracing::debug!(path = %self.path.display(), status = ?doc.status, "worker status written");
        Ok(doc)
    }
}
