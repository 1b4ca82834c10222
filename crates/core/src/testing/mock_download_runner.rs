//! Mock download runner for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::network::{DownloadJob, DownloadRunner, JobStatus, NetworkError, SharedFile};

/// Mock implementation of the DownloadRunner trait.
///
/// Jobs stay `InProgress` until a status is set for them, either by job id
/// or for every job of an uploader.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockDownloadRunner::new();
/// let job = runner.enqueue_download("alice", "Music/Album", &files).await?;
///
/// runner.set_user_status("alice", JobStatus::Succeeded { bytes: 1, average_speed: 1 }).await;
/// assert!(runner.job_status(&job).await?.is_terminal());
/// ```
#[derive(Debug, Default)]
pub struct MockDownloadRunner {
    enqueued: Arc<RwLock<Vec<DownloadJob>>>,
    job_statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
    user_statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
    next_enqueue_error: Arc<RwLock<Option<NetworkError>>>,
    next_status_error: Arc<RwLock<Option<NetworkError>>>,
    status_checks: Arc<RwLock<usize>>,
}

impl MockDownloadRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs enqueued so far.
    pub async fn enqueued(&self) -> Vec<DownloadJob> {
        self.enqueued.read().await.clone()
    }

    pub async fn set_job_status(&self, job_id: &str, status: JobStatus) {
        self.job_statuses
            .write()
            .await
            .insert(job_id.to_string(), status);
    }

    /// Status for all jobs from `username` without a job-specific status.
    pub async fn set_user_status(&self, username: &str, status: JobStatus) {
        self.user_statuses
            .write()
            .await
            .insert(username.to_string(), status);
    }

    pub async fn set_next_enqueue_error(&self, error: NetworkError) {
        self.next_enqueue_error.write().await.replace(error);
    }

    pub async fn set_next_status_error(&self, error: NetworkError) {
        self.next_status_error.write().await.replace(error);
    }

    /// Number of job_status calls.
    pub async fn status_checks(&self) -> usize {
        *self.status_checks.read().await
    }
}

#[async_trait]
impl DownloadRunner for MockDownloadRunner {
    async fn enqueue_download(
        &self,
        username: &str,
        directory: &str,
        files: &[SharedFile],
    ) -> Result<DownloadJob, NetworkError> {
        if let Some(error) = self.next_enqueue_error.write().await.take() {
            return Err(error);
        }

        let mut enqueued = self.enqueued.write().await;
        let job = DownloadJob {
            id: format!("job-{}", enqueued.len() + 1),
            username: username.to_string(),
            directory: directory.to_string(),
            filenames: files.iter().map(|f| f.filename.clone()).collect(),
            enqueued_at: Utc::now(),
        };
        enqueued.push(job.clone());
        Ok(job)
    }

    async fn job_status(&self, job: &DownloadJob) -> Result<JobStatus, NetworkError> {
        *self.status_checks.write().await += 1;

        if let Some(error) = self.next_status_error.write().await.take() {
            return Err(error);
        }

        if let Some(status) = self.job_statuses.read().await.get(&job.id) {
            return Ok(status.clone());
        }
        Ok(self
            .user_statuses
            .read()
            .await
            .get(&job.username)
            .cloned()
            .unwrap_or(JobStatus::InProgress))
    }
}
