//! Download monitor.
//!
//! Tracks jobs enqueued by the engine and turns their terminal states into
//! reputation outcomes. Jobs that never finish are abandoned after a
//! configurable age and count as failures.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::events::{EngineEvent, EventBus};
use crate::metrics;
use crate::network::{DownloadJob, DownloadRunner, JobStatus, SharedFile};
use crate::quality::{self, QualityTier};
use crate::reputation::{ReputationTracker, SuccessOutcome};

/// A job being watched.
#[derive(Debug, Clone)]
pub struct TrackedDownload {
    pub task_id: String,
    pub job: DownloadJob,
    /// Quality of the job's files on the 0-100 reputation scale.
    pub quality_percent: u32,
    pub tracked_at: Instant,
}

/// What happened to a job during a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { bytes: u64 },
    Failed { reason: String },
    Abandoned,
}

pub struct DownloadMonitor {
    runner: Arc<dyn DownloadRunner>,
    reputation: Arc<ReputationTracker>,
    events: EventBus,
    config: MonitorConfig,
    jobs: RwLock<HashMap<String, TrackedDownload>>,
}

impl std::fmt::Debug for DownloadMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadMonitor")
            .field("config", &self.config)
            .field("jobs", &"<jobs>")
            .finish()
    }
}

impl DownloadMonitor {
    pub fn new(
        runner: Arc<dyn DownloadRunner>,
        reputation: Arc<ReputationTracker>,
        events: EventBus,
        config: MonitorConfig,
    ) -> Self {
        Self {
            runner,
            reputation,
            events,
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Start watching `job`.
    pub async fn track(&self, task_id: &str, job: DownloadJob, files: &[SharedFile]) {
        let quality_percent = quality::dominant_quality(files)
            .map(|q| q.tier.percent())
            .unwrap_or_else(|| QualityTier::Unknown.percent());

        debug!(job_id = %job.id, username = %job.username, quality_percent, "Tracking download");
        self.jobs.write().await.insert(
            job.id.clone(),
            TrackedDownload {
                task_id: task_id.to_string(),
                job,
                quality_percent,
                tracked_at: Instant::now(),
            },
        );
    }

    pub async fn tracked(&self) -> Vec<TrackedDownload> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn active_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Check every tracked job once and settle the finished ones.
    pub async fn check_once(&self) -> Vec<(String, JobOutcome)> {
        let tracked = self.tracked().await;
        let max_age = self.config.max_job_age();
        let mut settled = Vec::new();

        for download in tracked {
            let status = match self.runner.job_status(&download.job).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(job_id = %download.job.id, error = %e, "Failed to check download");
                    JobStatus::InProgress
                }
            };

            let outcome = match status {
                JobStatus::Succeeded {
                    bytes,
                    average_speed,
                } => {
                    self.record(
                        &download,
                        Some(SuccessOutcome {
                            bytes,
                            speed: average_speed,
                            quality_score: download.quality_percent,
                        }),
                    );
                    self.events.publish(EngineEvent::DownloadCompleted {
                        job_id: download.job.id.clone(),
                        username: download.job.username.clone(),
                        directory: download.job.directory.clone(),
                        bytes,
                    });
                    metrics::DOWNLOAD_OUTCOMES
                        .with_label_values(&["succeeded"])
                        .inc();
                    info!(
                        "Download {} from {} completed ({} bytes)",
                        download.job.id, download.job.username, bytes
                    );
                    JobOutcome::Succeeded { bytes }
                }
                JobStatus::Failed { reason } => {
                    self.record(&download, None);
                    self.events.publish(EngineEvent::DownloadFailed {
                        job_id: download.job.id.clone(),
                        username: download.job.username.clone(),
                        reason: reason.clone(),
                    });
                    metrics::DOWNLOAD_OUTCOMES.with_label_values(&["failed"]).inc();
                    info!(
                        "Download {} from {} failed: {}",
                        download.job.id, download.job.username, reason
                    );
                    JobOutcome::Failed { reason }
                }
                JobStatus::InProgress if download.tracked_at.elapsed() >= max_age => {
                    self.record(&download, None);
                    self.events.publish(EngineEvent::DownloadFailed {
                        job_id: download.job.id.clone(),
                        username: download.job.username.clone(),
                        reason: "abandoned".to_string(),
                    });
                    metrics::DOWNLOAD_OUTCOMES
                        .with_label_values(&["abandoned"])
                        .inc();
                    warn!(
                        "Download {} from {} abandoned after {:?}",
                        download.job.id,
                        download.job.username,
                        download.tracked_at.elapsed()
                    );
                    JobOutcome::Abandoned
                }
                JobStatus::InProgress => continue,
            };

            self.jobs.write().await.remove(&download.job.id);
            settled.push((download.job.id, outcome));
        }

        settled
    }

    /// Check jobs every poll interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.poll_interval_secs,
            "Download monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Download monitor stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let settled = self.check_once().await;
                    if !settled.is_empty() {
                        debug!(settled = settled.len(), "Settled downloads");
                    }
                }
            }
        }
    }

    /// Feed an outcome to the reputation tracker; `None` is a failure.
    fn record(&self, download: &TrackedDownload, success: Option<SuccessOutcome>) {
        let username = &download.job.username;
        let result = match success {
            Some(success) => self.reputation.record_success(username, success),
            None => self.reputation.record_failure(username),
        };
        if let Err(e) = result {
            warn!(username = %username, error = %e, "Failed to record download outcome");
        }
    }
}
