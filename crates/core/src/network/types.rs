//! Types for the peer-to-peer search network and download runner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file offered by an uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFile {
    /// Full path as reported by the uploader (either separator style).
    pub filename: String,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Bitrate in kbps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u32>,
    /// Sample rate in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl SharedFile {
    /// Create a file with only a name; metadata fields unset.
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            size: None,
            bit_rate: None,
            bit_depth: None,
            sample_rate: None,
            length: None,
        }
    }

    /// Path with `\` separators converted to `/`.
    pub fn normalized_path(&self) -> String {
        normalize_path(&self.filename)
    }

    /// Parent directory in normalized form ("" for bare filenames).
    pub fn directory(&self) -> String {
        let path = self.normalized_path();
        match path.rfind('/') {
            Some(idx) => path[..idx].to_string(),
            None => String::new(),
        }
    }

    /// Final path component.
    pub fn basename(&self) -> &str {
        self.filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename)
    }

    /// Lowercase extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.basename();
        let idx = name.rfind('.')?;
        if idx == 0 || idx + 1 == name.len() {
            return None;
        }
        Some(name[idx + 1..].to_ascii_lowercase())
    }
}

/// Convert separators to `/` and strip trailing separators.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_end_matches('/').to_string()
}

/// One uploader's offer for a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub username: String,
    pub files: Vec<SharedFile>,
    #[serde(default)]
    pub has_free_slot: bool,
    /// Upload speed in bytes per second.
    #[serde(default)]
    pub upload_speed: u64,
    #[serde(default)]
    pub queue_length: u32,
}

/// Snapshot of an in-flight search.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    /// Whether the network reports the search as finished.
    pub complete: bool,
    /// All responses received so far (cumulative).
    pub responses: Vec<CandidateResponse>,
}

/// Handle for a download enqueued on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: String,
    pub username: String,
    pub directory: String,
    pub filenames: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Progress of a download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or transferring.
    InProgress,
    /// All files transferred.
    Succeeded {
        bytes: u64,
        /// Average transfer speed in bytes per second.
        average_speed: u64,
    },
    /// At least one file failed, was rejected or cancelled.
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

/// Errors from the external network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Search not found: {0}")]
    SearchNotFound(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// External search network (e.g. slskd).
#[async_trait]
pub trait SearchNetwork: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Start a search and return its identifier.
    async fn submit_search(&self, query: &str) -> Result<String, NetworkError>;

    /// Fetch the current state and all responses of a search.
    async fn poll_state(&self, search_id: &str) -> Result<SearchState, NetworkError>;

    /// Stop a search and release it on the network side.
    async fn cancel_search(&self, search_id: &str) -> Result<(), NetworkError>;
}

/// Runs downloads once a candidate has been chosen.
#[async_trait]
pub trait DownloadRunner: Send + Sync {
    /// Queue the given files from `username`.
    async fn enqueue_download(
        &self,
        username: &str,
        directory: &str,
        files: &[SharedFile],
    ) -> Result<DownloadJob, NetworkError>;

    /// Report the current status of a previously enqueued job.
    async fn job_status(&self, job: &DownloadJob) -> Result<JobStatus, NetworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_handles_backslashes() {
        let file = SharedFile::named("@@music\\Artist\\Album\\01 - Song.flac");
        assert_eq!(file.directory(), "@@music/Artist/Album");
        assert_eq!(file.basename(), "01 - Song.flac");
    }

    #[test]
    fn test_directory_of_bare_filename_is_empty() {
        let file = SharedFile::named("song.mp3");
        assert_eq!(file.directory(), "");
        assert_eq!(file.basename(), "song.mp3");
    }

    #[test]
    fn test_extension() {
        assert_eq!(
            SharedFile::named("a/b/Track.FLAC").extension().as_deref(),
            Some("flac")
        );
        assert_eq!(SharedFile::named("a/b/README").extension(), None);
        assert_eq!(SharedFile::named("a/b/.hidden").extension(), None);
        assert_eq!(SharedFile::named("a/b/trailing.").extension(), None);
    }

    #[test]
    fn test_candidate_response_deserialize_minimal() {
        let json = r#"{"username": "user1", "files": [{"filename": "track1.flac"}]}"#;
        let parsed: CandidateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.username, "user1");
        assert_eq!(parsed.files.len(), 1);
        assert!(!parsed.has_free_slot);
        assert_eq!(parsed.upload_speed, 0);
    }

    #[test]
    fn test_candidate_response_requires_username() {
        let json = r#"{"files": [{"filename": "track1.flac"}]}"#;
        assert!(serde_json::from_str::<CandidateResponse>(json).is_err());
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Failed {
            reason: "x".to_string()
        }
        .is_terminal());
    }
}
