//! slskd REST API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SlskdConfig;

use super::{
    CandidateResponse, DownloadJob, DownloadRunner, JobStatus, NetworkError, SearchNetwork,
    SearchState, SharedFile,
};

/// slskd client implementing both search and download.
pub struct SlskdClient {
    client: Client,
    config: SlskdConfig,
}

impl SlskdClient {
    /// Create a new slskd client.
    pub fn new(config: SlskdConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| NetworkError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v0{}", self.base_url(), endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("X-API-Key", &self.config.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, NetworkError> {
        self.authorized(request)
            .send()
            .await
            .map_err(map_request_error)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        search_id: Option<&str>,
    ) -> Result<T, NetworkError> {
        let response = self.send(self.client.get(self.url(endpoint))).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = search_id {
                return Err(NetworkError::SearchNotFound(id.to_string()));
            }
        }
        if !status.is_success() {
            return Err(NetworkError::ApiError(format!("HTTP {} for {}", status, endpoint)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::ApiError(format!("Invalid response body: {}", e)))
    }
}

fn map_request_error(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else if e.is_connect() {
        NetworkError::ConnectionFailed(e.to_string())
    } else {
        NetworkError::ApiError(e.to_string())
    }
}

#[async_trait]
impl SearchNetwork for SlskdClient {
    fn name(&self) -> &str {
        "slskd"
    }

    async fn submit_search(&self, query: &str) -> Result<String, NetworkError> {
        let request = SlskdSearchRequest {
            id: Uuid::new_v4().to_string(),
            search_text: query.to_string(),
            search_timeout: self.config.search_timeout_ms,
            response_limit: self.config.response_limit,
            file_limit: self.config.file_limit,
        };

        let response = self
            .send(self.client.post(self.url("/searches")).json(&request))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::ApiError(format!(
                "Search submission failed: HTTP {}: {}",
                status,
                body.chars().take(100).collect::<String>()
            )));
        }

        // slskd echoes the search back; fall back to our id if the body is odd
        let id = match response.json::<SlskdSearch>().await {
            Ok(search) if !search.id.is_empty() => search.id,
            _ => request.id,
        };

        debug!(search_id = %id, query = %query, "Submitted slskd search");
        Ok(id)
    }

    async fn poll_state(&self, search_id: &str) -> Result<SearchState, NetworkError> {
        let search: SlskdSearch = self
            .get_json(&format!("/searches/{}", search_id), Some(search_id))
            .await?;

        let responses: Vec<SlskdSearchResponse> = self
            .get_json(&format!("/searches/{}/responses", search_id), Some(search_id))
            .await?;

        Ok(SearchState {
            complete: search.is_complete || search.state.starts_with("Completed"),
            responses: responses.into_iter().map(CandidateResponse::from).collect(),
        })
    }

    async fn cancel_search(&self, search_id: &str) -> Result<(), NetworkError> {
        let endpoint = format!("/searches/{}", search_id);

        // Stop first so slskd releases the search on the network, then delete it.
        let stop = self.send(self.client.put(self.url(&endpoint))).await?;
        if !stop.status().is_success() && stop.status() != StatusCode::NOT_FOUND {
            warn!(search_id = %search_id, status = %stop.status(), "Failed to stop slskd search");
        }

        let delete = self.send(self.client.delete(self.url(&endpoint))).await?;
        match delete.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => Err(NetworkError::ApiError(format!(
                "Failed to delete search {}: HTTP {}",
                search_id, s
            ))),
        }
    }
}

#[async_trait]
impl DownloadRunner for SlskdClient {
    async fn enqueue_download(
        &self,
        username: &str,
        directory: &str,
        files: &[SharedFile],
    ) -> Result<DownloadJob, NetworkError> {
        let body: Vec<SlskdDownloadRequest> = files
            .iter()
            .map(|f| SlskdDownloadRequest {
                filename: f.filename.clone(),
                size: f.size.unwrap_or(0),
            })
            .collect();

        let endpoint = format!("/transfers/downloads/{}", urlencoding::encode(username));
        let response = self
            .send(self.client.post(self.url(&endpoint)).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::ApiError(format!(
                "Download enqueue failed: HTTP {}: {}",
                status,
                body.chars().take(100).collect::<String>()
            )));
        }

        debug!(username = %username, files = files.len(), "Enqueued slskd download");

        Ok(DownloadJob {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            directory: directory.to_string(),
            filenames: files.iter().map(|f| f.filename.clone()).collect(),
            enqueued_at: Utc::now(),
        })
    }

    async fn job_status(&self, job: &DownloadJob) -> Result<JobStatus, NetworkError> {
        let endpoint = format!(
            "/transfers/downloads/{}",
            urlencoding::encode(&job.username)
        );

        let response = self.send(self.client.get(self.url(&endpoint))).await?;
        let status = response.status();

        // Transfers may not be registered yet right after enqueueing.
        if status == StatusCode::NOT_FOUND {
            return Ok(JobStatus::InProgress);
        }
        if !status.is_success() {
            return Err(NetworkError::ApiError(format!("HTTP {} for {}", status, endpoint)));
        }

        let user: SlskdUserTransfers = response
            .json()
            .await
            .map_err(|e| NetworkError::ApiError(format!("Invalid response body: {}", e)))?;

        let transfers: Vec<&SlskdTransfer> = user
            .directories
            .iter()
            .flat_map(|d| d.files.iter())
            .collect();

        Ok(summarize_transfers(job, &transfers))
    }
}

/// Fold the per-file transfer states of a job into a single status.
fn summarize_transfers(job: &DownloadJob, transfers: &[&SlskdTransfer]) -> JobStatus {
    let mut bytes = 0u64;
    let mut speeds = Vec::with_capacity(job.filenames.len());

    for filename in &job.filenames {
        // The most recent transfer wins when a file was retried.
        let Some(transfer) = transfers.iter().rev().find(|t| &t.filename == filename) else {
            return JobStatus::InProgress;
        };

        match parse_transfer_state(&transfer.state) {
            TransferState::Pending => return JobStatus::InProgress,
            TransferState::Failed => {
                return JobStatus::Failed {
                    reason: format!("{}: {}", filename, transfer.state),
                }
            }
            TransferState::Succeeded => {
                bytes += transfer.bytes_transferred.max(transfer.size);
                speeds.push(transfer.average_speed);
            }
        }
    }

    let average_speed = if speeds.is_empty() {
        0
    } else {
        (speeds.iter().sum::<f64>() / speeds.len() as f64).round() as u64
    };

    JobStatus::Succeeded {
        bytes,
        average_speed,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TransferState {
    Pending,
    Succeeded,
    Failed,
}

/// Parse an slskd transfer state such as "Completed, Succeeded".
fn parse_transfer_state(state: &str) -> TransferState {
    if !state.starts_with("Completed") {
        return TransferState::Pending;
    }
    if state.contains("Succeeded") {
        TransferState::Succeeded
    } else {
        // Errored, Rejected, Cancelled, TimedOut
        TransferState::Failed
    }
}

// slskd API types (internal)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SlskdSearchRequest {
    id: String,
    search_text: String,
    search_timeout: u64,
    response_limit: u32,
    file_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlskdSearch {
    #[serde(default)]
    id: String,
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlskdSearchResponse {
    username: String,
    #[serde(default)]
    files: Vec<SlskdFile>,
    #[serde(default)]
    has_free_upload_slot: bool,
    #[serde(default)]
    upload_speed: u64,
    #[serde(default)]
    queue_length: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlskdFile {
    filename: String,
    size: Option<u64>,
    bit_rate: Option<u32>,
    bit_depth: Option<u32>,
    sample_rate: Option<u32>,
    length: Option<u32>,
}

impl From<SlskdSearchResponse> for CandidateResponse {
    fn from(r: SlskdSearchResponse) -> Self {
        CandidateResponse {
            username: r.username,
            files: r
                .files
                .into_iter()
                .map(|f| SharedFile {
                    filename: f.filename,
                    size: f.size,
                    bit_rate: f.bit_rate,
                    bit_depth: f.bit_depth,
                    sample_rate: f.sample_rate,
                    length: f.length,
                })
                .collect(),
            has_free_slot: r.has_free_upload_slot,
            upload_speed: r.upload_speed,
            queue_length: r.queue_length,
        }
    }
}

#[derive(Debug, Serialize)]
struct SlskdDownloadRequest {
    filename: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct SlskdUserTransfers {
    #[serde(default)]
    directories: Vec<SlskdTransferDirectory>,
}

#[derive(Debug, Deserialize)]
struct SlskdTransferDirectory {
    #[serde(default)]
    files: Vec<SlskdTransfer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlskdTransfer {
    filename: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    bytes_transferred: u64,
    #[serde(default)]
    average_speed: f64,
}
