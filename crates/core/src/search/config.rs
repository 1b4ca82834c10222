//! Search tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::{QueryTemplates, SearchKind};
use crate::quality::QualityPreferences;
use crate::selector::FileSelectionOptions;

const MB: u64 = 1024 * 1024;

/// Minimum files expected for an album download.
pub const MIN_FILES_ALBUM: usize = 3;

/// Minimum files expected for a track download.
pub const MIN_FILES_TRACK: usize = 1;

/// Retry policy for searches that find nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_true")]
    pub simplify_on_retry: bool,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            simplify_on_retry: true,
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Per-search tunables. Owned by the caller and never mutated by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Stop collecting responses after this long.
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
    /// Hard ceiling for one attempt.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Responses with fewer files are ignored.
    #[serde(default = "default_min_response_files")]
    pub min_response_files: usize,
    /// Responses with more files are ignored (whole-share dumps).
    #[serde(default = "default_max_response_files")]
    pub max_response_files: usize,
    /// How many ranked responses the file selector looks at.
    #[serde(default = "default_max_responses_to_eval")]
    pub max_responses_to_eval: usize,
    #[serde(default = "default_min_files_album")]
    pub min_files_album: usize,
    #[serde(default = "default_min_files_track")]
    pub min_files_track: usize,
    #[serde(default = "default_min_file_size_mb")]
    pub min_file_size_mb: u64,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_true")]
    pub prefer_complete_albums: bool,
    #[serde(default = "default_true")]
    pub prefer_album_folder: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub query: QueryTemplates,
    /// Overrides the top-level `[quality]` section when set.
    #[serde(default)]
    pub quality: Option<QualityPreferences>,
}

fn default_search_timeout_ms() -> u64 {
    15_000
}

fn default_max_wait_ms() -> u64 {
    20_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_min_response_files() -> usize {
    1
}

fn default_max_response_files() -> usize {
    1_000
}

fn default_max_responses_to_eval() -> usize {
    50
}

fn default_min_files_album() -> usize {
    MIN_FILES_ALBUM
}

fn default_min_files_track() -> usize {
    MIN_FILES_TRACK
}

fn default_min_file_size_mb() -> u64 {
    1
}

fn default_max_file_size_mb() -> u64 {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_timeout_ms: default_search_timeout_ms(),
            max_wait_ms: default_max_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            min_response_files: default_min_response_files(),
            max_response_files: default_max_response_files(),
            max_responses_to_eval: default_max_responses_to_eval(),
            min_files_album: MIN_FILES_ALBUM,
            min_files_track: MIN_FILES_TRACK,
            min_file_size_mb: default_min_file_size_mb(),
            max_file_size_mb: default_max_file_size_mb(),
            prefer_complete_albums: true,
            prefer_album_folder: true,
            retry: RetryPolicy::default(),
            query: QueryTemplates::default(),
            quality: None,
        }
    }
}

impl SearchConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.delay_ms)
    }

    pub fn min_file_size_bytes(&self) -> u64 {
        self.min_file_size_mb.saturating_mul(MB)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(MB)
    }

    /// Attempts allowed in total (at least one).
    pub fn max_attempts(&self) -> u32 {
        if self.retry.enabled {
            self.retry.max_attempts.max(1)
        } else {
            1
        }
    }

    pub fn min_files_for(&self, kind: SearchKind) -> usize {
        match kind {
            SearchKind::Track => self.min_files_track,
            SearchKind::Album | SearchKind::Artist => self.min_files_album,
        }
    }

    /// File selector options for a search of the given kind.
    ///
    /// Track searches take a single file matching `title`.
    pub fn selection_options(&self, kind: SearchKind, title: Option<&str>) -> FileSelectionOptions {
        FileSelectionOptions {
            min_file_size_bytes: self.min_file_size_bytes(),
            max_file_size_bytes: self.max_file_size_bytes(),
            min_files: self.min_files_for(kind),
            prefer_complete_albums: self.prefer_complete_albums,
            prefer_album_folder: self.prefer_album_folder,
            quality: self.quality.clone(),
            single_file_hint: match kind {
                SearchKind::Track => Some(title.unwrap_or_default().to_string()),
                _ => None,
            },
            directory: None,
        }
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("search.poll_interval_ms must be greater than 0".to_string());
        }
        if self.max_wait_ms == 0 {
            return Err("search.max_wait_ms must be greater than 0".to_string());
        }
        if self.search_timeout_ms > self.max_wait_ms {
            return Err(format!(
                "search.search_timeout_ms ({}) cannot exceed search.max_wait_ms ({})",
                self.search_timeout_ms, self.max_wait_ms
            ));
        }
        if self.min_response_files > self.max_response_files {
            return Err("search.min_response_files cannot exceed search.max_response_files".to_string());
        }
        if self.min_file_size_mb > self.max_file_size_mb {
            return Err("search.min_file_size_mb cannot exceed search.max_file_size_mb".to_string());
        }
        if self.max_responses_to_eval == 0 {
            return Err("search.max_responses_to_eval must be greater than 0".to_string());
        }
        if self.retry.enabled && self.retry.max_attempts == 0 {
            return Err("search.retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}
