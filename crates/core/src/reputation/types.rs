use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trust state of an uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Neutral,
    Trusted,
    Flagged,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Neutral => "neutral",
            UserStatus::Trusted => "trusted",
            UserStatus::Flagged => "flagged",
            UserStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ReputationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "neutral" => Ok(UserStatus::Neutral),
            "trusted" => Ok(UserStatus::Trusted),
            "flagged" => Ok(UserStatus::Flagged),
            "blocked" => Ok(UserStatus::Blocked),
            other => Err(ReputationError::InvalidStatus(other.to_string())),
        }
    }
}

/// Durable per-uploader reputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub id: String,
    /// Lowercased username; unique.
    pub username: String,
    pub status: UserStatus,
    pub success_count: u32,
    pub failure_count: u32,
    /// Mean transfer speed over successes (bytes/s).
    pub average_speed: u64,
    pub total_bytes: u64,
    /// Mean quality over successes, 0-100.
    pub quality_score: u32,
    pub notes: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReputationRecord {
    /// A fresh neutral record for `username` (lowercased).
    pub fn new(username: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: normalize_username(username),
            status: UserStatus::Neutral,
            success_count: 0,
            failure_count: 0,
            average_speed: 0,
            total_bytes: 0,
            quality_score: 0,
            notes: None,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Identity key for an uploader.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Result of a completed download, as fed into reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessOutcome {
    pub bytes: u64,
    /// Bytes per second.
    pub speed: u64,
    /// 0-100.
    pub quality_score: u32,
}

/// Reputation feature settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_auto_trust_threshold")]
    pub auto_trust_threshold: u32,
    #[serde(default = "default_auto_flag_threshold")]
    pub auto_flag_threshold: u32,
    #[serde(default = "default_track_quality")]
    pub track_quality: bool,
}

fn default_auto_trust_threshold() -> u32 {
    5
}

fn default_auto_flag_threshold() -> u32 {
    3
}

fn default_track_quality() -> bool {
    true
}

impl Default for ReputationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_trust_threshold: default_auto_trust_threshold(),
            auto_flag_threshold: default_auto_flag_threshold(),
            track_quality: default_track_quality(),
        }
    }
}

/// Filter for listing uploaders.
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub status: Option<UserStatus>,
    /// Case-insensitive substring of the username.
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of uploaders plus the total matching count.
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub items: Vec<ReputationRecord>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total: u64,
    pub neutral: u64,
    pub trusted: u64,
    pub flagged: u64,
    pub blocked: u64,
}

/// Usernames partitioned by non-neutral status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserExport {
    pub trusted: Vec<String>,
    pub blocked: Vec<String>,
    pub flagged: Vec<String>,
}

/// Usernames to import per status. Missing lists are treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserImport {
    #[serde(default)]
    pub trusted: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
    #[serde(default)]
    pub flagged: Vec<String>,
}

impl From<UserExport> for UserImport {
    fn from(export: UserExport) -> Self {
        Self {
            trusted: export.trusted,
            blocked: export.blocked,
            flagged: export.flagged,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: u32,
    pub updated: u32,
}

/// Errors from reputation storage.
#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("Uploader not found: {0}")]
    NotFound(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for ReputationError {
    fn from(e: rusqlite::Error) -> Self {
        ReputationError::Database(e.to_string())
    }
}
