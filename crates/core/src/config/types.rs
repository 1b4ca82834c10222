use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::quality::QualityPreferences;
use crate::reputation::ReputationSettings;
use crate::search::SearchConfig;
use crate::selection::{SelectionCacheConfig, DEFAULT_MAX_CANDIDATES};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub slskd: SlskdConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    /// Quality preferences used when `[search.quality]` is not set.
    #[serde(default)]
    pub quality: QualityPreferences,
    #[serde(default)]
    pub reputation: ReputationSettings,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub wishlist: Option<WishlistConfig>,
}

impl Config {
    /// Search settings with the quality fallback applied.
    pub fn effective_search_config(&self) -> SearchConfig {
        let mut search = self.search.clone();
        if search.quality.is_none() {
            search.quality = Some(self.quality.clone());
        }
        search
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("digger.db")
}

/// slskd connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlskdConfig {
    /// slskd base URL (e.g., "http://localhost:5030")
    pub url: String,
    /// slskd API key; empty when slskd runs without authentication
    #[serde(default)]
    pub api_key: String,
    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Search timeout slskd applies on its side
    #[serde(default = "default_slskd_search_timeout_ms")]
    pub search_timeout_ms: u64,
    /// Maximum responses slskd collects per search
    #[serde(default = "default_response_limit")]
    pub response_limit: u32,
    /// Maximum files slskd collects per search
    #[serde(default = "default_file_limit")]
    pub file_limit: u32,
}

fn default_timeout() -> u32 {
    30
}

fn default_slskd_search_timeout_ms() -> u64 {
    15_000
}

fn default_response_limit() -> u32 {
    100
}

fn default_file_limit() -> u32 {
    10_000
}

/// What happens once a search produced a valid selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Enqueue the best candidate right away.
    #[default]
    Auto,
    /// Stage the candidates and wait for an operator.
    Interactive,
}

/// Interactive selection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub mode: SelectionMode,
    /// Pending selection lifetime; 0 keeps entries until resolved
    #[serde(default = "default_selection_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::default(),
            timeout_secs: default_selection_timeout_secs(),
            max_candidates: default_max_candidates(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SelectionConfig {
    pub fn cache_config(&self) -> SelectionCacheConfig {
        SelectionCacheConfig {
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            max_candidates: self.max_candidates,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_selection_timeout_secs() -> u64 {
    3600
}

fn default_max_candidates() -> usize {
    DEFAULT_MAX_CANDIDATES
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Download monitor settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Jobs still unfinished after this long are abandoned
    #[serde(default = "default_max_job_age_secs")]
    pub max_job_age_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_monitor_poll_interval_secs(),
            max_job_age_secs: default_max_job_age_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_job_age(&self) -> Duration {
        Duration::from_secs(self.max_job_age_secs)
    }
}

fn default_monitor_poll_interval_secs() -> u64 {
    10
}

fn default_max_job_age_secs() -> u64 {
    6 * 3600
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Wishlist processing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WishlistConfig {
    pub path: PathBuf,
    /// Entries searched at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    2
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub slskd: SanitizedSlskdConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub quality: QualityPreferences,
    pub reputation: ReputationSettings,
    pub selection: SelectionConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wishlist: Option<WishlistConfig>,
}

/// Sanitized slskd config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSlskdConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub search_timeout_ms: u64,
    pub response_limit: u32,
    pub file_limit: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            slskd: SanitizedSlskdConfig {
                url: config.slskd.url.clone(),
                api_key_configured: !config.slskd.api_key.is_empty(),
                timeout_secs: config.slskd.timeout_secs,
                search_timeout_ms: config.slskd.search_timeout_ms,
                response_limit: config.slskd.response_limit,
                file_limit: config.slskd.file_limit,
            },
            database: config.database.clone(),
            search: config.search.clone(),
            quality: config.quality.clone(),
            reputation: config.reputation.clone(),
            selection: config.selection.clone(),
            monitor: config.monitor.clone(),
            logging: config.logging.clone(),
            wishlist: config.wishlist.clone(),
        }
    }
}
