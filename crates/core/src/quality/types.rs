//! Types for the audio quality model.

use serde::{Deserialize, Serialize};

/// Bitrate threshold for the high tier (kbps).
pub const HIGH_QUALITY_BITRATE: u32 = 320;

/// Bitrate threshold for the standard tier (kbps).
pub const STANDARD_QUALITY_BITRATE: u32 = 256;

/// Nominal "very low" threshold (kbps).
///
/// Files below this are still classified as [`QualityTier::Low`]; there is
/// no separate tier for them.
pub const LOW_QUALITY_BITRATE: u32 = 96;

/// Audio format detected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Flac,
    Wav,
    Alac,
    Aiff,
    Mp3,
    M4a,
    Aac,
    Ogg,
    Opus,
    Wma,
    Unknown,
}

impl AudioFormat {
    /// Look up a format by file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "flac" => AudioFormat::Flac,
            "wav" => AudioFormat::Wav,
            "alac" => AudioFormat::Alac,
            "aiff" => AudioFormat::Aiff,
            "mp3" => AudioFormat::Mp3,
            "m4a" => AudioFormat::M4a,
            "aac" => AudioFormat::Aac,
            "ogg" => AudioFormat::Ogg,
            "opus" => AudioFormat::Opus,
            "wma" => AudioFormat::Wma,
            _ => AudioFormat::Unknown,
        }
    }

    /// Returns the lowercase name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Alac => "alac",
            AudioFormat::Aiff => "aiff",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Aac => "aac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Opus => "opus",
            AudioFormat::Wma => "wma",
            AudioFormat::Unknown => "unknown",
        }
    }

    /// Whether this is a lossless container.
    pub fn is_lossless(&self) -> bool {
        matches!(
            self,
            AudioFormat::Flac | AudioFormat::Wav | AudioFormat::Alac | AudioFormat::Aiff
        )
    }

    /// Whether the extension was recognized as audio at all.
    pub fn is_audio(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse quality bucket derived from format and bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Lossless,
    High,
    Standard,
    Low,
    Unknown,
}

impl QualityTier {
    /// Position in the fixed quality ordering (0 = best).
    ///
    /// Unknown sorts last even though its base score is above `Low`.
    pub fn rank(&self) -> u8 {
        match self {
            QualityTier::Lossless => 0,
            QualityTier::High => 1,
            QualityTier::Standard => 2,
            QualityTier::Low => 3,
            QualityTier::Unknown => 4,
        }
    }

    /// Base ranking score for this tier.
    pub fn base_score(&self) -> i64 {
        match self {
            QualityTier::Lossless => 1000,
            QualityTier::High => 500,
            QualityTier::Standard => 200,
            QualityTier::Low => 50,
            QualityTier::Unknown => 100,
        }
    }

    /// Tier expressed on the 0-100 scale stored in uploader reputation.
    pub fn percent(&self) -> u32 {
        match self {
            QualityTier::Lossless => 100,
            QualityTier::High => 80,
            QualityTier::Standard => 60,
            QualityTier::Unknown => 40,
            QualityTier::Low => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Lossless => "lossless",
            QualityTier::High => "high",
            QualityTier::Standard => "standard",
            QualityTier::Low => "low",
            QualityTier::Unknown => "unknown",
        }
    }
}

/// Quality information extracted from a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityInfo {
    pub format: AudioFormat,
    /// Bitrate in kbps, if reported.
    pub bit_rate: Option<u32>,
    pub bit_depth: Option<u32>,
    /// Sample rate in Hz, if reported.
    pub sample_rate: Option<u32>,
    pub tier: QualityTier,
}

/// User preferences for quality filtering and scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreferences {
    /// When false, every score is 0 and nothing is rejected.
    #[serde(default)]
    pub enabled: bool,
    /// Formats that earn a bonus (lowercase names, e.g. "flac").
    #[serde(default = "default_preferred_formats")]
    pub preferred_formats: Vec<String>,
    /// Minimum acceptable bitrate for lossy files (kbps).
    #[serde(default = "default_min_bitrate")]
    pub min_bitrate: u32,
    #[serde(default = "default_true")]
    pub prefer_lossless: bool,
    #[serde(default)]
    pub reject_low_quality: bool,
    #[serde(default)]
    pub reject_lossless: bool,
}

fn default_preferred_formats() -> Vec<String> {
    vec!["flac".to_string()]
}

fn default_min_bitrate() -> u32 {
    STANDARD_QUALITY_BITRATE
}

fn default_true() -> bool {
    true
}

impl Default for QualityPreferences {
    fn default() -> Self {
        Self {
            enabled: false,
            preferred_formats: default_preferred_formats(),
            min_bitrate: default_min_bitrate(),
            prefer_lossless: true,
            reject_low_quality: false,
            reject_lossless: false,
        }
    }
}

impl QualityPreferences {
    /// Whether `format` is listed in the preferred formats (case-insensitive).
    pub fn prefers(&self, format: AudioFormat) -> bool {
        self.preferred_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format.as_str()))
    }
}
