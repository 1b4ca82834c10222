//! Audio quality detection and scoring.
//!
//! Files offered by uploaders carry a filename and, optionally, bitrate,
//! bit depth and sample rate. This module classifies them into coarse
//! quality tiers and scores them against user preferences so that
//! candidates can be ranked.

mod scoring;
mod types;

pub use scoring::{
    average_score, detect_format, dominant_quality, extract_quality_info, score, should_reject,
    tier,
};
pub use types::{
    AudioFormat, QualityInfo, QualityPreferences, QualityTier, HIGH_QUALITY_BITRATE,
    LOW_QUALITY_BITRATE, STANDARD_QUALITY_BITRATE,
};
