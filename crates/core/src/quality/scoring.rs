//! Quality classification and preference-weighted scoring.

use std::collections::HashMap;

use crate::network::SharedFile;

use super::types::{
    AudioFormat, QualityInfo, QualityPreferences, QualityTier, HIGH_QUALITY_BITRATE,
    STANDARD_QUALITY_BITRATE,
};

/// Detect the audio format from a filename's extension.
pub fn detect_format(filename: &str) -> AudioFormat {
    SharedFile::named(filename)
        .extension()
        .map(|ext| AudioFormat::from_extension(&ext))
        .unwrap_or(AudioFormat::Unknown)
}

/// Determine the quality tier for a format and bitrate.
///
/// Lossless formats are always `Lossless`. Lossy files without a usable
/// bitrate are `Unknown`; everything under 256 kbps is `Low`.
pub fn tier(format: AudioFormat, bit_rate: Option<u32>) -> QualityTier {
    if format.is_lossless() {
        return QualityTier::Lossless;
    }

    match bit_rate {
        None | Some(0) => QualityTier::Unknown,
        Some(br) if br >= HIGH_QUALITY_BITRATE => QualityTier::High,
        Some(br) if br >= STANDARD_QUALITY_BITRATE => QualityTier::Standard,
        Some(_) => QualityTier::Low,
    }
}

/// Extract quality information from a shared file.
pub fn extract_quality_info(file: &SharedFile) -> QualityInfo {
    let format = detect_format(&file.filename);
    QualityInfo {
        format,
        bit_rate: file.bit_rate,
        bit_depth: file.bit_depth,
        sample_rate: file.sample_rate,
        tier: tier(format, file.bit_rate),
    }
}

/// Score a file against the user's preferences.
///
/// Scores are only comparable within a single ranking run.
pub fn score(info: &QualityInfo, preferences: &QualityPreferences) -> i64 {
    if !preferences.enabled {
        return 0;
    }

    let mut score = info.tier.base_score();

    if preferences.prefers(info.format) {
        score += 100;
    }

    if preferences.prefer_lossless && info.tier == QualityTier::Lossless {
        score += 500;
    }

    if info.tier != QualityTier::Lossless {
        if let Some(br) = info.bit_rate {
            if br >= preferences.min_bitrate {
                score += 50;
            } else {
                score -= 200;
            }
        }
    }

    score
}

/// Whether a file should be excluded under the given preferences.
pub fn should_reject(info: &QualityInfo, preferences: &QualityPreferences) -> bool {
    if !preferences.enabled {
        return false;
    }

    if info.tier == QualityTier::Lossless {
        return preferences.reject_lossless;
    }

    if !preferences.reject_low_quality {
        return false;
    }

    match info.bit_rate {
        Some(_) if info.tier == QualityTier::Low => true,
        Some(br) => br < preferences.min_bitrate,
        None => false,
    }
}

/// The most common (format, tier) combination across a set of files.
///
/// Count ties go to the better tier. The reported bitrate is the rounded
/// mean of known bitrates among files of the winning format.
pub fn dominant_quality(files: &[SharedFile]) -> Option<QualityInfo> {
    if files.is_empty() {
        return None;
    }

    let infos: Vec<QualityInfo> = files.iter().map(extract_quality_info).collect();

    // (format, tier) -> (count, first index seen)
    let mut groups: HashMap<(AudioFormat, QualityTier), (usize, usize)> = HashMap::new();
    for (idx, info) in infos.iter().enumerate() {
        groups
            .entry((info.format, info.tier))
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, idx));
    }

    let ((format, tier), _) = groups.into_iter().max_by(|(ka, (ca, ia)), (kb, (cb, ib))| {
        ca.cmp(cb)
            .then_with(|| kb.1.rank().cmp(&ka.1.rank()))
            .then_with(|| ib.cmp(ia))
    })?;

    let same_format: Vec<&QualityInfo> = infos.iter().filter(|i| i.format == format).collect();

    let bit_rates: Vec<u32> = same_format.iter().filter_map(|i| i.bit_rate).collect();
    let bit_rate = if bit_rates.is_empty() {
        None
    } else {
        let sum: u64 = bit_rates.iter().map(|&b| b as u64).sum();
        Some((sum as f64 / bit_rates.len() as f64).round() as u32)
    };

    Some(QualityInfo {
        format,
        bit_rate,
        bit_depth: same_format.iter().find_map(|i| i.bit_depth),
        sample_rate: same_format.iter().find_map(|i| i.sample_rate),
        tier,
    })
}

/// Rounded mean of per-file scores; 0 for no files or disabled preferences.
pub fn average_score(files: &[SharedFile], preferences: &QualityPreferences) -> i64 {
    if files.is_empty() || !preferences.enabled {
        return 0;
    }

    let total: i64 = files
        .iter()
        .map(|f| score(&extract_quality_info(f), preferences))
        .sum();

    (total as f64 / files.len() as f64).round() as i64
}
