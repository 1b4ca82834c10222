//! Candidate ranking.

use tracing::warn;

use crate::network::{CandidateResponse, SharedFile};
use crate::quality::{self, QualityPreferences};
use crate::reputation::ReputationTracker;

use super::types::RankedCandidate;

/// Bonus for uploaders with a free upload slot.
pub const FREE_SLOT_BONUS: i64 = 1000;

/// Upload speed above which the speed bonus no longer grows (bytes/s).
pub const SPEED_BONUS_CAP: u64 = 1_000_000;

/// Availability part of the score: free slot plus speed (0..=100).
pub fn availability_bonus(response: &CandidateResponse) -> i64 {
    let slot = if response.has_free_slot {
        FREE_SLOT_BONUS
    } else {
        0
    };
    slot + (response.upload_speed.min(SPEED_BONUS_CAP) / 10_000) as i64
}

/// Audio files of a response.
pub fn audio_files(response: &CandidateResponse) -> Vec<SharedFile> {
    response
        .files
        .iter()
        .filter(|f| quality::detect_format(&f.filename).is_audio())
        .cloned()
        .collect()
}

/// Score a single response.
pub fn score_response(
    response: CandidateResponse,
    preferences: &QualityPreferences,
    reputation: &ReputationTracker,
) -> RankedCandidate {
    let audio = audio_files(&response);
    let quality_score = quality::average_score(&audio, preferences);

    let reputation_bonus = reputation.score_bonus(&response.username).unwrap_or_else(|e| {
        warn!(username = %response.username, error = %e, "Reputation lookup failed; no bonus");
        0
    });

    let score = quality_score + reputation_bonus + availability_bonus(&response);

    RankedCandidate {
        dominant_quality: quality::dominant_quality(&audio),
        response,
        score,
        quality_score,
        reputation_bonus,
    }
}

/// Score and sort responses, best first. Ties keep their input order.
pub fn rank_candidates(
    responses: Vec<CandidateResponse>,
    preferences: &QualityPreferences,
    reputation: &ReputationTracker,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = responses
        .into_iter()
        .map(|r| score_response(r, preferences, reputation))
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}
