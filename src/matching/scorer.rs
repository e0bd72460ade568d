//! Score calculation for matched options

use crate::config::OptionsConfig;
use crate::matching::option_matcher::MatchResult;

/// Weight of one matched required option (3:1 against nice-to-have)
pub const REQUIRED_WEIGHT: f64 = 75.0;

/// Weight of one matched nice-to-have option
pub const NICE_TO_HAVE_WEIGHT: f64 = 25.0;

/// A match result reduced to its score and qualification verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMatch {
    /// 0–100, normalized against the maximum reachable score
    pub score: f64,
    /// True iff every required option matched and no dealbreaker was found
    pub is_qualified: bool,
}

/// Scores a match result against the configuration
///
/// `score = (required × 75 + nice_to_have × 25) / max × 100`. A config
/// with no options at all yields a perfect score.
pub fn calculate_score(match_result: &MatchResult, config: &OptionsConfig) -> ScoredMatch {
    let raw_score = match_result.matched_required.len() as f64 * REQUIRED_WEIGHT
        + match_result.matched_nice_to_have.len() as f64 * NICE_TO_HAVE_WEIGHT;

    let max_score = config.required.len() as f64 * REQUIRED_WEIGHT
        + config.nice_to_have.len() as f64 * NICE_TO_HAVE_WEIGHT;

    let score = if max_score > 0.0 {
        (raw_score / max_score) * 100.0
    } else {
        100.0
    };

    let is_qualified = match_result.missing_required.is_empty() && !match_result.has_dealbreaker;

    ScoredMatch { score, is_qualified }
}
