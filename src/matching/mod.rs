//! Option matching and scoring
//!
//! The collaborator the orchestrator consults after a detail fetch: which
//! configured options does this listing carry, and how well does it match
//! what the user is hunting for.

mod option_matcher;
mod scorer;

pub use option_matcher::{match_options, normalize_text, MatchResult};
pub use scorer::{calculate_score, ScoredMatch, NICE_TO_HAVE_WEIGHT, REQUIRED_WEIGHT};
