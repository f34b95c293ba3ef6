//! Ranking output types.

use serde::{Deserialize, Serialize};

use crate::catalog::CandidateRelease;
use crate::query::StructuredQuery;

/// A release candidate with its final relevance score and explanation.
///
/// Created fresh for each ranking pass; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    /// The catalog release.
    pub release: CandidateRelease,
    /// Final relevance score (0-1).
    pub relevance_score: f32,
    /// Human-readable explanation of the score.
    pub match_explanation: String,
    /// The free-text description the user originally submitted.
    pub original_query: String,
    /// The structured query the candidates were ranked against.
    pub structured_query: StructuredQuery,
}
