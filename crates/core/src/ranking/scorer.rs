//! Heuristic relevance scoring.
//!
//! Scores release candidates against the structured query using field
//! matching. No completion model required - works entirely offline.

use crate::catalog::CandidateRelease;
use crate::query::StructuredQuery;

const ARTIST_WEIGHT: f32 = 0.4;
const ALBUM_WEIGHT: f32 = 0.3;
const YEAR_WEIGHT: f32 = 0.2;
const FORMAT_WEIGHT: f32 = 0.1;
const CATNO_WEIGHT: f32 = 0.1;

/// Partial credit for each matching format token, capped at [`FORMAT_WEIGHT`].
const FORMAT_TOKEN_CREDIT: f32 = 0.05;

/// Year tolerance: releases within this many years still count.
const YEAR_TOLERANCE: i32 = 2;

/// Field-matching relevance scorer.
///
/// Each query field that is present contributes its weight to the applicable
/// total; each match contributes credit. The score is credit over applicable
/// weight, so a candidate is judged only on the fields the query actually
/// constrains.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceScorer;

impl RelevanceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a candidate against the query (0-1). Pure, no I/O.
    pub fn score(&self, query: &StructuredQuery, candidate: &CandidateRelease) -> f32 {
        let title_lower = candidate.title.to_lowercase();
        let mut credit = 0.0f32;
        let mut applicable = 0.0f32;

        if let Some(artist) = query.artist.as_deref().filter(|a| !a.is_empty()) {
            applicable += ARTIST_WEIGHT;
            if title_lower.contains(&artist.to_lowercase()) {
                credit += ARTIST_WEIGHT;
            }
        }

        if let Some(album) = query.album.as_deref().filter(|a| !a.is_empty()) {
            applicable += ALBUM_WEIGHT;
            if title_lower.contains(&album.to_lowercase()) {
                credit += ALBUM_WEIGHT;
            }
        }

        if let Some(wanted_year) = query.year {
            applicable += YEAR_WEIGHT;
            if let Some(year) = candidate.year {
                if (year - wanted_year).abs() <= YEAR_TOLERANCE {
                    credit += YEAR_WEIGHT;
                }
            }
        }

        if let Some(format) = query.format.as_deref().filter(|f| !f.is_empty()) {
            applicable += FORMAT_WEIGHT;
            credit += self.format_credit(format, candidate);
        }

        if let Some(catno) = query.catalog_number.as_deref().filter(|c| !c.is_empty()) {
            applicable += CATNO_WEIGHT;
            if candidate
                .catno
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(catno))
            {
                credit += CATNO_WEIGHT;
            }
        }

        if applicable == 0.0 {
            return 0.0;
        }
        credit / applicable
    }

    /// Partial credit per format token found in any of the candidate's
    /// format names, descriptions or free text, capped at the full weight.
    fn format_credit(&self, wanted_format: &str, candidate: &CandidateRelease) -> f32 {
        let haystack = candidate
            .formats
            .iter()
            .map(|f| f.haystack())
            .collect::<Vec<_>>()
            .join(" ");

        let mut credit = 0.0f32;
        for token in wanted_format.to_lowercase().split_whitespace() {
            if haystack.contains(token) {
                credit += FORMAT_TOKEN_CREDIT;
            }
        }
        credit.min(FORMAT_WEIGHT)
    }
}

/// Qualitative label for a relevance score.
pub fn score_label(score: f32) -> &'static str {
    if score >= 0.8 {
        "Strong match"
    } else if score >= 0.5 {
        "Good match"
    } else if score >= 0.3 {
        "Possible match"
    } else {
        "Weak match"
    }
}
