//! Model-assisted variant ranking.
//!
//! When the query carries pressing-variant descriptors (colored vinyl,
//! anniversary editions, pressing plants) that structured catalog filters
//! cannot express, a completion model compares the requirements against each
//! candidate's format text. The model never has the last word: its score is
//! blended with the field-matching score, and any failure degrades to
//! field-matching alone.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::CandidateRelease;
use crate::llm::{extract_json_object, CompletionRequest, LlmClient};
use crate::query::StructuredQuery;
use crate::ranking::scorer::{score_label, RelevanceScorer};
use crate::ranking::types::RankedResult;

/// Configuration for the variant ranker.
#[derive(Debug, Clone)]
pub struct VariantRankerConfig {
    /// Maximum candidates to send to the model (to limit token usage).
    pub max_candidates: usize,
    /// Maximum results to return.
    pub max_results: usize,
    /// Weight of the field-matching score in the blend.
    pub basic_weight: f32,
    /// Weight of the model's variant score in the blend.
    pub variant_weight: f32,
    /// Maximum tokens for the model response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for VariantRankerConfig {
    fn default() -> Self {
        Self {
            max_candidates: 20,
            max_results: 10,
            basic_weight: 0.6,
            variant_weight: 0.4,
            max_tokens: 2048,
            temperature: 0.0, // Deterministic scoring
        }
    }
}

/// Score used for candidates the model did not rank.
const UNRANKED_VARIANT_SCORE: f32 = 0.5;

/// Two-stage ranker: field matching always, variant comparison when the
/// query asks for a specific pressing.
pub struct VariantRanker {
    client: Arc<dyn LlmClient>,
    scorer: RelevanceScorer,
    config: VariantRankerConfig,
}

impl VariantRanker {
    /// Create a new ranker with default configuration.
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            scorer: RelevanceScorer::new(),
            config: VariantRankerConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(client: Arc<dyn LlmClient>, config: VariantRankerConfig) -> Self {
        Self {
            client,
            scorer: RelevanceScorer::new(),
            config,
        }
    }

    /// Rank candidates against the query. Infallible: a variant-ranking
    /// failure degrades to field matching, never to an error.
    ///
    /// Returns at most `max_results` results, sorted by score descending.
    /// Ties keep the catalog's ordering.
    pub async fn rank(
        &self,
        query: &StructuredQuery,
        candidates: Vec<CandidateRelease>,
        original_query: &str,
    ) -> Vec<RankedResult> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let basic_scores: Vec<f32> = candidates
            .iter()
            .map(|c| self.scorer.score(query, c))
            .collect();

        let mut results = if !query.variant_descriptors.has_any() {
            debug!("No variant descriptors in query, using field matching only");
            self.basic_results(query, &candidates, &basic_scores, original_query, None)
        } else {
            let batch_len = candidates.len().min(self.config.max_candidates);
            match self.try_batch_rank(query, &candidates[..batch_len]).await {
                Ok(rankings) => self.blend_results(
                    query,
                    &candidates[..batch_len],
                    &basic_scores[..batch_len],
                    &rankings,
                    original_query,
                ),
                Err(reason) => {
                    warn!("Variant ranking failed, degrading to field matching: {reason}");
                    self.basic_results(
                        query,
                        &candidates,
                        &basic_scores,
                        original_query,
                        Some(&reason),
                    )
                }
            }
        };

        // Stable sort: equal scores keep the catalog's order.
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(self.config.max_results);
        results
    }

    /// Field-matching-only results, optionally carrying the degradation
    /// reason in every explanation.
    fn basic_results(
        &self,
        query: &StructuredQuery,
        candidates: &[CandidateRelease],
        basic_scores: &[f32],
        original_query: &str,
        degraded_reason: Option<&str>,
    ) -> Vec<RankedResult> {
        candidates
            .iter()
            .zip(basic_scores)
            .map(|(candidate, &score)| {
                let match_explanation = match degraded_reason {
                    Some(reason) => {
                        format!(
                            "{} (variant ranking unavailable: {})",
                            score_label(score),
                            reason
                        )
                    }
                    None => score_label(score).to_string(),
                };
                RankedResult {
                    release: candidate.clone(),
                    relevance_score: score,
                    match_explanation,
                    original_query: original_query.to_string(),
                    structured_query: query.clone(),
                }
            })
            .collect()
    }

    /// Blend field-matching and model scores for the candidates that were
    /// sent to the model.
    fn blend_results(
        &self,
        query: &StructuredQuery,
        candidates: &[CandidateRelease],
        basic_scores: &[f32],
        rankings: &HashMap<u64, VariantRanking>,
        original_query: &str,
    ) -> Vec<RankedResult> {
        candidates
            .iter()
            .zip(basic_scores)
            .map(|(candidate, &basic)| {
                let ranking = candidate.release_id().and_then(|id| rankings.get(&id));
                let (variant_score, variant_explanation) = match ranking {
                    Some(r) => (r.relevance_score.clamp(0.0, 1.0), r.explanation.as_str()),
                    None => (UNRANKED_VARIANT_SCORE, "not ranked by model"),
                };

                let score =
                    basic * self.config.basic_weight + variant_score * self.config.variant_weight;
                let match_explanation = if variant_score > 0.0 {
                    format!("{}; {}", score_label(basic), variant_explanation)
                } else {
                    score_label(basic).to_string()
                };

                RankedResult {
                    release: candidate.clone(),
                    relevance_score: score,
                    match_explanation,
                    original_query: original_query.to_string(),
                    structured_query: query.clone(),
                }
            })
            .collect()
    }

    /// Ask the model to rank the batch. Any failure (invocation, missing
    /// JSON, wrong shape) is reported as the degradation reason.
    async fn try_batch_rank(
        &self,
        query: &StructuredQuery,
        candidates: &[CandidateRelease],
    ) -> Result<HashMap<u64, VariantRanking>, String> {
        let request = CompletionRequest::new(self.build_user_prompt(query, candidates))
            .with_system(self.build_system_prompt())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| format!("completion failed: {e}"))?;

        let json_str = extract_json_object(&response.text)
            .ok_or_else(|| format!("no JSON object in response: {}", response.text))?;

        let parsed: RankingsResponse = serde_json::from_str(json_str)
            .map_err(|e| format!("failed to parse rankings: {e}"))?;

        debug!("Model ranked {} candidates", parsed.rankings.len());

        Ok(parsed
            .rankings
            .into_iter()
            .map(|r| (r.discogs_id, r))
            .collect())
    }

    fn build_system_prompt(&self) -> String {
        r#"You are a vinyl record pressing expert. Your task is to score how well each candidate release matches the specific pressing variant the user is looking for.

SCORING GUIDELINES (0.0 to 1.0):
- 0.9-1.0: All variant requirements explicitly confirmed by the candidate's format details
- 0.7-0.89: Most requirements confirmed, nothing contradicted
- 0.5-0.69: Plausible but unconfirmed
- 0.3-0.49: Little or contradicting variant information
- 0.0-0.29: Clearly a different pressing

RULES:
- If no variant requirements are listed, score every candidate 0.5.
- If a candidate carries no pressing variant information at all, score it 0.3.
- Score every candidate, in any order.

Respond with JSON only:
{
  "rankings": [
    {
      "discogs_id": 123456,
      "relevance_score": 0.85,
      "explanation": "Brief explanation",
      "matching_aspects": ["red vinyl"],
      "missing_aspects": ["numbered"]
    }
  ]
}"#
        .to_string()
    }

    fn build_user_prompt(
        &self,
        query: &StructuredQuery,
        candidates: &[CandidateRelease],
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str("VARIANT REQUIREMENTS:\n");
        let fields = query.variant_descriptors.present_fields();
        if fields.is_empty() {
            prompt.push_str("(none)\n");
        }
        for (name, value) in fields {
            prompt.push_str(&format!("- {}: {}\n", name, value));
        }

        prompt.push_str("\nCANDIDATES:\n");
        for candidate in candidates {
            let id = candidate
                .release_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            prompt.push_str(&format!("\n[{}] {}\n", id, candidate.title));
            if let Some(year) = candidate.year {
                prompt.push_str(&format!("    Year: {}\n", year));
            }
            if let Some(catno) = &candidate.catno {
                prompt.push_str(&format!("    Catalog number: {}\n", catno));
            }
            for format in &candidate.formats {
                let qty = format.qty.as_deref().unwrap_or("1");
                prompt.push_str(&format!(
                    "    Format: {}x {} [{}]",
                    qty,
                    format.name,
                    format.descriptions.join(", ")
                ));
                if let Some(text) = format.text.as_deref().filter(|t| !t.is_empty()) {
                    prompt.push_str(&format!(" - {}", text));
                }
                prompt.push('\n');
            }
            if !candidate.has_format_details() {
                prompt.push_str("    (no pressing variant information)\n");
            }
        }

        prompt.push_str("\nScore each candidate from 0.0 to 1.0 against the variant requirements.");
        prompt
    }
}

/// Expected JSON response from the model.
#[derive(Debug, Deserialize)]
struct RankingsResponse {
    rankings: Vec<VariantRanking>,
}

/// One candidate's ranking from the model.
#[derive(Debug, Deserialize)]
struct VariantRanking {
    discogs_id: u64,
    relevance_score: f32,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    #[allow(dead_code)]
    matching_aspects: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    missing_aspects: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FormatEntry;
    use crate::query::VariantDescriptors;
    use crate::testing::MockLlmClient;

    fn variant_query() -> StructuredQuery {
        StructuredQuery {
            artist: Some("Elliott Smith".to_string()),
            album: Some("Figure 8".to_string()),
            variant_descriptors: VariantDescriptors {
                vinyl_color: Some("red white black tri-color".to_string()),
                reissue_type: Some("25th anniversary".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn basic_query() -> StructuredQuery {
        StructuredQuery {
            artist: Some("Elliott Smith".to_string()),
            album: Some("Figure 8".to_string()),
            ..Default::default()
        }
    }

    fn make_candidate(id: u64, title: &str, text: Option<&str>) -> CandidateRelease {
        CandidateRelease {
            id: Some(id),
            title: title.to_string(),
            formats: vec![FormatEntry {
                name: "Vinyl".to_string(),
                descriptions: vec!["LP".to_string()],
                text: text.map(String::from),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rank_empty_candidates() {
        let client = Arc::new(MockLlmClient::new("{}"));
        let ranker = VariantRanker::new(client.clone());

        let results = ranker.rank(&variant_query(), Vec::new(), "test").await;
        assert!(results.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_variants_skips_model() {
        let client = Arc::new(MockLlmClient::new("{}"));
        let ranker = VariantRanker::new(client.clone());

        let candidates = vec![
            make_candidate(1, "Elliott Smith - Figure 8", None),
            make_candidate(2, "Elliott Smith - XO", None),
        ];
        let results = ranker.rank(&basic_query(), candidates, "test").await;

        assert_eq!(client.call_count(), 0);
        assert_eq!(results.len(), 2);
        // Field-matching only, sorted descending, labeled.
        assert_eq!(results[0].release.id, Some(1));
        assert_eq!(results[0].relevance_score, 1.0);
        assert_eq!(results[0].match_explanation, "Strong match");
        assert!(results[1].relevance_score < results[0].relevance_score);
    }

    #[tokio::test]
    async fn test_blended_scores() {
        let response = r#"{
            "rankings": [
                {"discogs_id": 1, "relevance_score": 0.95, "explanation": "Tri-color 25th anniversary pressing confirmed", "matching_aspects": ["red white black", "25th anniversary"], "missing_aspects": []},
                {"discogs_id": 2, "relevance_score": 0.3, "explanation": "No variant info", "matching_aspects": [], "missing_aspects": ["vinyl color"]}
            ]
        }"#;
        let client = Arc::new(MockLlmClient::new(response));
        let ranker = VariantRanker::new(client.clone());

        let candidates = vec![
            make_candidate(
                1,
                "Elliott Smith - Figure 8",
                Some("Red White Black Tri-Color, 25th Anniversary"),
            ),
            make_candidate(2, "Elliott Smith - Figure 8", None),
        ];
        let results = ranker.rank(&variant_query(), candidates, "test").await;

        assert_eq!(client.call_count(), 1);
        assert_eq!(results.len(), 2);

        // basic = 1.0 for both; blended = 0.6*1.0 + 0.4*variant.
        assert_eq!(results[0].release.id, Some(1));
        assert!((results[0].relevance_score - (0.6 + 0.4 * 0.95)).abs() < 1e-6);
        assert!(results[0]
            .match_explanation
            .contains("Tri-color 25th anniversary pressing confirmed"));
        assert!(results[0].match_explanation.starts_with("Strong match"));

        assert!((results[1].relevance_score - (0.6 + 0.4 * 0.3)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unranked_candidate_gets_neutral_variant_score() {
        let response = r#"{
            "rankings": [
                {"discogs_id": 1, "relevance_score": 0.9, "explanation": "Confirmed"}
            ]
        }"#;
        let client = Arc::new(MockLlmClient::new(response));
        let ranker = VariantRanker::new(client);

        let candidates = vec![
            make_candidate(1, "Elliott Smith - Figure 8", Some("Tri-Color")),
            make_candidate(2, "Elliott Smith - Figure 8", None),
        ];
        let results = ranker.rank(&variant_query(), candidates, "test").await;

        let unranked = results.iter().find(|r| r.release.id == Some(2)).unwrap();
        assert!((unranked.relevance_score - (0.6 + 0.4 * 0.5)).abs() < 1e-6);
        assert!(unranked.match_explanation.contains("not ranked by model"));
    }

    #[tokio::test]
    async fn test_invalid_response_degrades_to_field_matching() {
        let client = Arc::new(MockLlmClient::new("I cannot rank these candidates."));
        let ranker = VariantRanker::new(client.clone());

        let candidates = vec![
            make_candidate(1, "Elliott Smith - Figure 8", None),
            make_candidate(2, "Other Band - Other Album", None),
        ];
        let results = ranker.rank(&variant_query(), candidates, "test").await;

        assert_eq!(client.call_count(), 1);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].relevance_score, 1.0);
        for result in &results {
            assert!(result
                .match_explanation
                .contains("variant ranking unavailable"));
        }
    }

    #[tokio::test]
    async fn test_completion_error_degrades_to_field_matching() {
        let client = Arc::new(MockLlmClient::new("{}"));
        client.fail_next("backend unavailable");
        let ranker = VariantRanker::new(client);

        let candidates = vec![make_candidate(1, "Elliott Smith - Figure 8", None)];
        let results = ranker.rank(&variant_query(), candidates, "test").await;

        assert_eq!(results.len(), 1);
        assert!(results[0]
            .match_explanation
            .contains("variant ranking unavailable"));
    }

    #[tokio::test]
    async fn test_max_candidates_and_max_results() {
        // Degraded path still caps the result count.
        let client = Arc::new(MockLlmClient::new("not json"));
        let ranker = VariantRanker::new(client.clone());

        let candidates: Vec<CandidateRelease> = (1..=25)
            .map(|i| make_candidate(i, &format!("Candidate {}", i), None))
            .collect();
        let results = ranker.rank(&variant_query(), candidates, "test").await;

        assert_eq!(results.len(), 10);

        // Only the first 20 candidates were sent to the model.
        let prompt = client.last_prompt().unwrap();
        assert!(prompt.contains("[20]"));
        assert!(!prompt.contains("[21]"));
    }

    #[tokio::test]
    async fn test_prompt_contains_requirements_and_format_text() {
        let client = Arc::new(MockLlmClient::new(r#"{"rankings": []}"#));
        let ranker = VariantRanker::new(client.clone());

        let candidates = vec![make_candidate(
            1,
            "Elliott Smith - Figure 8",
            Some("Red White Black Swirl"),
        )];
        ranker.rank(&variant_query(), candidates, "test").await;

        let prompt = client.last_prompt().unwrap();
        assert!(prompt.contains("vinyl color: red white black tri-color"));
        assert!(prompt.contains("reissue type: 25th anniversary"));
        assert!(prompt.contains("Red White Black Swirl"));
    }

    #[tokio::test]
    async fn test_prompt_flags_candidates_without_format_details() {
        let client = Arc::new(MockLlmClient::new(r#"{"rankings": []}"#));
        let ranker = VariantRanker::new(client.clone());

        // A bare format name carries nothing for the model to compare.
        let bare = CandidateRelease {
            id: Some(2),
            title: "Elliott Smith - Figure 8".to_string(),
            formats: vec![FormatEntry {
                name: "Vinyl".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let candidates = vec![
            make_candidate(1, "Elliott Smith - Figure 8", Some("Tri-Color")),
            bare,
        ];
        ranker.rank(&variant_query(), candidates, "test").await;

        let prompt = client.last_prompt().unwrap();
        assert_eq!(
            prompt.matches("(no pressing variant information)").count(),
            1
        );
    }
}
