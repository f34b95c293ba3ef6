//! LLM-backed parser turning free-text record descriptions into
//! [`StructuredQuery`] values.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::{extract_json_object, CompletionRequest, LlmClient};
use crate::query::types::StructuredQuery;

/// Errors that can occur while parsing a record description.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Record description cannot be empty")]
    EmptyInput,

    #[error("No valid JSON found in completion response: {0}")]
    MalformedResponse(String),

    #[error("Parsed query failed validation: {0}")]
    Validation(String),

    #[error("Completion service error: {0}")]
    Service(String),
}

/// Configuration for the query parser.
#[derive(Debug, Clone)]
pub struct QueryParserConfig {
    /// Maximum tokens for the completion response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
    /// Maximum fallback keywords to derive from the raw description.
    pub max_fallback_keywords: usize,
}

impl Default for QueryParserConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.0, // Extraction should be deterministic
            max_fallback_keywords: 5,
        }
    }
}

/// Words too common to be useful as fallback search keywords.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "been", "be", "have", "has", "had", "do", "does", "did",
        "will", "would", "could", "should", "vinyl", "record", "album", "song", "music",
        "looking", "search", "find",
    ]
    .into_iter()
    .collect()
});

/// Format synonym table, checked in order by case-insensitive substring.
/// Longer/more specific spellings come before the short ones they contain.
static FORMAT_SYNONYMS: &[(&str, &str)] = &[
    ("12 inch", "12\""),
    ("twelve inch", "12\""),
    ("12\"", "12\""),
    ("7 inch", "7\""),
    ("seven inch", "7\""),
    ("7\"", "7\""),
    ("45", "7\""),
    ("single", "7\""),
    ("lp", "LP"),
    ("cd", "CD"),
    ("cassette", "Cassette"),
    ("tape", "Cassette"),
];

const YEAR_MIN: i32 = 1900;
const YEAR_MAX: i32 = 2030;

/// Parses natural-language record descriptions into structured queries.
pub struct QueryParser {
    client: Arc<dyn LlmClient>,
    config: QueryParserConfig,
}

impl QueryParser {
    /// Create a new parser with default configuration.
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: QueryParserConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(client: Arc<dyn LlmClient>, config: QueryParserConfig) -> Self {
        Self { client, config }
    }

    /// Parse a record description into a structured query.
    ///
    /// The completion model's own confidence is never trusted: it is
    /// overwritten from field presence after parsing.
    pub async fn parse(&self, description: &str) -> Result<StructuredQuery, ParseError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        debug!(description, "parsing record description");

        let request = CompletionRequest::new(Self::build_prompt(description))
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| ParseError::Service(e.to_string()))?;

        let json_str = extract_json_object(&response.text).ok_or_else(|| {
            ParseError::MalformedResponse(format!(
                "response contained no JSON object: {}",
                response.text
            ))
        })?;

        // Two-phase: a syntactically broken span is a malformed response,
        // while well-formed JSON of the wrong shape is a validation failure.
        let value: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| ParseError::MalformedResponse(format!("invalid JSON in response: {e}")))?;
        let mut query: StructuredQuery =
            serde_json::from_value(value).map_err(|e| ParseError::Validation(e.to_string()))?;

        query.confidence = (query.non_empty_field_count() as f32 / 5.0).min(1.0);
        self.post_process(&mut query, description);

        info!(
            artist = query.artist.as_deref(),
            album = query.album.as_deref(),
            confidence = query.confidence,
            "parsed record description"
        );

        Ok(query)
    }

    /// The fixed extraction prompt. Enumerates both field groups so the
    /// model fills variant descriptors alongside the core search fields.
    fn build_prompt(description: &str) -> String {
        format!(
            r#"You are a vinyl record expert. Parse the following natural language description of a vinyl record into structured data.

Extract core searchable attributes:
- artist: artist or band name
- album: album or release title
- track: specific track name, only if one is mentioned
- year: release year as an integer
- genre: musical genre
- format: physical format (LP, 7", 12", etc.)
- label: record label
- catalog_number: catalog number
- country: country of release
- condition: media condition, if mentioned
- pressing_details: free-text pressing notes that fit nowhere else
- keywords: additional relevant search terms

And pressing-variant descriptors under "variant_descriptors":
- vinyl_color: color of the vinyl itself
- reissue_type: e.g. "25th anniversary", "deluxe", "remaster"
- pressing_plant: pressing plant name
- matrix_runout: matrix or runout etching
- speed: playback speed, e.g. "45 RPM"
- size: record size, e.g. "10 inch"
- edition_details: other edition wording
- limited_edition: true or false only when stated, otherwise null
- numbered: true or false only when stated, otherwise null
- special_features: list of features like "gatefold", "box set"

User description: "{description}"

Return your response as valid JSON with exactly those keys, with
"variant_descriptors" as a nested object.

Rules:
- Use null for missing information, not empty strings. Never guess.
- Be conservative - only extract information you're confident about.
- If a field is unclear or ambiguous, use null.
- Return ONLY the JSON, no additional text.

JSON Response:"#
        )
    }

    /// Post-processing: fallback keywords, format normalization, year sanity.
    fn post_process(&self, query: &mut StructuredQuery, description: &str) {
        if !query.has_primary_fields() && query.keywords.is_empty() {
            query.keywords = self.fallback_keywords(description);
        }

        if let Some(format) = &query.format {
            let format_lower = format.to_lowercase();
            for (needle, normalized) in FORMAT_SYNONYMS {
                if format_lower.contains(needle) {
                    query.format = Some((*normalized).to_string());
                    break;
                }
            }
        }

        if let Some(year) = query.year {
            if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
                debug!(year, "discarding implausible year");
                query.year = None;
            }
        }
    }

    /// Derive search keywords from the raw description when the model
    /// extracted no artist/album/track.
    fn fallback_keywords(&self, description: &str) -> Vec<String> {
        description
            .to_lowercase()
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|word| word.len() > 2 && !STOP_WORDS.contains(word.as_str()))
            .take(self.config.max_fallback_keywords)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlmClient;

    fn parser_with_response(response: &str) -> QueryParser {
        QueryParser::new(Arc::new(MockLlmClient::new(response)))
    }

    #[tokio::test]
    async fn test_parse_empty_input() {
        let parser = parser_with_response("{}");
        let result = parser.parse("   ").await;
        assert!(matches!(result, Err(ParseError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_parse_basic_fields() {
        let response = r#"{
            "artist": "Pink Floyd",
            "album": "The Dark Side of the Moon",
            "year": 1973,
            "confidence": 0.99
        }"#;
        let parser = parser_with_response(response);

        let query = parser.parse("Pink Floyd Dark Side 1973").await.unwrap();
        assert_eq!(query.artist.as_deref(), Some("Pink Floyd"));
        assert_eq!(query.year, Some(1973));
        // Confidence is recomputed from presence (3 fields / 5), not taken
        // from the model's asserted 0.99.
        assert!((query.confidence - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_confidence_caps_at_one() {
        let response = r#"{
            "artist": "a", "album": "b", "track": "c", "year": 1999,
            "genre": "rock", "format": "LP", "label": "x"
        }"#;
        let parser = parser_with_response(response);
        let query = parser.parse("whatever").await.unwrap();
        assert_eq!(query.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_parse_json_wrapped_in_prose() {
        let response = "Here you go:\n```json\n{\"artist\": \"Nirvana\"}\n```\nEnjoy!";
        let parser = parser_with_response(response);
        let query = parser.parse("nirvana record").await.unwrap();
        assert_eq!(query.artist.as_deref(), Some("Nirvana"));
    }

    #[tokio::test]
    async fn test_parse_no_json_is_malformed() {
        let parser = parser_with_response("I could not parse that description.");
        let result = parser.parse("some record").await;
        assert!(matches!(result, Err(ParseError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_parse_broken_json_is_malformed() {
        let parser = parser_with_response(r#"{"artist": }"#);
        let result = parser.parse("some record").await;
        assert!(matches!(result, Err(ParseError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_parse_wrong_type_is_validation_error() {
        let parser = parser_with_response(r#"{"year": "nineteen seventy three"}"#);
        let result = parser.parse("some record").await;
        assert!(matches!(result, Err(ParseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_provider_error_is_service_error() {
        let client = MockLlmClient::new("{}");
        client.fail_next("backend unavailable");
        let parser = QueryParser::new(Arc::new(client));

        let result = parser.parse("some record").await;
        assert!(matches!(result, Err(ParseError::Service(_))));
    }

    #[tokio::test]
    async fn test_year_out_of_range_discarded() {
        let response = r#"{"artist": "Test", "year": 1750}"#;
        let parser = parser_with_response(response);
        let query = parser.parse("test 1750").await.unwrap();
        assert_eq!(query.year, None);

        let response = r#"{"artist": "Test", "year": 2031}"#;
        let parser = parser_with_response(response);
        let query = parser.parse("test future").await.unwrap();
        assert_eq!(query.year, None);

        let response = r#"{"artist": "Test", "year": 2030}"#;
        let parser = parser_with_response(response);
        let query = parser.parse("test boundary").await.unwrap();
        assert_eq!(query.year, Some(2030));
    }

    #[tokio::test]
    async fn test_format_normalization() {
        for (raw, expected) in [
            ("12 inch", "12\""),
            ("twelve inch vinyl", "12\""),
            ("45", "7\""),
            ("single", "7\""),
            ("LP", "LP"),
            ("compact cassette", "Cassette"),
        ] {
            let response = format!(r#"{{"artist": "Test", "format": "{raw}"}}"#);
            let parser = parser_with_response(&response);
            let query = parser.parse("test").await.unwrap();
            assert_eq!(query.format.as_deref(), Some(expected), "input {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_fallback_keywords_when_no_primary_fields() {
        let parser = parser_with_response("{}");
        let query = parser
            .parse("looking for obscure japanese psychedelic pressing, gatefold!")
            .await
            .unwrap();

        // Stop words and short tokens dropped, punctuation stripped, max 5.
        assert_eq!(
            query.keywords,
            vec!["obscure", "japanese", "psychedelic", "pressing", "gatefold"]
        );
    }

    #[tokio::test]
    async fn test_no_fallback_keywords_when_artist_present() {
        let parser = parser_with_response(r#"{"artist": "Can"}"#);
        let query = parser.parse("Can german krautrock band").await.unwrap();
        assert!(query.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_variant_descriptors_parsed() {
        let response = r#"{
            "artist": "Elliott Smith",
            "album": "Figure 8",
            "variant_descriptors": {
                "vinyl_color": "red white black tri-color",
                "reissue_type": "25th anniversary repress"
            }
        }"#;
        let parser = parser_with_response(response);
        let query = parser
            .parse("elliott smith figure 8 red white black 25th anniversary repress")
            .await
            .unwrap();

        assert!(query.variant_descriptors.has_any());
        assert_eq!(
            query.variant_descriptors.vinyl_color.as_deref(),
            Some("red white black tri-color")
        );
        // 2 core + 2 variant fields -> 4/5
        assert!((query.confidence - 0.8).abs() < 1e-6);
    }
}
