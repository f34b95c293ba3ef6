//! End-to-end search orchestration.

use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::CatalogClient;
use crate::llm::LlmClient;
use crate::query::{
    build_fallback_query, build_search_params, ParseError, QueryParser, QueryParserConfig,
    SearchParams,
};
use crate::ranking::{RankedResult, VariantRanker, VariantRankerConfig};

/// Errors that abort a search. Ranking degradation is not one of them.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Record description cannot be empty")]
    EmptyInput,

    #[error("Failed to parse description: {0}")]
    Parse(ParseError),

    #[error("Catalog search failed: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),
}

impl From<ParseError> for SearchError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::EmptyInput => SearchError::EmptyInput,
            other => SearchError::Parse(other),
        }
    }
}

/// Drives the full pipeline: parse, search, rank.
///
/// Holds no mutable state; concurrent searches share nothing but the catalog
/// client's rate-limit watermark.
pub struct SearchOrchestrator {
    parser: QueryParser,
    catalog: Arc<dyn CatalogClient>,
    ranker: VariantRanker,
}

impl SearchOrchestrator {
    /// Create an orchestrator with default parser and ranker configuration.
    pub fn new(llm: Arc<dyn LlmClient>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self {
            parser: QueryParser::new(llm.clone()),
            catalog,
            ranker: VariantRanker::new(llm),
        }
    }

    /// Create with custom parser and ranker configuration.
    pub fn with_configs(
        llm: Arc<dyn LlmClient>,
        catalog: Arc<dyn CatalogClient>,
        parser_config: QueryParserConfig,
        ranker_config: VariantRankerConfig,
    ) -> Self {
        Self {
            parser: QueryParser::with_config(llm.clone(), parser_config),
            catalog,
            ranker: VariantRanker::with_config(llm, ranker_config),
        }
    }

    /// Search the catalog from a free-text record description.
    ///
    /// Parsing and catalog failures abort the search; a variant-ranking
    /// failure degrades to field matching inside the ranker.
    pub async fn search(
        &self,
        description: &str,
        max_results: usize,
    ) -> Result<Vec<RankedResult>, SearchError> {
        if description.trim().is_empty() {
            return Err(SearchError::EmptyInput);
        }

        let query = self.parser.parse(description).await?;
        let params = build_search_params(&query);

        // Over-fetch so ranking has something to choose from.
        let per_page = (max_results.saturating_mul(2)).min(100) as u32;

        let mut candidates = self.catalog.search(&params, per_page, 1).await?;
        debug!("Catalog search returned {} candidates", candidates.len());

        if candidates.is_empty() && self.can_broaden(&query, &params) {
            let fallback = build_fallback_query(&query);
            info!("No results for filtered search, retrying with '{fallback}'");

            let mut fallback_params = SearchParams::new();
            fallback_params.insert("q".to_string(), fallback);
            fallback_params.insert("type".to_string(), "release".to_string());
            candidates = self.catalog.search(&fallback_params, per_page, 1).await?;
            debug!("Fallback search returned {} candidates", candidates.len());
        }

        let mut results = self.ranker.rank(&query, candidates, description).await;
        results.truncate(max_results);

        info!(
            results = results.len(),
            confidence = query.confidence,
            "search complete"
        );
        Ok(results)
    }

    /// A broadened retry only makes sense when there is something to search
    /// for and the broadened query would differ from the first one.
    fn can_broaden(&self, query: &crate::query::StructuredQuery, params: &SearchParams) -> bool {
        let has_terms = query.artist.as_deref().is_some_and(|a| !a.is_empty())
            || query.album.as_deref().is_some_and(|a| !a.is_empty())
            || !query.keywords.is_empty();
        // A bare q + type search would just repeat itself.
        has_terms && params.len() > 2
    }
}
