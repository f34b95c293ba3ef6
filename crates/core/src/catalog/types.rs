//! Catalog data model and client trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::query::SearchParams;

/// Errors from the marketplace catalog API.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Catalog API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse catalog response: {0}")]
    Parse(String),

    #[error("Catalog client not configured: {0}")]
    NotConfigured(String),
}

/// One physical format entry of a release (a release can carry several,
/// e.g. 2xLP + CD).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatEntry {
    /// Format name (e.g., "Vinyl").
    #[serde(default)]
    pub name: String,
    /// Quantity, as the catalog reports it (a string like "2").
    #[serde(default)]
    pub qty: Option<String>,
    /// Format descriptions (e.g., "LP", "Album", "Reissue").
    #[serde(default)]
    pub descriptions: Vec<String>,
    /// Free-text format notes, preserved verbatim. This is where pressing
    /// variant details (colored vinyl, anniversary editions) usually live.
    #[serde(default)]
    pub text: Option<String>,
}

impl FormatEntry {
    /// All searchable text of this entry, lowercased, for field matching.
    pub fn haystack(&self) -> String {
        let mut parts = vec![self.name.to_lowercase()];
        parts.extend(self.descriptions.iter().map(|d| d.to_lowercase()));
        if let Some(text) = &self.text {
            parts.push(text.to_lowercase());
        }
        parts.join(" ")
    }
}

/// A release candidate returned by a catalog search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRelease {
    /// Catalog release id, when the API reports one directly.
    #[serde(default)]
    pub id: Option<u64>,
    /// Release title. For Discogs this is usually "Artist - Album".
    pub title: String,
    /// Release year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Catalog number.
    #[serde(default)]
    pub catno: Option<String>,
    /// Country of release.
    #[serde(default)]
    pub country: Option<String>,
    /// Physical format entries.
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
    /// API resource URL for the release.
    #[serde(default)]
    pub resource_url: Option<String>,
    /// Thumbnail image URL.
    #[serde(default)]
    pub thumb: Option<String>,
}

impl CandidateRelease {
    /// The release id, falling back to the numeric suffix of the resource
    /// URL when the id field is absent.
    pub fn release_id(&self) -> Option<u64> {
        if self.id.is_some() {
            return self.id;
        }
        self.resource_url
            .as_deref()?
            .trim_end_matches('/')
            .rsplit('/')
            .next()?
            .parse()
            .ok()
    }

    /// True if any format entry carries information beyond a bare name.
    pub fn has_format_details(&self) -> bool {
        self.formats
            .iter()
            .any(|f| !f.descriptions.is_empty() || f.text.as_deref().is_some_and(|t| !t.is_empty()))
    }
}

/// Read side of the marketplace catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Search for releases. `per_page` is clamped to the API maximum by
    /// implementations.
    async fn search(
        &self,
        params: &SearchParams,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<CandidateRelease>, CatalogError>;
}
