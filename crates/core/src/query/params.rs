//! Translation of structured queries into catalog search parameters.

use std::collections::BTreeMap;

use crate::query::types::StructuredQuery;

/// Catalog search parameters as a sorted key/value map, ready to become
/// URL query parameters.
pub type SearchParams = BTreeMap<String, String>;

/// Build catalog search parameters from a structured query.
///
/// The free-text `q` parameter carries artist/album/track (or, failing
/// those, up to three keywords); the remaining fields map to the catalog's
/// discrete filters. Always restricted to releases.
pub fn build_search_params(query: &StructuredQuery) -> SearchParams {
    let mut params = SearchParams::new();

    let mut q_parts: Vec<&str> = Vec::new();
    for value in [&query.artist, &query.album, &query.track] {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            q_parts.push(v);
        }
    }
    if q_parts.is_empty() {
        q_parts = query.keywords.iter().take(3).map(String::as_str).collect();
    }
    if !q_parts.is_empty() {
        params.insert("q".to_string(), q_parts.join(" "));
    }

    if let Some(year) = query.year {
        params.insert("year".to_string(), year.to_string());
    }
    let filters = [
        ("genre", &query.genre),
        ("format", &query.format),
        ("label", &query.label),
        ("catno", &query.catalog_number),
        ("country", &query.country),
    ];
    for (key, value) in filters {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            params.insert(key.to_string(), v.to_string());
        }
    }

    params.insert("type".to_string(), "release".to_string());
    params
}

/// Build a single free-text query string for the broadened fallback search,
/// used when the filtered search returns nothing.
pub fn build_fallback_query(query: &StructuredQuery) -> String {
    let mut parts: Vec<String> = Vec::new();
    for value in [&query.artist, &query.album, &query.track] {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            parts.push(v.to_string());
        }
    }
    if let Some(year) = query.year {
        parts.push(year.to_string());
    }
    if parts.is_empty() {
        parts = query.keywords.iter().take(3).cloned().collect();
    }
    parts.join(" ")
}
