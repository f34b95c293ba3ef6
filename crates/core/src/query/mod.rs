//! Natural-language query understanding.
//!
//! Free-text record descriptions go in; [`StructuredQuery`] values come out,
//! extracted by a completion model with deterministic post-processing on top
//! (fallback keywords, format normalization, year sanity). [`params`] then
//! maps a structured query onto catalog search parameters.

mod params;
mod parser;
mod types;

pub use params::{build_fallback_query, build_search_params, SearchParams};
pub use parser::{ParseError, QueryParser, QueryParserConfig};
pub use types::{StructuredQuery, VariantDescriptors};
