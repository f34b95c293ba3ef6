//! Core library for cratedigger: natural language vinyl record search and
//! cataloging for Discogs.
//!
//! The pipeline: a free-text record description is parsed into a
//! [`query::StructuredQuery`] by a completion model, translated into catalog
//! search parameters, run against the Discogs database search, and the
//! candidates are ranked in two stages - deterministic field matching plus,
//! when the query names a specific pressing variant, a model-assisted
//! comparison. Ranked results can be accumulated in a local SQLite batch
//! before publishing them to the user's collection.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod llm;
pub mod query;
pub mod ranking;
pub mod search;
pub mod testing;

pub use batch::{BatchStore, SqliteBatchStore};
pub use catalog::{CatalogClient, DiscogsClient};
pub use config::{load_config, Config};
pub use llm::LlmClient;
pub use query::{QueryParser, StructuredQuery};
pub use ranking::{RankedResult, VariantRanker};
pub use search::{SearchError, SearchOrchestrator};
