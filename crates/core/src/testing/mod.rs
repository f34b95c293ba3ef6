//! Test doubles for the trait seams.
//!
//! Exported from the crate (not `#[cfg(test)]`-gated) so downstream
//! consumers can script the completion and catalog seams in their own tests.

mod mock_catalog;
mod mock_llm;

pub use mock_catalog::MockCatalogClient;
pub use mock_llm::MockLlmClient;
