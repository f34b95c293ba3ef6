//! Local batch store.
//!
//! Ranked results the user wants to keep are accumulated locally, annotated
//! with condition and notes, and flagged once published to the marketplace
//! collection. The schema is created idempotently on open; there are no
//! migrations.

mod sqlite;
mod types;

pub use sqlite::SqliteBatchStore;
pub use types::{BatchError, BatchItemDetails, BatchRecord, BatchStats, BatchStore};
