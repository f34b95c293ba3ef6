//! Batch store types and trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::FormatEntry;
use crate::ranking::RankedResult;

/// Errors from the batch store.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Batch record not found: {0}")]
    NotFound(i64),
}

/// User-editable details attached to a batch item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchItemDetails {
    /// Media condition (e.g., "VG+").
    pub condition: Option<String>,
    /// Sleeve condition.
    pub sleeve_condition: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
}

/// A release queued locally for later publishing to the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Local row id.
    pub id: i64,
    /// Catalog release id, when known.
    pub discogs_id: Option<u64>,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub catno: Option<String>,
    /// Snapshot of the release's format entries at the time it was added.
    pub format_info: Vec<FormatEntry>,
    pub condition: Option<String>,
    pub sleeve_condition: Option<String>,
    pub notes: Option<String>,
    /// Relevance score from the ranking pass that produced this record.
    pub relevance_score: f32,
    pub match_explanation: String,
    /// The free-text description the search started from.
    pub original_query: String,
    /// Whether this record has been published to the collection.
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counts of batch records by publish status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: i64,
    pub published: i64,
    pub pending: i64,
}

/// Local store accumulating ranked results before publishing.
pub trait BatchStore: Send + Sync {
    /// Add a ranked result with its details. Returns the new record id.
    fn add(&self, result: &RankedResult, details: BatchItemDetails) -> Result<i64, BatchError>;

    /// Fetch a record by id.
    fn get(&self, id: i64) -> Result<Option<BatchRecord>, BatchError>;

    /// List records, optionally filtered by publish status, oldest first.
    fn list(&self, published: Option<bool>) -> Result<Vec<BatchRecord>, BatchError>;

    /// Replace a record's condition/sleeve/notes.
    fn update_details(&self, id: i64, details: BatchItemDetails)
        -> Result<BatchRecord, BatchError>;

    /// Delete a record.
    fn remove(&self, id: i64) -> Result<(), BatchError>;

    /// Flag records as published. Returns how many rows changed.
    fn mark_published(&self, ids: &[i64]) -> Result<usize, BatchError>;

    /// Delete all published records. Returns how many rows were removed.
    fn clear_published(&self) -> Result<usize, BatchError>;

    /// Counts by publish status.
    fn stats(&self) -> Result<BatchStats, BatchError>;
}
