//! Mock catalog client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::catalog::{CandidateRelease, CatalogClient, CatalogError};
use crate::query::SearchParams;

/// Scripted [`CatalogClient`] for tests.
///
/// Result sets queued with [`push_results`](Self::push_results) are returned
/// first; once the queue is empty every search returns the default set.
/// Records every search call (params, per_page, page) for assertions.
pub struct MockCatalogClient {
    default_results: Vec<CandidateRelease>,
    queued: Mutex<VecDeque<Vec<CandidateRelease>>>,
    searches: Mutex<Vec<(SearchParams, u32, u32)>>,
    next_error: Mutex<Option<CatalogError>>,
}

impl MockCatalogClient {
    /// Create a mock that always returns `results`.
    pub fn new(results: Vec<CandidateRelease>) -> Self {
        Self {
            default_results: results,
            queued: Mutex::new(VecDeque::new()),
            searches: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
        }
    }

    /// Create a mock that always returns nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Queue a result set to be returned before the default.
    pub fn push_results(&self, results: Vec<CandidateRelease>) {
        self.queued.lock().unwrap().push_back(results);
    }

    /// Make the next search fail.
    pub fn fail_next(&self, error: CatalogError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Number of searches made.
    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    /// All recorded search calls as (params, per_page, page).
    pub fn recorded_searches(&self) -> Vec<(SearchParams, u32, u32)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn search(
        &self,
        params: &SearchParams,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<CandidateRelease>, CatalogError> {
        self.searches
            .lock()
            .unwrap()
            .push((params.clone(), per_page, page));

        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }

        Ok(self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_results.clone()))
    }
}
