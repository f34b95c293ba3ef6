//! Top-level search pipeline.

mod orchestrator;

pub use orchestrator::{SearchError, SearchOrchestrator};
