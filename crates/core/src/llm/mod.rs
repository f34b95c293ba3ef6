//! Completion capability: LLM clients and response-payload extraction.
//!
//! Two providers are supported out of the box: Google Gemini (the default)
//! and a local Ollama server. Both sit behind the [`LlmClient`] trait so the
//! parser and ranker can be composed with any backend, including the mocks
//! in [`crate::testing`].

mod client;
mod json;

pub use client::{
    CompletionRequest, CompletionResponse, GeminiClient, LlmClient, LlmError, LlmUsage,
    OllamaClient,
};
pub use json::extract_json_object;
