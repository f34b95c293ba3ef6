//! Mock completion client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Scripted [`LlmClient`] for tests.
///
/// Responses queued with [`push_response`](Self::push_response) are returned
/// first; once the queue is empty every call returns the default response.
/// Records every request for assertions on prompts.
pub struct MockLlmClient {
    default_response: String,
    queued: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    next_error: Mutex<Option<String>>,
}

impl MockLlmClient {
    /// Create a mock that always returns `response`.
    pub fn new(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
        }
    }

    /// Queue a response to be returned before the default.
    pub fn push_response(&self, response: &str) {
        self.queued.lock().unwrap().push_back(response.to_string());
    }

    /// Make the next call fail with an API error.
    pub fn fail_next(&self, message: &str) {
        *self.next_error.lock().unwrap() = Some(message.to_string());
    }

    /// Number of completion calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// User prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.prompt.clone())
    }

    /// System prompt of the most recent request.
    pub fn last_system(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.system.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);

        if let Some(message) = self.next_error.lock().unwrap().take() {
            return Err(LlmError::Api {
                status: 500,
                message,
            });
        }

        let text = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());

        Ok(CompletionResponse {
            text,
            usage: LlmUsage {
                input_tokens: 200,
                output_tokens: 100,
            },
            model: "mock-model".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_and_queued_responses() {
        let client = MockLlmClient::new("default");
        client.push_response("first");

        let r1 = client.complete(CompletionRequest::new("a")).await.unwrap();
        let r2 = client.complete(CompletionRequest::new("b")).await.unwrap();

        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "default");
        assert_eq!(client.call_count(), 2);
        assert_eq!(client.last_prompt().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let client = MockLlmClient::new("ok");
        client.fail_next("boom");

        assert!(client.complete(CompletionRequest::new("a")).await.is_err());
        assert!(client.complete(CompletionRequest::new("b")).await.is_ok());
    }
}
