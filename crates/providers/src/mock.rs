//! A deterministic `LlmProvider` that never calls out to the network.
//!
//! Template-fills a canned Plan-shaped JSON response, or echoes back a
//! fixture registered for the exact prompt text, so the gateway's full
//! HTTP boundary can be exercised in tests and local runs without real
//! model credentials.

use std::collections::HashMap;

use async_stream::stream;
use parking_lot::RwLock;
use serde_json::json;

use sa_domain::error::Result;
use sa_domain::llm::{BoxStream, LlmRequest, LlmResponse, StreamEvent, Usage};

use crate::traits::LlmProvider;

pub struct MockProvider {
    id: String,
    /// Exact-prompt fixtures: last message's text -> canned response text.
    fixtures: RwLock<HashMap<String, String>>,
}

impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fixtures: RwLock::new(HashMap::new()),
        }
    }

    /// Register a canned response for an exact prompt.
    pub fn with_fixture(self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.fixtures.write().insert(prompt.into(), response.into());
        self
    }

    fn render(&self, req: &LlmRequest) -> String {
        let prompt = req.messages.last().map(|m| m.text.as_str()).unwrap_or("");
        if let Some(fixture) = self.fixtures.read().get(prompt) {
            return fixture.clone();
        }
        json!({
            "intention": "respond to prompt",
            "steps": [
                { "type": "tool", "name": "echo", "args": { "text": prompt } }
            ]
        })
        .to_string()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn generate(&self, req: LlmRequest) -> Result<LlmResponse> {
        let text = self.render(&req);
        let prompt_tokens = req.messages.iter().map(|m| m.text.split_whitespace().count() as u32).sum();
        let completion_tokens = text.split_whitespace().count() as u32;
        Ok(LlmResponse {
            text,
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    async fn stream(&self, req: LlmRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let text = self.render(&req);
        let s = stream! {
            for word in text.split_whitespace() {
                yield Ok(StreamEvent::Token { text: format!("{word} ") });
            }
            yield Ok(StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) });
        };
        Ok(Box::pin(s))
    }

    fn implements(&self, feature: &str) -> bool {
        matches!(feature, "stream" | "json_mode")
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
