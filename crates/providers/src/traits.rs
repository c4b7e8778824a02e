use sa_domain::error::Result;
use sa_domain::llm::{BoxStream, LlmRequest, LlmResponse, StreamEvent};

/// The "LLM model" collaborator: `generate`, an optional `stream`, and an
/// `implements(feature)` probe for feature gating — mirroring the
/// teacher's own `LlmProvider` adapter trait, trimmed to what the
/// coordination core actually drives (no tool-call assembly: the plan
/// already names the tools to call).
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, req: LlmRequest) -> Result<LlmResponse>;

    async fn stream(&self, req: LlmRequest) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Feature gate, e.g. `"stream"`, `"json_mode"`.
    fn implements(&self, feature: &str) -> bool;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
