use std::sync::Arc;

use sa_core::{ElicitationService, ElicitationRouter, Refiner};
use sa_domain::config::Config;
use sa_providers::LlmProvider;
use sa_store::ConversationStore;
use sa_tools::ToolRegistry;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern, following the teacher's
/// grouped-by-concern `AppState` layout:
/// - **Core services** — config, conversation store, tools, LLM provider
/// - **Coordination** — elicitation router/service, schema refiner
/// - **Security** — API token hash computed once at startup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<dyn ConversationStore>,
    pub tools: Arc<dyn ToolRegistry>,
    pub llm: Arc<dyn LlmProvider>,

    // ── Coordination ─────────────────────────────────────────────────
    pub router: Arc<ElicitationRouter>,
    pub refiner: Arc<Refiner>,
    pub elicitation: Arc<ElicitationService>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use sa_core::ElicitationService;
    use sa_domain::config::ElicitationConfig;
    use sa_providers::MockProvider;
    use sa_store::JsonConversationStore;
    use sa_tools::InMemoryToolRegistry;

    /// Build a minimal, fully-wired `AppState` over a throwaway temp
    /// directory, with a given api-token hash (or `None` for dev mode).
    /// Leaks the `TempDir` for the duration of the test process — fine
    /// for short-lived unit tests, not meant for production use.
    pub fn state_with_api_token_hash(api_token_hash: Option<Vec<u8>>) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();
        std::mem::forget(dir);

        let config = Arc::new(Config::default());
        let store: Arc<dyn ConversationStore> = Arc::new(JsonConversationStore::open(&data_dir).unwrap());
        let tools: Arc<dyn ToolRegistry> = Arc::new(InMemoryToolRegistry::new());
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new("mock"));
        let router = Arc::new(ElicitationRouter::new());
        let refiner = Arc::new(Refiner::with_no_presets());
        let elicitation = Arc::new(ElicitationService::new(
            store.clone(),
            router.clone(),
            refiner.clone(),
            ElicitationConfig::default(),
        ));

        AppState {
            config,
            store,
            tools,
            llm,
            router,
            refiner,
            elicitation,
            api_token_hash,
        }
    }
}
