use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use sa_core::{ElicitationRouter, ElicitationService, Refiner};
use sa_domain::config::{Config, ConfigSeverity, RefinerConfig};
use sa_domain::schema::Preset;
use sa_gateway::api;
use sa_gateway::cli::{Cli, Command, ConfigCommand};
use sa_gateway::state::AppState;
use sa_providers::{LlmProvider, MockProvider};
use sa_store::{ConversationStore, JsonConversationStore};
use sa_tools::builtin::{CalcTool, EchoTool, FailOnceTool};
use sa_tools::{InMemoryToolRegistry, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = sa_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = sa_gateway::cli::load_config()?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            println!("{config_path}: ok");
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = sa_gateway::cli::load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("serialagent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sa_gateway=debug")))
        .json()
        .init();
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("serialagent starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Conversation store ────────────────────────────────────────────
    let store: Arc<dyn ConversationStore> =
        Arc::new(JsonConversationStore::open(&config.store.data_dir).context("opening conversation store")?);
    tracing::info!(path = %config.store.data_dir.display(), "conversation store ready");

    // ── Tool registry ─────────────────────────────────────────────────
    let tool_registry = InMemoryToolRegistry::new();
    tool_registry.register(Arc::new(CalcTool));
    tool_registry.register(Arc::new(EchoTool));
    tool_registry.register(Arc::new(FailOnceTool::new()));
    let tools: Arc<dyn ToolRegistry> = Arc::new(tool_registry);
    tracing::info!(tools = tools.definitions().len(), "tool registry ready");

    // ── LLM provider ──────────────────────────────────────────────────
    let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new("mock"));
    tracing::info!(provider = llm.provider_id(), "LLM provider ready");

    // ── Schema refiner ────────────────────────────────────────────────
    let presets = load_presets(&config.refiner).context("loading schema-refiner presets")?;
    tracing::info!(presets = presets.len(), "schema refiner ready");
    let refiner = Arc::new(Refiner::new(presets));

    // ── Elicitation router and service ───────────────────────────────
    let router = Arc::new(ElicitationRouter::new());
    let elicitation = Arc::new(ElicitationService::new(store.clone(), router.clone(), refiner.clone(), config.elicitation.clone()));

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = read_token_hash(&config.server.api_token_env, "API bearer-token auth");

    let state = AppState {
        config: config.clone(),
        store,
        tools,
        llm,
        router,
        refiner,
        elicitation,
        api_token_hash,
    };

    // ── Router ─────────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);
    let app = api::router(state).layer(cors_layer);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "serialagent listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Reads an env var once at startup and hashes it for constant-time
/// comparison. `None` means the corresponding auth is disabled (dev mode).
fn read_token_hash(env_var: &str, label: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var) {
        Ok(token) if !token.is_empty() => {
            tracing::info!(env_var = %env_var, "{label} enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(env_var = %env_var, "{label} DISABLED — set {env_var} to enable");
            None
        }
    }
}

/// Loads schema-refiner presets from `presets_path` (a single JSON array)
/// and/or `presets_dir` (one preset per `*.json` file). Both are optional;
/// an unset or missing source simply contributes no presets.
fn load_presets(config: &RefinerConfig) -> anyhow::Result<Vec<Preset>> {
    let mut presets = Vec::new();

    if let Some(path) = &config.presets_path {
        if path.exists() {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let parsed: Vec<Preset> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
            presets.extend(parsed);
        }
    }

    if let Some(dir) = &config.presets_dir {
        if dir.exists() {
            for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                let preset: Preset = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
                presets.push(preset);
            }
        }
    }

    Ok(presets)
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `*` wildcard for the port segment (e.g.
/// `http://localhost:*`), expanded into a predicate that matches any port
/// on that host. A literal `"*"` allows all origins (not recommended for
/// production).
fn build_cors_layer(cors: &sa_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            let prefix = origin.trim_end_matches('*').to_owned();
            wildcard_prefixes.push(prefix);
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
