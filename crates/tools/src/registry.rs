//! Tool registry.
//!
//! A minimal in-memory registry matching the teacher's registry-of-sessions
//! shape (`RwLock<HashMap>`), generalized from process sessions to tool
//! implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use sa_domain::error::{Error, Result};

/// A single tool's JSON-Schema-like parameter definition, exposed to
/// callers that need to introspect what a tool accepts.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, args: &HashMap<String, Value>) -> Result<String>;
}

pub trait ToolRegistry: Send + Sync {
    fn execute(&self, name: &str, args: &HashMap<String, Value>) -> ExecuteFuture<'_>;
    fn get_definition(&self, name: &str) -> Option<ToolDefinition>;
    fn definitions(&self) -> Vec<ToolDefinition>;
    fn must_have_tools(&self, names: &[String]) -> Result<Vec<ToolDefinition>>;
}

pub type ExecuteFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>>;

/// In-memory registry of tool implementations.
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.write().insert(name, tool);
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn execute(&self, name: &str, args: &HashMap<String, Value>) -> ExecuteFuture<'_> {
        let tool = self.tools.read().get(name).cloned();
        let args = args.clone();
        let name = name.to_owned();
        Box::pin(async move {
            let tool = tool.ok_or_else(|| Error::NotFound(format!("tool {name}")))?;
            tool.execute(&args).await
        })
    }

    fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.read().get(name).map(|t| t.definition())
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.read().values().map(|t| t.definition()).collect()
    }

    fn must_have_tools(&self, names: &[String]) -> Result<Vec<ToolDefinition>> {
        let tools = self.tools.read();
        names
            .iter()
            .map(|name| {
                tools
                    .get(name)
                    .map(|t| t.definition())
                    .ok_or_else(|| Error::NotFound(format!("required tool {name} not registered")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CalcTool, EchoTool};

    #[tokio::test]
    async fn execute_dispatches_to_registered_tool() {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let mut args = HashMap::new();
        args.insert("text".into(), Value::String("hi".into()));
        let out = registry.execute("echo", &args).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_not_found() {
        let registry = InMemoryToolRegistry::new();
        let err = registry.execute("nope", &HashMap::new()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn must_have_tools_fails_when_missing() {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(CalcTool));
        let err = registry
            .must_have_tools(&["calc".into(), "echo".into()])
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn must_have_tools_succeeds_when_present() {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(CalcTool));
        registry.register(Arc::new(EchoTool));
        let defs = registry
            .must_have_tools(&["calc".into(), "echo".into()])
            .unwrap();
        assert_eq!(defs.len(), 2);
    }
}
