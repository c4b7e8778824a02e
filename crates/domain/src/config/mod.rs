mod admin;
mod agents;
mod elicitation;
mod plan;
mod refiner;
mod router;
mod server;
mod store;

pub use admin::*;
pub use agents::*;
pub use elicitation::*;
pub use plan::*;
pub use refiner::*;
pub use router::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub refiner: RefinerConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub elicitation: ElicitationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Non-fatal at the type level — callers decide whether to abort.
    /// Per convention, the binary aborts startup only on `Error`-severity
    /// issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }
        if self.server.api_token_env.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.api_token_env".into(),
                message: "no bearer token configured — protected routes run in dev mode (no auth)"
                    .into(),
            });
        }

        if self.plan.max_steps == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "plan.max_steps".into(),
                message: "max_steps must be greater than 0".into(),
            });
        }
        if self.plan.duplicate_guard.window_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "plan.duplicate_guard.window_size".into(),
                message: "window_size must be greater than 0".into(),
            });
        }
        if self.plan.duplicate_guard.consecutive_limit == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "plan.duplicate_guard.consecutive_limit".into(),
                message: "consecutive_limit must be greater than 0".into(),
            });
        }
        if self.plan.duplicate_guard.frequency_threshold == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "plan.duplicate_guard.frequency_threshold".into(),
                message: "frequency_threshold must be greater than 0".into(),
            });
        }

        if self.elicitation.callback_url_template.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "elicitation.callback_url_template".into(),
                message: "callback_url_template must not be empty".into(),
            });
        } else if !self.elicitation.callback_url_template.contains("{conv}")
            || !self.elicitation.callback_url_template.contains("{elic}")
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "elicitation.callback_url_template".into(),
                message: "callback_url_template must contain both {conv} and {elic} placeholders"
                    .into(),
            });
        }
        if self.elicitation.helper_wait_seconds == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "elicitation.helper_wait_seconds".into(),
                message: "helper_wait_seconds must be greater than 0".into(),
            });
        }

        if self.store.data_dir.as_os_str().is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.data_dir".into(),
                message: "data_dir must not be empty".into(),
            });
        }

        if self.admin.token_env.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "admin.token_env".into(),
                message: "token_env must not be empty".into(),
            });
        }

        if let Some(path) = &self.refiner.presets_path {
            if path.as_os_str().is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "refiner.presets_path".into(),
                    message: "presets_path must not be empty when set".into(),
                });
            }
        }

        issues
    }
}
