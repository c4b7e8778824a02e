use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default = "d_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub duplicate_guard: DuplicateGuardConfig,
    /// Tool names exempt from the prior-success short-circuit, e.g. `calc`.
    #[serde(default = "d_repeat_allowed_tools")]
    pub repeat_allowed_tools: Vec<String>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_steps: d_max_steps(),
            duplicate_guard: DuplicateGuardConfig::default(),
            repeat_allowed_tools: d_repeat_allowed_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGuardConfig {
    #[serde(default = "d_window_size")]
    pub window_size: usize,
    #[serde(default = "d_consecutive_limit")]
    pub consecutive_limit: usize,
    #[serde(default = "d_frequency_threshold")]
    pub frequency_threshold: usize,
}

impl Default for DuplicateGuardConfig {
    fn default() -> Self {
        Self {
            window_size: d_window_size(),
            consecutive_limit: d_consecutive_limit(),
            frequency_threshold: d_frequency_threshold(),
        }
    }
}

fn d_max_steps() -> usize {
    1000
}
fn d_window_size() -> usize {
    8
}
fn d_consecutive_limit() -> usize {
    3
}
fn d_frequency_threshold() -> usize {
    4
}
fn d_repeat_allowed_tools() -> Vec<String> {
    vec!["calc".into()]
}
