use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationConfig {
    #[serde(default = "d_callback_url_template")]
    pub callback_url_template: String,
    /// Bounded per-round wait for a helper awaiter, in seconds.
    #[serde(default = "d_helper_wait_seconds")]
    pub helper_wait_seconds: u64,
    #[serde(default)]
    pub root_walk: RootWalkConfig,
}

impl Default for ElicitationConfig {
    fn default() -> Self {
        Self {
            callback_url_template: d_callback_url_template(),
            helper_wait_seconds: d_helper_wait_seconds(),
            root_walk: RootWalkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootWalkConfig {
    /// When the root walk hits a broken parent link, fall back to the
    /// closest non-root ancestor instead of propagating a lookup failure.
    /// Defaults to `false` — see DESIGN.md for the rationale.
    #[serde(default)]
    pub closest_non_root_on_failure: bool,
}

fn d_callback_url_template() -> String {
    "/v1/api/conversations/{conv}/elicitation/{elic}".into()
}
fn d_helper_wait_seconds() -> u64 {
    600
}
