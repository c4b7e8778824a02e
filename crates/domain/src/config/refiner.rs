use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RefinerConfig {
    /// Single file of named presets, loaded once, lazily.
    #[serde(default)]
    pub presets_path: Option<PathBuf>,
    /// Workspace directory scanned for additional presets.
    #[serde(default)]
    pub presets_dir: Option<PathBuf>,
}
