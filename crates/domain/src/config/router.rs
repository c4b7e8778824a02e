use serde::{Deserialize, Serialize};

/// No tunables beyond the router's algorithm. Present for symmetry with
/// the other subsystem config blocks, and as a home for future extension.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouterConfig {}
