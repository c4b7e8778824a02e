use serde::{Deserialize, Serialize};

/// Tool allow/deny policy — prefix-based matching.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this caller may use. `["*"]` or empty = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this caller is denied (evaluated before allow).
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Check whether the given tool name is permitted by this policy.
    ///
    /// Matching is case-insensitive. Deny always wins over allow.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        for a in &self.allow {
            let a_lower = a.to_ascii_lowercase();
            if name == a_lower || name.starts_with(&format!("{a_lower}.")) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_policy_empty_allows_all() {
        let policy = ToolPolicy::default();
        assert!(policy.allows("calc"));
        assert!(policy.allows("memory.search"));
    }

    #[test]
    fn tool_policy_allow_restricts() {
        let policy = ToolPolicy {
            allow: vec!["calc".into(), "memory".into()],
            deny: vec![],
        };
        assert!(policy.allows("calc"));
        assert!(policy.allows("memory.search"));
        assert!(!policy.allows("echo"));
    }

    #[test]
    fn tool_policy_deny_takes_precedence() {
        let policy = ToolPolicy {
            allow: vec!["*".into()],
            deny: vec!["exec".into()],
        };
        assert!(!policy.allows("exec"));
        assert!(policy.allows("calc"));
    }

    #[test]
    fn tool_policy_deny_prefix_blocks_subtree() {
        let policy = ToolPolicy {
            allow: vec![],
            deny: vec!["memory".into()],
        };
        assert!(policy.allows("calc"));
        assert!(!policy.allows("memory.search"));
    }

    #[test]
    fn tool_policy_deny_star_blocks_all() {
        let policy = ToolPolicy {
            allow: vec!["calc".into()],
            deny: vec!["*".into()],
        };
        assert!(!policy.allows("calc"));
    }

    #[test]
    fn tool_policy_case_insensitive() {
        let policy = ToolPolicy {
            allow: vec!["Calc".into()],
            deny: vec![],
        };
        assert!(policy.allows("calc"));
        assert!(policy.allows("CALC"));
        assert!(!policy.allows("echo"));
    }
}
