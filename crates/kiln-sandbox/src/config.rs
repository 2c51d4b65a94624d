//! Sandbox configuration.

use serde::{Deserialize, Serialize};

use kiln_eval::EvalOptions;

/// Limits and conventions for one sandbox. Missing JSON fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Evaluation steps allowed per cycle.
    pub gas_limit: u64,
    pub max_call_depth: usize,
    /// Nesting of `require` calls allowed, counted apart from call depth.
    pub max_module_depth: usize,
    /// Fixed `Date.now()` reading in epoch milliseconds, for reproducible
    /// renders; the system clock when unset.
    pub clock_ms: Option<i64>,
    /// File stems tried, case-insensitively, when no entry is pinned.
    pub entry_names: Vec<String>,
    /// Bare specifiers served by host capabilities.
    pub capabilities: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let eval = EvalOptions::default();
        Self {
            gas_limit: eval.gas_limit,
            max_call_depth: eval.max_call_depth,
            max_module_depth: eval.max_module_depth,
            clock_ms: None,
            entry_names: vec!["index".into(), "main".into(), "App".into()],
            capabilities: eval.capabilities,
        }
    }
}

impl SandboxConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            gas_limit: self.gas_limit,
            max_call_depth: self.max_call_depth,
            max_module_depth: self.max_module_depth,
            capabilities: self.capabilities.clone(),
            clock_ms: self.clock_ms.map(|ms| ms as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.gas_limit, 1_000_000);
        assert_eq!(config.max_call_depth, 64);
        assert_eq!(config.max_module_depth, 128);
        assert_eq!(config.clock_ms, None);
        assert_eq!(config.entry_names, ["index", "main", "App"]);
        assert_eq!(config.capabilities, ["react", "react-dom"]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SandboxConfig::from_json(r#"{"gas_limit": 500}"#).unwrap();
        assert_eq!(config.gas_limit, 500);
        assert_eq!(config.max_call_depth, 64);
        assert_eq!(config.eval_options().gas_limit, 500);
    }

    #[test]
    fn test_clock_and_module_depth_reach_eval_options() {
        let config = SandboxConfig::from_json(r#"{"clock_ms": 86400000, "max_module_depth": 8}"#).unwrap();
        let options = config.eval_options();
        assert_eq!(options.clock_ms, Some(86_400_000.0));
        assert_eq!(options.max_module_depth, 8);
        assert_eq!(SandboxConfig::default().eval_options(), EvalOptions::default());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(SandboxConfig::from_json(r#"{"gas_limit": "lots"}"#).is_err());
    }
}
