use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Select,
    Compile,
    Resolve,
    Execute,
    Mount,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Select => "entry selection",
            Stage::Compile => "compilation",
            Stage::Resolve => "module resolution",
            Stage::Execute => "execution",
            Stage::Mount => "mount",
        };
        f.write_str(name)
    }
}

/// A failure of one preview cycle, as shown on the diagnostic surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewError {
    #[error("Compilation failed in {path}: {diagnostic}")]
    CompileFailure { path: String, diagnostic: String },

    #[error("Module not found: '{specifier}' (imported from {from_path})")]
    ModuleNotFound { from_path: String, specifier: String },

    #[error("Runtime error in {path}: {error}")]
    RuntimeFailure { path: String, error: String },

    #[error("No entry point: no files to preview")]
    NoEntryPoint,
}

impl PreviewError {
    pub fn stage(&self) -> Stage {
        match self {
            PreviewError::CompileFailure { .. } => Stage::Compile,
            PreviewError::ModuleNotFound { .. } => Stage::Resolve,
            PreviewError::RuntimeFailure { .. } => Stage::Execute,
            PreviewError::NoEntryPoint => Stage::Select,
        }
    }

    /// The file the failure is attributed to.
    pub fn path(&self) -> Option<&str> {
        match self {
            PreviewError::CompileFailure { path, .. }
            | PreviewError::RuntimeFailure { path, .. } => Some(path),
            PreviewError::ModuleNotFound { from_path, .. } => Some(from_path),
            PreviewError::NoEntryPoint => None,
        }
    }

    /// Error-class name exposed to script `catch` blocks.
    pub fn class_name(&self) -> &'static str {
        match self {
            PreviewError::CompileFailure { .. } => "SyntaxError",
            PreviewError::ModuleNotFound { .. } => "ModuleNotFoundError",
            PreviewError::RuntimeFailure { .. } => "Error",
            PreviewError::NoEntryPoint => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_not_found_message() {
        let err = PreviewError::ModuleNotFound {
            from_path: "src/App.tsx".into(),
            specifier: "./Missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "Module not found: './Missing' (imported from src/App.tsx)"
        );
        assert_eq!(err.stage(), Stage::Resolve);
        assert_eq!(err.path(), Some("src/App.tsx"));
    }

    #[test]
    fn test_tagged_json() {
        let err = PreviewError::RuntimeFailure {
            path: "index.tsx".into(),
            error: "boom".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "runtime_failure");
        assert_eq!(json["path"], "index.tsx");
        assert_eq!(PreviewError::NoEntryPoint.path(), None);
    }
}
