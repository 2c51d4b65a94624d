//! Source registry: normalized path → source text, in insertion order.

use indexmap::IndexMap;
use kiln_types::VirtualFile;

/// Error raised when a producer-supplied path cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("path is empty")]
    EmptyPath,
    #[error("path escapes the registry root: {0}")]
    EscapesRoot(String),
}

/// Normalize a producer-supplied path to the registry's canonical form:
/// slash-separated, no leading `/` or `./`, with `.` and `..` segments
/// folded away.
///
/// ```text
/// "./src//components/../App.tsx"  →  "src/App.tsx"
/// "\\src\\App.tsx"                 →  "src/App.tsx"
/// ```
pub fn normalize_path(raw: &str) -> Result<String, RegistryError> {
    let unified = raw.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(RegistryError::EscapesRoot(raw.to_string()));
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(RegistryError::EmptyPath);
    }
    Ok(segments.join("/"))
}

/// The in-memory file map for one preview cycle.
///
/// Every insertion and lookup goes through [`normalize_path`]. Re-inserting
/// a path replaces its text but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    files: IndexMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from producer files. Files whose path cannot be
    /// normalized are skipped with a warning.
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = VirtualFile>,
    {
        let mut registry = Self::new();
        for file in files {
            if let Err(err) = registry.insert(&file.path, file.source_text) {
                tracing::warn!(path = %file.path, %err, "skipping file with invalid path");
            }
        }
        registry
    }

    /// Insert or replace a file; returns the normalized path.
    pub fn insert(&mut self, path: &str, source_text: impl Into<String>) -> Result<String, RegistryError> {
        let path = normalize_path(path)?;
        self.files.insert(path.clone(), source_text.into());
        Ok(path)
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        let path = normalize_path(path).ok()?;
        self.files.get(&path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, s)| (p.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn to_files(&self) -> Vec<VirtualFile> {
        self.files().map(|(p, s)| VirtualFile::new(p, s)).collect()
    }
}
