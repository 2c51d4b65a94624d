//! Path resolution for `require` specifiers.
//!
//! Relative specifiers (leading `.`) are resolved against the directory of
//! the requesting file and tried in a fixed order:
//!
//! ```text
//! ./Button  →  Button  →  Button.tsx  →  Button.ts  →  Button/index.tsx
//! ```
//!
//! Anything else is a bare specifier and is never looked up in the
//! registry; the host decides what it means.

use serde::Serialize;

use crate::registry::Registry;

/// Componentized-source extension.
pub const MARKUP_EXTENSION: &str = ".tsx";
/// Plain-source extension.
pub const PLAIN_EXTENSION: &str = ".ts";

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Resolution {
    /// A path present in the registry.
    File(String),
    /// A bare specifier, handed to the host as a capability request.
    Capability(String),
    /// A relative specifier matching no registered file, or one that
    /// climbs above the registry root.
    Unresolved,
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with('.')
}

/// Resolve `specifier` as requested from `from_path`. Pure: the registry
/// is only read.
pub fn resolve(registry: &Registry, from_path: &str, specifier: &str) -> Resolution {
    if !is_relative(specifier) {
        return Resolution::Capability(specifier.to_string());
    }
    match join(from_path, specifier) {
        Some(base) => find_candidate(registry, &base).map_or(Resolution::Unresolved, Resolution::File),
        None => Resolution::Unresolved,
    }
}

/// Directory of `from_path` plus the segments of `specifier`, with `.`
/// skipped and `..` popping. `None` when `..` climbs past the root.
fn join(from_path: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = from_path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// First registered candidate for `base`, in lookup order.
pub fn find_candidate(registry: &Registry, base: &str) -> Option<String> {
    let index = if base.is_empty() {
        format!("index{MARKUP_EXTENSION}")
    } else {
        format!("{base}/index{MARKUP_EXTENSION}")
    };
    let candidates = [
        base.to_string(),
        format!("{base}{MARKUP_EXTENSION}"),
        format!("{base}{PLAIN_EXTENSION}"),
        index,
    ];
    candidates
        .into_iter()
        .filter(|c| !c.is_empty())
        .find(|c| registry.contains(c))
}
