//! Entry point selection.

use kiln_types::PreviewError;

use crate::registry::{normalize_path, Registry};
use crate::resolver::{find_candidate, MARKUP_EXTENSION};

/// Pick the program root.
///
/// 1. `explicit`, when it names (or extends to) a registered file;
/// 2. the first path whose file stem matches one of `entry_names`,
///    ignoring case;
/// 3. the first componentized-source file;
/// 4. the first path.
///
/// An empty registry has no entry point.
pub fn select_entry(registry: &Registry, explicit: Option<&str>, entry_names: &[String]) -> Result<String, PreviewError> {
    if registry.is_empty() {
        return Err(PreviewError::NoEntryPoint);
    }

    if let Some(explicit) = explicit {
        match normalize_path(explicit)
            .ok()
            .and_then(|path| find_candidate(registry, &path))
        {
            Some(path) => return Ok(path),
            None => tracing::warn!(explicit, "explicit entry not registered; falling back"),
        }
    }

    let conventional = registry.paths().find(|path| {
        let stem = file_stem(path);
        entry_names.iter().any(|name| name.eq_ignore_ascii_case(stem))
    });
    let chosen = conventional
        .or_else(|| registry.paths().find(|path| path.ends_with(MARKUP_EXTENSION)))
        .or_else(|| registry.paths().next());
    chosen.map(str::to_string).ok_or(PreviewError::NoEntryPoint)
}

/// Final segment without its extension: `src/pages/Home.tsx` → `Home`.
fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}
