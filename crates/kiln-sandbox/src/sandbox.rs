//! The sandbox host: one preview cycle from snapshot to surface.
//!
//! ```text
//! Snapshot → Registry → compile all → select entry → execute entry
//!          → find renderable export → mount → RenderReport
//! ```
//!
//! Every failure, including a panic inside the engine, is converted into
//! a diagnostic outcome here. Nothing escapes [`Sandbox::render`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use kiln_eval::{is_element, EvalError, Evaluator, Value};
use kiln_types::{PreviewError, Stage};

use crate::config::SandboxConfig;
use crate::entry::select_entry;
use crate::loader::{Loader, LoaderEvent};
use crate::report::{Diagnostic, RenderOutcome, RenderReport};
use crate::snapshot::Snapshot;

/// Renders snapshots. Holds no state between cycles: each call to
/// [`Sandbox::render`] builds a fresh registry, loader and realm.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

/// Partial results gathered while a cycle runs, kept even when a later
/// stage fails.
#[derive(Default)]
struct CycleState {
    entry: Option<String>,
    compile_failures: Vec<PreviewError>,
    events: Vec<LoaderEvent>,
    console: Vec<kiln_eval::ConsoleLine>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run one preview cycle.
    pub fn render(&self, snapshot: &Snapshot) -> RenderReport {
        let cycle = snapshot.cycle_id();
        let mut state = CycleState::default();

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.run(snapshot, &mut state))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%cycle, %message, "preview engine panicked");
                RenderOutcome::diagnostic(Diagnostic::new(
                    Stage::Execute,
                    state.entry.clone(),
                    format!("Internal error: {message}"),
                ))
            }
        };

        tracing::info!(
            %cycle,
            files = snapshot.files.len(),
            entry = state.entry.as_deref().unwrap_or("-"),
            mounted = outcome.is_mounted(),
            compile_failures = state.compile_failures.len(),
            "preview cycle finished"
        );

        RenderReport {
            cycle,
            entry: state.entry,
            outcome,
            compile_failures: state.compile_failures,
            events: state.events,
            console: state.console,
        }
    }

    fn run(&self, snapshot: &Snapshot, state: &mut CycleState) -> RenderOutcome {
        let registry = snapshot.registry();
        if registry.is_empty() {
            return RenderOutcome::empty();
        }

        let loader = Loader::new(registry);
        state.compile_failures = loader.compile_all();

        let entry = match select_entry(
            loader.registry(),
            snapshot.entry.as_deref(),
            &self.config.entry_names,
        ) {
            Ok(entry) => entry,
            Err(error) => return RenderOutcome::diagnostic(Diagnostic::from_error(&error)),
        };
        state.entry = Some(entry.clone());
        tracing::debug!(%entry, "entry selected");

        let mut eval = Evaluator::new(self.config.eval_options());
        let outcome = self.execute_and_mount(&loader, &mut eval, &entry);
        state.events = loader.events();
        state.console = eval.take_console();
        outcome
    }

    fn execute_and_mount(&self, loader: &Loader, eval: &mut Evaluator, entry: &str) -> RenderOutcome {
        let exports = match loader.execute(eval, entry) {
            Ok(exports) => exports,
            Err(err) => {
                let error = loader.failure(entry, &err);
                tracing::warn!(%entry, %error, "entry module failed");
                return RenderOutcome::diagnostic(Diagnostic::from_error(&error));
            }
        };

        let mounted = match renderable_export(&exports) {
            Some(component @ Value::Function(_)) => eval.mount_component(&component),
            Some(element) => eval.mount(&element),
            None => match eval.rendered_root().cloned() {
                Some(root) => eval.mount(&root),
                None => {
                    return RenderOutcome::diagnostic(Diagnostic::new(
                        Stage::Mount,
                        Some(entry.to_string()),
                        format!("No component export found in {entry}"),
                    ))
                }
            },
        };

        match mounted {
            Ok(surface) => RenderOutcome::mounted(surface),
            Err(err) => RenderOutcome::diagnostic(mount_diagnostic(entry, &err)),
        }
    }
}

/// `default` when it is a component or element, otherwise the first
/// exported function.
fn renderable_export(exports: &Value) -> Option<Value> {
    let Value::Object(exports) = exports else {
        return match exports {
            Value::Function(_) => Some(exports.clone()),
            _ => None,
        };
    };
    if let Some(default) = exports.get("default") {
        if matches!(default, Value::Function(_)) || is_element(&default) {
            return Some(default);
        }
    }
    exports
        .entries()
        .into_iter()
        .map(|(_, value)| value)
        .find(|value| matches!(value, Value::Function(_)))
}

fn mount_diagnostic(entry: &str, err: &EvalError) -> Diagnostic {
    tracing::warn!(%entry, error = %err, "mount failed");
    let path = err.module_path().unwrap_or(entry).to_string();
    Diagnostic::new(Stage::Mount, Some(path), err.root().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::VirtualFile;

    fn render(files: &[(&str, &str)]) -> RenderReport {
        Sandbox::default().render(&Snapshot::from_pairs(files.iter().copied()))
    }

    #[test]
    fn test_empty_snapshot() {
        let report = render(&[]);
        assert!(matches!(report.outcome, RenderOutcome::Empty { .. }));
        assert_eq!(report.entry, None);
    }

    #[test]
    fn test_first_function_export_used_without_default() {
        let report = render(&[("App.tsx", "export const version = 2;\nexport function Page() { return <h1>Hi</h1>; }")]);
        assert_eq!(report.html(), "<h1>Hi</h1>");
    }

    #[test]
    fn test_no_component_export() {
        let report = render(&[("App.tsx", "export const version = 2;")]);
        let diagnostic = report.outcome.as_diagnostic().expect("diagnostic");
        assert_eq!(diagnostic.message, "No component export found in App.tsx");
        assert_eq!(diagnostic.stage, Stage::Mount);
    }

    #[test]
    fn test_rendered_root_fallback() {
        let report = render(&[(
            "main.tsx",
            "import { createRoot } from 'react-dom/client';\nfunction App() { return <p>root</p>; }\ncreateRoot(document.getElementById('root')).render(<App />);",
        )]);
        assert_eq!(report.html(), "<p>root</p>");
    }

    #[test]
    fn test_explicit_entry_from_snapshot() {
        let snapshot = Snapshot::new(
            vec![
                VirtualFile::new("App.tsx", "export default () => <p>app</p>;"),
                VirtualFile::new("Other.tsx", "export default () => <p>other</p>;"),
            ],
            Some("Other.tsx".into()),
        );
        let report = Sandbox::default().render(&snapshot);
        assert_eq!(report.entry.as_deref(), Some("Other.tsx"));
        assert_eq!(report.html(), "<p>other</p>");
    }
}
