//! Module loader: per-path state records, demand-driven execution and
//! cycle handling.
//!
//! Every registered path owns one [`ModuleRecord`]. Records move through
//!
//! ```text
//! Uncompiled → Compiled → Executing → Executed
//!           ↘          ↘           ↘
//!                 Failed(stage, error)
//! ```
//!
//! A `require` that reaches a record in `Executing` is a cycle: it gets the
//! record's in-progress exports object and a [`LoaderEvent::CycleObserved`]
//! is recorded. `Executing → Executed` happens at most once per path.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;

use kiln_compiler::{compile_source, Factory};
use kiln_eval::{EvalError, EvalResult, Evaluator, ModuleFrame, ModuleHost, Value};
use kiln_types::{PreviewError, Stage};

use crate::registry::Registry;
use crate::resolver::{resolve, Resolution};

/// Lifecycle state of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModuleState {
    Uncompiled,
    Compiled,
    Executing,
    Executed,
    Failed { stage: Stage, error: PreviewError },
}

/// Something the loader observed that does not fail the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoaderEvent {
    /// `requested_by` re-entered `path` while it was still executing and
    /// received its partially populated exports.
    CycleObserved { path: String, requested_by: String },
}

struct ModuleRecord {
    state: ModuleState,
    factory: Option<Factory>,
    frame: Option<ModuleFrame>,
    /// The error to re-raise for a failed module.
    failure: Option<EvalError>,
    invocations: u32,
}

impl ModuleRecord {
    fn new() -> Self {
        Self {
            state: ModuleState::Uncompiled,
            factory: None,
            frame: None,
            failure: None,
            invocations: 0,
        }
    }

    fn fail(&mut self, stage: Stage, error: PreviewError, failure: EvalError) {
        self.state = ModuleState::Failed { stage, error };
        self.failure = Some(failure);
    }
}

/// Owns the registry and the module records of one preview cycle.
pub struct Loader {
    me: Weak<Loader>,
    registry: Registry,
    records: RefCell<IndexMap<String, ModuleRecord>>,
    events: RefCell<Vec<LoaderEvent>>,
}

impl Loader {
    pub fn new(registry: Registry) -> Rc<Self> {
        let records = registry
            .paths()
            .map(|path| (path.to_string(), ModuleRecord::new()))
            .collect();
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            records: RefCell::new(records),
            events: RefCell::new(Vec::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self, path: &str) -> Option<ModuleState> {
        self.records.borrow().get(path).map(|r| r.state.clone())
    }

    /// How many times `path`'s factory has been invoked.
    pub fn invocations(&self, path: &str) -> u32 {
        self.records.borrow().get(path).map_or(0, |r| r.invocations)
    }

    pub fn events(&self) -> Vec<LoaderEvent> {
        self.events.borrow().clone()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Compilation
    // ══════════════════════════════════════════════════════════════════════

    /// Compile every uncompiled file. A failure is recorded on its own
    /// record and never stops the others.
    pub fn compile_all(&self) -> Vec<PreviewError> {
        let paths: Vec<String> = self.records.borrow().keys().cloned().collect();
        paths
            .iter()
            .filter_map(|path| self.compile(path).err())
            .collect()
    }

    /// Compile one file if it has not been compiled yet.
    pub fn compile(&self, path: &str) -> Result<(), PreviewError> {
        let mut records = self.records.borrow_mut();
        let Some(record) = records.get_mut(path) else {
            return Err(PreviewError::RuntimeFailure {
                path: path.to_string(),
                error: "file is not registered".into(),
            });
        };
        match &record.state {
            ModuleState::Uncompiled => {}
            ModuleState::Failed { error, .. } => return Err(error.clone()),
            _ => return Ok(()),
        }
        let source = self.registry.get(path).unwrap_or_default();
        match compile_source(path, source) {
            Ok(unit) => {
                tracing::debug!(path, imports = ?unit.factory.imports(), "compiled");
                record.factory = Some(unit.factory);
                record.state = ModuleState::Compiled;
                Ok(())
            }
            Err(failure) => {
                let diagnostic = failure.diagnostic();
                tracing::warn!(path, %diagnostic, "compile failure");
                let error = PreviewError::CompileFailure {
                    path: path.to_string(),
                    diagnostic: diagnostic.clone(),
                };
                let raised = EvalError::InModule {
                    path: path.to_string(),
                    error: Box::new(EvalError::syntax_error(diagnostic)),
                };
                record.fail(Stage::Compile, error.clone(), raised);
                Err(error)
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Execution
    // ══════════════════════════════════════════════════════════════════════

    /// Execute `path` (compiling it first if needed) and return its
    /// exports. Repeated calls return the memoized exports object.
    pub fn execute(&self, eval: &mut Evaluator, path: &str) -> EvalResult<Value> {
        self.execute_from(eval, path, None)
    }

    fn execute_from(&self, eval: &mut Evaluator, path: &str, requested_by: Option<&str>) -> EvalResult<Value> {
        if self.state(path) == Some(ModuleState::Uncompiled) {
            // Failure is recorded on the record and re-raised below.
            let _ = self.compile(path);
        }

        let (frame, body) = {
            let mut records = self.records.borrow_mut();
            let Some(record) = records.get_mut(path) else {
                return Err(EvalError::ModuleNotFound {
                    from_path: requested_by.unwrap_or(path).to_string(),
                    specifier: path.to_string(),
                });
            };
            match &record.state {
                ModuleState::Executed => return Ok(exports_of(record)),
                ModuleState::Executing => {
                    let requested_by = requested_by.unwrap_or(path).to_string();
                    tracing::warn!(path, %requested_by, "cycle observed; returning partial exports");
                    self.events.borrow_mut().push(LoaderEvent::CycleObserved {
                        path: path.to_string(),
                        requested_by,
                    });
                    return Ok(exports_of(record));
                }
                ModuleState::Failed { .. } => {
                    return Err(record
                        .failure
                        .clone()
                        .unwrap_or_else(|| EvalError::type_error("module failed")));
                }
                ModuleState::Uncompiled | ModuleState::Compiled => {}
            }
            let Some(factory) = &record.factory else {
                return Err(EvalError::type_error(format!("{path} has no compiled factory")));
            };
            let body = factory.body();
            let frame = ModuleFrame::new(path);
            record.frame = Some(frame.clone());
            record.state = ModuleState::Executing;
            record.invocations += 1;
            (frame, body)
        };

        tracing::debug!(path, "executing module");
        let Some(me) = self.me.upgrade() else {
            return Err(EvalError::type_error("module loader dropped mid-cycle"));
        };
        let host: Rc<dyn ModuleHost> = me;
        let result = eval.run_factory(&frame, &body, host);

        let mut records = self.records.borrow_mut();
        match result {
            Ok(()) => {
                if let Some(record) = records.get_mut(path) {
                    record.state = ModuleState::Executed;
                }
                Ok(frame.exports())
            }
            Err(err) => {
                let error = self.attribute(path, &err, &records);
                if let Some(record) = records.get_mut(path) {
                    let stage = error.stage();
                    record.fail(stage, error, err.clone());
                }
                Err(err)
            }
        }
    }

    /// The failure to report for an error that escaped `path`'s factory.
    /// An error raised inside a dependency keeps the dependency's record.
    fn attribute(&self, path: &str, err: &EvalError, records: &IndexMap<String, ModuleRecord>) -> PreviewError {
        if let EvalError::ModuleNotFound {
            from_path,
            specifier,
        } = err.root()
        {
            return PreviewError::ModuleNotFound {
                from_path: from_path.clone(),
                specifier: specifier.clone(),
            };
        }
        if let Some(inner) = err.module_path().filter(|p| *p != path) {
            if let Some(ModuleState::Failed { error, .. }) = records.get(inner).map(|r| &r.state) {
                return error.clone();
            }
        }
        PreviewError::RuntimeFailure {
            path: err.module_path().unwrap_or(path).to_string(),
            error: err.root().to_string(),
        }
    }

    /// Map an error that escaped the entry module to the failure shown on
    /// the diagnostic surface.
    pub fn failure(&self, entry: &str, err: &EvalError) -> PreviewError {
        let records = self.records.borrow();
        if let Some(ModuleState::Failed { error, .. }) = records.get(entry).map(|r| &r.state) {
            return error.clone();
        }
        self.attribute(entry, err, &records)
    }
}

fn exports_of(record: &ModuleRecord) -> Value {
    record
        .frame
        .as_ref()
        .map_or(Value::Undefined, ModuleFrame::exports)
}

impl ModuleHost for Loader {
    fn require(&self, eval: &mut Evaluator, from_path: &str, specifier: &str) -> EvalResult<Value> {
        match resolve(&self.registry, from_path, specifier) {
            Resolution::File(path) => self.execute_from(eval, &path, Some(from_path)),
            Resolution::Capability(name) => Ok(eval.capability(&name)),
            Resolution::Unresolved => {
                tracing::warn!(from_path, specifier, "module not found");
                Err(EvalError::ModuleNotFound {
                    from_path: from_path.to_string(),
                    specifier: specifier.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_eval::EvalOptions;

    fn loader(files: &[(&str, &str)]) -> Rc<Loader> {
        let mut registry = Registry::new();
        for (path, source) in files {
            registry.insert(path, *source).unwrap();
        }
        Loader::new(registry)
    }

    #[test]
    fn test_states_progress() {
        let loader = loader(&[("App.tsx", "export const x = 1;"), ("unused.ts", "export const y = 2;")]);
        assert_eq!(loader.state("App.tsx"), Some(ModuleState::Uncompiled));
        assert!(loader.compile_all().is_empty());
        assert_eq!(loader.state("App.tsx"), Some(ModuleState::Compiled));

        let mut eval = Evaluator::new(EvalOptions::default());
        loader.execute(&mut eval, "App.tsx").unwrap();
        assert_eq!(loader.state("App.tsx"), Some(ModuleState::Executed));
        assert_eq!(loader.state("unused.ts"), Some(ModuleState::Compiled));
        assert_eq!(loader.invocations("unused.ts"), 0);
    }

    #[test]
    fn test_compile_failure_is_recorded_per_file() {
        let loader = loader(&[("good.ts", "export const a = 1;"), ("bad.ts", "export const = ;")]);
        let failures = loader.compile_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path(), Some("bad.ts"));
        assert_eq!(loader.state("good.ts"), Some(ModuleState::Compiled));
        assert!(matches!(
            loader.state("bad.ts"),
            Some(ModuleState::Failed { stage: Stage::Compile, .. })
        ));
    }

    #[test]
    fn test_execute_compiles_on_demand() {
        let loader = loader(&[("App.tsx", "import { v } from './dep';\nexport const w = v + 1;"), ("dep.ts", "export const v = 41;")]);
        let mut eval = Evaluator::new(EvalOptions::default());
        let exports = loader.execute(&mut eval, "App.tsx").unwrap();
        assert!(matches!(exports.own_property("w"), Some(Value::Number(n)) if n == 42.0));
        assert_eq!(loader.state("dep.ts"), Some(ModuleState::Executed));
    }

    #[test]
    fn test_runtime_failure_attributed_to_dependency() {
        let loader = loader(&[
            ("App.tsx", "import './dep';\nexport const ok = true;"),
            ("dep.ts", "const o: any = undefined;\nexport const bad = o.field;"),
        ]);
        let mut eval = Evaluator::new(EvalOptions::default());
        let err = loader.execute(&mut eval, "App.tsx").unwrap_err();
        match loader.failure("App.tsx", &err) {
            PreviewError::RuntimeFailure { path, error } => {
                assert_eq!(path, "dep.ts");
                assert!(error.starts_with("TypeError"), "{error}");
            }
            other => panic!("unexpected failure {other:?}"),
        }
        assert!(matches!(loader.state("dep.ts"), Some(ModuleState::Failed { stage: Stage::Execute, .. })));
    }
}
