//! Sandbox tests: whole preview cycles over small file sets.
//!
//! Tests verify:
//! - Self and mutual cycles terminate and expose the in-progress exports,
//!   however the self import is spelled and when `module.exports` is replaced
//! - Memoized execution (factory runs once, same exports reference)
//! - Resolution order and determinism through the loader
//! - Failure containment: unrelated compile errors, missing modules,
//!   runtime errors and step budgets become diagnostics
//! - Import chains nest past the call limit under their own module limit
//! - Oversized strings and arrays raise `RangeError` instead of aborting
//! - Entry selection fallbacks
//! - Console capture, report serialization, determinism (100-iteration)

use std::rc::Rc;

use kiln_eval::{EvalOptions, Evaluator, Value};
use kiln_sandbox::{
    resolve, Loader, LoaderEvent, ModuleState, Registry, RenderOutcome, RenderReport, Resolution,
    Sandbox, SandboxConfig, Snapshot,
};
use kiln_types::{PreviewError, Stage};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn render(files: &[(&str, &str)]) -> RenderReport {
    init_tracing();
    Sandbox::default().render(&Snapshot::from_pairs(files.iter().copied()))
}

fn render_with(config: SandboxConfig, files: &[(&str, &str)]) -> RenderReport {
    init_tracing();
    Sandbox::new(config).render(&Snapshot::from_pairs(files.iter().copied()))
}

fn loader(files: &[(&str, &str)]) -> Rc<Loader> {
    let mut registry = Registry::new();
    for (path, source) in files {
        registry.insert(path, *source).expect("valid path");
    }
    Loader::new(registry)
}

fn same_object(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

fn diagnostic_of(report: &RenderReport) -> &kiln_sandbox::Diagnostic {
    match &report.outcome {
        RenderOutcome::Diagnostic { diagnostic, .. } => diagnostic,
        other => panic!("expected a diagnostic, got {other:?}"),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Cycles & memoization
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_self_cycle_returns_in_progress_exports() {
    let loader = loader(&[(
        "a.tsx",
        "import * as me from './a';\nexport const same = me === exports;",
    )]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let exports = loader.execute(&mut eval, "a.tsx").expect("self cycle resolves");
    assert!(matches!(exports.own_property("same"), Some(Value::Bool(true))));
    assert_eq!(loader.invocations("a.tsx"), 1);
    assert_eq!(
        loader.events(),
        [LoaderEvent::CycleObserved {
            path: "a.tsx".into(),
            requested_by: "a.tsx".into()
        }]
    );
}

#[test]
fn test_execute_is_idempotent() {
    let loader = loader(&[("util.ts", "console.log('init');\nexport const n = 1;")]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let first = loader.execute(&mut eval, "util.ts").expect("runs");
    let second = loader.execute(&mut eval, "util.ts").expect("memoized");
    assert!(same_object(&first, &second));
    assert_eq!(loader.invocations("util.ts"), 1);
    assert_eq!(eval.console().len(), 1);
}

#[test]
fn test_mutual_cycle_sees_partial_exports() {
    let loader = loader(&[
        (
            "A.ts",
            "import { fromB } from './B';\nexport const fromA = 'a';\nexport const seen = fromB;",
        ),
        (
            "B.ts",
            "import * as A from './A';\nexport const fromB = 'b';\nexport const partialKeys = Object.keys(A).join(',');\nexport const aRef = A;",
        ),
    ]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let a = loader.execute(&mut eval, "A.ts").expect("cycle terminates");
    let b = loader.execute(&mut eval, "B.ts").expect("memoized");

    assert!(matches!(a.own_property("seen"), Some(Value::String(s)) if &*s == "b"));
    assert!(matches!(b.own_property("partialKeys"), Some(Value::String(s)) if s.is_empty()));
    let a_ref = b.own_property("aRef").expect("B kept a reference to A");
    assert!(same_object(&a_ref, &a));
    assert!(matches!(a_ref.own_property("fromA"), Some(Value::String(s)) if &*s == "a"));

    assert_eq!(loader.state("A.ts"), Some(ModuleState::Executed));
    assert_eq!(loader.state("B.ts"), Some(ModuleState::Executed));
    assert_eq!(
        loader.events(),
        [LoaderEvent::CycleObserved {
            path: "A.ts".into(),
            requested_by: "B.ts".into()
        }]
    );
}

#[test]
fn test_cycle_reported_in_render() {
    let report = render(&[
        (
            "index.tsx",
            "import { Footer } from './Footer';\nexport const title = 'Home';\nexport default function App() { return <main><Footer /></main>; }",
        ),
        (
            "Footer.tsx",
            "import * as Root from './index';\nexport function Footer() { return <footer>{Root.title}</footer>; }",
        ),
    ]);
    assert_eq!(report.html(), "<main><footer>Home</footer></main>");
    assert_eq!(report.events.len(), 1);
}

#[test]
fn test_self_require_with_explicit_extension() {
    let loader = loader(&[(
        "a.ts",
        "import * as me from './a.ts';\nexport const same = me === exports;",
    )]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let exports = loader.execute(&mut eval, "a.ts").expect("self cycle resolves");
    assert!(matches!(exports.own_property("same"), Some(Value::Bool(true))));
    assert_eq!(loader.invocations("a.ts"), 1);
    assert_eq!(
        loader.events(),
        [LoaderEvent::CycleObserved {
            path: "a.ts".into(),
            requested_by: "a.ts".into()
        }]
    );
}

#[test]
fn test_self_require_through_parent_directory() {
    let loader = loader(&[(
        "dir/a.ts",
        "import * as me from '../dir/a';\nexport const same = me === exports;",
    )]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let exports = loader.execute(&mut eval, "dir/a.ts").expect("self cycle resolves");
    assert!(matches!(exports.own_property("same"), Some(Value::Bool(true))));
    assert_eq!(loader.invocations("dir/a.ts"), 1);
    assert_eq!(loader.state("dir/a.ts"), Some(ModuleState::Executed));
    assert_eq!(
        loader.events(),
        [LoaderEvent::CycleObserved {
            path: "dir/a.ts".into(),
            requested_by: "dir/a.ts".into()
        }]
    );
}

#[test]
fn test_exports_replaced_after_cycle_closes() {
    let loader = loader(&[
        (
            "a.ts",
            "import { b, kindOfA } from './b';\nmodule.exports = { kind: 'replaced', fromB: b, seenByB: kindOfA() };",
        ),
        (
            "b.ts",
            "import * as A from './a';\nexport const b = 'b';\nexport function kindOfA() { return typeof A.kind; }",
        ),
    ]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let a = loader.execute(&mut eval, "a.ts").expect("cycle terminates");

    assert!(matches!(a.own_property("kind"), Some(Value::String(s)) if &*s == "replaced"));
    assert!(matches!(a.own_property("fromB"), Some(Value::String(s)) if &*s == "b"));
    // b captured the object a started with, not the replacement
    assert!(matches!(a.own_property("seenByB"), Some(Value::String(s)) if &*s == "undefined"));

    let again = loader.execute(&mut eval, "a.ts").expect("memoized");
    assert!(same_object(&a, &again));
    assert_eq!(loader.invocations("a.ts"), 1);
    assert_eq!(
        loader.events(),
        [LoaderEvent::CycleObserved {
            path: "a.ts".into(),
            requested_by: "b.ts".into()
        }]
    );
}

#[test]
fn test_exports_replaced_before_cycle_is_seen() {
    let loader = loader(&[
        (
            "a.ts",
            "module.exports = { kind: 'replaced' };\nconst B = require('./b');\nmodule.exports.seen = B.seen;",
        ),
        ("b.ts", "import * as A from './a';\nexport const seen = A.kind;"),
    ]);
    let mut eval = Evaluator::new(EvalOptions::default());
    let a = loader.execute(&mut eval, "a.ts").expect("cycle terminates");
    assert!(matches!(a.own_property("seen"), Some(Value::String(s)) if &*s == "replaced"));
    assert_eq!(loader.invocations("a.ts"), 1);
    assert_eq!(loader.invocations("b.ts"), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// Resolution
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_resolve_is_deterministic() {
    let mut registry = Registry::new();
    registry.insert("src/a.tsx", "").unwrap();
    registry.insert("src/a/index.tsx", "").unwrap();
    let before = registry.clone();
    let first = resolve(&registry, "src/main.tsx", "./a");
    assert_eq!(first, Resolution::File("src/a.tsx".into()));
    for _ in 0..100 {
        assert_eq!(resolve(&registry, "src/main.tsx", "./a"), first);
    }
    assert_eq!(registry, before);
}

#[test]
fn test_file_preferred_over_directory_index() {
    let report = render(&[
        ("main.tsx", "import Label from './a';\nexport default function App() { return <Label />; }"),
        ("a/index.tsx", "export default function Label() { return <span>index</span>; }"),
        ("a.tsx", "export default function Label() { return <span>file</span>; }"),
    ]);
    assert_eq!(report.html(), "<span>file</span>");
}

// ══════════════════════════════════════════════════════════════════════════════
// Failure containment
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_unrelated_compile_failure_is_contained() {
    let report = render(&[
        ("index.tsx", "export default function App() { return <h1>ok</h1>; }"),
        ("Broken.tsx", "export default function ( { return <div>; }"),
        ("Other.tsx", "export const x = 1;"),
    ]);
    assert_eq!(report.html(), "<h1>ok</h1>");
    assert_eq!(report.compile_failures.len(), 1);
    assert_eq!(report.compile_failures[0].path(), Some("Broken.tsx"));
}

#[test]
fn test_entry_compile_failure_renders_diagnostic() {
    let report = render(&[("App.tsx", "export default function App() { return <div>; }")]);
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.stage, Stage::Compile);
    assert_eq!(diagnostic.path.as_deref(), Some("App.tsx"));
    assert_eq!(diagnostic.title, "Preview Error");
    assert!(report.html().contains("Preview Error"));
}

#[test]
fn test_imported_compile_failure_names_the_broken_file() {
    let report = render(&[
        ("App.tsx", "import Nav from './Nav';\nexport default function App() { return <Nav />; }"),
        ("Nav.tsx", "export default function Nav( { return <nav />; }"),
    ]);
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.stage, Stage::Compile);
    assert_eq!(diagnostic.path.as_deref(), Some("Nav.tsx"));
}

#[test]
fn test_missing_module_renders_diagnostic() {
    let report = render(&[(
        "index.tsx",
        "import Missing from './Missing';\nexport default function App() { return <Missing />; }",
    )]);
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.stage, Stage::Resolve);
    assert_eq!(diagnostic.path.as_deref(), Some("index.tsx"));
    assert_eq!(
        diagnostic.message,
        "Module not found: './Missing' (imported from index.tsx)"
    );
}

#[test]
fn test_missing_module_can_be_caught() {
    let report = render(&[(
        "index.tsx",
        "let label = 'fallback';\ntry { label = require('./optional').label; } catch (e) {}\nexport default function App() { return <p>{label}</p>; }",
    )]);
    assert_eq!(report.html(), "<p>fallback</p>");
}

#[test]
fn test_runtime_failure_in_dependency() {
    let report = render(&[
        ("App.tsx", "import { rows } from './data';\nexport default function App() { return <ul>{rows.length}</ul>; }"),
        ("data.ts", "const source: any = null;\nexport const rows = source.items;"),
    ]);
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.stage, Stage::Execute);
    assert_eq!(diagnostic.path.as_deref(), Some("data.ts"));
    assert!(diagnostic.message.contains("TypeError"), "{}", diagnostic.message);
}

#[test]
fn test_step_budget_renders_diagnostic() {
    let config = SandboxConfig {
        gas_limit: 5_000,
        ..SandboxConfig::default()
    };
    let report = render_with(
        config,
        &[("App.tsx", "export default function App() { while (true) {} }")],
    );
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.stage, Stage::Mount);
    assert!(diagnostic.message.contains("step limit"), "{}", diagnostic.message);
}

#[test]
fn test_throw_during_render_renders_diagnostic() {
    let report = render(&[(
        "App.tsx",
        "function Boom(): any { throw new Error('kaboom'); }\nexport default function App() { return <div><Boom /></div>; }",
    )]);
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.message, "Error: kaboom");
}

/// `m0.ts` imports `m1.ts` and so on; each adds one to the next link's `depth`.
fn import_chain(links: usize) -> Vec<(String, String)> {
    (0..links)
        .map(|i| {
            let source = if i + 1 < links {
                format!("import {{ depth as inner }} from './m{}';\nexport const depth = inner + 1;", i + 1)
            } else {
                "export const depth = 1;".to_string()
            };
            (format!("m{i}.ts"), source)
        })
        .collect()
}

#[test]
fn test_import_chain_longer_than_call_depth() {
    const LINKS: usize = 80;
    // each nested factory recurses through the tree walker on the native stack
    let worker = std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(|| {
            let files = import_chain(LINKS);
            let pairs: Vec<(&str, &str)> = files.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();
            let loader = loader(&pairs);
            let mut eval = Evaluator::new(EvalOptions::default());
            let exports = loader.execute(&mut eval, "m0.ts").expect("chain loads");
            let depth = exports.own_property("depth").map(|v| v.to_number());
            (depth, loader.invocations(&format!("m{}.ts", LINKS - 1)))
        })
        .expect("spawn worker");
    let (depth, last_runs) = worker.join().expect("worker finished");
    assert!(LINKS > EvalOptions::default().max_call_depth);
    assert_eq!(depth, Some(LINKS as f64));
    assert_eq!(last_runs, 1);
}

#[test]
fn test_module_nesting_limit_renders_diagnostic() {
    let config = SandboxConfig {
        max_module_depth: 4,
        ..SandboxConfig::default()
    };
    let mut files = import_chain(8);
    files.push((
        "App.tsx".into(),
        "import { depth } from './m0';\nexport default function App() { return <p>{depth}</p>; }".into(),
    ));
    let pairs: Vec<(&str, &str)> = files.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();
    let report = render_with(config, &pairs);
    let diagnostic = diagnostic_of(&report);
    assert!(diagnostic.message.contains("module nesting of 4"), "{}", diagnostic.message);
}

#[test]
fn test_oversized_values_do_not_abort_the_host() {
    let report = render(&[(
        "App.tsx",
        r#"function attempt(f: () => unknown): string {
  try { f(); return 'ok'; } catch (e) { return e.name + ': ' + e.message; }
}
const a: any[] = [];
a.push(a);
const results = [
  `[${String(a)}]`,
  attempt(() => { a[1e17] = 1; }),
  attempt(() => new Array(1e17)),
  attempt(() => 'ab'.repeat(1e18)),
];
export default function App() {
  return <ul>{results.map((r, i) => <li key={i}>{r}</li>)}</ul>;
}"#,
    )]);
    assert_eq!(
        report.html(),
        "<ul><li>[]</li><li>RangeError: Invalid array length</li>\
         <li>RangeError: Invalid array length</li><li>RangeError: Invalid string length</li></ul>"
    );
}

#[test]
fn test_uncaught_range_error_renders_diagnostic() {
    let report = render(&[(
        "App.tsx",
        "export default function App() { return <p>{'ab'.repeat(1e18)}</p>; }",
    )]);
    let diagnostic = diagnostic_of(&report);
    assert_eq!(diagnostic.stage, Stage::Mount);
    assert_eq!(diagnostic.message, "RangeError: Invalid string length");
}

// ══════════════════════════════════════════════════════════════════════════════
// Entry selection & end to end
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_entry_fallback_prefers_component_file() {
    let report = render(&[
        ("src/utils/helpers.ts", "export const add = (a: number, b: number) => a + b;"),
        ("src/pages/Home.tsx", "export default function Home() { return <h1>Home</h1>; }"),
    ]);
    assert_eq!(report.entry.as_deref(), Some("src/pages/Home.tsx"));
    assert_eq!(report.html(), "<h1>Home</h1>");
}

#[test]
fn test_button_rendered_exactly_once() {
    let report = render(&[
        (
            "index.tsx",
            r#"import React from "react";
import Button from "./Button";

export default function App() {
  return (
    <div className="app">
      <Button label="Save" />
    </div>
  );
}
"#,
        ),
        (
            "Button.tsx",
            r#"interface ButtonProps { label: string }
export default function Button({ label }: ButtonProps) {
  return <button type="button">{label}</button>;
}
"#,
        ),
    ]);
    let RenderOutcome::Mounted { surface, html } = &report.outcome else {
        panic!("expected mounted outcome: {:?}", report.outcome);
    };
    assert_eq!(html, r#"<div class="app"><button type="button">Save</button></div>"#);
    let buttons: usize = surface.iter().map(|n| n.find_all("button").len()).sum();
    assert_eq!(buttons, 1);
    assert!(report.compile_failures.is_empty());
}

#[test]
fn test_empty_registry_shows_empty_state() {
    let report = render(&[]);
    assert!(matches!(report.outcome, RenderOutcome::Empty { .. }));
    assert!(report.html().contains("No code generated yet."));
}

// ══════════════════════════════════════════════════════════════════════════════
// Report
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_console_captured_in_report() {
    let report = render(&[(
        "App.tsx",
        "console.info('booting');\nexport default function App() { console.warn('rendering'); return null; }",
    )]);
    assert!(report.outcome.is_mounted());
    let messages: Vec<&str> = report.console.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, ["booting", "rendering"]);
}

#[test]
fn test_report_serializes() {
    let report = render(&[("App.tsx", "export default () => <p>hi</p>;")]);
    let json: serde_json::Value = serde_json::from_str(&report.to_json()).expect("valid json");
    assert_eq!(json["entry"], "App.tsx");
    assert_eq!(json["outcome"]["status"], "mounted");
    assert_eq!(json["outcome"]["html"], "<p>hi</p>");
    assert_eq!(json["cycle"].as_str().map(str::len), Some(12));
}

#[test]
fn test_preview_error_taxonomy_in_report() {
    let report = render(&[
        ("App.tsx", "export default () => <p>hi</p>;"),
        ("bad.ts", "const = 1;"),
    ]);
    assert!(matches!(
        &report.compile_failures[..],
        [PreviewError::CompileFailure { path, .. }] if path == "bad.ts"
    ));
}

#[test]
fn test_deterministic_100_iterations() {
    let files = [
        ("index.tsx", "import { items } from './data';\nexport default function App() { return <ol>{items.map((i) => <li key={i}>{i * Math.random()}</li>)}</ol>; }"),
        ("data.ts", "export const items = [1, 2, 3];"),
    ];
    let first = render(&files);
    assert!(first.outcome.is_mounted());
    for _ in 0..100 {
        assert_eq!(render(&files), first);
    }
}
