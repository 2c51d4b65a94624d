//! Compiler tests: module lowering order, import/export forms, markup
//! lowering, the wider statement and operator set, per-file isolation and
//! diagnostics.

use kiln_compiler::{compile, compile_source, CompiledUnit};
use kiln_types::ast::*;
use kiln_types::{ErrorCode, VirtualFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn compile_ok(source: &str) -> CompiledUnit {
    match compile_source("test.tsx", source) {
        Ok(unit) => unit,
        Err(failure) => {
            for e in &failure.errors.errors {
                eprintln!("  ERROR: {e}");
            }
            panic!("unexpected compile errors (see above)");
        }
    }
}

fn first_error_code(source: &str) -> ErrorCode {
    let failure = compile_source("test.tsx", source).expect_err("expected compile failure");
    failure.errors.errors[0].code
}

/// `Some(name)` if `stmt` is `exports.<name> = …`.
fn export_target(stmt: &Stmt) -> Option<&str> {
    let Stmt::Expr(ExprStmt { expr, .. }) = stmt else {
        return None;
    };
    let ExprKind::Assign { target, .. } = &expr.kind else {
        return None;
    };
    match &target.kind {
        ExprKind::Member { object, property, .. }
            if object.kind == ExprKind::Ident("exports".into()) =>
        {
            Some(property)
        }
        _ => None,
    }
}

fn is_require(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Var(decl)
        if matches!(&decl.declarators[0].init, Some(Expr { kind: ExprKind::Call { callee, .. }, .. })
            if callee.kind == ExprKind::Ident("require".into())))
}

/// The expression of the first `exports.default = …` statement.
fn default_export(unit: &CompiledUnit) -> Expr {
    let body = unit.factory.body();
    for stmt in body.iter() {
        if export_target(stmt) == Some("default") {
            if let Stmt::Expr(ExprStmt { expr, .. }) = stmt {
                if let ExprKind::Assign { value, .. } = &expr.kind {
                    return (**value).clone();
                }
            }
        }
    }
    panic!("no default export");
}

/// `(type, props, children)` of a `React.createElement(...)` call.
fn create_element(expr: &Expr) -> (&Expr, &Expr, Vec<&Expr>) {
    let ExprKind::Call { callee, args, .. } = &expr.kind else {
        panic!("expected call, got {:?}", expr.kind);
    };
    assert!(matches!(&callee.kind,
        ExprKind::Member { object, property, .. }
            if property == "createElement" && object.kind == ExprKind::Ident("React".into())));
    let args: Vec<&Expr> = args
        .iter()
        .map(|a| match a {
            Argument::Expr(e) => e,
            Argument::Spread(_) => panic!("unexpected spread argument"),
        })
        .collect();
    (args[0], args[1], args[2..].to_vec())
}

// ─────────────────────────────────────────────────────────────────────
// Module Lowering Order
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_es_module_marker_comes_first() {
    let unit = compile_ok("export const x = 1");
    let body = unit.factory.body();
    assert_eq!(export_target(&body[0]), Some("__esModule"));
}

#[test]
fn test_function_exports_hoisted_before_requires() {
    let unit = compile_ok(
        "import { b } from './b'\nexport const a = 1\nexport function helper() { return b }\nexport default function App() { return null }",
    );
    let body = unit.factory.body();
    assert_eq!(export_target(&body[1]), Some("helper"));
    assert_eq!(export_target(&body[2]), Some("default"));
    assert!(is_require(&body[3]));
    assert!(matches!(&body[4], Stmt::BindImport(b) if b.local.name == "b"));
    assert_eq!(unit.factory.exports(), ["a", "helper", "default"]);
}

#[test]
fn test_const_export_assigned_after_declaration() {
    let unit = compile_ok("export const { a, b: c } = obj, d = 2");
    let body = unit.factory.body();
    assert!(matches!(body[1], Stmt::Var(_)));
    let assigned: Vec<_> = body[2..].iter().filter_map(export_target).collect();
    assert_eq!(assigned, vec!["a", "c", "d"]);
}

#[test]
fn test_export_list_of_function_is_hoisted() {
    let unit = compile_ok("const n = 1\nfunction f() {}\nexport { f as g, n }");
    let body = unit.factory.body();
    assert_eq!(export_target(&body[1]), Some("g"));
    assert_eq!(export_target(body.last().unwrap()), Some("n"));
}

// ─────────────────────────────────────────────────────────────────────
// Imports & Re-exports
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_import_forms_become_bindings() {
    let unit = compile_ok(
        "import React, { useState as useS } from 'react'\nimport * as utils from './utils'\nimport './side-effect'",
    );
    assert_eq!(unit.factory.imports(), ["react", "./utils", "./side-effect"]);
    let bindings: Vec<(String, ImportedName)> = unit
        .factory
        .body()
        .iter()
        .filter_map(|s| match s {
            Stmt::BindImport(b) => Some((b.local.name.clone(), b.import.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        bindings,
        vec![
            ("React".to_string(), ImportedName::Default),
            ("useS".to_string(), ImportedName::Named("useState".into())),
            ("utils".to_string(), ImportedName::Namespace),
        ]
    );
}

#[test]
fn test_reexports() {
    let unit = compile_ok("export { default as Button, size } from './Button'\nexport * from './icons'");
    assert_eq!(unit.factory.imports(), ["./Button", "./icons"]);
    assert_eq!(unit.factory.exports(), ["Button", "size"]);
    let body = unit.factory.body();
    assert!(body
        .iter()
        .any(|s| matches!(s, Stmt::BindImport(b) if b.import == ImportedName::Default)));
    assert!(matches!(body.last(), Some(Stmt::ExportAll(_))));
}

#[test]
fn test_type_only_imports_leave_no_require() {
    let unit = compile_ok("import type { Props } from './types'\nexport const x = 1");
    assert!(unit.factory.imports().is_empty());
}

#[test]
fn test_duplicate_export() {
    assert_eq!(
        first_error_code("export const a = 1\nconst b = 2\nexport { b as a }"),
        ErrorCode::DUPLICATE_EXPORT
    );
    assert_eq!(
        first_error_code("export default 1\nexport default 2"),
        ErrorCode::DUPLICATE_EXPORT
    );
}

#[test]
fn test_empty_specifier() {
    assert_eq!(first_error_code("import x from ''"), ErrorCode::INVALID_SPECIFIER);
}

// ─────────────────────────────────────────────────────────────────────
// Markup Lowering
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_intrinsic_element() {
    let unit = compile_ok(r#"export default <div className="box" hidden>Hi &amp; bye</div>"#);
    let expr = default_export(&unit);
    let (ty, props, children) = create_element(&expr);
    assert_eq!(ty.kind, ExprKind::String("div".into()));
    let ExprKind::Object(defs) = &props.kind else {
        panic!("expected props object");
    };
    assert!(matches!(&defs[0], PropDef::KeyValue(PropKey::Named(k), v)
        if k == "className" && v.kind == ExprKind::String("box".into())));
    assert!(matches!(&defs[1], PropDef::KeyValue(PropKey::Named(k), v)
        if k == "hidden" && v.kind == ExprKind::Bool(true)));
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind, ExprKind::String("Hi & bye".into()));
}

#[test]
fn test_component_and_member_tags() {
    let unit = compile_ok("export default <Ctx.Provider value={1}><Button /></Ctx.Provider>");
    let expr = default_export(&unit);
    let (ty, _, children) = create_element(&expr);
    assert!(matches!(&ty.kind, ExprKind::Member { object, property, .. }
        if property == "Provider" && object.kind == ExprKind::Ident("Ctx".into())));
    let (child_ty, child_props, _) = create_element(children[0]);
    assert_eq!(child_ty.kind, ExprKind::Ident("Button".into()));
    assert_eq!(child_props.kind, ExprKind::Null);
}

#[test]
fn test_fragment_uses_react_fragment() {
    let unit = compile_ok("export default <>\n  <a />\n  {x}\n</>");
    let expr = default_export(&unit);
    let (ty, _, children) = create_element(&expr);
    assert!(matches!(&ty.kind, ExprKind::Member { property, .. } if property == "Fragment"));
    // Whitespace-only lines between children are dropped.
    assert_eq!(children.len(), 2);
}

#[test]
fn test_text_whitespace_collapses() {
    let unit = compile_ok("export default <p>\n    Hello\n    {name}!\n  </p>");
    let expr = default_export(&unit);
    let (_, _, children) = create_element(&expr);
    assert_eq!(children[0].kind, ExprKind::String("Hello".into()));
    assert_eq!(children[1].kind, ExprKind::Ident("name".into()));
    assert_eq!(children[2].kind, ExprKind::String("!".into()));
}

#[test]
fn test_spread_attributes_and_empty_containers() {
    let unit = compile_ok("export default <input {...rest} value={v} />\nconst y = <b>{/* c */}</b>");
    let expr = default_export(&unit);
    let (_, props, _) = create_element(&expr);
    let ExprKind::Object(defs) = &props.kind else {
        panic!("expected props object");
    };
    assert!(matches!(defs[0], PropDef::Spread(_)));
    let body = unit.factory.body();
    let Some(Stmt::Var(decl)) = body.last() else {
        panic!("expected declaration");
    };
    let (_, _, children) = create_element(decl.declarators[0].init.as_ref().unwrap());
    assert!(children.is_empty());
}

#[test]
fn test_markup_inside_nested_functions_is_lowered() {
    let unit = compile_ok(
        "export function List({ items }: { items: string[] }) {\n  return <ul>{items.map(i => <li key={i}>{i}</li>)}</ul>\n}",
    );
    let body = unit.factory.body();
    let text = format!("{body:?}");
    assert!(!text.contains("Markup"));
    assert!(text.contains("createElement"));
}

// ─────────────────────────────────────────────────────────────────────
// Language Forms
// ─────────────────────────────────────────────────────────────────────

fn body_text(unit: &CompiledUnit) -> String {
    format!("{:?}", unit.factory.body())
}

#[test]
fn test_switch_cases_are_lowered() {
    let text = body_text(&compile_ok(
        "export function Label({ n }: { n: number }) {\n  switch (n) {\n    case 1: return <b>one</b>\n    default: return <i>other</i>\n  }\n}",
    ));
    assert!(text.contains("Switch"));
    assert!(!text.contains("Markup"));
    assert!(text.contains("createElement"));
}

#[test]
fn test_async_functions_and_await() {
    let text = body_text(&compile_ok(
        "export const load = async () => { const rows = await fetchRows(); return <ul>{rows}</ul> }\n\
         export async function save() { await load() }",
    ));
    assert!(text.contains("Await"));
    assert!(text.contains("is_async: true"));
    assert!(!text.contains("Markup"));
}

#[test]
fn test_regex_literals_survive_lowering() {
    let unit = compile_ok("export const digits = /^\\d+$/g");
    let body = unit.factory.body();
    assert!(body.iter().any(|stmt| matches!(stmt, Stmt::Var(decl)
        if matches!(&decl.declarators[0].init,
            Some(Expr { kind: ExprKind::Regex { pattern, flags }, .. }) if pattern == "^\\d+$" && flags == "g"))));
}

#[test]
fn test_bitwise_and_exponent_operators() {
    let text = body_text(&compile_ok(
        "export const mix = (a: number) => ((a & 0xff) | (1 << 4)) ^ (~a >>> 1) + 2 ** 3",
    ));
    for op in ["BitAnd", "BitOr", "BitXor", "Shl", "UShr", "BitNot", "Pow"] {
        assert!(text.contains(op), "{op}");
    }
}

#[test]
fn test_for_in_and_do_while() {
    let text = body_text(&compile_ok(
        "export function keys(o: object) {\n  const out: string[] = []\n  for (const k in o) out.push(k)\n  let i = 0\n  do { i++ } while (i < 3)\n  return out\n}",
    ));
    assert!(text.contains("ForIn"));
    assert!(text.contains("DoWhile"));
}

#[test]
fn test_generic_arrow_in_tsx() {
    let unit = compile_ok(
        "export const identity = <T,>(x: T) => x\nexport default function App() { return <p>{identity('ok')}</p> }",
    );
    let body = unit.factory.body();
    assert!(body.iter().any(|stmt| matches!(stmt, Stmt::Var(decl)
        if matches!(&decl.declarators[0].init,
            Some(Expr { kind: ExprKind::Function(f), .. }) if f.is_arrow && f.params.len() == 1))));
    assert!(!body_text(&unit).contains("Markup"));
}

#[test]
fn test_object_accessors() {
    let text = body_text(&compile_ok(
        "export const store = {\n  items: [] as string[],\n  get count() { return this.items.length },\n  set count(n: number) { this.items.length = n },\n}",
    ));
    assert!(text.contains("Getter"));
    assert!(text.contains("Setter"));
}

// ─────────────────────────────────────────────────────────────────────
// Isolation & Determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_files_compile_independently() {
    let files = [
        VirtualFile::new("index.tsx", "export default function App() { return <p>ok</p> }"),
        VirtualFile::new("Broken.tsx", "export default function ( {"),
        VirtualFile::new("util.ts", "export const add = (a: number, b: number) => a + b"),
    ];
    let outcomes: Vec<_> = files.iter().map(compile).collect();
    assert!(outcomes[0].is_ok());
    let failure = outcomes[1].as_ref().unwrap_err();
    assert_eq!(failure.path, "Broken.tsx");
    assert!(!failure.diagnostic().is_empty());
    assert!(outcomes[2].is_ok());
}

#[test]
fn test_unsupported_syntax_fails_only_that_file() {
    assert_eq!(first_error_code("class Widget {}"), ErrorCode::UNSUPPORTED_SYNTAX);
    assert!(compile_source("ok.ts", "export const ok = true").is_ok());
}

#[test]
fn test_failure_serializes() {
    let failure = compile_source("x.tsx", "const = 1").unwrap_err();
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["path"], "x.tsx");
    assert_eq!(json["errors"]["total_errors"], 1);
}

#[test]
fn test_deterministic_100_iterations() {
    let source = "import { a } from './a'\nexport default function App() { return <div>{a}</div> }";
    let first = compile_ok(source);
    for _ in 0..100 {
        let again = compile_ok(source);
        assert_eq!(*again.factory.body(), *first.factory.body());
        assert_eq!(again.factory.imports(), first.factory.imports());
    }
}
