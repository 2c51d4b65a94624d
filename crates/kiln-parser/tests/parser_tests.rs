//! Parser tests: module declarations, statements, expressions, type
//! erasure, markup, automatic semicolons, regex literals, async functions,
//! accessors, unsupported syntax and recovery.

use kiln_parser::{parse_source, ParseResult};
use kiln_types::ast::*;
use kiln_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse(source: &str) -> ParseResult {
    let sf = SourceFile::new("test.tsx", source);
    parse_source(&sf)
}

fn parse_ok(source: &str) -> Module {
    let result = parse(source);
    if result.errors.has_errors() {
        for e in &result.errors.errors {
            eprintln!("  ERROR: {e}");
        }
        panic!("unexpected parse errors (see above)");
    }
    result.module.expect("no module returned")
}

fn first_error_code(source: &str) -> ErrorCode {
    let result = parse(source);
    assert!(result.module.is_none(), "expected errors for {source:?}");
    result.errors.errors[0].code
}

/// Expression of the single expression statement in `source`.
fn expr(source: &str) -> Expr {
    let module = parse_ok(source);
    match module.items.into_iter().next() {
        Some(ModuleItem::Stmt(Stmt::Expr(stmt))) => stmt.expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn stmts(source: &str) -> Vec<Stmt> {
    parse_ok(source)
        .items
        .into_iter()
        .filter_map(|item| match item {
            ModuleItem::Stmt(stmt) => Some(stmt),
            _ => None,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────
// Imports
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_import_default_and_named() {
    let module = parse_ok("import React, { useState, useEffect as effect } from 'react';");
    let ModuleItem::Import(decl) = &module.items[0] else {
        panic!("expected import");
    };
    assert_eq!(decl.source.value, "react");
    assert_eq!(decl.default.as_ref().map(|d| d.name.as_str()), Some("React"));
    assert_eq!(decl.named.len(), 2);
    assert_eq!(decl.named[1].imported.name, "useEffect");
    assert_eq!(decl.named[1].local.name, "effect");
}

#[test]
fn test_import_namespace_and_side_effect() {
    let module = parse_ok("import * as utils from './utils'\nimport './styles.css'");
    let ModuleItem::Import(ns) = &module.items[0] else {
        panic!("expected import");
    };
    assert_eq!(ns.namespace.as_ref().map(|n| n.name.as_str()), Some("utils"));
    let ModuleItem::Import(bare) = &module.items[1] else {
        panic!("expected import");
    };
    assert!(bare.default.is_none() && bare.named.is_empty() && bare.namespace.is_none());
    assert_eq!(bare.source.value, "./styles.css");
}

#[test]
fn test_type_only_imports_are_erased() {
    let module = parse_ok(
        "import type { Props } from './types'\nimport { type Item, load } from './data'",
    );
    assert_eq!(module.items.len(), 1);
    let ModuleItem::Import(decl) = &module.items[0] else {
        panic!("expected import");
    };
    assert_eq!(decl.named.len(), 1);
    assert_eq!(decl.named[0].local.name, "load");
}

#[test]
fn test_import_default_alias() {
    let module = parse_ok("import { default as Card } from './Card'");
    let ModuleItem::Import(decl) = &module.items[0] else {
        panic!("expected import");
    };
    assert_eq!(decl.named[0].imported.name, "default");
    assert_eq!(decl.named[0].local.name, "Card");
}

#[test]
fn test_nested_import_is_misplaced() {
    assert_eq!(
        first_error_code("function f() {\n  import x from './x'\n}"),
        ErrorCode::MISPLACED_MODULE_DECL
    );
}

// ─────────────────────────────────────────────────────────────────────
// Exports
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_export_default_function() {
    let module = parse_ok("export default function App() { return null }");
    let ModuleItem::Export(ExportDecl::DefaultFunction(decl)) = &module.items[0] else {
        panic!("expected default function export");
    };
    assert_eq!(decl.name.name, "App");
}

#[test]
fn test_export_default_expression() {
    let module = parse_ok("const App = () => null\nexport default App;");
    assert!(matches!(
        &module.items[1],
        ModuleItem::Export(ExportDecl::Default { value, .. })
            if value.kind == ExprKind::Ident("App".into())
    ));
}

#[test]
fn test_export_anonymous_default_function() {
    let module = parse_ok("export default function () { return 1 }");
    assert!(matches!(
        &module.items[0],
        ModuleItem::Export(ExportDecl::Default { value, .. })
            if matches!(value.kind, ExprKind::Function(_))
    ));
}

#[test]
fn test_export_declarations() {
    let module = parse_ok("export const a = 1, b = 2\nexport function f() {}");
    assert!(matches!(&module.items[0], ModuleItem::Export(ExportDecl::Decl(Stmt::Var(d))) if d.declarators.len() == 2));
    assert!(matches!(&module.items[1], ModuleItem::Export(ExportDecl::Decl(Stmt::Function(_)))));
}

#[test]
fn test_export_named_and_reexport() {
    let module = parse_ok("export { a, b as c }\nexport { default as Button } from './Button'\nexport * from './icons'");
    let ModuleItem::Export(ExportDecl::Named { specifiers, source, .. }) = &module.items[0] else {
        panic!("expected named export");
    };
    assert!(source.is_none());
    assert_eq!(specifiers[1].exported.name, "c");
    let ModuleItem::Export(ExportDecl::Named { specifiers, source, .. }) = &module.items[1] else {
        panic!("expected re-export");
    };
    assert_eq!(source.as_ref().map(|s| s.value.as_str()), Some("./Button"));
    assert_eq!(specifiers[0].local.name, "default");
    assert!(matches!(&module.items[2], ModuleItem::Export(ExportDecl::All { source, .. }) if source.value == "./icons"));
}

#[test]
fn test_exported_types_are_erased() {
    let module = parse_ok(
        "export interface Props { label: string }\nexport type Size = 'sm' | 'lg'\nexport const x = 1",
    );
    assert_eq!(module.items.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────
// Type erasure
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_annotations_are_skipped() {
    let s = stmts(
        "type Item = { id: number; tags?: string[] }\n\
         interface Props extends Base<Item> { items: Array<Item>; onPick: (id: number) => void }\n\
         function List({ items, onPick }: Props): JSX.Element | null { return null }\n\
         const map: Record<string, Item[]> = {}\n\
         let n!: number",
    );
    assert!(matches!(s[0], Stmt::Empty(_)));
    assert!(matches!(s[1], Stmt::Empty(_)));
    assert!(matches!(&s[2], Stmt::Function(f) if f.func.params.len() == 1));
    assert!(matches!(&s[3], Stmt::Var(v) if v.declarators[0].init.is_some()));
    assert!(matches!(&s[4], Stmt::Var(v) if v.declarators[0].init.is_none()));
}

#[test]
fn test_as_casts_and_non_null_are_erased() {
    let e = expr("(value as string).length");
    assert!(matches!(e.kind, ExprKind::Member { ref property, .. } if property == "length"));
    let e = expr("el!.focus()");
    assert!(matches!(e.kind, ExprKind::Call { .. }));
    let e = expr("config as const");
    assert_eq!(e.kind, ExprKind::Ident("config".into()));
}

#[test]
fn test_generic_call_arguments_are_skipped() {
    let e = expr("useState<string | null>(null)");
    let ExprKind::Call { callee, args, .. } = e.kind else {
        panic!("expected call");
    };
    assert_eq!(callee.kind, ExprKind::Ident("useState".into()));
    assert_eq!(args.len(), 1);
}

#[test]
fn test_comparison_is_not_mistaken_for_type_arguments() {
    let e = expr("a < b && c > (d)");
    assert!(matches!(e.kind, ExprKind::Logical { op: LogicalOp::And, .. }));
}

#[test]
fn test_arrow_with_typed_params_and_return_type() {
    let e = expr("(a: number, b?: string): number => a");
    let ExprKind::Function(f) = e.kind else {
        panic!("expected arrow");
    };
    assert!(f.is_arrow);
    assert_eq!(f.params.len(), 2);
    assert!(matches!(f.body, FunctionBody::Expr(_)));
}

#[test]
fn test_generic_arrow_with_trailing_comma() {
    let e = expr("<T,>(x: T): T => x");
    let ExprKind::Function(f) = e.kind else {
        panic!("expected arrow");
    };
    assert!(f.is_arrow);
    assert_eq!(f.params.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_precedence() {
    let e = expr("1 + 2 * 3");
    let ExprKind::Binary { op, right, .. } = e.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
}

#[test]
fn test_exponent_is_right_associative() {
    let e = expr("2 ** 3 ** 2");
    let ExprKind::Binary { left, right, .. } = e.kind else {
        panic!("expected binary");
    };
    assert_eq!(left.kind, ExprKind::Number(2.0));
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
}

#[test]
fn test_bitwise_operators() {
    let e = expr("a | b & c ^ ~d");
    let ExprKind::Binary { op, right, .. } = e.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::BitOr);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::BitXor, .. }));
    assert!(matches!(expr("x >>> 2").kind, ExprKind::Binary { op: BinOp::UShr, .. }));
    assert!(matches!(expr("x >> 2").kind, ExprKind::Binary { op: BinOp::Shr, .. }));
}

#[test]
fn test_regex_literal_and_division() {
    assert_eq!(
        expr("/ab+c/gi").kind,
        ExprKind::Regex {
            pattern: "ab+c".into(),
            flags: "gi".into()
        }
    );
    let e = expr("s.replace(/[/]\\//g, '-')");
    let ExprKind::Call { args, .. } = e.kind else {
        panic!("expected call");
    };
    assert!(matches!(&args[0], Argument::Expr(Expr { kind: ExprKind::Regex { pattern, .. }, .. }) if pattern == "[/]\\/"));
    let e = expr("total / count / 2");
    assert!(matches!(e.kind, ExprKind::Binary { op: BinOp::Div, .. }));
}

#[test]
fn test_object_accessors() {
    let e = expr("({ get a() { return 1 }, set a(v) {}, get: 1 })");
    let ExprKind::Object(props) = e.kind else {
        panic!("expected object");
    };
    assert!(matches!(&props[0], PropDef::Getter(PropKey::Named(k), _) if k == "a"));
    assert!(matches!(&props[1], PropDef::Setter(PropKey::Named(k), f) if f.params.len() == 1 && k == "a"));
    assert!(matches!(&props[2], PropDef::KeyValue(PropKey::Named(k), _) if k == "get"));
}

#[test]
fn test_async_functions_and_await() {
    let s = stmts(
        "async function load() { await fetchRows() }\n\
         const twice = async (n: number) => (await load()) + n",
    );
    let Stmt::Function(decl) = &s[0] else {
        panic!("expected function declaration");
    };
    assert!(decl.func.is_async);
    let FunctionBody::Block(body) = &decl.func.body else {
        panic!("expected block body");
    };
    assert!(matches!(&body.stmts[0], Stmt::Expr(e) if matches!(e.expr.kind, ExprKind::Await(_))));
    let Stmt::Var(var) = &s[1] else {
        panic!("expected declaration");
    };
    assert!(matches!(
        &var.declarators[0].init,
        Some(Expr { kind: ExprKind::Function(f), .. }) if f.is_async && f.is_arrow
    ));
}

#[test]
fn test_conditional_and_nullish() {
    let e = expr("a ?? b ? c : d");
    let ExprKind::Conditional { test, .. } = e.kind else {
        panic!("expected conditional");
    };
    assert!(matches!(test.kind, ExprKind::Logical { op: LogicalOp::Nullish, .. }));
}

#[test]
fn test_optional_chaining() {
    let e = expr("user?.profile?.[key]?.()");
    let ExprKind::Call { optional, callee, .. } = e.kind else {
        panic!("expected call");
    };
    assert!(optional);
    assert!(matches!(callee.kind, ExprKind::Index { optional: true, .. }));
}

#[test]
fn test_object_literal_forms() {
    let e = expr("({ a, b: 1, 'c-d': 2, [k]: 3, ...rest, m() { return 1 }, default: 4 })");
    let ExprKind::Object(props) = e.kind else {
        panic!("expected object");
    };
    assert_eq!(props.len(), 7);
    assert!(matches!(&props[0], PropDef::Shorthand(i) if i.name == "a"));
    assert!(matches!(&props[2], PropDef::KeyValue(PropKey::Named(k), _) if k == "c-d"));
    assert!(matches!(&props[3], PropDef::KeyValue(PropKey::Computed(_), _)));
    assert!(matches!(&props[4], PropDef::Spread(_)));
    assert!(matches!(&props[5], PropDef::Method(PropKey::Named(k), _) if k == "m"));
    assert!(matches!(&props[6], PropDef::KeyValue(PropKey::Named(k), _) if k == "default"));
}

#[test]
fn test_array_literal_with_holes_and_spread() {
    let e = expr("[1, , ...xs]");
    let ExprKind::Array(elems) = e.kind else {
        panic!("expected array");
    };
    assert_eq!(elems.len(), 3);
    assert!(matches!(elems[1], ArrayElem::Hole));
    assert!(matches!(elems[2], ArrayElem::Spread(_)));
}

#[test]
fn test_template_literal() {
    let e = expr("`Hello ${name}!`");
    let ExprKind::Template(parts) = e.kind else {
        panic!("expected template");
    };
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], TemplatePart::Literal("Hello ".into()));
    assert_eq!(parts[2], TemplatePart::Literal("!".into()));
}

#[test]
fn test_compound_assignment_and_update() {
    let e = expr("count += 1");
    assert!(matches!(e.kind, ExprKind::Assign { op: AssignOp::Add, .. }));
    let e = expr("i++");
    assert!(matches!(e.kind, ExprKind::Update { prefix: false, .. }));
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(first_error_code("1 = 2"), ErrorCode::INVALID_ASSIGNMENT_TARGET);
}

#[test]
fn test_new_expression() {
    let e = expr("new Date(2020, 1)");
    assert!(matches!(e.kind, ExprKind::New { ref args, .. } if args.len() == 2));
}

// ─────────────────────────────────────────────────────────────────────
// Statements & patterns
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_destructuring_declarations() {
    let s = stmts("const { a, b: { c }, d = 1, ...rest } = obj\nconst [x, , y = 2, ...zs] = arr");
    let Stmt::Var(obj) = &s[0] else {
        panic!("expected var");
    };
    let names: Vec<&str> = obj.declarators[0]
        .pattern
        .bound_names()
        .into_iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "c", "d", "rest"]);
    let Stmt::Var(arr) = &s[1] else {
        panic!("expected var");
    };
    let Pattern::Array { elems, rest, .. } = &arr.declarators[0].pattern else {
        panic!("expected array pattern");
    };
    assert_eq!(elems.len(), 3);
    assert!(elems[1].is_none());
    assert_eq!(rest.as_ref().map(|r| r.name.as_str()), Some("zs"));
}

#[test]
fn test_control_flow_statements() {
    let s = stmts(
        "for (let i = 0; i < 3; i++) { continue }\n\
         for (const [k, v] of pairs) {}\n\
         while (x) break\n\
         if (a) b(); else { c() }\n\
         try { f() } catch (e: unknown) { g(e) } finally { h() }\n\
         throw new Error('x')",
    );
    assert!(matches!(s[0], Stmt::For(_)));
    assert!(matches!(s[1], Stmt::ForOf(_)));
    assert!(matches!(s[2], Stmt::While(_)));
    assert!(matches!(&s[3], Stmt::If(i) if i.else_branch.is_some()));
    assert!(matches!(&s[4], Stmt::Try(t) if t.param.is_some() && t.finalizer.is_some()));
    assert!(matches!(s[5], Stmt::Throw(_)));
}

#[test]
fn test_switch_for_in_and_do_while() {
    let s = stmts(
        "switch (x) { case 1: case 2: f(); break; default: g() }\n\
         for (const k in obj) {}\n\
         do { x++ } while (x < 3)",
    );
    let Stmt::Switch(switch) = &s[0] else {
        panic!("expected switch");
    };
    assert_eq!(switch.cases.len(), 3);
    assert!(switch.cases[0].body.is_empty());
    assert_eq!(switch.cases[1].body.len(), 2);
    assert!(switch.cases[2].test.is_none());
    assert!(matches!(&s[1], Stmt::ForIn(f) if f.kind == VarKind::Const));
    assert!(matches!(s[2], Stmt::DoWhile(_)));
}

#[test]
fn test_automatic_semicolons() {
    // A line starting with `[` continues the previous expression.
    let s = stmts("const a = 1\nconst b = a\n  + 2\nfoo()\n[1].forEach(f)");
    assert_eq!(s.len(), 3);
    let Stmt::Var(b) = &s[1] else {
        panic!("expected var");
    };
    assert!(matches!(b.declarators[0].init.as_ref().map(|e| &e.kind), Some(ExprKind::Binary { .. })));
    assert!(matches!(&s[2], Stmt::Expr(e) if matches!(e.expr.kind, ExprKind::Call { .. })));
}

#[test]
fn test_return_ends_at_line_break() {
    let module = parse_ok("function f() {\n  return\n  1\n}");
    let ModuleItem::Stmt(Stmt::Function(f)) = &module.items[0] else {
        panic!("expected function");
    };
    let FunctionBody::Block(body) = &f.func.body else {
        panic!("expected block body");
    };
    assert!(matches!(&body.stmts[0], Stmt::Return(r) if r.value.is_none()));
}

#[test]
fn test_missing_semicolon_on_same_line() {
    assert_eq!(first_error_code("const a = 1 const b = 2"), ErrorCode::UNEXPECTED_TOKEN);
}

#[test]
fn test_top_level_return_rejected() {
    assert_eq!(first_error_code("return 1"), ErrorCode::UNEXPECTED_TOKEN);
}

// ─────────────────────────────────────────────────────────────────────
// Markup
// ─────────────────────────────────────────────────────────────────────

fn markup(source: &str) -> MarkupElement {
    match expr(source).kind {
        ExprKind::Markup(element) => *element,
        other => panic!("expected markup, got {other:?}"),
    }
}

#[test]
fn test_markup_element_with_attributes() {
    let el = markup(r#"<button className="primary" disabled onClick={() => go(1)} {...rest}>Go</button>"#);
    assert_eq!(el.name, MarkupName::Intrinsic("button".into()));
    assert_eq!(el.attributes.len(), 4);
    assert!(matches!(&el.attributes[0], MarkupAttr::Named { name, value: Some(MarkupAttrValue::Text(t)), .. } if name == "className" && t == "primary"));
    assert!(matches!(&el.attributes[1], MarkupAttr::Named { value: None, .. }));
    assert!(matches!(&el.attributes[3], MarkupAttr::Spread(_)));
    assert_eq!(el.children, vec![MarkupChild::Text("Go".into())]);
}

#[test]
fn test_component_and_member_names() {
    let el = markup("<Ctx.Provider value={1}><Button /></Ctx.Provider>");
    assert_eq!(el.name, MarkupName::Component(vec!["Ctx".into(), "Provider".into()]));
    assert!(matches!(&el.children[0], MarkupChild::Element(b) if b.name == MarkupName::Component(vec!["Button".into()])));
}

#[test]
fn test_fragment_and_expression_children() {
    let el = markup("<>{/* note */}{items.map(i => <li key={i}>{i}</li>)}</>");
    assert_eq!(el.name, MarkupName::Fragment);
    assert_eq!(el.children[0], MarkupChild::Expr(None));
    assert!(matches!(&el.children[1], MarkupChild::Expr(Some(_))));
}

#[test]
fn test_markup_in_return_with_parentheses() {
    let module = parse_ok("export default function App() {\n  return (\n    <div>\n      <h1>Hi</h1>\n    </div>\n  )\n}");
    assert_eq!(module.items.len(), 1);
}

#[test]
fn test_mismatched_closing_tag() {
    assert_eq!(first_error_code("const x = <div></span>"), ErrorCode::MISMATCHED_CLOSING_TAG);
}

#[test]
fn test_unterminated_markup() {
    assert_eq!(first_error_code("const x = <div>"), ErrorCode::UNTERMINATED_MARKUP);
}

// ─────────────────────────────────────────────────────────────────────
// Unsupported syntax & recovery
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unsupported_constructs() {
    for source in ["class A {}", "enum Color { Red }", "const C = class {}"] {
        assert_eq!(first_error_code(source), ErrorCode::UNSUPPORTED_SYNTAX, "{source}");
    }
    let result = parse("class A {}");
    assert_eq!(result.errors.errors[0].message, "Not supported in previews: classes");
}

#[test]
fn test_recovery_reports_multiple_errors() {
    let result = parse("const = 1\nconst ok = 2\nlet = 3");
    assert!(result.module.is_none());
    assert_eq!(result.errors.total_errors, 2);
}

#[test]
fn test_nesting_limit() {
    let source = format!("const x = {}1{}", "(".repeat(150), ")".repeat(150));
    assert_eq!(first_error_code(&source), ErrorCode::NESTING_LIMIT_EXCEEDED);
}

#[test]
fn test_deterministic_100_iterations() {
    let source = "import { a } from './a'\nexport default function App({ n }: { n: number }) {\n  return <p>{a(n) ?? 'none'}</p>\n}";
    let first = parse_ok(source);
    for _ in 0..100 {
        assert_eq!(parse_ok(source), first);
    }
}
