//! Lowering from the parsed module to the factory's plain statement list.
//!
//! Output order:
//!
//! ```text
//! exports.__esModule = true
//! exports.f = f            // hoisted function exports
//! const m0 = require("…")  // imports, each followed by its bindings
//! …                        // module body, exports assigned in place
//! ```
//!
//! Function exports are assigned first because function declarations are
//! hoisted: a module that is re-entered through a cycle already exposes
//! them.

use kiln_types::ast::*;
use kiln_types::{CompileErrors, ErrorCode, KilnError, SourceFile, Span};
use std::collections::HashSet;
use std::sync::Arc;

use crate::text::{clean_text, decode_entities};

/// Lowered statements plus the module's import and export lists.
pub struct Lowered {
    pub body: Vec<Stmt>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub errors: CompileErrors,
}

/// Lower a parsed module. Diagnostics end up in [`Lowered::errors`].
pub fn lower_module(module: Module, source_file: &SourceFile) -> Lowered {
    let mut lowering = Lowering::new(source_file);
    lowering.collect_function_names(&module);
    for item in module.items {
        lowering.lower_item(item);
    }
    lowering.finish()
}

struct Lowering<'a> {
    source_file: &'a SourceFile,
    errors: CompileErrors,
    imports: Vec<String>,
    exports: Vec<String>,
    exported: HashSet<String>,
    /// Top-level function declarations; exporting one is hoisted.
    functions: HashSet<String>,
    hoisted: Vec<Stmt>,
    requires: Vec<Stmt>,
    body: Vec<Stmt>,
    next_module: usize,
}

impl<'a> Lowering<'a> {
    fn new(source_file: &'a SourceFile) -> Self {
        Self {
            source_file,
            errors: CompileErrors::empty(),
            imports: Vec::new(),
            exports: Vec::new(),
            exported: HashSet::new(),
            functions: HashSet::new(),
            hoisted: Vec::new(),
            requires: Vec::new(),
            body: Vec::new(),
            next_module: 0,
        }
    }

    fn finish(self) -> Lowered {
        let mut body = Vec::with_capacity(1 + self.hoisted.len() + self.requires.len() + self.body.len());
        body.push(export_assign("__esModule", Expr::new(ExprKind::Bool(true), Span::SYNTHETIC)));
        body.extend(self.hoisted);
        body.extend(self.requires);
        body.extend(self.body);
        Lowered {
            body,
            imports: self.imports,
            exports: self.exports,
            errors: self.errors,
        }
    }

    fn error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let line = self.source_file.line(span.start_line).unwrap_or("");
        let error = KilnError::new(&self.source_file.name, code, message, span, line);
        self.errors.push_error(error);
    }

    fn collect_function_names(&mut self, module: &Module) {
        for item in &module.items {
            match item {
                ModuleItem::Stmt(Stmt::Function(decl))
                | ModuleItem::Export(ExportDecl::Decl(Stmt::Function(decl)))
                | ModuleItem::Export(ExportDecl::DefaultFunction(decl)) => {
                    self.functions.insert(decl.name.name.clone());
                }
                _ => {}
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Module Items
    // ══════════════════════════════════════════════════════════════════════════

    fn lower_item(&mut self, item: ModuleItem) {
        match item {
            ModuleItem::Import(decl) => self.lower_import(decl),
            ModuleItem::Export(decl) => self.lower_export(decl),
            ModuleItem::Stmt(mut stmt) => {
                self.lower_stmt(&mut stmt);
                self.body.push(stmt);
            }
        }
    }

    /// Emit `const mN = require(source)` and return `mN`.
    fn require(&mut self, source: &StrLit) -> Ident {
        if source.value.trim().is_empty() {
            self.error(
                ErrorCode::INVALID_SPECIFIER,
                "module specifier must not be empty",
                source.span,
            );
        }
        let module = Ident::new(format!("__kiln_m{}", self.next_module), source.span);
        self.next_module += 1;
        self.imports.push(source.value.clone());

        let call = Expr::call(
            Expr::ident("require", source.span),
            vec![Argument::Expr(Expr::string(source.value.clone(), source.span))],
            source.span,
        );
        self.requires.push(Stmt::Var(VarDecl {
            kind: VarKind::Const,
            declarators: vec![Declarator {
                pattern: Pattern::Ident(module.clone()),
                init: Some(call),
            }],
            span: source.span,
        }));
        module
    }

    fn lower_import(&mut self, decl: ImportDecl) {
        let module = self.require(&decl.source);
        let mut bind = |local: Ident, import: ImportedName| {
            self.requires.push(Stmt::BindImport(ImportBinding {
                local,
                module: module.clone(),
                import,
            }));
        };
        if let Some(local) = decl.default {
            bind(local, ImportedName::Default);
        }
        if let Some(local) = decl.namespace {
            bind(local, ImportedName::Namespace);
        }
        for spec in decl.named {
            let import = imported_name(&spec.imported.name);
            bind(spec.local, import);
        }
    }

    fn lower_export(&mut self, decl: ExportDecl) {
        match decl {
            ExportDecl::Decl(Stmt::Function(mut func)) => {
                self.declare_export(&func.name.name, func.name.span);
                self.hoisted
                    .push(export_assign(&func.name.name, ident_expr(&func.name)));
                self.lower_function(&mut func.func);
                self.body.push(Stmt::Function(func));
            }
            ExportDecl::Decl(mut stmt) => {
                self.lower_stmt(&mut stmt);
                let names: Vec<Ident> = match &stmt {
                    Stmt::Var(var) => var
                        .declarators
                        .iter()
                        .flat_map(|d| d.pattern.bound_names())
                        .cloned()
                        .collect(),
                    _ => Vec::new(),
                };
                self.body.push(stmt);
                for name in names {
                    self.declare_export(&name.name, name.span);
                    self.body.push(export_assign(&name.name, ident_expr(&name)));
                }
            }
            ExportDecl::DefaultFunction(mut func) => {
                self.declare_export("default", func.name.span);
                self.hoisted.push(export_assign("default", ident_expr(&func.name)));
                self.lower_function(&mut func.func);
                self.body.push(Stmt::Function(func));
            }
            ExportDecl::Default { mut value, span } => {
                self.declare_export("default", span);
                self.lower_expr(&mut value);
                self.body.push(export_assign("default", value));
            }
            ExportDecl::Named {
                specifiers,
                source: None,
                ..
            } => {
                for spec in specifiers {
                    self.declare_export(&spec.exported.name, spec.exported.span);
                    let assign = export_assign(&spec.exported.name, ident_expr(&spec.local));
                    if self.functions.contains(&spec.local.name) {
                        self.hoisted.push(assign);
                    } else {
                        self.body.push(assign);
                    }
                }
            }
            ExportDecl::Named {
                specifiers,
                source: Some(source),
                ..
            } => {
                let module = self.require(&source);
                for (i, spec) in specifiers.into_iter().enumerate() {
                    self.declare_export(&spec.exported.name, spec.exported.span);
                    let local = Ident::new(format!("{}_{i}", module.name), spec.local.span);
                    self.requires.push(Stmt::BindImport(ImportBinding {
                        local: local.clone(),
                        module: module.clone(),
                        import: imported_name(&spec.local.name),
                    }));
                    self.body
                        .push(export_assign(&spec.exported.name, ident_expr(&local)));
                }
            }
            ExportDecl::All { source, .. } => {
                let module = self.require(&source);
                self.body.push(Stmt::ExportAll(module));
            }
        }
    }

    fn declare_export(&mut self, name: &str, span: Span) {
        if !self.exported.insert(name.to_string()) {
            self.error(
                ErrorCode::DUPLICATE_EXPORT,
                format!("duplicate export '{name}'"),
                span,
            );
            return;
        }
        self.exports.push(name.to_string());
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════════

    fn lower_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Var(decl) => self.lower_var(decl),
            Stmt::Function(decl) => self.lower_function(&mut decl.func),
            Stmt::Return(ret) => {
                if let Some(value) = &mut ret.value {
                    self.lower_expr(value);
                }
            }
            Stmt::If(stmt) => {
                self.lower_expr(&mut stmt.condition);
                self.lower_stmt(&mut stmt.then_branch);
                if let Some(other) = &mut stmt.else_branch {
                    self.lower_stmt(other);
                }
            }
            Stmt::For(stmt) => {
                match &mut stmt.init {
                    Some(ForInit::Var(decl)) => self.lower_var(decl),
                    Some(ForInit::Expr(expr)) => self.lower_expr(expr),
                    None => {}
                }
                if let Some(test) = &mut stmt.test {
                    self.lower_expr(test);
                }
                if let Some(update) = &mut stmt.update {
                    self.lower_expr(update);
                }
                self.lower_stmt(&mut stmt.body);
            }
            Stmt::ForOf(stmt) => {
                self.lower_pattern(&mut stmt.pattern);
                self.lower_expr(&mut stmt.iterable);
                self.lower_stmt(&mut stmt.body);
            }
            Stmt::ForIn(stmt) => {
                self.lower_pattern(&mut stmt.pattern);
                self.lower_expr(&mut stmt.object);
                self.lower_stmt(&mut stmt.body);
            }
            Stmt::While(stmt) | Stmt::DoWhile(stmt) => {
                self.lower_expr(&mut stmt.condition);
                self.lower_stmt(&mut stmt.body);
            }
            Stmt::Switch(stmt) => {
                self.lower_expr(&mut stmt.discriminant);
                for case in &mut stmt.cases {
                    if let Some(test) = &mut case.test {
                        self.lower_expr(test);
                    }
                    for stmt in &mut case.body {
                        self.lower_stmt(stmt);
                    }
                }
            }
            Stmt::Throw(stmt) => self.lower_expr(&mut stmt.value),
            Stmt::Try(stmt) => {
                self.lower_block(&mut stmt.block);
                if let Some(param) = &mut stmt.param {
                    self.lower_pattern(param);
                }
                if let Some(handler) = &mut stmt.handler {
                    self.lower_block(handler);
                }
                if let Some(finalizer) = &mut stmt.finalizer {
                    self.lower_block(finalizer);
                }
            }
            Stmt::Block(block) => self.lower_block(block),
            Stmt::Expr(stmt) => self.lower_expr(&mut stmt.expr),
            Stmt::Break(_)
            | Stmt::Continue(_)
            | Stmt::Empty(_)
            | Stmt::BindImport(_)
            | Stmt::ExportAll(_) => {}
        }
    }

    fn lower_block(&mut self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_var(&mut self, decl: &mut VarDecl) {
        for declarator in &mut decl.declarators {
            self.lower_pattern(&mut declarator.pattern);
            if let Some(init) = &mut declarator.init {
                self.lower_expr(init);
            }
        }
    }

    /// Pattern defaults are expressions and may contain markup.
    fn lower_pattern(&mut self, pattern: &mut Pattern) {
        match pattern {
            Pattern::Ident(_) => {}
            Pattern::Object { props, .. } => {
                for prop in props {
                    self.lower_pattern(&mut prop.value);
                    if let Some(default) = &mut prop.default {
                        self.lower_expr(default);
                    }
                }
            }
            Pattern::Array { elems, .. } => {
                for elem in elems.iter_mut().flatten() {
                    self.lower_pattern(&mut elem.pattern);
                    if let Some(default) = &mut elem.default {
                        self.lower_expr(default);
                    }
                }
            }
        }
    }

    fn lower_function(&mut self, func: &mut Arc<Function>) {
        let func = Arc::make_mut(func);
        for param in &mut func.params {
            self.lower_pattern(&mut param.pattern);
            if let Some(default) = &mut param.default {
                self.lower_expr(default);
            }
        }
        match &mut func.body {
            FunctionBody::Block(block) => self.lower_block(block),
            FunctionBody::Expr(expr) => self.lower_expr(expr),
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn lower_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Markup(element) => {
                let element = std::mem::replace(
                    element.as_mut(),
                    MarkupElement {
                        name: MarkupName::Fragment,
                        attributes: Vec::new(),
                        children: Vec::new(),
                        span: Span::SYNTHETIC,
                    },
                );
                *expr = self.lower_markup(element);
            }
            ExprKind::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(e) = part {
                        self.lower_expr(e);
                    }
                }
            }
            ExprKind::Array(elems) => {
                for elem in elems {
                    match elem {
                        ArrayElem::Expr(e) | ArrayElem::Spread(e) => self.lower_expr(e),
                        ArrayElem::Hole => {}
                    }
                }
            }
            ExprKind::Object(props) => {
                for prop in props {
                    match prop {
                        PropDef::KeyValue(key, value) => {
                            if let PropKey::Computed(key) = key {
                                self.lower_expr(key);
                            }
                            self.lower_expr(value);
                        }
                        PropDef::Method(key, func)
                        | PropDef::Getter(key, func)
                        | PropDef::Setter(key, func) => {
                            if let PropKey::Computed(key) = key {
                                self.lower_expr(key);
                            }
                            self.lower_function(func);
                        }
                        PropDef::Spread(e) => self.lower_expr(e),
                        PropDef::Shorthand(_) => {}
                    }
                }
            }
            ExprKind::Function(func) => self.lower_function(func),
            ExprKind::Unary { operand, .. } | ExprKind::Await(operand) => self.lower_expr(operand),
            ExprKind::Update { target, .. } => self.lower_expr(target),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.lower_expr(left);
                self.lower_expr(right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.lower_expr(test);
                self.lower_expr(consequent);
                self.lower_expr(alternate);
            }
            ExprKind::Assign { target, value, .. } => {
                self.lower_expr(target);
                self.lower_expr(value);
            }
            ExprKind::Member { object, .. } => self.lower_expr(object),
            ExprKind::Index { object, index, .. } => {
                self.lower_expr(object);
                self.lower_expr(index);
            }
            ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                self.lower_expr(callee);
                self.lower_args(args);
            }
            ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex { .. }
            | ExprKind::Ident(_)
            | ExprKind::This => {}
        }
    }

    fn lower_args(&mut self, args: &mut [Argument]) {
        for arg in args {
            match arg {
                Argument::Expr(e) | Argument::Spread(e) => self.lower_expr(e),
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Markup
    // ══════════════════════════════════════════════════════════════════════════

    /// `<T a="1" {...p}>x</T>` → `React.createElement(T, { a: "1", ...p }, "x")`
    fn lower_markup(&mut self, element: MarkupElement) -> Expr {
        let span = element.span;
        let react = Expr::ident("React", span);

        let element_type = match element.name {
            MarkupName::Fragment => Expr::member(react.clone(), "Fragment", span),
            MarkupName::Intrinsic(tag) => Expr::string(tag, span),
            MarkupName::Component(path) => {
                let mut segments = path.into_iter();
                let first = segments.next().unwrap_or_default();
                segments.fold(Expr::ident(first, span), |object, segment| {
                    Expr::member(object, segment, span)
                })
            }
        };

        let props = if element.attributes.is_empty() {
            Expr::new(ExprKind::Null, span)
        } else {
            let mut defs = Vec::with_capacity(element.attributes.len());
            for attr in element.attributes {
                defs.push(self.lower_attribute(attr));
            }
            Expr::new(ExprKind::Object(defs), span)
        };

        let mut args = vec![Argument::Expr(element_type), Argument::Expr(props)];
        for child in element.children {
            match child {
                MarkupChild::Text(raw) => {
                    if let Some(text) = clean_text(&raw) {
                        args.push(Argument::Expr(Expr::string(text, span)));
                    }
                }
                MarkupChild::Expr(None) => {}
                MarkupChild::Expr(Some(mut expr)) => {
                    self.lower_expr(&mut expr);
                    args.push(Argument::Expr(expr));
                }
                MarkupChild::Element(nested) => {
                    args.push(Argument::Expr(self.lower_markup(nested)));
                }
            }
        }

        Expr::call(Expr::member(react, "createElement", span), args, span)
    }

    fn lower_attribute(&mut self, attr: MarkupAttr) -> PropDef {
        match attr {
            MarkupAttr::Named { name, value, span } => {
                let value = match value {
                    None => Expr::new(ExprKind::Bool(true), span),
                    Some(MarkupAttrValue::Text(text)) => Expr::string(decode_entities(&text), span),
                    Some(MarkupAttrValue::Expr(mut expr)) => {
                        self.lower_expr(&mut expr);
                        expr
                    }
                };
                PropDef::KeyValue(PropKey::Named(name), value)
            }
            MarkupAttr::Spread(mut expr) => {
                self.lower_expr(&mut expr);
                PropDef::Spread(expr)
            }
        }
    }
}

fn imported_name(name: &str) -> ImportedName {
    if name == "default" {
        ImportedName::Default
    } else {
        ImportedName::Named(name.to_string())
    }
}

fn ident_expr(ident: &Ident) -> Expr {
    Expr::ident(ident.name.clone(), ident.span)
}

/// `exports.<name> = value;`
fn export_assign(name: &str, value: Expr) -> Stmt {
    let span = value.span;
    let target = Expr::member(Expr::ident("exports", span), name, span);
    Stmt::Expr(ExprStmt {
        expr: Expr::assign(target, value, span),
        span,
    })
}
