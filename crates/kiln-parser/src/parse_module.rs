//! Module-level parsing: imports, exports and top-level statements.

use kiln_lexer::TokenKind;
use kiln_types::ast::*;
use kiln_types::{ErrorCode, Span};
use std::sync::Arc;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    pub(crate) fn parse_module(&mut self) -> Option<Module> {
        let start = self.current_span();
        let mut items = Vec::new();

        while !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            let before = self.mark();
            match self.parse_module_item() {
                Some(Some(item)) => items.push(item),
                Some(None) => {}
                None => self.synchronize(),
            }
            if self.mark() == before {
                // Recovery must always make progress.
                self.advance();
            }
        }

        let span = start.merge(self.previous_span());
        Some(Module { items, span })
    }

    /// `Some(None)` for items erased entirely (type-only imports and exports).
    fn parse_module_item(&mut self) -> Option<Option<ModuleItem>> {
        match self.peek_kind() {
            // `import(...)` and `import.meta` are expressions, not declarations.
            TokenKind::Import
                if !matches!(self.look_ahead(1), TokenKind::LParen | TokenKind::Dot) =>
            {
                self.parse_import().map(|decl| decl.map(ModuleItem::Import))
            }
            TokenKind::Export => self.parse_export().map(|decl| decl.map(ModuleItem::Export)),
            _ => self.parse_statement().map(|stmt| Some(ModuleItem::Stmt(stmt))),
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Imports
    // ══════════════════════════════════════════════════════════════════════════

    /// ```text
    /// import "source"
    /// import Default from "source"
    /// import Default, { a, b as c } from "source"
    /// import * as ns from "source"
    /// import type { T } from "source"
    /// ```
    fn parse_import(&mut self) -> Option<Option<ImportDecl>> {
        let start = self.advance().span;

        if let TokenKind::String(_) = self.peek_kind() {
            let (value, span) = self.expect_string()?;
            self.consume_semicolon();
            return Some(Some(ImportDecl {
                source: StrLit { value, span },
                default: None,
                namespace: None,
                named: Vec::new(),
                span: start.merge(span),
            }));
        }

        let type_only = self.check_word("type")
            && match self.look_ahead(1) {
                TokenKind::LBrace | TokenKind::Star => true,
                TokenKind::Ident(name) => name != "from",
                _ => false,
            };
        if type_only {
            self.advance();
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();

        if let TokenKind::Ident(_) = self.peek_kind() {
            default = Some(self.expect_identifier()?);
            if !self.eat(&TokenKind::Comma) {
                return self.finish_import(start, type_only, default, namespace, named);
            }
        }

        if self.eat(&TokenKind::Star) {
            if !self.eat_word("as") {
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "expected 'as' after '*'");
                return None;
            }
            namespace = Some(self.expect_identifier()?);
        } else if self.check(&TokenKind::LBrace) {
            named = self.parse_import_specifiers()?;
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected import bindings, got {}", self.peek_kind()),
            );
            return None;
        }

        self.finish_import(start, type_only, default, namespace, named)
    }

    fn finish_import(
        &mut self,
        start: Span,
        type_only: bool,
        default: Option<Ident>,
        namespace: Option<Ident>,
        named: Vec<ImportSpecifier>,
    ) -> Option<Option<ImportDecl>> {
        if !self.eat_word("from") {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected 'from', got {}", self.peek_kind()),
            );
            return None;
        }
        let (value, span) = self.expect_string()?;
        self.consume_semicolon();
        if type_only {
            return Some(None);
        }
        Some(Some(ImportDecl {
            source: StrLit { value, span },
            default,
            namespace,
            named,
            span: start.merge(span),
        }))
    }

    /// `{ a, b as c, type T, default as D }`; type-only specifiers are dropped.
    fn parse_import_specifiers(&mut self) -> Option<Vec<ImportSpecifier>> {
        let open = self.advance().span;
        let mut specifiers = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let type_only = self.type_specifier_ahead();
            if type_only {
                self.advance();
            }
            let imported = match self.peek_kind().clone() {
                TokenKind::String(value) => {
                    let span = self.advance().span;
                    Ident::new(value, span)
                }
                _ => self.expect_property_name()?,
            };
            let local = if self.eat_word("as") {
                self.expect_identifier()?
            } else {
                if imported.name == "default" {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "'default' must be renamed with 'as'",
                        imported.span,
                    );
                    return None;
                }
                imported.clone()
            };
            if !type_only {
                specifiers.push(ImportSpecifier { imported, local });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_closing(&TokenKind::RBrace, open)?;
        Some(specifiers)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Exports
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_export(&mut self) -> Option<Option<ExportDecl>> {
        let start = self.advance().span;

        match self.peek_kind().clone() {
            TokenKind::Default => {
                self.advance();
                self.parse_export_default(start).map(Some)
            }
            TokenKind::Star => {
                self.advance();
                if self.check_word("as") {
                    self.unsupported("'export * as' re-exports", start.merge(self.current_span()));
                    return None;
                }
                if !self.eat_word("from") {
                    self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "expected 'from' after 'export *'");
                    return None;
                }
                let (value, span) = self.expect_string()?;
                self.consume_semicolon();
                Some(Some(ExportDecl::All {
                    source: StrLit { value, span },
                    span: start.merge(span),
                }))
            }
            TokenKind::LBrace => self.parse_export_named(start, false).map(Some),
            TokenKind::Ident(word) if word == "type" && self.look_ahead(1) == &TokenKind::LBrace => {
                self.advance();
                self.parse_export_named(start, true)?;
                Some(None)
            }
            TokenKind::Ident(word)
                if matches!(word.as_str(), "type" | "interface" | "declare")
                    && self.type_declaration_ahead() =>
            {
                self.skip_type_declaration();
                Some(None)
            }
            TokenKind::Const | TokenKind::Let | TokenKind::Var | TokenKind::Function => {
                let stmt = self.parse_statement()?;
                Some(Some(ExportDecl::Decl(stmt)))
            }
            TokenKind::Ident(word) if word == "async" && self.look_ahead(1) == &TokenKind::Function => {
                let stmt = self.parse_statement()?;
                Some(Some(ExportDecl::Decl(stmt)))
            }
            TokenKind::Class => {
                self.unsupported("classes", self.current_span());
                None
            }
            TokenKind::Enum => {
                self.unsupported("enums", self.current_span());
                None
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected declaration after 'export', got {other}"),
                );
                None
            }
        }
    }

    fn parse_export_default(&mut self, start: Span) -> Option<ExportDecl> {
        let keyword = usize::from(self.check_word("async"));
        if self.look_ahead(keyword) == &TokenKind::Function {
            if let TokenKind::Ident(_) = self.look_ahead(keyword + 1) {
                let Stmt::Function(decl) = self.parse_function_declaration()? else {
                    return None;
                };
                return Some(ExportDecl::DefaultFunction(decl));
            }
        }
        if self.check_word("interface") && self.type_declaration_ahead() {
            self.skip_type_declaration();
            self.unsupported("'export default interface'", start);
            return None;
        }
        if self.check(&TokenKind::Class) {
            self.unsupported("classes", self.current_span());
            return None;
        }
        let value = self.parse_assignment()?;
        self.consume_semicolon();
        let span = start.merge(value.span);
        Some(ExportDecl::Default { value, span })
    }

    /// `export { a, b as c } [from "source"]`
    fn parse_export_named(&mut self, start: Span, type_only: bool) -> Option<ExportDecl> {
        let open = self.advance().span;
        let mut specifiers = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let skip = self.type_specifier_ahead();
            if skip {
                self.advance();
            }
            let local = self.expect_property_name()?;
            let exported = if self.eat_word("as") {
                self.expect_property_name()?
            } else {
                local.clone()
            };
            if !skip {
                specifiers.push(ExportSpecifier { local, exported });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_closing(&TokenKind::RBrace, open)?.span;

        let source = if self.eat_word("from") {
            let (value, span) = self.expect_string()?;
            Some(StrLit { value, span })
        } else {
            None
        };
        self.consume_semicolon();

        if type_only {
            specifiers.clear();
        }
        let end = source.as_ref().map(|s| s.span).unwrap_or(close);
        Some(ExportDecl::Named {
            specifiers,
            source,
            span: start.merge(end),
        })
    }

    /// `type T` inside an import or export list, as opposed to a binding named `type`.
    fn type_specifier_ahead(&self) -> bool {
        self.check_word("type")
            && match self.look_ahead(1) {
                TokenKind::Comma | TokenKind::RBrace => false,
                TokenKind::Ident(word) => word != "as",
                _ => true,
            }
    }

    /// Parse a `function` or `async function` declaration statement.
    pub(crate) fn parse_function_declaration(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let is_async = self.eat_word("async");
        self.expect(&TokenKind::Function)?;
        if self.check(&TokenKind::Star) {
            self.unsupported("generator functions", start);
            return None;
        }
        let name = self.expect_identifier()?;
        let func = self.parse_function_rest(Some(name.clone()), start, is_async)?;
        Some(Stmt::Function(FunctionDecl {
            name,
            func: Arc::new(func),
        }))
    }
}
