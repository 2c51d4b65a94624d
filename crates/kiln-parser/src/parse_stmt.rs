//! Statement, declaration and binding-pattern parsing.

use kiln_lexer::TokenKind;
use kiln_types::ast::*;
use kiln_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        if !self.enter_nesting() {
            return None;
        }
        let stmt = self.parse_statement_inner();
        self.leave_nesting();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::Const | TokenKind::Let | TokenKind::Var => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon();
                Some(Stmt::Var(decl))
            }
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Break | TokenKind::Continue => {
                let is_break = self.check(&TokenKind::Break);
                self.advance();
                if matches!(self.peek_kind(), TokenKind::Ident(_)) && !self.newline_before_current() {
                    self.unsupported("labelled jumps", start.merge(self.current_span()));
                    return None;
                }
                self.consume_semicolon();
                Some(if is_break {
                    Stmt::Break(start)
                } else {
                    Stmt::Continue(start)
                })
            }
            TokenKind::Throw => {
                self.advance();
                if self.newline_before_current() {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "line break is not allowed after 'throw'",
                    );
                    return None;
                }
                let value = self.parse_expression()?;
                self.consume_semicolon();
                let span = start.merge(value.span);
                Some(Stmt::Throw(ThrowStmt { value, span }))
            }
            TokenKind::Try => self.parse_try(),
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Semicolon => {
                self.advance();
                Some(Stmt::Empty(start))
            }
            TokenKind::Import if self.look_ahead(1) == &TokenKind::LParen => {
                self.unsupported("dynamic import()", start);
                None
            }
            TokenKind::Import | TokenKind::Export => {
                self.error_at_current(
                    ErrorCode::MISPLACED_MODULE_DECL,
                    format!(
                        "{} declarations may only appear at the top level of a module",
                        self.peek_kind()
                    ),
                );
                None
            }
            TokenKind::Do => self.parse_do_while(),
            TokenKind::Class => {
                self.unsupported("classes", start);
                None
            }
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Enum => {
                self.unsupported("enums", start);
                None
            }
            TokenKind::Ident(word)
                if word == "async"
                    && self.look_ahead(1) == &TokenKind::Function
                    && !self.newline_before_at(1) =>
            {
                self.parse_function_declaration()
            }
            TokenKind::Ident(_) if self.type_declaration_ahead() => {
                self.skip_type_declaration();
                Some(Stmt::Empty(start))
            }
            TokenKind::Ident(_) if self.look_ahead(1) == &TokenKind::Colon => {
                self.unsupported("labelled statements", start);
                None
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon();
                let span = expr.span;
                Some(Stmt::Expr(ExprStmt { expr, span }))
            }
        }
    }

    /// `{ stmt* }`
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let open = self.expect(&TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                return None;
            }
            let before = self.mark();
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
            if self.mark() == before {
                self.advance();
            }
        }
        let close = self.expect_closing(&TokenKind::RBrace, open)?.span;
        Some(Block {
            stmts,
            span: open.merge(close),
        })
    }

    /// A block that forms a function body.
    pub(crate) fn parse_function_body(&mut self) -> Option<Block> {
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        body
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        if self.function_depth == 0 {
            self.error_at(ErrorCode::UNEXPECTED_TOKEN, "'return' outside of a function", start);
            return None;
        }
        let ends_here = self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.at_end()
            || self.newline_before_current();
        let value = if ends_here {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon();
        let span = value.as_ref().map(|v| start.merge(v.span)).unwrap_or(start);
        Some(Stmt::Return(ReturnStmt { value, span }))
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let condition = self.parse_paren_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|s| stmt_span(s))
            .unwrap_or_else(|| stmt_span(&then_branch));
        Some(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch,
            span: start.merge(end),
        }))
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let condition = self.parse_paren_condition()?;
        let body = Box::new(self.parse_statement()?);
        let span = start.merge(stmt_span(&body));
        Some(Stmt::While(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    /// `do body while (cond)`
    fn parse_do_while(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::While)?;
        let condition = self.parse_paren_condition()?;
        // The semicolon after `do … while (…)` is always optional.
        self.eat(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Some(Stmt::DoWhile(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    /// `switch (value) { case a: … default: … }`
    fn parse_switch(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let discriminant = self.parse_paren_condition()?;
        let open = self.expect(&TokenKind::LBrace)?.span;
        let mut cases: Vec<SwitchCase> = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                return None;
            }
            let case_start = self.current_span();
            let test = if self.eat(&TokenKind::Case) {
                Some(self.parse_expression()?)
            } else if self.eat(&TokenKind::Default) {
                if cases.iter().any(|c| c.test.is_none()) {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "more than one 'default' clause in switch statement",
                        case_start,
                    );
                    return None;
                }
                None
            } else {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected 'case' or 'default', got {}", self.peek_kind()),
                );
                return None;
            };
            self.expect(&TokenKind::Colon)?;
            let mut body = Vec::new();
            while !matches!(
                self.peek_kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                let before = self.mark();
                match self.parse_statement() {
                    Some(stmt) => body.push(stmt),
                    None => self.synchronize(),
                }
                if self.mark() == before {
                    self.advance();
                }
            }
            cases.push(SwitchCase {
                test,
                body,
                span: case_start.merge(self.previous_span()),
            });
        }
        let close = self.expect_closing(&TokenKind::RBrace, open)?.span;
        Some(Stmt::Switch(SwitchStmt {
            discriminant,
            cases,
            span: start.merge(close),
        }))
    }

    fn parse_paren_condition(&mut self) -> Option<Expr> {
        let open = self.expect(&TokenKind::LParen)?.span;
        let condition = self.parse_expression()?;
        self.expect_closing(&TokenKind::RParen, open)?;
        Some(condition)
    }

    /// `for (init; test; update) body` or `for (const x of xs) body`
    fn parse_for(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        if self.check_word("await") {
            self.unsupported("for await", start);
            return None;
        }
        let open = self.expect(&TokenKind::LParen)?.span;

        let mut init = None;
        if let Some(kind) = self.var_kind() {
            let decl_start = self.advance().span;
            let pattern = self.parse_binding_pattern()?;
            if self.eat_word("of") {
                let iterable = self.parse_assignment()?;
                self.expect_closing(&TokenKind::RParen, open)?;
                let body = Box::new(self.parse_statement()?);
                let span = start.merge(stmt_span(&body));
                return Some(Stmt::ForOf(ForOfStmt {
                    kind,
                    pattern,
                    iterable,
                    body,
                    span,
                }));
            }
            if self.eat(&TokenKind::In) {
                let object = self.parse_expression()?;
                self.expect_closing(&TokenKind::RParen, open)?;
                let body = Box::new(self.parse_statement()?);
                let span = start.merge(stmt_span(&body));
                return Some(Stmt::ForIn(ForInStmt {
                    kind,
                    pattern,
                    object,
                    body,
                    span,
                }));
            }
            let first = self.parse_declarator_rest(kind, pattern)?;
            let mut declarators = vec![first];
            while self.eat(&TokenKind::Comma) {
                let pattern = self.parse_binding_pattern()?;
                declarators.push(self.parse_declarator_rest(kind, pattern)?);
            }
            init = Some(ForInit::Var(VarDecl {
                kind,
                declarators,
                span: decl_start.merge(self.previous_span()),
            }));
        } else if !self.check(&TokenKind::Semicolon) {
            let expr = self.parse_expression()?;
            if self.check_word("of") || self.check(&TokenKind::In) {
                self.unsupported("loops over existing bindings", expr.span);
                return None;
            }
            init = Some(ForInit::Expr(expr));
        }
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_closing(&TokenKind::RParen, open)?;

        let body = Box::new(self.parse_statement()?);
        let span = start.merge(stmt_span(&body));
        Some(Stmt::For(ForStmt {
            init,
            test,
            update,
            body,
            span,
        }))
    }

    fn parse_try(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let block = self.parse_block()?;

        let mut param = None;
        let mut handler = None;
        if self.eat(&TokenKind::Catch) {
            if let Some(open) = self.check(&TokenKind::LParen).then(|| self.advance().span) {
                param = Some(self.parse_binding_pattern()?);
                if self.eat(&TokenKind::Colon) {
                    self.expect_type()?;
                }
                self.expect_closing(&TokenKind::RParen, open)?;
            }
            handler = Some(self.parse_block()?);
        }

        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                "expected 'catch' or 'finally' after 'try' block",
            );
            return None;
        }

        let span = start.merge(self.previous_span());
        Some(Stmt::Try(TryStmt {
            block,
            param,
            handler,
            finalizer,
            span,
        }))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Variable Declarations
    // ══════════════════════════════════════════════════════════════════════════

    fn var_kind(&self) -> Option<VarKind> {
        match self.peek_kind() {
            TokenKind::Const => Some(VarKind::Const),
            TokenKind::Let => Some(VarKind::Let),
            TokenKind::Var => Some(VarKind::Var),
            _ => None,
        }
    }

    /// `const a = 1, { b } = obj` without the terminating semicolon.
    pub(crate) fn parse_var_decl(&mut self) -> Option<VarDecl> {
        let kind = self.var_kind()?;
        let start = self.advance().span;
        let mut declarators = Vec::new();
        loop {
            let pattern = self.parse_binding_pattern()?;
            declarators.push(self.parse_declarator_rest(kind, pattern)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(VarDecl {
            kind,
            declarators,
            span: start.merge(self.previous_span()),
        })
    }

    /// Type annotation and initializer after a declarator's pattern.
    fn parse_declarator_rest(&mut self, kind: VarKind, pattern: Pattern) -> Option<Declarator> {
        // Definite assignment assertion: `let x!: T`
        self.eat(&TokenKind::Bang);
        if self.eat(&TokenKind::Colon) {
            self.expect_type()?;
        }
        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        if init.is_none() && kind == VarKind::Const {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                "missing initializer in const declaration",
                pattern.span(),
            );
            return None;
        }
        if init.is_none() && !matches!(pattern, Pattern::Ident(_)) {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                "destructuring declaration requires an initializer",
                pattern.span(),
            );
            return None;
        }
        Some(Declarator { pattern, init })
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Binding Patterns & Parameters
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_binding_pattern(&mut self) -> Option<Pattern> {
        match self.peek_kind() {
            TokenKind::Ident(_) => self.expect_identifier().map(Pattern::Ident),
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected binding name or pattern, got {}", self.peek_kind()),
                );
                None
            }
        }
    }

    /// `{ a, b: c, d = 1, e: { f }, ...rest }`
    fn parse_object_pattern(&mut self) -> Option<Pattern> {
        let open = self.advance().span;
        let mut props = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(&TokenKind::DotDotDot) {
                rest = Some(self.expect_identifier()?);
                self.eat(&TokenKind::Comma);
                break;
            }
            if self.check(&TokenKind::LBracket) {
                self.unsupported("computed keys in patterns", self.current_span());
                return None;
            }
            let key = match self.peek_kind().clone() {
                TokenKind::String(value) => {
                    let span = self.advance().span;
                    Ident::new(value, span)
                }
                _ => self.expect_property_name()?,
            };
            let value = if self.eat(&TokenKind::Colon) {
                self.parse_binding_pattern()?
            } else {
                if key.name.chars().next().is_some_and(|c| !(c.is_alphabetic() || c == '_' || c == '$'))
                    || TokenKind::from_keyword(&key.name).is_some()
                {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("'{}' cannot be used as a binding name", key.name),
                        key.span,
                    );
                    return None;
                }
                Pattern::Ident(key.clone())
            };
            let default = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            props.push(ObjectPatternProp {
                key: key.name,
                value,
                default,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_closing(&TokenKind::RBrace, open)?.span;
        Some(Pattern::Object {
            props,
            rest,
            span: open.merge(close),
        })
    }

    /// `[a, , b = 1, ...rest]`
    fn parse_array_pattern(&mut self) -> Option<Pattern> {
        let open = self.advance().span;
        let mut elems = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBracket) && !self.at_end() {
            if self.eat(&TokenKind::Comma) {
                elems.push(None);
                continue;
            }
            if self.eat(&TokenKind::DotDotDot) {
                rest = Some(self.expect_identifier()?);
                self.eat(&TokenKind::Comma);
                break;
            }
            let pattern = self.parse_binding_pattern()?;
            let default = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            elems.push(Some(PatternElem { pattern, default }));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_closing(&TokenKind::RBracket, open)?.span;
        Some(Pattern::Array {
            elems,
            rest,
            span: open.merge(close),
        })
    }

    /// `(a, b?: T, { c }: Props = {}, ...rest: T[])`
    pub(crate) fn parse_params(&mut self) -> Option<Vec<Param>> {
        let open = self.expect(&TokenKind::LParen)?.span;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            // `this` parameters only carry a type.
            if self.check(&TokenKind::This) && self.look_ahead(1) == &TokenKind::Colon {
                self.advance();
                self.advance();
                self.expect_type()?;
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                continue;
            }
            let rest = self.eat(&TokenKind::DotDotDot);
            let pattern = self.parse_binding_pattern()?;
            self.eat(&TokenKind::Question);
            if self.eat(&TokenKind::Colon) {
                self.expect_type()?;
            }
            let default = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                pattern,
                default,
                rest,
            });
            if rest || !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_closing(&TokenKind::RParen, open)?;
        Some(params)
    }

    /// Everything after `function [name]`: type parameters, parameters,
    /// return type and body.
    pub(crate) fn parse_function_rest(
        &mut self,
        name: Option<Ident>,
        start: Span,
        is_async: bool,
    ) -> Option<Function> {
        if self.check(&TokenKind::Less) {
            self.expect_type_params()?;
        }
        let params = self.parse_params()?;
        if self.eat(&TokenKind::Colon) {
            self.expect_type()?;
        }
        let body = self.parse_function_body()?;
        let span = start.merge(body.span);
        Some(Function {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            is_async,
            span,
        })
    }
}

pub(crate) fn stmt_span(stmt: &Stmt) -> Span {
    match stmt {
        Stmt::Var(d) => d.span,
        Stmt::Function(f) => f.func.span,
        Stmt::Return(r) => r.span,
        Stmt::If(i) => i.span,
        Stmt::For(f) => f.span,
        Stmt::ForOf(f) => f.span,
        Stmt::ForIn(f) => f.span,
        Stmt::While(w) | Stmt::DoWhile(w) => w.span,
        Stmt::Switch(s) => s.span,
        Stmt::Break(s) | Stmt::Continue(s) | Stmt::Empty(s) => *s,
        Stmt::Throw(t) => t.span,
        Stmt::Try(t) => t.span,
        Stmt::Block(b) => b.span,
        Stmt::Expr(e) => e.span,
        Stmt::BindImport(b) => b.local.span,
        Stmt::ExportAll(m) => m.span,
    }
}
