//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 1. assignment (`=`, `+=`, `??=`, …) and arrow functions (right-assoc)
//! 2. conditional `a ? b : c`
//! 3. `||`, `??`
//! 4. `&&`
//! 5. `|`
//! 6. `^`
//! 7. `&`
//! 8. `==`, `!=`, `===`, `!==`
//! 9. `<`, `>`, `<=`, `>=`, `instanceof`, `in`, `as` (type cast, erased)
//! 10. `<<`, `>>`, `>>>`
//! 11. `+`, `-`
//! 12. `*`, `/`, `%`
//! 13. `**` (right-assoc)
//! 14. unary `!`, `-`, `+`, `~`, `typeof`, `void`, `await`, prefix `++`/`--`
//! 15. postfix `++`/`--`
//! 16. member access, calls, `new`, optional chaining, non-null `!`
//!
//! The lexer never joins `>` characters, so `>>`, `>>>` and their
//! assignment forms are recognised here as adjacent `>` tokens.

use kiln_lexer::TokenKind;
use kiln_types::ast::*;
use kiln_types::{ErrorCode, Span};
use std::sync::Arc;

use crate::parser::Parser;

const RELATIONAL_PREC: u8 = 9;
const SHIFT_PREC: u8 = 10;

#[derive(Clone, Copy, PartialEq, Eq)]
enum InfixOp {
    Binary(BinOp),
    Logical(LogicalOp),
}

fn infix_operator(kind: &TokenKind) -> Option<(u8, InfixOp)> {
    use InfixOp::{Binary, Logical};
    Some(match kind {
        TokenKind::PipePipe => (3, Logical(LogicalOp::Or)),
        TokenKind::QuestionQuestion => (3, Logical(LogicalOp::Nullish)),
        TokenKind::AmpAmp => (4, Logical(LogicalOp::And)),
        TokenKind::Pipe => (5, Binary(BinOp::BitOr)),
        TokenKind::Caret => (6, Binary(BinOp::BitXor)),
        TokenKind::Amp => (7, Binary(BinOp::BitAnd)),
        TokenKind::EqEq => (8, Binary(BinOp::LooseEq)),
        TokenKind::BangEq => (8, Binary(BinOp::LooseNotEq)),
        TokenKind::EqEqEq => (8, Binary(BinOp::StrictEq)),
        TokenKind::BangEqEq => (8, Binary(BinOp::StrictNotEq)),
        TokenKind::Less => (RELATIONAL_PREC, Binary(BinOp::Less)),
        TokenKind::Greater => (RELATIONAL_PREC, Binary(BinOp::Greater)),
        TokenKind::LessEq => (RELATIONAL_PREC, Binary(BinOp::LessEq)),
        TokenKind::GreaterEq => (RELATIONAL_PREC, Binary(BinOp::GreaterEq)),
        TokenKind::Instanceof => (RELATIONAL_PREC, Binary(BinOp::InstanceOf)),
        TokenKind::In => (RELATIONAL_PREC, Binary(BinOp::In)),
        TokenKind::LessLess => (SHIFT_PREC, Binary(BinOp::Shl)),
        TokenKind::Plus => (11, Binary(BinOp::Add)),
        TokenKind::Minus => (11, Binary(BinOp::Sub)),
        TokenKind::Star => (12, Binary(BinOp::Mul)),
        TokenKind::Slash => (12, Binary(BinOp::Div)),
        TokenKind::Percent => (12, Binary(BinOp::Mod)),
        TokenKind::StarStar => (13, Binary(BinOp::Pow)),
        _ => return None,
    })
}

fn assign_operator(kind: &TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::Add,
        TokenKind::MinusEq => AssignOp::Sub,
        TokenKind::StarEq => AssignOp::Mul,
        TokenKind::SlashEq => AssignOp::Div,
        TokenKind::PercentEq => AssignOp::Mod,
        TokenKind::StarStarEq => AssignOp::Pow,
        TokenKind::AmpEq => AssignOp::BitAnd,
        TokenKind::PipeEq => AssignOp::BitOr,
        TokenKind::CaretEq => AssignOp::BitXor,
        TokenKind::LessLessEq => AssignOp::Shl,
        TokenKind::AmpAmpEq => AssignOp::And,
        TokenKind::PipePipeEq => AssignOp::Or,
        TokenKind::QuestionQuestionEq => AssignOp::Nullish,
        _ => return None,
    })
}

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Points
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    /// `AssignExpr = ArrowFn | CondExpr [ AssignOp AssignExpr ]`
    pub(crate) fn parse_assignment(&mut self) -> Option<Expr> {
        if !self.enter_nesting() {
            return None;
        }
        let expr = self.parse_assignment_inner();
        self.leave_nesting();
        expr
    }

    fn parse_assignment_inner(&mut self) -> Option<Expr> {
        let start = self.current_span();
        if self.check_word("async") && self.async_arrow_ahead() {
            self.advance();
            return self.parse_arrow(start, true);
        }
        if self.arrow_ahead() {
            return self.parse_arrow(start, false);
        }

        let target = self.parse_conditional()?;
        let (op, width) = match self.right_shift_ahead() {
            Some((BinOp::Shr, true, width)) => (AssignOp::Shr, width),
            Some((_, true, width)) => (AssignOp::UShr, width),
            _ => match assign_operator(self.peek_kind()) {
                Some(op) => (op, 1),
                None => return Some(target),
            },
        };
        if !target.is_assignable() {
            if matches!(target.kind, ExprKind::Object(_) | ExprKind::Array(_)) {
                self.unsupported("destructuring assignment", target.span);
            } else {
                self.error_at(
                    ErrorCode::INVALID_ASSIGNMENT_TARGET,
                    "invalid assignment target",
                    target.span,
                );
            }
            return None;
        }
        for _ in 0..width {
            self.advance();
        }
        let value = self.parse_assignment()?;
        let span = target.span.merge(value.span);
        Some(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Arrow Functions
    // ══════════════════════════════════════════════════════════════════════════

    /// `x =>`, `(…) =>`, `(…): T =>` or `<T,>(…) =>` at the cursor.
    fn arrow_ahead(&mut self) -> bool {
        match self.peek_kind() {
            TokenKind::Ident(_) => {
                self.look_ahead(1) == &TokenKind::Arrow && !self.newline_before_at(1)
            }
            TokenKind::LParen | TokenKind::Less => {
                let mark = self.mark();
                let mut found = !self.check(&TokenKind::Less)
                    || self.skip_balanced(&TokenKind::Less, &TokenKind::Greater);
                found = found && self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen);
                if found && self.eat(&TokenKind::Colon) {
                    found = self.skip_type();
                }
                found = found && self.check(&TokenKind::Arrow) && !self.newline_before_current();
                self.reset(mark);
                found
            }
            _ => false,
        }
    }

    /// `async x =>` or `async (…) =>` at the cursor.
    fn async_arrow_ahead(&mut self) -> bool {
        if self.newline_before_at(1) {
            return false;
        }
        match self.look_ahead(1) {
            TokenKind::Ident(_) => self.look_ahead(2) == &TokenKind::Arrow,
            TokenKind::LParen | TokenKind::Less => {
                let mark = self.mark();
                self.advance();
                let found = self.arrow_ahead();
                self.reset(mark);
                found
            }
            _ => false,
        }
    }

    /// `>>`, `>>>`, `>>=` or `>>>=` at the cursor: the operator, whether it
    /// assigns, and how many tokens spell it.
    fn right_shift_ahead(&self) -> Option<(BinOp, bool, usize)> {
        if !self.check(&TokenKind::Greater) || !self.joined_at(1) {
            return None;
        }
        match self.look_ahead(1) {
            TokenKind::GreaterEq => Some((BinOp::Shr, true, 2)),
            TokenKind::Greater if self.joined_at(2) => match self.look_ahead(2) {
                TokenKind::Greater => Some((BinOp::UShr, false, 3)),
                TokenKind::GreaterEq => Some((BinOp::UShr, true, 3)),
                _ => Some((BinOp::Shr, false, 2)),
            },
            TokenKind::Greater => Some((BinOp::Shr, false, 2)),
            _ => None,
        }
    }

    fn parse_arrow(&mut self, start: Span, is_async: bool) -> Option<Expr> {
        if self.check(&TokenKind::Less) {
            self.expect_type_params()?;
        }
        let params = if let TokenKind::Ident(_) = self.peek_kind() {
            let ident = self.expect_identifier()?;
            vec![Param {
                pattern: Pattern::Ident(ident),
                default: None,
                rest: false,
            }]
        } else {
            self.parse_params()?
        };
        if self.eat(&TokenKind::Colon) {
            self.expect_type()?;
        }
        self.expect(&TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_function_body()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        let end = match &body {
            FunctionBody::Block(block) => block.span,
            FunctionBody::Expr(expr) => expr.span,
        };
        let span = start.merge(end);
        Some(Expr::new(
            ExprKind::Function(Arc::new(Function {
                name: None,
                params,
                body,
                is_arrow: true,
                is_async,
                span,
            })),
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Conditional & Binary Operators
    // ══════════════════════════════════════════════════════════════════════════

    /// `CondExpr = BinaryExpr [ "?" AssignExpr ":" AssignExpr ]`
    fn parse_conditional(&mut self) -> Option<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = test.span.merge(alternate.span);
        Some(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    /// Precedence climbing over the binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            if (self.check_word("as") || self.check_word("satisfies"))
                && RELATIONAL_PREC >= min_prec
                && !self.newline_before_current()
            {
                self.advance();
                if !self.eat(&TokenKind::Const) {
                    self.expect_type()?;
                }
                continue;
            }

            let (prec, op, width) = match self.right_shift_ahead() {
                Some((_, true, _)) => break,
                Some((op, false, width)) => (SHIFT_PREC, InfixOp::Binary(op), width),
                None => match infix_operator(self.peek_kind()) {
                    Some((prec, op)) => (prec, op, 1),
                    None => break,
                },
            };
            if prec < min_prec {
                break;
            }
            for _ in 0..width {
                self.advance();
            }
            let next_min = if op == InfixOp::Binary(BinOp::Pow) {
                prec
            } else {
                prec + 1
            };
            let right = self.parse_binary(next_min)?;
            let span = left.span.merge(right.span);
            let kind = match op {
                InfixOp::Binary(op) => ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                InfixOp::Logical(op) => ExprKind::Logical {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            };
            left = Expr::new(kind, span);
        }
        Some(left)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Unary & Postfix
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::TypeOf),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.check(&TokenKind::PlusPlus) {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                self.advance();
                let target = self.parse_unary()?;
                return self.finish_update(op, true, target, start);
            }
            TokenKind::Delete => {
                self.unsupported("'delete'", start);
                return None;
            }
            TokenKind::Ident(word)
                if word == "await"
                    && !self.newline_before_at(1)
                    && !matches!(
                        self.look_ahead(1),
                        TokenKind::Semicolon
                            | TokenKind::RParen
                            | TokenKind::RBrace
                            | TokenKind::RBracket
                            | TokenKind::Comma
                            | TokenKind::Eof
                    )
                    && infix_operator(self.look_ahead(1)).is_none() =>
            {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                return Some(Expr::new(ExprKind::Await(Box::new(operand)), span));
            }
            _ => None,
        };

        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn finish_update(&mut self, op: UpdateOp, prefix: bool, target: Expr, start: Span) -> Option<Expr> {
        if !target.is_assignable() {
            self.error_at(
                ErrorCode::INVALID_ASSIGNMENT_TARGET,
                "invalid increment/decrement operand",
                target.span,
            );
            return None;
        }
        let span = start.merge(target.span).merge(self.previous_span());
        Some(Expr::new(
            ExprKind::Update {
                op,
                prefix,
                target: Box::new(target),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let expr = self.parse_call_member()?;
        let op = match self.peek_kind() {
            TokenKind::PlusPlus if !self.newline_before_current() => UpdateOp::Increment,
            TokenKind::MinusMinus if !self.newline_before_current() => UpdateOp::Decrement,
            _ => return Some(expr),
        };
        self.advance();
        let start = expr.span;
        self.finish_update(op, false, expr, start)
    }

    /// `Primary { "." Name | "?." … | "[" Expr "]" | Args | TypeArgs | "!" }`
    fn parse_call_member(&mut self) -> Option<Expr> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_property_name()?;
                    let span = expr.span.merge(name.span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property: name.name,
                            optional: false,
                        },
                        span,
                    );
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    expr = match self.peek_kind() {
                        TokenKind::LParen => {
                            let args = self.parse_arguments()?;
                            let span = expr.span.merge(self.previous_span());
                            Expr::new(
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    args,
                                    optional: true,
                                },
                                span,
                            )
                        }
                        TokenKind::LBracket => {
                            let index = self.parse_index()?;
                            let span = expr.span.merge(self.previous_span());
                            Expr::new(
                                ExprKind::Index {
                                    object: Box::new(expr),
                                    index: Box::new(index),
                                    optional: true,
                                },
                                span,
                            )
                        }
                        _ => {
                            let name = self.expect_property_name()?;
                            let span = expr.span.merge(name.span);
                            Expr::new(
                                ExprKind::Member {
                                    object: Box::new(expr),
                                    property: name.name,
                                    optional: true,
                                },
                                span,
                            )
                        }
                    };
                }
                TokenKind::LBracket => {
                    let index = self.parse_index()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: false,
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::call(expr, args, span);
                }
                TokenKind::Less => {
                    if !self.skip_call_type_args() {
                        break;
                    }
                }
                TokenKind::Bang if !self.newline_before_current() => {
                    // Non-null assertion.
                    self.advance();
                }
                TokenKind::TemplateStart(_) | TokenKind::String(_)
                    if !self.newline_before_current()
                        && matches!(self.previous_kind(), Some(TokenKind::Ident(_))) =>
                {
                    self.unsupported("tagged templates", self.current_span());
                    return None;
                }
                _ => break,
            }
        }
        Some(expr)
    }

    /// `f<T, U>(…)`: skip the type arguments when a call follows, otherwise
    /// leave the cursor on `<` so it parses as a comparison.
    fn skip_call_type_args(&mut self) -> bool {
        let mark = self.mark();
        self.advance();
        let mut ok = true;
        loop {
            if !self.skip_type() {
                ok = false;
                break;
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        ok = ok && self.eat(&TokenKind::Greater) && self.check(&TokenKind::LParen);
        if !ok {
            self.reset(mark);
        }
        ok
    }

    fn parse_index(&mut self) -> Option<Expr> {
        let open = self.advance().span;
        let index = self.parse_expression()?;
        self.expect_closing(&TokenKind::RBracket, open)?;
        Some(index)
    }

    /// `new Callee [TypeArgs] [Args]`
    fn parse_new(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat(&TokenKind::Dot) {
                let name = self.expect_property_name()?;
                let span = callee.span.merge(name.span);
                callee = Expr::member(callee, name.name, span);
            } else if self.check(&TokenKind::LBracket) {
                let index = self.parse_index()?;
                let span = callee.span.merge(self.previous_span());
                callee = Expr::new(
                    ExprKind::Index {
                        object: Box::new(callee),
                        index: Box::new(index),
                        optional: false,
                    },
                    span,
                );
            } else {
                break;
            }
        }
        if self.check(&TokenKind::Less) {
            self.skip_call_type_args();
        }
        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let span = start.merge(self.previous_span());
        Some(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            span,
        ))
    }

    /// `( [ "..." ] AssignExpr { "," [ "..." ] AssignExpr } [ "," ] )`
    pub(crate) fn parse_arguments(&mut self) -> Option<Vec<Argument>> {
        let open = self.expect(&TokenKind::LParen)?.span;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            if self.eat(&TokenKind::DotDotDot) {
                args.push(Argument::Spread(self.parse_assignment()?));
            } else {
                args.push(Argument::Expr(self.parse_assignment()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_closing(&TokenKind::RParen, open)?;
        Some(args)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary Expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            // ── Literals ────────────────────────────────────────────────
            TokenKind::Number(n) => {
                self.advance();
                Some(Expr::new(ExprKind::Number(n), start))
            }
            TokenKind::String(s) => {
                self.advance();
                Some(Expr::new(ExprKind::String(s), start))
            }
            TokenKind::TemplateStart(head) => {
                self.advance();
                self.parse_template(head, start)
            }
            TokenKind::Regex { pattern, flags } => {
                self.advance();
                Some(Expr::new(ExprKind::Regex { pattern, flags }, start))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(&TokenKind::True);
                self.advance();
                Some(Expr::new(ExprKind::Bool(value), start))
            }
            TokenKind::Null => {
                self.advance();
                Some(Expr::new(ExprKind::Null, start))
            }
            TokenKind::This => {
                self.advance();
                Some(Expr::new(ExprKind::This, start))
            }
            TokenKind::Ident(word)
                if word == "async"
                    && self.look_ahead(1) == &TokenKind::Function
                    && !self.newline_before_at(1) =>
            {
                self.advance();
                self.parse_function_expression(start, true)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Some(Expr::ident(name, start))
            }

            // ── Collections ─────────────────────────────────────────────
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),

            // ── Grouping ────────────────────────────────────────────────
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_closing(&TokenKind::RParen, start)?;
                let span = start.merge(self.previous_span());
                Some(Expr::new(inner.kind, span))
            }

            // ── Functions & markup ──────────────────────────────────────
            TokenKind::Function => self.parse_function_expression(start, false),
            TokenKind::MarkupOpen => {
                let element = self.parse_markup_element()?;
                let span = element.span;
                Some(Expr::new(ExprKind::Markup(Box::new(element)), span))
            }

            // ── Outside the supported subset ────────────────────────────
            TokenKind::Class => {
                self.unsupported("classes", start);
                None
            }
            TokenKind::Super => {
                self.unsupported("'super'", start);
                None
            }
            TokenKind::Import => {
                self.unsupported("dynamic import()", start);
                None
            }
            TokenKind::Yield => {
                self.unsupported("generators", start);
                None
            }

            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected expression, got {other}"),
                );
                None
            }
        }
    }

    /// `function [name](…) {…}` with the cursor on `function`.
    fn parse_function_expression(&mut self, start: Span, is_async: bool) -> Option<Expr> {
        self.advance();
        if self.check(&TokenKind::Star) {
            self.unsupported("generator functions", start);
            return None;
        }
        let name = match self.peek_kind() {
            TokenKind::Ident(_) => Some(self.expect_identifier()?),
            _ => None,
        };
        let func = self.parse_function_rest(name, start, is_async)?;
        let span = func.span;
        Some(Expr::new(ExprKind::Function(Arc::new(func)), span))
    }

    /// Template literal after its head text.
    fn parse_template(&mut self, head: String, start: Span) -> Option<Expr> {
        let mut parts = vec![TemplatePart::Literal(head)];
        loop {
            self.expect(&TokenKind::InterpolationStart)?;
            let expr = self.parse_expression()?;
            parts.push(TemplatePart::Expr(expr));
            self.expect(&TokenKind::InterpolationEnd)?;
            match self.peek_kind().clone() {
                TokenKind::TemplatePart(text) => {
                    self.advance();
                    parts.push(TemplatePart::Literal(text));
                }
                TokenKind::TemplateEnd(text) => {
                    self.advance();
                    parts.push(TemplatePart::Literal(text));
                    break;
                }
                other => {
                    self.error_at_current(
                        ErrorCode::UNTERMINATED_STRING,
                        format!("expected rest of template literal, got {other}"),
                    );
                    return None;
                }
            }
        }
        let span = start.merge(self.previous_span());
        Some(Expr::new(ExprKind::Template(parts), span))
    }

    /// `[ a, , ...b ]`
    fn parse_array_literal(&mut self) -> Option<Expr> {
        let open = self.advance().span;
        let mut elems = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.at_end() {
            if self.eat(&TokenKind::Comma) {
                elems.push(ArrayElem::Hole);
                continue;
            }
            if self.eat(&TokenKind::DotDotDot) {
                elems.push(ArrayElem::Spread(self.parse_assignment()?));
            } else {
                elems.push(ArrayElem::Expr(self.parse_assignment()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_closing(&TokenKind::RBracket, open)?.span;
        Some(Expr::new(ExprKind::Array(elems), open.merge(close)))
    }

    /// `{ a, b: 1, [k]: v, ...rest, method() {} }`
    fn parse_object_literal(&mut self) -> Option<Expr> {
        let open = self.advance().span;
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(&TokenKind::DotDotDot) {
                props.push(PropDef::Spread(self.parse_assignment()?));
            } else {
                props.push(self.parse_object_property()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_closing(&TokenKind::RBrace, open)?.span;
        Some(Expr::new(ExprKind::Object(props), open.merge(close)))
    }

    fn parse_object_property(&mut self) -> Option<PropDef> {
        let start = self.current_span();
        let modifier = match self.peek_kind() {
            TokenKind::Ident(word) if matches!(word.as_str(), "get" | "set" | "async") => word.clone(),
            _ => String::new(),
        };
        let key_follows = !matches!(
            self.look_ahead(1),
            TokenKind::Colon
                | TokenKind::Comma
                | TokenKind::RBrace
                | TokenKind::LParen
                | TokenKind::Less
                | TokenKind::Eq
        );
        if !modifier.is_empty() && key_follows {
            self.advance();
            let (key, _) = self.parse_prop_key()?;
            let name = match &key {
                PropKey::Named(name) => Some(Ident::new(name.clone(), start)),
                PropKey::Computed(_) => None,
            };
            let func = Arc::new(self.parse_function_rest(name, start, modifier == "async")?);
            return Some(match modifier.as_str() {
                "get" if func.params.is_empty() => PropDef::Getter(key, func),
                "set" if func.params.len() == 1 => PropDef::Setter(key, func),
                "async" => PropDef::Method(key, func),
                _ => {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("'{modifier}' accessor has the wrong number of parameters"),
                        func.span,
                    );
                    return None;
                }
            });
        }

        let (key, shorthand) = self.parse_prop_key()?;
        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Less) {
            let name = match &key {
                PropKey::Named(name) => Some(Ident::new(name.clone(), start)),
                PropKey::Computed(_) => None,
            };
            let func = self.parse_function_rest(name, start, false)?;
            return Some(PropDef::Method(key, Arc::new(func)));
        }
        if self.eat(&TokenKind::Colon) {
            let value = self.parse_assignment()?;
            return Some(PropDef::KeyValue(key, value));
        }
        match shorthand {
            Some(ident) if !self.check(&TokenKind::Eq) => Some(PropDef::Shorthand(ident)),
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected ':' in object literal, got {}", self.peek_kind()),
                );
                None
            }
        }
    }

    /// A property key, plus the identifier it could abbreviate.
    fn parse_prop_key(&mut self) -> Option<(PropKey, Option<Ident>)> {
        Some(match self.peek_kind().clone() {
            TokenKind::LBracket => {
                let bracket = self.advance().span;
                let key = self.parse_assignment()?;
                self.expect_closing(&TokenKind::RBracket, bracket)?;
                (PropKey::Computed(Box::new(key)), None)
            }
            TokenKind::String(value) => {
                self.advance();
                (PropKey::Named(value), None)
            }
            TokenKind::Number(n) => {
                self.advance();
                (PropKey::Named(number_key(n)), None)
            }
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                (PropKey::Named(name.clone()), Some(Ident::new(name, span)))
            }
            _ => {
                let name = self.expect_property_name()?;
                (PropKey::Named(name.name), None)
            }
        })
    }
}

/// Property name for a numeric key: `1` not `1.0`.
fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
