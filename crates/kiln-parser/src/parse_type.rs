//! Type annotation skipping.
//!
//! Types never reach the AST. The skippers here recognise enough of the
//! annotation grammar to find where a type ends: references with type
//! arguments, unions and intersections, arrays and tuples, object types,
//! function types, literal types and conditional types. They report nothing
//! themselves so expression parsing can use them speculatively.

use kiln_lexer::TokenKind;
use kiln_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Skip a type, reporting an error if none is present.
    pub(crate) fn expect_type(&mut self) -> Option<()> {
        if self.skip_type() {
            Some(())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected type, got {}", self.peek_kind()),
            );
            None
        }
    }

    /// Skip `<T, U extends V = W>`.
    pub(crate) fn expect_type_params(&mut self) -> Option<()> {
        if self.skip_balanced(&TokenKind::Less, &TokenKind::Greater) {
            Some(())
        } else {
            self.error_at_current(ErrorCode::UNCLOSED_DELIMITER, "unterminated type parameter list");
            None
        }
    }

    pub(crate) fn skip_type(&mut self) -> bool {
        if matches!(self.peek_kind(), TokenKind::Pipe | TokenKind::Amp) {
            self.advance();
        }
        loop {
            if !self.skip_type_operand() {
                return false;
            }
            if matches!(self.peek_kind(), TokenKind::Pipe | TokenKind::Amp) {
                self.advance();
                continue;
            }
            break;
        }
        if self.check(&TokenKind::Extends) {
            self.advance();
            if !self.skip_type_operand() || !self.eat(&TokenKind::Question) {
                return false;
            }
            if !self.skip_type() || !self.eat(&TokenKind::Colon) {
                return false;
            }
            return self.skip_type();
        }
        true
    }

    fn skip_type_operand(&mut self) -> bool {
        while ["keyof", "readonly", "unique", "infer"]
            .iter()
            .any(|word| self.check_word(word))
            && matches!(
                self.look_ahead(1),
                TokenKind::Ident(_) | TokenKind::LBracket | TokenKind::LParen | TokenKind::LBrace
            )
        {
            self.advance();
        }

        match self.peek_kind() {
            TokenKind::Typeof => {
                self.advance();
                if !self.skip_type_name() {
                    return false;
                }
            }
            TokenKind::Ident(_) => {
                if !self.skip_type_name() {
                    return false;
                }
                if self.check(&TokenKind::Less) && !self.skip_balanced(&TokenKind::Less, &TokenKind::Greater) {
                    return false;
                }
                // Type predicates: `value is string`
                if self.check_word("is") {
                    self.advance();
                    return self.skip_type_operand();
                }
            }
            TokenKind::Null
            | TokenKind::Void
            | TokenKind::This
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Number(_)
            | TokenKind::String(_) => {
                self.advance();
            }
            TokenKind::Minus if matches!(self.look_ahead(1), TokenKind::Number(_)) => {
                self.advance();
                self.advance();
            }
            TokenKind::TemplateStart(_) => {
                while !matches!(self.peek_kind(), TokenKind::TemplateEnd(_) | TokenKind::Eof) {
                    self.advance();
                }
                if !matches!(self.advance().kind, TokenKind::TemplateEnd(_)) {
                    return false;
                }
            }
            TokenKind::LParen => {
                if self.function_type_ahead() {
                    return self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)
                        && self.eat(&TokenKind::Arrow)
                        && self.skip_type();
                }
                self.advance();
                if !self.skip_type() || !self.eat(&TokenKind::RParen) {
                    return false;
                }
            }
            TokenKind::Less => {
                return self.skip_balanced(&TokenKind::Less, &TokenKind::Greater)
                    && self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)
                    && self.eat(&TokenKind::Arrow)
                    && self.skip_type();
            }
            TokenKind::New => {
                self.advance();
                if self.check(&TokenKind::Less) && !self.skip_balanced(&TokenKind::Less, &TokenKind::Greater) {
                    return false;
                }
                return self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)
                    && self.eat(&TokenKind::Arrow)
                    && self.skip_type();
            }
            TokenKind::LBracket => {
                if !self.skip_balanced(&TokenKind::LBracket, &TokenKind::RBracket) {
                    return false;
                }
            }
            TokenKind::LBrace => {
                if !self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace) {
                    return false;
                }
            }
            _ => return false,
        }

        // Array and indexed-access suffixes.
        while self.check(&TokenKind::LBracket) && !self.newline_before_current() {
            if !self.skip_balanced(&TokenKind::LBracket, &TokenKind::RBracket) {
                return false;
            }
        }
        true
    }

    /// `Name` or `A.B.C`, keywords allowed after a dot.
    fn skip_type_name(&mut self) -> bool {
        if !matches!(self.peek_kind(), TokenKind::Ident(_)) && !self.peek_kind().is_keyword() {
            return false;
        }
        self.advance();
        while self.check(&TokenKind::Dot) {
            self.advance();
            if !matches!(self.peek_kind(), TokenKind::Ident(_)) && !self.peek_kind().is_keyword() {
                return false;
            }
            self.advance();
        }
        true
    }

    /// At `(`: does the matching `)` precede `=>`?
    fn function_type_ahead(&mut self) -> bool {
        let mark = self.mark();
        let result = self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)
            && self.check(&TokenKind::Arrow);
        self.reset(mark);
        result
    }

    /// Skip from `open` to its matching `close`. `false` if the current
    /// token is not `open` or the input ends first.
    pub(crate) fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) -> bool {
        if !self.check(open) {
            return false;
        }
        let mut depth = 0usize;
        loop {
            let kind = self.peek_kind();
            if kind == &TokenKind::Eof {
                return false;
            }
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    return true;
                }
            }
            self.advance();
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Type-only Declarations
    // ══════════════════════════════════════════════════════════════════════════

    /// `type X = …`, `interface X {…}` or `declare …` at the cursor.
    pub(crate) fn type_declaration_ahead(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Ident(word) if word == "type" => {
                matches!(self.look_ahead(1), TokenKind::Ident(_))
                    && matches!(self.look_ahead(2), TokenKind::Eq | TokenKind::Less)
            }
            TokenKind::Ident(word) if word == "interface" => {
                matches!(self.look_ahead(1), TokenKind::Ident(_))
            }
            TokenKind::Ident(word) if word == "declare" => matches!(
                self.look_ahead(1),
                TokenKind::Ident(_)
                    | TokenKind::Const
                    | TokenKind::Let
                    | TokenKind::Var
                    | TokenKind::Function
                    | TokenKind::Class
                    | TokenKind::Enum
            ),
            _ => false,
        }
    }

    pub(crate) fn skip_type_declaration(&mut self) {
        let start = self.current_span();
        let ok = if self.eat_word("type") {
            self.advance();
            (!self.check(&TokenKind::Less) || self.skip_balanced(&TokenKind::Less, &TokenKind::Greater))
                && self.eat(&TokenKind::Eq)
                && self.skip_type()
        } else if self.eat_word("interface") {
            self.advance();
            if self.check(&TokenKind::Less) {
                self.skip_balanced(&TokenKind::Less, &TokenKind::Greater);
            }
            if self.eat(&TokenKind::Extends) {
                while self.skip_type_operand() && self.eat(&TokenKind::Comma) {}
            }
            self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)
        } else {
            self.advance();
            self.skip_ambient_declaration();
            true
        };
        if !ok {
            self.error_at(ErrorCode::UNEXPECTED_TOKEN, "malformed type declaration", start);
            self.synchronize();
            return;
        }
        self.eat(&TokenKind::Semicolon);
    }

    /// Skip the body of a `declare` statement up to its end.
    fn skip_ambient_declaration(&mut self) {
        let mut depth = 0usize;
        let mut consumed = false;
        while !self.at_end() {
            if depth == 0 && consumed && self.newline_before_current() {
                return;
            }
            match self.peek_kind() {
                TokenKind::Semicolon if depth == 0 => return,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
            consumed = true;
        }
    }
}
