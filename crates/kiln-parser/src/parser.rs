//! Core parser infrastructure: token cursor, error reporting, helpers.

use kiln_lexer::{Lexer, Token, TokenKind};
use kiln_types::ast::{Ident, Module};
use kiln_types::{CompileErrors, ErrorCode, KilnError, SourceFile, Span};

/// Maximum nesting of expressions, statements and elements.
pub(crate) const MAX_NESTING: u32 = 100;

/// Consumes a token stream produced by the lexer and builds a [`Module`].
/// Collects errors and recovers at statement boundaries.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    file_name: String,
    errors: CompileErrors,
    /// Current nesting depth across expressions, blocks and markup.
    pub(crate) depth: u32,
    /// Statements nested inside a function body.
    pub(crate) function_depth: u32,
}

pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: CompileErrors,
}

/// Lex and parse one source file.
///
/// Lexer diagnostics come first; the module is withheld when either stage
/// reported an error.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let mut errors = lexed.errors;
    let parsed = Parser::new(lexed.tokens, source_file).parse();
    errors.extend(parsed.errors);
    let module = if errors.has_errors() { None } else { parsed.module };
    ParseResult { module, errors }
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            file_name: source_file.name.clone(),
            source_file,
            errors: CompileErrors::empty(),
            depth: 0,
            function_depth: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        static EOF: Token = Token {
            kind: TokenKind::Eof,
            span: Span::SYNTHETIC,
            newline_before: false,
        };
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span,
            None => Span::point(1, 1),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// `true` if the current token is the identifier `word`.
    pub(crate) fn check_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(name) if name == word)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    pub(crate) fn newline_before_current(&self) -> bool {
        self.peek().newline_before
    }

    /// The token at `pos + n` starts on the column right after the one
    /// before it ends, with nothing in between.
    pub(crate) fn joined_at(&self, n: usize) -> bool {
        let (Some(prev), Some(next)) = (
            n.checked_sub(1).and_then(|i| self.tokens.get(self.pos + i)),
            self.tokens.get(self.pos + n),
        ) else {
            return false;
        };
        prev.span.end_line == next.span.start_line && prev.span.end_col + 1 == next.span.start_col
    }

    /// Line break before the token `n` positions ahead.
    pub(crate) fn newline_before_at(&self, n: usize) -> bool {
        self.tokens
            .get(self.pos + n)
            .is_some_and(|t| t.newline_before)
    }

    pub(crate) fn previous_kind(&self) -> Option<&TokenKind> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)).map(|t| &t.kind)
    }

    /// Saved cursor position for speculative parsing.
    pub(crate) fn mark(&self) -> usize {
        self.pos
    }

    pub(crate) fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }

    // ── Statement Termination ─────────────────────────────────────────────────

    /// Consume a `;`, or accept an inserted one before `}`, end of file or a
    /// line break.
    pub(crate) fn consume_semicolon(&mut self) {
        if self.eat(&TokenKind::Semicolon) {
            return;
        }
        if self.at_end() || self.check(&TokenKind::RBrace) || self.newline_before_current() {
            return;
        }
        self.error_at_current(
            ErrorCode::UNEXPECTED_TOKEN,
            format!("expected ';', got {}", self.peek_kind()),
        );
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected {expected}, got {}", self.peek_kind()),
            );
            None
        }
    }

    /// Expect a closing delimiter, reporting the opening one on failure.
    pub(crate) fn expect_closing(&mut self, expected: &TokenKind, opened_at: Span) -> Option<Token> {
        if self.check(expected) {
            return Some(self.advance());
        }
        let span = self.current_span();
        let message = format!(
            "expected {expected} to close the one opened at {opened_at}, got {}",
            self.peek_kind()
        );
        self.error_at(ErrorCode::UNCLOSED_DELIMITER, message, span);
        None
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected identifier, got {}", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Expect an identifier or a keyword used as a property name
    /// (`obj.default`, `{ case: 1 }`).
    pub(crate) fn expect_property_name(&mut self) -> Option<Ident> {
        let kind = self.peek_kind().clone();
        match &kind {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Some(Ident::new(name.clone(), span))
            }
            _ => match kind.keyword_text() {
                Some(text) => {
                    let span = self.advance().span;
                    Some(Ident::new(text, span))
                }
                None => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected property name, got {}", self.peek_kind()),
                    );
                    None
                }
            },
        }
    }

    pub(crate) fn expect_string(&mut self) -> Option<(String, Span)> {
        match self.peek_kind().clone() {
            TokenKind::String(value) => {
                let span = self.advance().span;
                Some((value, span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected string literal, got {}", self.peek_kind()),
                );
                None
            }
        }
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self
            .source_file
            .line(span.start_line)
            .unwrap_or("")
            .to_string();
        let error = KilnError::new(&self.file_name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    /// Report a construct outside the supported subset.
    pub(crate) fn unsupported(&mut self, what: &str, span: Span) {
        self.errors.push_error(
            KilnError::new(
                &self.file_name,
                ErrorCode::UNSUPPORTED_SYNTAX,
                format!("Not supported in previews: {what}"),
                span,
                self.source_file.line(span.start_line).unwrap_or(""),
            )
            .with_suggestion("rewrite it with functions, objects and arrays"),
        );
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_saturated()
    }

    /// Enter one nesting level; `false` (with an error) past the limit.
    pub(crate) fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            self.error_at_current(
                ErrorCode::NESTING_LIMIT_EXCEEDED,
                format!("maximum nesting depth is {MAX_NESTING}"),
            );
            self.depth -= 1;
            return false;
        }
        true
    }

    pub(crate) fn leave_nesting(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip tokens until a likely statement boundary.
    pub(crate) fn synchronize(&mut self) {
        let start = self.pos;
        while !self.at_end() {
            if self.pos > start && self.newline_before_current() {
                return;
            }
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace if self.pos > start => return,
                TokenKind::Const
                | TokenKind::Let
                | TokenKind::Var
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Import
                | TokenKind::Export
                    if self.pos > start =>
                {
                    return
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    pub fn parse(mut self) -> ParseResult {
        let module = self.parse_module();
        ParseResult {
            module,
            errors: self.errors,
        }
    }
}
