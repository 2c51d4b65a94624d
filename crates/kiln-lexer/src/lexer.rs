//! Core Kiln lexer: converts source text to a token stream.
//!
//! - Script tokens including keywords, operators and number forms
//! - Template literals with `${expr}` via a mode stack
//! - Regular expression literals wherever an operand may start
//! - Element markup: tags, attribute strings, child text and `{expr}` containers
//! - `//` and `/* */` comments stripped; line breaks recorded on the next token
//! - Error recovery: collects up to [`kiln_types::MAX_ERRORS`] errors
//!
//! Whether `<` starts an element depends on the previous token: after
//! something that ends an operand it is a comparison, anywhere else it opens
//! a tag when followed by a name or `>`.

use kiln_types::{CompileErrors, ErrorCode, KilnError, SourceFile, Span};

use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside a template literal, scanning text until a backtick or `${`.
    Template,
    /// Inside `${...}`. The depth counts nested braces so the closing `}`
    /// of the interpolation can be told apart.
    Interpolation { brace_depth: u32 },
    /// Between `<` and `>` of an opening tag.
    MarkupTag,
    /// Between `</` and `>` of a closing tag.
    MarkupClosingTag,
    /// Between an opening tag and its closing tag.
    MarkupChildren,
    /// Inside a `{...}` container in markup.
    MarkupExpr { brace_depth: u32 },
}

pub struct Lexer<'src> {
    chars: Vec<char>,
    source_file: &'src SourceFile,
    file_name: &'src str,
    pos: usize,
    line: u32,
    col: u32,
    errors: CompileErrors,
    mode_stack: Vec<Mode>,
    /// Tokens to emit before the next scan (the `${` after a template head).
    pending: Vec<Token>,
    /// The last emitted token ends an operand.
    operand_ended: bool,
    /// A line break was skipped since the last emitted token.
    newline_seen: bool,
}

/// Result of lexing: tokens plus any errors collected.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            chars: source_file.source.chars().collect(),
            source_file,
            file_name: &source_file.name,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
            mode_stack: vec![Mode::Normal],
            pending: Vec::new(),
            operand_ended: false,
            newline_seen: false,
        }
    }

    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            if self.errors.is_saturated() {
                break;
            }

            if let Some(pending) = self.pending.pop() {
                self.operand_ended = pending.kind.ends_operand();
                tokens.push(pending);
                continue;
            }

            let mut token = match self.current_mode() {
                Mode::Normal | Mode::Interpolation { .. } | Mode::MarkupExpr { .. } => {
                    self.scan_code()
                }
                Mode::Template => {
                    let (line, col) = (self.line, self.col);
                    self.scan_template_text(line, col, true)
                }
                Mode::MarkupTag | Mode::MarkupClosingTag => self.scan_tag(),
                Mode::MarkupChildren => self.scan_children(),
            };
            token.newline_before = std::mem::take(&mut self.newline_seen);
            self.operand_ended = token.kind.ends_operand();

            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Mode stack helpers
    // ─────────────────────────────────────────────────────────────

    fn current_mode(&self) -> Mode {
        *self.mode_stack.last().unwrap_or(&Mode::Normal)
    }

    fn push_mode(&mut self, mode: Mode) {
        self.mode_stack.push(mode);
    }

    fn pop_mode(&mut self) {
        if self.mode_stack.len() > 1 {
            self.mode_stack.pop();
        }
    }

    fn replace_mode(&mut self, mode: Mode) {
        self.pop_mode();
        self.push_mode(mode);
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn token(&self, kind: TokenKind, start_line: u32, start_col: u32) -> Token {
        Token::new(kind, self.span_from(start_line, start_col))
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("").to_string();
        let err = KilnError::new(self.file_name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace and comments, noting line breaks.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.newline_seen = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() || ch == '\u{feff}' => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let (start_line, start_col) = (self.line, self.col);
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(ErrorCode::UNCLOSED_DELIMITER, "Unterminated comment", span);
                    return;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    return;
                }
                Some('\n') => {
                    self.newline_seen = true;
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Error for end of input while a template or element is still open.
    fn report_unclosed_modes(&mut self) {
        let span = self.current_span();
        if self
            .mode_stack
            .iter()
            .any(|m| matches!(m, Mode::Template | Mode::Interpolation { .. }))
        {
            self.emit_error(
                ErrorCode::UNTERMINATED_STRING,
                "Unterminated template literal",
                span,
            );
        }
        if self.mode_stack.iter().any(|m| {
            matches!(
                m,
                Mode::MarkupTag
                    | Mode::MarkupClosingTag
                    | Mode::MarkupChildren
                    | Mode::MarkupExpr { .. }
            )
        }) {
            self.emit_error(
                ErrorCode::UNTERMINATED_MARKUP,
                "Unterminated element: missing closing tag",
                span,
            );
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Code scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_code(&mut self) -> Token {
        self.skip_trivia();

        if self.errors.is_saturated() {
            return Token::new(TokenKind::Eof, self.current_span());
        }

        let (sl, sc) = (self.line, self.col);
        let Some(ch) = self.advance() else {
            self.report_unclosed_modes();
            return Token::new(TokenKind::Eof, self.current_span());
        };

        match ch {
            '"' | '\'' => self.scan_string(ch, sl, sc),
            '`' => self.scan_template_text(sl, sc, false),
            '0'..='9' => self.scan_number(ch, sl, sc),
            '.' if matches!(self.peek(), Some('0'..='9')) => self.scan_number(ch, sl, sc),
            c if is_ident_start(c) => self.scan_identifier(c, sl, sc),

            '<' => {
                let starts_tag = !self.operand_ended
                    && matches!(self.peek(), Some(c) if is_ident_start(c) || c == '>')
                    && !self.type_params_ahead();
                if starts_tag {
                    self.push_mode(Mode::MarkupTag);
                    self.token(TokenKind::MarkupOpen, sl, sc)
                } else if self.eat('<') {
                    let kind = if self.eat('=') {
                        TokenKind::LessLessEq
                    } else {
                        TokenKind::LessLess
                    };
                    self.token(kind, sl, sc)
                } else if self.eat('=') {
                    self.token(TokenKind::LessEq, sl, sc)
                } else {
                    self.token(TokenKind::Less, sl, sc)
                }
            }
            '>' => {
                // `>>` stays two tokens so nested type arguments close cleanly.
                if self.eat('=') {
                    self.token(TokenKind::GreaterEq, sl, sc)
                } else {
                    self.token(TokenKind::Greater, sl, sc)
                }
            }
            '=' => {
                let kind = if self.eat('>') {
                    TokenKind::Arrow
                } else if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    TokenKind::Eq
                };
                self.token(kind, sl, sc)
            }
            '!' => {
                let kind = if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                };
                self.token(kind, sl, sc)
            }
            '+' => {
                let kind = if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                };
                self.token(kind, sl, sc)
            }
            '-' => {
                let kind = if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                };
                self.token(kind, sl, sc)
            }
            '*' => {
                let kind = if self.eat('*') {
                    if self.eat('=') {
                        TokenKind::StarStarEq
                    } else {
                        TokenKind::StarStar
                    }
                } else if self.eat('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                };
                self.token(kind, sl, sc)
            }
            '/' if !self.operand_ended => self.scan_regex(sl, sc),
            '/' => {
                let kind = if self.eat('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                };
                self.token(kind, sl, sc)
            }
            '%' => {
                let kind = if self.eat('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                };
                self.token(kind, sl, sc)
            }
            '&' => {
                let kind = if self.eat('&') {
                    if self.eat('=') {
                        TokenKind::AmpAmpEq
                    } else {
                        TokenKind::AmpAmp
                    }
                } else if self.eat('=') {
                    TokenKind::AmpEq
                } else {
                    TokenKind::Amp
                };
                self.token(kind, sl, sc)
            }
            '|' => {
                let kind = if self.eat('|') {
                    if self.eat('=') {
                        TokenKind::PipePipeEq
                    } else {
                        TokenKind::PipePipe
                    }
                } else if self.eat('=') {
                    TokenKind::PipeEq
                } else {
                    TokenKind::Pipe
                };
                self.token(kind, sl, sc)
            }
            '?' => {
                let kind = if self.eat('?') {
                    if self.eat('=') {
                        TokenKind::QuestionQuestionEq
                    } else {
                        TokenKind::QuestionQuestion
                    }
                } else if self.peek() == Some('.') && !matches!(self.peek_at(1), Some('0'..='9'))
                {
                    self.advance();
                    TokenKind::QuestionDot
                } else {
                    TokenKind::Question
                };
                self.token(kind, sl, sc)
            }
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.advance();
                    self.advance();
                    self.token(TokenKind::DotDotDot, sl, sc)
                } else {
                    self.token(TokenKind::Dot, sl, sc)
                }
            }
            '^' => {
                let kind = if self.eat('=') {
                    TokenKind::CaretEq
                } else {
                    TokenKind::Caret
                };
                self.token(kind, sl, sc)
            }
            '~' => self.token(TokenKind::Tilde, sl, sc),
            '(' => self.token(TokenKind::LParen, sl, sc),
            ')' => self.token(TokenKind::RParen, sl, sc),
            '[' => self.token(TokenKind::LBracket, sl, sc),
            ']' => self.token(TokenKind::RBracket, sl, sc),
            ',' => self.token(TokenKind::Comma, sl, sc),
            ';' => self.token(TokenKind::Semicolon, sl, sc),
            ':' => self.token(TokenKind::Colon, sl, sc),

            '{' => {
                if let Some(
                    Mode::Interpolation { brace_depth } | Mode::MarkupExpr { brace_depth },
                ) = self.mode_stack.last_mut()
                {
                    *brace_depth += 1;
                }
                self.token(TokenKind::LBrace, sl, sc)
            }
            '}' => match self.current_mode() {
                Mode::Interpolation { brace_depth: 0 } => {
                    self.replace_mode(Mode::Template);
                    self.token(TokenKind::InterpolationEnd, sl, sc)
                }
                Mode::MarkupExpr { brace_depth: 0 } => {
                    self.pop_mode();
                    self.token(TokenKind::RBrace, sl, sc)
                }
                _ => {
                    if let Some(
                        Mode::Interpolation { brace_depth } | Mode::MarkupExpr { brace_depth },
                    ) = self.mode_stack.last_mut()
                    {
                        *brace_depth -= 1;
                    }
                    self.token(TokenKind::RBrace, sl, sc)
                }
            },

            other => {
                let span = self.span_from(sl, sc);
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("Unexpected character '{other}'"),
                    span,
                );
                self.scan_code()
            }
        }
    }

    /// After a `<` in operand position: `<T,>` or `<T extends …>` opens
    /// the type parameters of a generic arrow, not an element.
    fn type_params_ahead(&self) -> bool {
        let mut i = 0;
        while self.peek_at(i).is_some_and(is_ident_part) {
            i += 1;
        }
        while self.peek_at(i).is_some_and(|c| c == ' ' || c == '\t') {
            i += 1;
        }
        if self.peek_at(i) == Some(',') {
            return true;
        }
        let word: String = (i..i + 7).filter_map(|j| self.peek_at(j)).collect();
        word == "extends" && self.peek_at(i + 7).is_some_and(char::is_whitespace)
    }

    /// Scan a regular expression literal after its opening `/`.
    fn scan_regex(&mut self, sl: u32, sc: u32) -> Token {
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    let span = self.span_from(sl, sc);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "Unterminated regular expression",
                        span,
                    );
                    return Token::new(TokenKind::Regex { pattern, flags: String::new() }, span);
                }
                Some('/') if !in_class => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    pattern.push('\\');
                    if let Some(escaped) = self.peek().filter(|c| *c != '\n') {
                        self.advance();
                        pattern.push(escaped);
                    }
                }
                Some(ch) => {
                    match ch {
                        '[' => in_class = true,
                        ']' => in_class = false,
                        _ => {}
                    }
                    self.advance();
                    pattern.push(ch);
                }
            }
        }
        let mut flags = String::new();
        while let Some(ch) = self.peek().filter(|c| is_ident_part(*c)) {
            self.advance();
            flags.push(ch);
        }
        self.token(TokenKind::Regex { pattern, flags }, sl, sc)
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, first: char, sl: u32, sc: u32) -> Token {
        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                return self.scan_radix_number(radix, sl, sc);
            }
        }

        let mut text = String::new();
        text.push(first);
        if first != '.' {
            self.take_digits(&mut text);
            if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
                self.advance();
                text.push('.');
            }
        }
        self.take_digits(&mut text);

        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if matches!(self.peek_at(digit_at), Some('0'..='9')) {
                text.push('e');
                self.advance();
                if signed {
                    if let Some(sign) = self.advance() {
                        text.push(sign);
                    }
                }
                self.take_digits(&mut text);
            }
        }

        let span = self.span_from(sl, sc);
        let value = match text.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("Invalid number literal '{text}'"),
                    span,
                );
                0.0
            }
        };
        Token::new(TokenKind::Number(value), span)
    }

    /// Decimal digits with `_` separators dropped.
    fn take_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => text.push(ch),
                '_' => {}
                _ => break,
            }
            self.advance();
        }
    }

    fn scan_radix_number(&mut self, radix: u32, sl: u32, sc: u32) -> Token {
        let mut value = 0.0_f64;
        let mut digits = 0;
        while let Some(ch) = self.peek() {
            if ch == '_' {
                self.advance();
                continue;
            }
            let Some(digit) = ch.to_digit(radix) else {
                break;
            };
            value = value * f64::from(radix) + f64::from(digit);
            digits += 1;
            self.advance();
        }
        let span = self.span_from(sl, sc);
        if digits == 0 {
            self.emit_error(ErrorCode::UNEXPECTED_TOKEN, "Missing digits after radix prefix", span);
        }
        Token::new(TokenKind::Number(value), span)
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, first: char, sl: u32, sc: u32) -> Token {
        let mut text = String::new();
        text.push(first);
        while let Some(ch) = self.peek() {
            if !is_ident_part(ch) {
                break;
            }
            text.push(ch);
            self.advance();
        }

        let kind = TokenKind::from_keyword(&text).unwrap_or(TokenKind::Ident(text));
        self.token(kind, sl, sc)
    }

    // ─────────────────────────────────────────────────────────────
    // Strings & template literals
    // ─────────────────────────────────────────────────────────────

    /// Scan a quoted string after its opening quote.
    fn scan_string(&mut self, quote: char, sl: u32, sc: u32) -> Token {
        let mut buf = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    let span = self.span_from(sl, sc);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "Unterminated string literal",
                        span,
                    );
                    return Token::new(TokenKind::String(buf), span);
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    return self.token(TokenKind::String(buf), sl, sc);
                }
                Some('\\') => self.scan_escape_sequence(&mut buf),
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
    }

    /// Scan template text up to the closing backtick or the next `${`.
    ///
    /// `continuation` is set when resuming after an interpolation, in which
    /// case the template mode is already on the stack.
    fn scan_template_text(&mut self, sl: u32, sc: u32, continuation: bool) -> Token {
        let mut buf = String::new();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(sl, sc);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "Unterminated template literal",
                        span,
                    );
                    if continuation {
                        self.pop_mode();
                        return Token::new(TokenKind::TemplateEnd(buf), span);
                    }
                    return Token::new(TokenKind::String(buf), span);
                }
                Some('`') => {
                    self.advance();
                    if continuation {
                        self.pop_mode();
                        return self.token(TokenKind::TemplateEnd(buf), sl, sc);
                    }
                    return self.token(TokenKind::String(buf), sl, sc);
                }
                Some('\\') => self.scan_escape_sequence(&mut buf),
                Some('$') if self.peek_at(1) == Some('{') => {
                    let head = self.span_from(sl, sc);
                    let (il, ic) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    if continuation {
                        self.pop_mode();
                    }
                    self.push_mode(Mode::Interpolation { brace_depth: 0 });
                    self.pending
                        .push(self.token(TokenKind::InterpolationStart, il, ic));
                    let kind = if continuation {
                        TokenKind::TemplatePart(buf)
                    } else {
                        TokenKind::TemplateStart(buf)
                    };
                    return Token::new(kind, head);
                }
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
    }

    /// Scan an escape sequence starting at the `\` and push its value.
    fn scan_escape_sequence(&mut self, buf: &mut String) {
        let (sl, sc) = (self.line, self.col);
        self.advance();

        let Some(ch) = self.advance() else {
            let span = self.span_from(sl, sc);
            self.emit_error(
                ErrorCode::UNTERMINATED_STRING,
                "Unexpected end of file in escape sequence",
                span,
            );
            return;
        };

        match ch {
            'n' => buf.push('\n'),
            't' => buf.push('\t'),
            'r' => buf.push('\r'),
            'b' => buf.push('\u{8}'),
            'f' => buf.push('\u{c}'),
            'v' => buf.push('\u{b}'),
            '0' if !matches!(self.peek(), Some('0'..='9')) => buf.push('\0'),
            // Line continuation.
            '\n' => {}
            '\r' => {
                self.eat('\n');
            }
            'x' => {
                let code = self.take_hex(2);
                self.push_code_point(buf, code, sl, sc);
            }
            'u' => {
                let code = if self.eat('{') {
                    let mut value = 0u32;
                    let mut digits = 0;
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        value = value.saturating_mul(16).saturating_add(d);
                        digits += 1;
                        self.advance();
                    }
                    if digits > 0 && self.eat('}') {
                        Some(value)
                    } else {
                        None
                    }
                } else {
                    self.take_hex(4)
                };
                self.push_code_point(buf, code, sl, sc);
            }
            other => buf.push(other),
        }
    }

    fn take_hex(&mut self, count: usize) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = self.peek().and_then(|c| c.to_digit(16))?;
            value = value * 16 + digit;
            self.advance();
        }
        Some(value)
    }

    fn push_code_point(&mut self, buf: &mut String, code: Option<u32>, sl: u32, sc: u32) {
        match code.and_then(char::from_u32) {
            Some(ch) => buf.push(ch),
            None => {
                let span = self.span_from(sl, sc);
                self.emit_error(ErrorCode::INVALID_ESCAPE, "Invalid escape sequence", span);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Markup
    // ─────────────────────────────────────────────────────────────

    /// Scan one token inside an opening or closing tag.
    fn scan_tag(&mut self) -> Token {
        self.skip_trivia();

        if self.errors.is_saturated() {
            return Token::new(TokenKind::Eof, self.current_span());
        }

        let closing = self.current_mode() == Mode::MarkupClosingTag;
        let (sl, sc) = (self.line, self.col);
        let Some(ch) = self.advance() else {
            self.report_unclosed_modes();
            return Token::new(TokenKind::Eof, self.current_span());
        };

        match ch {
            '>' => {
                if closing {
                    self.pop_mode();
                } else {
                    self.replace_mode(Mode::MarkupChildren);
                }
                self.token(TokenKind::MarkupTagEnd, sl, sc)
            }
            '/' if !closing && self.peek() == Some('>') => {
                self.advance();
                self.pop_mode();
                self.token(TokenKind::MarkupSelfClose, sl, sc)
            }
            '=' => self.token(TokenKind::Eq, sl, sc),
            '.' => self.token(TokenKind::Dot, sl, sc),
            ':' => self.token(TokenKind::Colon, sl, sc),
            '{' => {
                self.push_mode(Mode::MarkupExpr { brace_depth: 0 });
                self.token(TokenKind::LBrace, sl, sc)
            }
            '"' | '\'' => {
                let mut buf = String::new();
                loop {
                    match self.advance() {
                        Some(c) if c == ch => {
                            return self.token(TokenKind::MarkupAttrString(buf), sl, sc)
                        }
                        Some(c) => buf.push(c),
                        None => {
                            let span = self.span_from(sl, sc);
                            self.emit_error(
                                ErrorCode::UNTERMINATED_STRING,
                                "Unterminated attribute value",
                                span,
                            );
                            return Token::new(TokenKind::MarkupAttrString(buf), span);
                        }
                    }
                }
            }
            c if is_ident_start(c) => {
                // Markup names allow `-` and are never keywords.
                let mut name = String::new();
                name.push(c);
                while let Some(next) = self.peek() {
                    if !(is_ident_part(next) || next == '-') {
                        break;
                    }
                    name.push(next);
                    self.advance();
                }
                self.token(TokenKind::Ident(name), sl, sc)
            }
            other => {
                let span = self.span_from(sl, sc);
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("Unexpected character '{other}' in element tag"),
                    span,
                );
                self.scan_tag()
            }
        }
    }

    /// Scan element content: child text, `{` containers and nested tags.
    fn scan_children(&mut self) -> Token {
        let (sl, sc) = (self.line, self.col);
        match self.peek() {
            None => {
                self.report_unclosed_modes();
                Token::new(TokenKind::Eof, self.current_span())
            }
            Some('<') => {
                self.advance();
                if self.eat('/') {
                    self.replace_mode(Mode::MarkupClosingTag);
                    self.token(TokenKind::MarkupCloseOpen, sl, sc)
                } else {
                    self.push_mode(Mode::MarkupTag);
                    self.token(TokenKind::MarkupOpen, sl, sc)
                }
            }
            Some('{') => {
                self.advance();
                self.push_mode(Mode::MarkupExpr { brace_depth: 0 });
                self.token(TokenKind::LBrace, sl, sc)
            }
            Some(_) => {
                let mut text = String::new();
                while let Some(ch) = self.peek() {
                    if ch == '<' || ch == '{' {
                        break;
                    }
                    text.push(ch);
                    self.advance();
                }
                self.token(TokenKind::MarkupText(text), sl, sc)
            }
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
