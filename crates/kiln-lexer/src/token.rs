//! Token types for the Kiln lexer.
//!
//! [`TokenKind`] covers the script subset the preview compiler accepts plus
//! the markup-specific lexemes produced while scanning element tags and
//! children. [`Token`] pairs a kind with its [`Span`].

use kiln_types::Span;
use std::fmt;

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator separates this token from the previous one.
    /// Drives automatic semicolon insertion in the parser.
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            newline_before: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────
    Number(f64),
    /// Quoted string or a template literal without substitutions.
    String(String),
    /// `/pattern/flags`, body undecoded.
    Regex { pattern: String, flags: String },

    // ── Template literals ────────────────────────────────────
    /// Text before the first `${` of a template literal.
    TemplateStart(String),
    /// Text between a `}` and the next `${`.
    TemplatePart(String),
    /// Text after the last `}` up to the closing backtick.
    TemplateEnd(String),
    InterpolationStart,
    InterpolationEnd,

    // ── Identifiers ──────────────────────────────────────────
    /// Identifier, including contextual words such as `of`, `as`, `from`, `type`.
    Ident(String),

    // ── Keywords ─────────────────────────────────────────────
    Const,
    Let,
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    New,
    Typeof,
    Void,
    Delete,
    In,
    Instanceof,
    This,
    Null,
    True,
    False,
    Import,
    Export,
    Default,
    Class,
    Extends,
    Super,
    Switch,
    Case,
    Enum,
    Yield,

    // ── Operators ────────────────────────────────────────────
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LessLessEq,
    AmpAmpEq,
    PipePipeEq,
    QuestionQuestionEq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    /// `<<`. A right shift stays separate `>` tokens so nested type
    /// arguments close cleanly; the parser joins adjacent ones.
    LessLess,
    AmpAmp,
    PipePipe,
    QuestionQuestion,
    Bang,
    Question,
    QuestionDot,
    /// `&`: bitwise and, or an intersection type.
    Amp,
    /// `|`: bitwise or, or a union type.
    Pipe,
    Caret,
    Tilde,
    Arrow,
    DotDotDot,

    // ── Punctuation ──────────────────────────────────────────
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    // ── Markup ───────────────────────────────────────────────
    /// `<` opening an element tag.
    MarkupOpen,
    /// `</` opening a closing tag.
    MarkupCloseOpen,
    /// `>` ending a tag.
    MarkupTagEnd,
    /// `/>` ending a self-closing tag.
    MarkupSelfClose,
    /// Raw text between tags.
    MarkupText(String),
    /// Quoted attribute value, undecoded.
    MarkupAttrString(String),

    Eof,
}

impl TokenKind {
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "const" => TokenKind::Const,
            "let" => TokenKind::Let,
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "throw" => TokenKind::Throw,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "new" => TokenKind::New,
            "typeof" => TokenKind::Typeof,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "in" => TokenKind::In,
            "instanceof" => TokenKind::Instanceof,
            "this" => TokenKind::This,
            "null" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "import" => TokenKind::Import,
            "export" => TokenKind::Export,
            "default" => TokenKind::Default,
            "class" => TokenKind::Class,
            "extends" => TokenKind::Extends,
            "super" => TokenKind::Super,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "enum" => TokenKind::Enum,
            "yield" => TokenKind::Yield,
            _ => return None,
        })
    }

    /// Source spelling of a keyword token.
    ///
    /// Keywords are valid property names (`obj.default`, `{ case: 1 }`), so
    /// the parser asks for the spelling wherever a property name is expected.
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Const => "const",
            TokenKind::Let => "let",
            TokenKind::Var => "var",
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Throw => "throw",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::New => "new",
            TokenKind::Typeof => "typeof",
            TokenKind::Void => "void",
            TokenKind::Delete => "delete",
            TokenKind::In => "in",
            TokenKind::Instanceof => "instanceof",
            TokenKind::This => "this",
            TokenKind::Null => "null",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::Default => "default",
            TokenKind::Class => "class",
            TokenKind::Extends => "extends",
            TokenKind::Super => "super",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Enum => "enum",
            TokenKind::Yield => "yield",
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        self.keyword_text().is_some()
    }

    /// `true` if this token can end an operand, so a following `<` is a
    /// comparison rather than the start of an element.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Regex { .. }
                | TokenKind::TemplateEnd(_)
                | TokenKind::Ident(_)
                | TokenKind::This
                | TokenKind::Super
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::MarkupTagEnd
                | TokenKind::MarkupSelfClose
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.keyword_text() {
            return write!(f, "'{text}'");
        }
        match self {
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::String(s) => write!(f, "string \"{s}\""),
            TokenKind::Regex { pattern, flags } => write!(f, "regular expression /{pattern}/{flags}"),
            TokenKind::TemplateStart(_)
            | TokenKind::TemplatePart(_)
            | TokenKind::TemplateEnd(_) => f.write_str("template literal"),
            TokenKind::InterpolationStart => f.write_str("'${'"),
            TokenKind::InterpolationEnd => f.write_str("'}'"),
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::MarkupText(_) => f.write_str("markup text"),
            TokenKind::MarkupAttrString(s) => write!(f, "attribute value \"{s}\""),
            TokenKind::Eof => f.write_str("end of file"),
            other => write!(f, "'{}'", other.punct_text()),
        }
    }
}

impl TokenKind {
    fn punct_text(&self) -> &'static str {
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::StarStarEq => "**=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::LessLessEq => "<<=",
            TokenKind::AmpAmpEq => "&&=",
            TokenKind::PipePipeEq => "||=",
            TokenKind::QuestionQuestionEq => "??=",
            TokenKind::EqEq => "==",
            TokenKind::EqEqEq => "===",
            TokenKind::BangEq => "!=",
            TokenKind::BangEqEq => "!==",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEq => "<=",
            TokenKind::GreaterEq => ">=",
            TokenKind::LessLess => "<<",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Bang => "!",
            TokenKind::Question => "?",
            TokenKind::QuestionDot => "?.",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Arrow => "=>",
            TokenKind::DotDotDot => "...",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::MarkupOpen => "<",
            TokenKind::MarkupCloseOpen => "</",
            TokenKind::MarkupTagEnd => ">",
            TokenKind::MarkupSelfClose => "/>",
            _ => "?",
        }
    }
}
