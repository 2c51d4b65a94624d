use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of diagnostics stored per file before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Unsupported,
    Module,
    Structure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syntax => "syntax",
            Self::Unsupported => "unsupported",
            Self::Module => "module",
            Self::Structure => "structure",
        };
        f.write_str(name)
    }
}

/// Numeric diagnostic code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_DELIMITER: Self = Self(101);
    pub const UNTERMINATED_STRING: Self = Self(102);
    pub const INVALID_ESCAPE: Self = Self(103);
    pub const UNTERMINATED_MARKUP: Self = Self(104);
    pub const MISMATCHED_CLOSING_TAG: Self = Self(105);
    pub const INVALID_ASSIGNMENT_TARGET: Self = Self(106);

    // ── Unsupported syntax (E200–E299) ──
    pub const UNSUPPORTED_SYNTAX: Self = Self(200);

    // ── Module structure (E300–E399) ──
    pub const MISPLACED_MODULE_DECL: Self = Self(300);
    pub const DUPLICATE_EXPORT: Self = Self(301);
    pub const INVALID_SPECIFIER: Self = Self(302);

    // ── Structural limits (E400–E499) ──
    pub const NESTING_LIMIT_EXCEEDED: Self = Self(400);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Unsupported,
            300..=399 => ErrorCategory::Module,
            _ => ErrorCategory::Structure,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A structured compile diagnostic for one file.
///
/// The diagnostic surface renders these fields directly; nothing
/// downstream parses the message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KilnError {
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The source line the span starts on.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl KilnError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for KilnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for KilnError {}

/// Diagnostics collected while compiling one file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<KilnError>,
    pub warnings: Vec<KilnError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// `true` once the error cap is reached and scanning should stop.
    pub fn is_saturated(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    pub fn push_error(&mut self, error: KilnError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    pub fn push_warning(&mut self, warning: KilnError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Append every diagnostic of `other`, respecting the cap.
    pub fn extend(&mut self, other: CompileErrors) {
        let uncounted = other.total_errors.saturating_sub(other.errors.len());
        for error in other.errors {
            self.push_error(error);
        }
        self.total_errors += uncounted;
        for warning in other.warnings {
            self.push_warning(warning);
        }
    }

    /// The first error, formatted for a one-line diagnostic.
    pub fn summary(&self) -> String {
        match self.errors.first() {
            Some(first) if self.total_errors > 1 => {
                format!("{first} (and {} more)", self.total_errors - 1)
            }
            Some(first) => first.to_string(),
            None => String::from("unknown compile error"),
        }
    }
}
