//! Runtime error types for the Kiln evaluator.

use std::fmt;

use crate::value::{error_text, Value};

/// Built-in error classes raised by the evaluator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Reference,
    Range,
    Syntax,
}

impl ErrorKind {
    pub fn class_name(self) -> &'static str {
        match self {
            ErrorKind::Type => "TypeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Syntax => "SyntaxError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Evaluation error: thrown script values, evaluator-raised errors, module
/// failures and resource limits.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// `throw value` that nothing caught.
    #[error("{}", describe_thrown(.0))]
    Thrown(Value),

    #[error("{kind}: {message}")]
    Native { kind: ErrorKind, message: String },

    /// A relative import that resolved to no registered file.
    #[error("Module not found: '{specifier}' (imported from {from_path})")]
    ModuleNotFound { from_path: String, specifier: String },

    /// A failure raised while a module factory ran.
    #[error("{error}")]
    InModule { path: String, error: Box<EvalError> },

    /// Step budget spent; not catchable by script code.
    #[error("Execution step limit of {0} exceeded")]
    GasExhausted(u64),

    /// Call nesting too deep; not catchable by script code.
    #[error("Maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    /// `require` chain too deep; not catchable by script code.
    #[error("Maximum module nesting of {0} exceeded")]
    ModuleDepthExceeded(usize),

    /// `await` on a promise nothing can settle. Unwinds to the enclosing
    /// async call, which yields a pending promise.
    #[error("Awaited a promise that never settles")]
    Suspended,
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;

fn describe_thrown(value: &Value) -> String {
    match value {
        Value::Object(obj) if obj.class() == crate::value::ObjectClass::Error => error_text(obj),
        other => other.to_display(),
    }
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::Native {
            kind: ErrorKind::Type,
            message: message.into(),
        }
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        EvalError::Native {
            kind: ErrorKind::Reference,
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        EvalError::Native {
            kind: ErrorKind::Range,
            message: message.into(),
        }
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        EvalError::Native {
            kind: ErrorKind::Syntax,
            message: message.into(),
        }
    }

    /// Script `try`/`catch` may observe this error.
    pub fn is_catchable(&self) -> bool {
        match self {
            EvalError::GasExhausted(_)
            | EvalError::CallDepthExceeded(_)
            | EvalError::ModuleDepthExceeded(_)
            | EvalError::Suspended => false,
            EvalError::InModule { error, .. } => error.is_catchable(),
            _ => true,
        }
    }

    /// The path of the innermost module the error was raised in.
    pub fn module_path(&self) -> Option<&str> {
        match self {
            EvalError::InModule { path, error } => error.module_path().or(Some(path)),
            EvalError::ModuleNotFound { from_path, .. } => Some(from_path),
            _ => None,
        }
    }

    /// The error with module attribution stripped.
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::InModule { error, .. } => error.root(),
            other => other,
        }
    }

    /// Attribute the error to `path` unless it already carries a module.
    pub fn in_module(self, path: &str) -> Self {
        match self {
            EvalError::InModule { .. } | EvalError::ModuleNotFound { .. } => self,
            other => EvalError::InModule {
                path: path.to_string(),
                error: Box::new(other),
            },
        }
    }
}
