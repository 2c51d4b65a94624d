//! Shared types for the Kiln preview engine.
//!
//! Source spans, compile diagnostics, the module AST, the producer-facing
//! [`VirtualFile`] and the [`PreviewError`] taxonomy used at the sandbox
//! boundary.

mod error;
mod file;
mod preview;
mod span;
pub mod ast;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, KilnError, Severity, MAX_ERRORS};
pub use file::VirtualFile;
pub use preview::{PreviewError, Stage};
pub use span::{SourceFile, Span};

/// Result type used by the compile stages.
pub type Result<T> = std::result::Result<T, KilnError>;
