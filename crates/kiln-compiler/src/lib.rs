//! Kiln per-file compiler.
//!
//! ```text
//! VirtualFile → Lexer → Parser (types erased) → Lowering → CompiledUnit
//! ```
//!
//! Every file compiles on its own: nothing here looks at other files or
//! runs any of the code it produces. The output [`Factory`] is a flat
//! statement list in which
//!
//! - markup has become `React.createElement(type, props, ...children)`,
//! - imports have become `require(specifier)` plus live import bindings,
//! - exports have become assignments on the injected `exports` object.
//!
//! The loader decides when (and whether) a factory runs.

mod lower;
mod text;

use kiln_parser::parse_source;
use kiln_types::ast::Stmt;
use kiln_types::{CompileErrors, SourceFile, VirtualFile};
use serde::Serialize;
use std::sync::Arc;

pub use lower::{lower_module, Lowered};

/// One file's compiled factory, ready to be invoked by the loader.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub path: String,
    pub factory: Factory,
}

/// The executable form of one module.
///
/// Invoked with `require`, `exports` and `module` bound in its scope;
/// running it fills in `exports` as a side effect.
#[derive(Debug, Clone)]
pub struct Factory {
    body: Arc<[Stmt]>,
    imports: Vec<String>,
    exports: Vec<String>,
}

impl Factory {
    /// Shared handle to the lowered statements.
    pub fn body(&self) -> Arc<[Stmt]> {
        Arc::clone(&self.body)
    }

    /// Module specifiers in the order the module requires them.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Names the module exports, excluding `export *` re-exports.
    pub fn exports(&self) -> &[String] {
        &self.exports
    }
}

/// A file that did not compile. Recorded per file; never aborts a batch.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("compilation failed in {path}: {}", .errors.summary())]
pub struct CompileFailure {
    pub path: String,
    pub errors: CompileErrors,
}

impl CompileFailure {
    /// One-line diagnostic for the preview surface.
    pub fn diagnostic(&self) -> String {
        self.errors.summary()
    }
}

/// Compile one file into a [`CompiledUnit`].
pub fn compile(file: &VirtualFile) -> Result<CompiledUnit, CompileFailure> {
    compile_source(&file.path, &file.source_text)
}

/// Compile `source` as the module at `path`.
pub fn compile_source(path: &str, source: &str) -> Result<CompiledUnit, CompileFailure> {
    let source_file = SourceFile::new(path, source);
    let parsed = parse_source(&source_file);

    let Some(module) = parsed.module else {
        tracing::debug!(path, errors = parsed.errors.total_errors, "parse failed");
        return Err(CompileFailure {
            path: path.to_string(),
            errors: parsed.errors,
        });
    };

    let lowered = lower_module(module, &source_file);
    if lowered.errors.has_errors() {
        tracing::debug!(path, errors = lowered.errors.total_errors, "lowering failed");
        return Err(CompileFailure {
            path: path.to_string(),
            errors: lowered.errors,
        });
    }

    tracing::debug!(
        path,
        statements = lowered.body.len(),
        imports = lowered.imports.len(),
        exports = lowered.exports.len(),
        "compiled module"
    );
    Ok(CompiledUnit {
        path: path.to_string(),
        factory: Factory {
            body: lowered.body.into(),
            imports: lowered.imports,
            exports: lowered.exports,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_names_the_file() {
        let failure = compile_source("src/Broken.tsx", "const = 1").unwrap_err();
        assert_eq!(failure.path, "src/Broken.tsx");
        let message = failure.to_string();
        assert!(message.starts_with("compilation failed in src/Broken.tsx: src/Broken.tsx:1:7"));
    }

    #[test]
    fn test_factory_body_is_shared() {
        let unit = compile_source("a.ts", "export const a = 1").unwrap();
        let first = unit.factory.body();
        let second = unit.factory.body();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
