//! Kiln parser: converts a token stream into a module AST.
//!
//! Type annotations, type-only declarations and type arguments are consumed
//! and dropped here, so nothing downstream sees TypeScript syntax.

mod parse_expr;
mod parse_markup;
mod parse_module;
mod parse_stmt;
mod parse_type;
mod parser;

pub use parser::{parse_source, ParseResult, Parser};
