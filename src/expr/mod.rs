//! Expression engine: tokenizer, parser, compile cache and evaluator.
//!
//! Expressions are compiled once per text ([`compile`]) and evaluated many
//! times against a per-node [`Scope`].

pub mod ast;
pub mod cache;
pub mod eval;
pub mod parser;
pub mod tokenizer;

pub use ast::{BinaryOp, Expr, Segment, UnaryOp};
pub use cache::{compile, CompiledExpression, ParseMode};
pub use eval::{evaluate, Scope, FUNCTIONS};
pub use parser::{parse_expression, parse_interpolated};

/// The parse mode for a destination type: text properties interpolate.
pub fn mode_for(expected: Option<&crate::types::TypeDescriptor>) -> ParseMode {
    match expected {
        Some(crate::types::TypeDescriptor::String) => ParseMode::Interpolated,
        _ => ParseMode::Expression,
    }
}
