//! Process-wide compiled-expression cache.
//!
//! Keyed by parse mode and source text. Lives on the UI thread like the rest
//! of the engine's caches; [`clear`] drops every entry so the next
//! [`compile`] parses afresh.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::LayoutError;

use super::ast::Expr;
use super::parser::{parse_expression, parse_interpolated};

/// How expression text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseMode {
    /// A formula: `parent.width - 20`.
    Expression,
    /// Literal text with `{expr}` segments, used for string destinations.
    Interpolated,
}

/// A parsed expression with the symbol paths it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub source: String,
    pub mode: ParseMode,
    pub expr: Expr,
    pub symbols: Vec<String>,
}

thread_local! {
    static COMPILED: RefCell<HashMap<(ParseMode, String), Rc<CompiledExpression>>> =
        RefCell::new(HashMap::new());
}

/// Parse `source`, reusing a cached result when one exists.
///
/// Parse failures are not cached; they are cheap to reproduce and always
/// identical for the same text.
pub fn compile(source: &str, mode: ParseMode) -> Result<Rc<CompiledExpression>, LayoutError> {
    let key = (mode, source.to_owned());
    if let Some(hit) = COMPILED.with(|c| c.borrow().get(&key).cloned()) {
        return Ok(hit);
    }

    let expr = match mode {
        ParseMode::Expression => parse_expression(source)?,
        ParseMode::Interpolated => parse_interpolated(source)?,
    };
    let compiled = Rc::new(CompiledExpression {
        source: source.to_owned(),
        mode,
        symbols: expr.symbols(),
        expr,
    });
    tracing::trace!(source, ?mode, "compiled expression");
    COMPILED.with(|c| c.borrow_mut().insert(key, Rc::clone(&compiled)));
    Ok(compiled)
}

/// Drop every cached expression.
pub fn clear() {
    COMPILED.with(|c| c.borrow_mut().clear());
}

/// Number of cached expressions.
pub fn len() -> usize {
    COMPILED.with(|c| c.borrow().len())
}
