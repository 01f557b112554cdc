//! Error types: symbol resolution failures, layout errors, host errors.
//!
//! Every error that reaches the embedding layer carries enough context (symbol,
//! expression text, node class, resource location) to render an actionable
//! message. Errors are `Clone` because failed evaluations are memoized in the
//! value cache, and `Send` because they travel back from async template loads.

use std::fmt;

// ---------------------------------------------------------------------------
// SymbolError
// ---------------------------------------------------------------------------

/// How an unresolved symbol was encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolErrorKind {
    /// A property name used as a template attribute is not known to the class.
    UnknownProperty,
    /// A name referenced inside an expression could not be resolved.
    UnknownExpression,
    /// A static `Type.member` or enum member lookup failed.
    UnknownMember,
}

/// A symbol that could not be resolved, with ranked suggestions.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolError {
    /// The unresolved symbol, e.g. `parent.widht`.
    pub symbol: String,
    /// The enclosing expression text, if known.
    pub expression: Option<String>,
    pub kind: SymbolErrorKind,
    /// Best matches first.
    pub suggestions: Vec<String>,
    /// The failure one level down a dotted chain (`widht` on the parent for
    /// `parent.widht`).
    pub inner: Option<Box<SymbolError>>,
}

impl SymbolError {
    /// Create a symbol error with no suggestions.
    pub fn new(kind: SymbolErrorKind, symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            expression: None,
            kind,
            suggestions: Vec::new(),
            inner: None,
        }
    }

    /// Attach ranked suggestions (builder).
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Attach the enclosing expression text (builder). Keeps an existing one.
    pub fn in_expression(mut self, expression: impl Into<String>) -> Self {
        if self.expression.is_none() {
            self.expression = Some(expression.into());
        }
        self
    }

    /// Wrap a failure from further down a dotted chain (builder).
    pub fn with_inner(mut self, inner: SymbolError) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// The innermost error of a dotted chain.
    pub fn innermost(&self) -> &SymbolError {
        let mut current = self;
        while let Some(inner) = current.inner.as_deref() {
            current = inner;
        }
        current
    }
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            SymbolErrorKind::UnknownProperty => "unknown property",
            SymbolErrorKind::UnknownExpression => "unknown symbol",
            SymbolErrorKind::UnknownMember => "unknown member",
        };
        write!(f, "{what} '{}'", self.symbol)?;
        if let Some(expr) = &self.expression {
            if expr.trim() != self.symbol {
                write!(f, " in '{}'", expr.trim())?;
            }
        }
        if !self.suggestions.is_empty() {
            write!(f, "; did you mean {}?", quote_list(&self.suggestions))?;
        }
        Ok(())
    }
}

impl std::error::Error for SymbolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .as_deref()
            .map(|inner| inner as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// HostError
// ---------------------------------------------------------------------------

/// An error reported by the hosting view layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One view that failed to release during unmount.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseFailure {
    pub class: String,
    pub error: HostError,
}

// ---------------------------------------------------------------------------
// LayoutError
// ---------------------------------------------------------------------------

/// Errors produced while constructing, evaluating, reloading or tearing down a
/// layout tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error("'{property}' is unavailable: {reason}")]
    Unavailable { property: String, reason: String },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
    #[error("parse error in '{expression}' at offset {position}: {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },
    #[error("{message}")]
    Invalid { message: String },
    #[error("unknown class '{class}'{}", suggestion_suffix(.suggestions))]
    UnknownClass {
        class: String,
        suggestions: Vec<String>,
    },
    #[error("failed to load template '{path}': {message}")]
    Load { path: String, message: String },
    #[error("deferred load of '{path}' failed: {source}")]
    AsyncLoad {
        path: String,
        source: Box<LayoutError>,
    },
    #[error("{property}: {source}")]
    Property {
        property: String,
        expression: Option<String>,
        source: Box<LayoutError>,
    },
    #[error("{class}{}: {source}", resource_suffix(.resource))]
    Node {
        class: String,
        resource: Option<String>,
        source: Box<LayoutError>,
    },
    #[error("failed to release {} view(s): {}", .failures.len(), release_summary(.failures))]
    Release { failures: Vec<ReleaseFailure> },
    #[error("node no longer exists")]
    StaleNode,
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

impl LayoutError {
    /// Shorthand for [`LayoutError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        LayoutError::Invalid { message: message.into() }
    }

    /// Shorthand for a type mismatch.
    pub fn mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        LayoutError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Strip property, node and deferred-load wrappers.
    pub fn root_cause(&self) -> &LayoutError {
        match self {
            LayoutError::Property { source, .. }
            | LayoutError::Node { source, .. }
            | LayoutError::AsyncLoad { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The symbol error at the root of this error, if any.
    pub fn symbol_error(&self) -> Option<&SymbolError> {
        match self.root_cause() {
            LayoutError::Symbol(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the root cause is a dependency cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self.root_cause(), LayoutError::CyclicDependency { .. })
    }

    /// Whether this error (or its root cause) was produced at construction time
    /// and must abort construction of the affected node.
    pub fn is_fatal(&self) -> bool {
        match self.root_cause() {
            LayoutError::CyclicDependency { .. }
            | LayoutError::UnknownClass { .. }
            | LayoutError::Unavailable { .. }
            | LayoutError::Load { .. } => true,
            LayoutError::Symbol(err) => err.kind == SymbolErrorKind::UnknownProperty,
            _ => false,
        }
    }

    /// The resource location attached by the nearest node wrapper, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            LayoutError::Node { resource: Some(resource), .. } => Some(resource),
            LayoutError::Node { source, .. }
            | LayoutError::Property { source, .. }
            | LayoutError::AsyncLoad { source, .. } => source.resource(),
            _ => None,
        }
    }
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean {}?", quote_list(suggestions))
    }
}

fn resource_suffix(resource: &Option<String>) -> String {
    match resource {
        Some(resource) => format!(" in {resource}"),
        None => String::new(),
    }
}

fn release_summary(failures: &[ReleaseFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.class, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}
