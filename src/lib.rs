//! # relayout
//!
//! An expression-driven, hot-reloadable declarative layout engine.
//!
//! Layouts are trees of [`Template`](template::Template)s whose properties are
//! bound to small expressions (`parent.width - 20`, `previous.bottom + 8`,
//! `"Hello {name}"`). A [`LayoutTree`](node::LayoutTree) evaluates them lazily,
//! memoizes every value with the dependencies it read, and on each mutation
//! invalidates exactly what depended on the change. Views live behind the
//! [`Host`](host::Host) and [`ViewAdapter`](host::ViewAdapter) traits, so the
//! engine never touches a UI toolkit.
//!
//! ## Core Systems
//!
//! - **[`types`]**: runtime values, type descriptors, per-class property tables
//! - **[`expr`]**: logos tokenizer, parser, compile cache, evaluator
//! - **[`node`]**: slotmap-backed layout tree, dependency-tracked value cache,
//!   lifecycle, hot reload
//! - **[`loader`]**: template construction with async nested templates
//! - **[`reload`]**: reload registry and the document observer
//! - **[`diagnostics`]**: ranked "did you mean" suggestions
//! - **[`testing`]**: headless recording host and snapshot helpers
//! - **[`geometry`]**: Point, Size, Rect, Insets primitives

// Foundation
pub mod config;
pub mod error;
pub mod geometry;

// Types and expressions
pub mod diagnostics;
pub mod expr;
pub mod types;

// Layout
pub mod host;
pub mod node;
pub mod template;

// Loading and reload
pub mod cache;
pub mod loader;
pub mod reload;

// Headless testing
pub mod testing;

pub use config::EngineConfig;
pub use error::{LayoutError, SymbolError, SymbolErrorKind};
pub use node::{LayoutTree, NodeId};
pub use template::Template;

// Proc macros (feature-gated)
#[cfg(feature = "macros")]
pub use relayout_macros::template;
