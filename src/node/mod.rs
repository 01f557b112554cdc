//! Layout node tree.
//!
//! - [`LayoutTree`]: slotmap arena of [`LayoutNode`]s with parent/child
//!   links, construction from [`Template`](crate::template::Template)s and
//!   tree queries.
//! - Values are computed lazily and memoized in a dependency-tracked cache;
//!   mutations invalidate exactly the entries that read what changed.
//! - Lifecycle: [`LayoutTree::mount`], [`LayoutTree::update`],
//!   [`LayoutTree::unmount`].
//! - Hot reload: [`LayoutTree::apply_template`].

mod compute;
pub mod data;
pub mod deps;
mod lifecycle;
mod mutate;
mod reload;
mod scope;
pub mod tree;

pub use data::{LayoutNode, LifecycleEvent, NodeId, Phase};
pub use deps::{CacheKey, Slot};
pub use reload::UpdateReport;
pub use tree::{LayoutTree, LAYOUT_KEYS};
