//! Host-view adapter traits.
//!
//! The engine never touches a UI toolkit directly. A [`Host`] creates one
//! [`ViewAdapter`] per node at mount time; the tree pushes computed values
//! and frames into adapters and reads a few things back (current values,
//! intrinsic size).

use crate::error::HostError;
use crate::geometry::{Rect, Size};
use crate::node::{LayoutNode, NodeId};
use crate::types::Value;

/// The hosting view layer a root node is mounted into.
pub trait Host {
    /// Size of the container the root lays out in.
    fn container_size(&self) -> Size;

    /// Fallback for symbols nothing else resolves. `None` is the normal
    /// answer for keys the host does not know.
    fn layout_value(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Create the view for node `id`. `node` carries its class, stable id
    /// and expressions; nothing has been evaluated yet.
    fn make_view(&mut self, id: NodeId, node: &LayoutNode) -> Result<Box<dyn ViewAdapter>, HostError>;
}

/// One host view, owned by its node until unmount.
pub trait ViewAdapter {
    /// Apply a computed property value.
    fn set_value(&mut self, key: &str, value: &Value) -> Result<(), HostError>;

    /// Apply the computed frame.
    fn set_frame(&mut self, frame: Rect);

    /// The view's current value for a property nobody bound an expression to.
    fn value(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Natural content size, used by `auto` sizing of leaf nodes.
    fn intrinsic_size(&self) -> Option<Size> {
        None
    }

    /// A child view was inserted at `index`.
    fn did_insert_child(&mut self, _index: usize) {}

    /// The child view at `index` was removed.
    fn did_remove_child(&mut self, _index: usize) {}

    /// Tear the view down. Called exactly once, at unmount.
    fn release(&mut self) -> Result<(), HostError>;
}
