//! Node types: NodeId, LayoutNode, Phase.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use slotmap::new_key_type;

use crate::error::LayoutError;
use crate::geometry::Rect;
use crate::host::ViewAdapter;
use crate::template::Template;
use crate::types::registry;
use crate::types::{ClassTypes, TypeDescriptor, Value};

new_key_type! {
    /// Unique identifier for a layout node. Copy, lightweight (u64).
    ///
    /// Ids are never reused while a stale copy could observe the slot, so
    /// a removed node's id reliably reports "gone".
    pub struct NodeId;
}

/// Lifecycle phase of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Constructed; expressions stored, nothing evaluated.
    Unattached,
    /// Mounted and every committed value is current.
    Attached,
    /// Mounted, with these properties invalidated since the last commit.
    Dirty(BTreeSet<String>),
    /// Being torn down.
    Unmounting,
}

impl Phase {
    pub fn is_attached(&self) -> bool {
        matches!(self, Phase::Attached | Phase::Dirty(_))
    }
}

/// Events produced as nodes move through their lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Mount { node: NodeId },
    Unmount { node: NodeId },
    /// Changed values were committed to the node's view.
    Update { node: NodeId },
}

/// The live counterpart of a [`Template`].
pub struct LayoutNode {
    pub(crate) class: String,
    pub(crate) types: Rc<ClassTypes>,
    pub(crate) id: Option<String>,
    pub(crate) expressions: BTreeMap<String, String>,
    /// Declared parameters, resolved to descriptors.
    pub(crate) parameters: BTreeMap<String, TypeDescriptor>,
    pub(crate) macros: BTreeMap<String, String>,
    pub(crate) state: BTreeMap<String, Value>,
    pub(crate) constants: BTreeMap<String, Value>,
    pub(crate) body: Option<String>,
    /// The template this node was built from, without children.
    pub(crate) template: Template,
    pub(crate) root_resource: Option<String>,
    pub(crate) view: Option<Box<dyn ViewAdapter>>,
    pub(crate) phase: Phase,
    /// External template requested but not yet applied.
    pub(crate) pending_template: Option<String>,
    /// The referencing element this node was composed from, children
    /// included. Set once its external template has been applied.
    pub(crate) reference: Option<Template>,
    pub(crate) committed: BTreeMap<String, Value>,
    pub(crate) committed_frame: Option<Rect>,
    pub(crate) errors: Vec<LayoutError>,
}

impl LayoutNode {
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn expression(&self, key: &str) -> Option<&str> {
        self.expressions.get(key).map(String::as_str)
    }

    pub fn expressions(&self) -> &BTreeMap<String, String> {
        &self.expressions
    }

    pub fn state(&self) -> &BTreeMap<String, Value> {
        &self.state
    }

    pub fn constants(&self) -> &BTreeMap<String, Value> {
        &self.constants
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn root_resource(&self) -> Option<&str> {
        self.root_resource.as_deref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pending_template(&self) -> Option<&str> {
        self.pending_template.as_deref()
    }

    /// The `template="path"` element this node was composed from.
    pub fn reference(&self) -> Option<&Template> {
        self.reference.as_ref()
    }

    pub fn has_view(&self) -> bool {
        self.view.is_some()
    }

    /// Label used in cycle reports: the stable id, else the class.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.class)
    }

    /// Whether `key` names something this node can be asked for.
    pub(crate) fn knows(&self, key: &str) -> bool {
        self.types.contains(key) || self.parameters.contains_key(key)
    }

    /// The declared type of `key`: parameters first, then the class's
    /// memoized expression types.
    pub(crate) fn type_of(&self, key: &str) -> Option<TypeDescriptor> {
        if let Some(ty) = self.parameters.get(key) {
            return Some(ty.clone());
        }
        registry::expression_type(&self.class, key).unwrap_or_else(|_| self.types.get(key).cloned())
    }
}

impl fmt::Debug for LayoutNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutNode")
            .field("class", &self.class)
            .field("id", &self.id)
            .field("expressions", &self.expressions)
            .field("phase", &self.phase)
            .field("has_view", &self.view.is_some())
            .finish()
    }
}
