//! The layout tree arena: construction, structure queries, walks.

use std::collections::{BTreeMap, BTreeSet};

use slotmap::{SecondaryMap, SlotMap};

use crate::diagnostics::best_matches;
use crate::error::{LayoutError, SymbolError, SymbolErrorKind};
use crate::expr::{self, ParseMode};
use crate::geometry::Size;
use crate::host::Host;
use crate::template::{Template, TEMPLATE_KEY};
use crate::types::registry::{self, type_named, types_for};
use crate::types::{ClassTypes, TypeDescriptor};

use super::data::{LayoutNode, LifecycleEvent, NodeId, Phase};
use super::deps::{CacheKey, DependencyGraph, Slot};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// Layout properties computed by the geometry rules.
pub const LAYOUT_KEYS: &[&str] = &[
    "left", "top", "right", "bottom", "width", "height", "center.x", "center.y",
];

pub(crate) fn is_layout_key(key: &str) -> bool {
    LAYOUT_KEYS.contains(&key)
}

/// The tree of live layout nodes, backed by a slotmap arena.
///
/// Parent links are non-owning ids; a removed node's id simply stops
/// resolving, which is how late async completions detect staleness.
pub struct LayoutTree {
    pub(crate) nodes: SlotMap<NodeId, LayoutNode>,
    pub(super) children: SecondaryMap<NodeId, Vec<NodeId>>,
    pub(super) parent: SecondaryMap<NodeId, NodeId>,
    pub(crate) graph: DependencyGraph,
    /// Hosts of mounted roots.
    pub(super) hosts: SecondaryMap<NodeId, Box<dyn Host>>,
    /// Container sizes of mounted roots.
    pub(super) containers: SecondaryMap<NodeId, Size>,
    pub(super) events: Vec<LifecycleEvent>,
}

impl LayoutTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            graph: DependencyGraph::new(),
            hosts: SecondaryMap::new(),
            containers: SecondaryMap::new(),
            events: Vec::new(),
        }
    }

    // ── Construction ─────────────────────────────────────────────────

    /// Build a detached root node (and its subtree) from `template`.
    ///
    /// Every expression key is validated against the class table and the
    /// declared parameters, and every expression is compiled. Nothing is
    /// evaluated until [`mount`](Self::mount).
    pub fn insert_root(&mut self, template: &Template) -> Result<NodeId, LayoutError> {
        self.build(None, 0, template)
    }

    /// Build `template` as a child of `parent` at `index` (clamped).
    pub(crate) fn build(
        &mut self,
        parent: Option<NodeId>,
        index: usize,
        template: &Template,
    ) -> Result<NodeId, LayoutError> {
        let parent_resource = parent
            .and_then(|p| self.nodes.get(p))
            .and_then(|n| n.root_resource.clone());
        let node = construct_node(template, parent_resource.clone())
            .map_err(|err| template_error(template, parent_resource.as_deref(), err))?;

        let id = self.nodes.insert(node);
        self.children.insert(id, Vec::new());
        if let Some(parent) = parent {
            self.parent.insert(id, parent);
            if let Some(siblings) = self.children.get_mut(parent) {
                let at = index.min(siblings.len());
                siblings.insert(at, id);
            }
        }

        for (i, child) in template.children.iter().enumerate() {
            if let Err(err) = self.build(Some(id), i, child) {
                let wrapped = if self.is_resource_root(id) {
                    self.node_error(id, err)
                } else {
                    err
                };
                self.discard(id);
                return Err(wrapped);
            }
        }
        tracing::trace!(class = %template.class, "constructed node");
        Ok(id)
    }

    /// Drop a subtree that was never mounted.
    pub(super) fn discard(&mut self, id: NodeId) {
        if let Some(parent) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|&child| child != id);
            }
        }
        for node in self.walk_depth_first(id) {
            self.graph.remove_node(node);
            self.children.remove(node);
            self.parent.remove(node);
            self.hosts.remove(node);
            self.containers.remove(node);
            self.nodes.remove(node);
        }
    }

    // ── Structure queries ────────────────────────────────────────────

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no
    /// children or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Ancestors from the immediate parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().copied().unwrap_or(id)
    }

    /// Index of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn get(&self, id: NodeId) -> Option<&LayoutNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// The nearest node with stable id `id`: first in `from`'s own subtree,
    /// then in each ancestor's subtree, closest ancestor first.
    pub fn find_by_id(&self, from: NodeId, id: &str) -> Option<NodeId> {
        let has_id = |n: &NodeId| self.nodes.get(*n).and_then(|node| node.id.as_deref()) == Some(id);
        if let Some(found) = self.walk_depth_first(from).into_iter().find(has_id) {
            return Some(found);
        }
        self.ancestors(from)
            .into_iter()
            .find_map(|ancestor| self.walk_depth_first(ancestor).into_iter().find(has_id))
    }

    // ── State queries ────────────────────────────────────────────────

    pub fn phase(&self, id: NodeId) -> Option<&Phase> {
        self.nodes.get(id).map(|n| &n.phase)
    }

    /// Properties invalidated since the node's last commit.
    pub fn dirty_properties(&self, id: NodeId) -> BTreeSet<String> {
        match self.phase(id) {
            Some(Phase::Dirty(set)) => set.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_dirty(&self, id: NodeId, key: &str) -> bool {
        matches!(self.phase(id), Some(Phase::Dirty(set)) if set.contains(key))
    }

    /// Whether a computed value for `key` is memoized.
    pub fn is_cached(&self, id: NodeId, key: &str) -> bool {
        self.graph.contains(&CacheKey::property(id, key))
    }

    /// Per-property errors recorded by the last mount or update of `id`.
    pub fn property_errors(&self, id: NodeId) -> &[LayoutError] {
        self.nodes.get(id).map(|n| n.errors.as_slice()).unwrap_or(&[])
    }

    /// Drain lifecycle events recorded since the last call.
    pub fn pending_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Error attribution ────────────────────────────────────────────

    /// Whether `id` roots a resource other than its parent's.
    pub fn is_resource_root(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let parent_resource = self
            .parent(id)
            .and_then(|p| self.nodes.get(p))
            .and_then(|p| p.root_resource.as_deref());
        node.root_resource.is_some() && node.root_resource.as_deref() != parent_resource
    }

    /// Wrap `err` with the class of `id` and, for a resource root, its
    /// resource location.
    pub fn node_error(&self, id: NodeId, err: LayoutError) -> LayoutError {
        let Some(node) = self.nodes.get(id) else {
            return err;
        };
        let resource = if self.is_resource_root(id) {
            node.root_resource.clone()
        } else {
            None
        };
        LayoutError::Node {
            class: node.class.clone(),
            resource,
            source: Box::new(err),
        }
    }

    // ── Invalidation plumbing ────────────────────────────────────────

    /// Record that the entry being computed read a source slot of `node`.
    pub(crate) fn record_source(&mut self, node: NodeId, slot: Slot) {
        self.graph.record_read(&CacheKey::new(node, slot));
    }

    /// Invalidate `key` and everything that read it, marking the affected
    /// properties dirty on attached nodes.
    pub(crate) fn invalidate(&mut self, key: CacheKey) {
        let dropped = self.graph.invalidate(&key);
        self.mark_dirty(dropped);
    }

    pub(super) fn mark_dirty(&mut self, keys: Vec<CacheKey>) {
        if !keys.is_empty() {
            tracing::trace!(count = keys.len(), "invalidated cached values");
        }
        for key in keys {
            let Slot::Property(name) = key.slot else {
                continue;
            };
            let Some(node) = self.nodes.get_mut(key.node) else {
                continue;
            };
            match &mut node.phase {
                Phase::Attached => node.phase = Phase::Dirty(BTreeSet::from([name])),
                Phase::Dirty(set) => {
                    set.insert(name);
                }
                Phase::Unattached | Phase::Unmounting => {}
            }
        }
    }
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a construction failure with the template's class and, when it roots
/// a resource of its own, that resource.
pub(crate) fn template_error(
    template: &Template,
    parent_resource: Option<&str>,
    err: LayoutError,
) -> LayoutError {
    let resource = template
        .source
        .as_ref()
        .and_then(|s| s.resource())
        .filter(|r| parent_resource != Some(*r))
        .map(str::to_owned);
    LayoutError::Node {
        class: template.class.clone(),
        resource,
        source: Box::new(err),
    }
}

/// The declared type of `key` on a node with these tables, or the error a
/// template binding it must fail with.
pub(crate) fn validate_key(
    types: &ClassTypes,
    parameters: &BTreeMap<String, TypeDescriptor>,
    key: &str,
) -> Result<TypeDescriptor, LayoutError> {
    let declared = match parameters.get(key) {
        Some(ty) => Some(ty.clone()),
        None => registry::expression_type(&types.class, key)?,
    };
    match declared {
        Some(TypeDescriptor::Unavailable(reason)) => Err(LayoutError::Unavailable {
            property: key.to_owned(),
            reason,
        }),
        Some(ty) => Ok(ty),
        None => {
            let candidates = types
                .available_names()
                .chain(parameters.keys().map(String::as_str));
            let mut suggestions = best_matches(key, candidates);
            suggestions.truncate(registry::config().max_suggestions);
            Err(SymbolError::new(SymbolErrorKind::UnknownProperty, key)
                .with_suggestions(suggestions)
                .into())
        }
    }
}

/// Validate a template's own attributes and build the node for it.
pub(crate) fn construct_node(
    template: &Template,
    parent_resource: Option<String>,
) -> Result<LayoutNode, LayoutError> {
    let types = types_for(&template.class)?;

    let mut parameters = BTreeMap::new();
    for (name, type_name) in &template.parameters {
        let ty = type_named(type_name).ok_or_else(|| {
            LayoutError::invalid(format!("unknown type '{type_name}' for parameter '{name}'"))
        })?;
        parameters.insert(name.clone(), ty);
    }

    let mut pending_template = None;
    for (key, source) in &template.expressions {
        if key == TEMPLATE_KEY {
            pending_template = Some(source.clone());
            continue;
        }
        let ty = validate_key(&types, &parameters, key)?;
        expr::compile(source, expr::mode_for(Some(&ty))).map_err(|err| LayoutError::Property {
            property: key.clone(),
            expression: Some(source.clone()),
            source: Box::new(err),
        })?;
    }
    for (name, expansion) in &template.macros {
        expr::compile(expansion, ParseMode::Expression).map_err(|err| LayoutError::Property {
            property: name.clone(),
            expression: Some(expansion.clone()),
            source: Box::new(err),
        })?;
    }

    let root_resource = template
        .source
        .as_ref()
        .and_then(|s| s.resource())
        .map(str::to_owned)
        .or(parent_resource);

    Ok(LayoutNode {
        class: template.class.clone(),
        types,
        id: template.id.clone(),
        expressions: template
            .expressions
            .iter()
            .filter(|(k, _)| k.as_str() != TEMPLATE_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        parameters,
        macros: template.macros.clone(),
        state: BTreeMap::new(),
        constants: BTreeMap::new(),
        body: template.body.clone(),
        template: template.shallow(),
        root_resource,
        view: None,
        phase: Phase::Unattached,
        pending_template,
        reference: None,
        committed: BTreeMap::new(),
        committed_frame: None,
        errors: Vec::new(),
    })
}
