//! Mutations: expressions, state, constants, container size, children.
//!
//! Every mutation invalidates exactly the entries that read what changed;
//! nothing is recomputed until the next read or [`LayoutTree::update`].

use std::collections::BTreeMap;

use crate::error::LayoutError;
use crate::expr;
use crate::geometry::Size;
use crate::template::{Template, TEMPLATE_KEY};
use crate::types::Value;

use super::data::{LayoutNode, NodeId};
use super::deps::{CacheKey, Slot};
use super::tree::{validate_key, LayoutTree};

impl LayoutTree {
    /// Bind (or rebind) `key` on `node` to `source`.
    pub fn set_expression(&mut self, node: NodeId, key: &str, source: &str) -> Result<(), LayoutError> {
        let n = self.nodes.get(node).ok_or(LayoutError::StaleNode)?;
        if key == TEMPLATE_KEY {
            return Err(LayoutError::invalid(
                "external templates are applied by the loader, not bound as expressions",
            ));
        }
        let ty = validate_key(&n.types, &n.parameters, key)?;
        expr::compile(source, expr::mode_for(Some(&ty))).map_err(|err| LayoutError::Property {
            property: key.to_owned(),
            expression: Some(source.to_owned()),
            source: Box::new(err),
        })?;
        if n.expressions.get(key).map(String::as_str) == Some(source) {
            return Ok(());
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.expressions.insert(key.to_owned(), source.to_owned());
            n.template.expressions.insert(key.to_owned(), source.to_owned());
        }
        self.expression_changed(node, key);
        Ok(())
    }

    /// Unbind `key` on `node`; it falls back to its default rule.
    pub fn remove_expression(&mut self, node: NodeId, key: &str) -> Result<(), LayoutError> {
        let n = self.nodes.get_mut(node).ok_or(LayoutError::StaleNode)?;
        if n.expressions.remove(key).is_some() {
            n.template.expressions.remove(key);
            n.committed.remove(key);
            self.expression_changed(node, key);
        }
        Ok(())
    }

    fn expression_changed(&mut self, node: NodeId, key: &str) {
        tracing::trace!(key, "expression changed");
        self.invalidate(CacheKey::property(node, key));
        self.invalidate(CacheKey::new(node, Slot::Expression(key.to_owned())));
    }

    /// Set state values on `node`. Later entries for the same key win; only
    /// keys whose value actually changed invalidate their readers.
    pub fn set_state<K, I>(&mut self, node: NodeId, values: I) -> Result<(), LayoutError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.set_values(node, values, Slot::State, |n| &mut n.state)
    }

    /// Set constants on `node`, with the same merge rule as
    /// [`set_state`](Self::set_state).
    pub fn set_constants<K, I>(&mut self, node: NodeId, values: I) -> Result<(), LayoutError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.set_values(node, values, Slot::Constant, |n| &mut n.constants)
    }

    fn set_values<K, I>(
        &mut self,
        node: NodeId,
        values: I,
        slot: fn(String) -> Slot,
        pick: fn(&mut LayoutNode) -> &mut BTreeMap<String, Value>,
    ) -> Result<(), LayoutError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let n = self.nodes.get_mut(node).ok_or(LayoutError::StaleNode)?;
        let map = pick(n);
        let mut changed = Vec::new();
        for (key, value) in values {
            let key = key.into();
            if map.get(&key) != Some(&value) {
                map.insert(key.clone(), value);
                changed.push(key);
            }
        }
        for key in changed {
            self.invalidate(CacheKey::new(node, slot(key)));
        }
        Ok(())
    }

    /// Change the container size of a root.
    pub fn set_container_size(&mut self, root: NodeId, size: Size) -> Result<(), LayoutError> {
        if !self.contains(root) {
            return Err(LayoutError::StaleNode);
        }
        if self.parent(root).is_some() {
            return Err(LayoutError::invalid("only root nodes have a container"));
        }
        if self.containers.insert(root, size) != Some(size) {
            tracing::debug!(width = size.width, height = size.height, "container resized");
            self.invalidate(CacheKey::new(root, Slot::Container));
        }
        Ok(())
    }

    /// Construct `template` as a child of `parent` at `index` (clamped).
    ///
    /// Under a mounted parent the new nodes get views immediately and are
    /// marked dirty; the next [`update`](Self::update) evaluates them.
    pub fn insert_subtree(
        &mut self,
        parent: NodeId,
        index: usize,
        template: &Template,
    ) -> Result<NodeId, LayoutError> {
        let attached = self
            .nodes
            .get(parent)
            .ok_or(LayoutError::StaleNode)?
            .phase
            .is_attached();
        let id = self.build(Some(parent), index, template)?;
        let ids = self.walk_depth_first(id);
        if attached {
            if let Err(err) = self.create_views_in_place(&ids) {
                self.discard(id);
                return Err(err);
            }
            self.notify_children(&ids);
            self.attach_dirty(&ids);
            let at = self.index_in_parent(id).unwrap_or(index);
            if let Some(view) = self.nodes.get_mut(parent).and_then(|n| n.view.as_mut()) {
                view.did_insert_child(at);
            }
        }
        self.structure_changed(parent);
        tracing::trace!(class = %template.class, nodes = ids.len(), "inserted subtree");
        Ok(id)
    }

    /// Insert a child built from `template`; see
    /// [`insert_subtree`](Self::insert_subtree).
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        template: &Template,
    ) -> Result<NodeId, LayoutError> {
        self.insert_subtree(parent, index, template)
    }

    /// Unmount and drop the child of `parent` at `index`.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<(), LayoutError> {
        let child = self.child_at(parent, index)?;
        self.unmount(child)
    }

    /// Replace the child of `parent` at `index` with one built from
    /// `template`. The new child is inserted even if releasing the old one
    /// reported failures; those are returned afterwards.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        index: usize,
        template: &Template,
    ) -> Result<NodeId, LayoutError> {
        let child = self.child_at(parent, index)?;
        let released = self.unmount(child);
        let id = self.insert_subtree(parent, index, template)?;
        released.map(|()| id)
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId, LayoutError> {
        if !self.contains(parent) {
            return Err(LayoutError::StaleNode);
        }
        self.children(parent).get(index).copied().ok_or_else(|| {
            LayoutError::invalid(format!(
                "child index {index} out of range ({} children)",
                self.children(parent).len()
            ))
        })
    }
}
