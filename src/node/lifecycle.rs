//! Node lifecycle: mount, update, unmount.
//!
//! Mounting creates one view adapter per node, evaluates every bound
//! expression and commits the results. Later mutations only invalidate; the
//! next [`update`](LayoutTree::update) recomputes what was dropped and
//! re-commits values that actually changed. Each transition is recorded as
//! a [`LifecycleEvent`] that callers drain with
//! [`pending_events`](LayoutTree::pending_events).

use std::collections::BTreeSet;

use crate::error::{LayoutError, ReleaseFailure};
use crate::geometry::Rect;
use crate::host::Host;

use super::data::{LifecycleEvent, NodeId, Phase};
use super::deps::{CacheKey, Slot};
use super::tree::{is_layout_key, LayoutTree};

/// Geometry keys committed as the frame.
const FRAME_KEYS: &[&str] = &["left", "top", "width", "height"];

impl LayoutTree {
    /// Mount the tree rooted at `root` into `host`.
    ///
    /// Fails if a view cannot be created (views created so far are released),
    /// or if evaluation hits a dependency cycle or another fatal error.
    /// Ordinary per-property failures don't abort the mount; they are
    /// available from [`property_errors`](Self::property_errors).
    pub fn mount(&mut self, root: NodeId, mut host: Box<dyn Host>) -> Result<(), LayoutError> {
        let node = self.nodes.get(root).ok_or(LayoutError::StaleNode)?;
        if self.parent(root).is_some() {
            return Err(LayoutError::invalid(format!("{} is not a root node", node.class)));
        }
        if node.phase != Phase::Unattached {
            return Err(LayoutError::invalid(format!("{} is already mounted", node.class)));
        }

        let ids = self.walk_depth_first(root);
        self.create_views(&ids, host.as_mut())?;
        let size = host.container_size();
        if self.containers.insert(root, size) != Some(size) {
            self.invalidate(CacheKey::new(root, Slot::Container));
        }
        self.hosts.insert(root, host);
        self.notify_children(&ids);
        for &id in &ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.phase = Phase::Attached;
            }
            self.events.push(LifecycleEvent::Mount { node: id });
        }
        tracing::debug!(nodes = ids.len(), width = size.width, height = size.height, "mounted layout tree");
        self.refresh(&ids)
    }

    /// Recompute everything invalidated since the last commit and push
    /// changed values and frames to the views.
    pub fn update(&mut self) -> Result<(), LayoutError> {
        let roots: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|&id| !self.parent.contains_key(id))
            .collect();
        let dirty: Vec<NodeId> = roots
            .into_iter()
            .flat_map(|root| self.walk_depth_first(root))
            .filter(|&id| matches!(self.phase(id), Some(Phase::Dirty(_))))
            .collect();
        if dirty.is_empty() {
            return Ok(());
        }
        tracing::trace!(nodes = dirty.len(), "updating dirty nodes");
        self.refresh(&dirty)
    }

    /// Detach `node` from its parent and release the views of its whole
    /// subtree, top-down.
    ///
    /// A failing release is logged and collected; the walk always finishes.
    /// The collected failures are returned as [`LayoutError::Release`].
    pub fn unmount(&mut self, node: NodeId) -> Result<(), LayoutError> {
        if !self.contains(node) {
            return Err(LayoutError::StaleNode);
        }
        self.detach(node);

        let ids = self.walk_depth_first(node);
        let mut failures = Vec::new();
        for &id in &ids {
            let Some(n) = self.nodes.get_mut(id) else {
                continue;
            };
            let was_attached = n.phase.is_attached();
            n.phase = Phase::Unmounting;
            if let Some(mut view) = n.view.take() {
                if let Err(error) = view.release() {
                    tracing::warn!(class = %n.class, %error, "failed to release view");
                    failures.push(ReleaseFailure {
                        class: n.class.clone(),
                        error,
                    });
                }
            }
            if was_attached {
                self.events.push(LifecycleEvent::Unmount { node: id });
            }
        }

        let mut dropped = Vec::new();
        for &id in &ids {
            dropped.extend(self.graph.remove_node(id));
            self.children.remove(id);
            self.parent.remove(id);
            self.hosts.remove(id);
            self.containers.remove(id);
            self.nodes.remove(id);
        }
        self.mark_dirty(dropped);
        tracing::debug!(nodes = ids.len(), failures = failures.len(), "unmounted subtree");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LayoutError::Release { failures })
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Create views for `ids` through `host`. On failure, views created by
    /// this call are released again.
    pub(super) fn create_views(&mut self, ids: &[NodeId], host: &mut dyn Host) -> Result<(), LayoutError> {
        for (done, &id) in ids.iter().enumerate() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            match host.make_view(id, node) {
                Ok(view) => {
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.view = Some(view);
                    }
                }
                Err(err) => {
                    for &created in &ids[..done] {
                        let view = self.nodes.get_mut(created).and_then(|n| n.view.take());
                        if let Some(mut view) = view {
                            if let Err(error) = view.release() {
                                tracing::warn!(%error, "failed to release view after aborted mount");
                            }
                        }
                    }
                    return Err(self.node_error(id, LayoutError::Host(err)));
                }
            }
        }
        Ok(())
    }

    /// Create views for a subtree added under an already mounted tree.
    pub(super) fn create_views_in_place(&mut self, ids: &[NodeId]) -> Result<(), LayoutError> {
        let Some(&first) = ids.first() else {
            return Ok(());
        };
        let root = self.root_of(first);
        let Some(mut host) = self.hosts.remove(root) else {
            return Err(LayoutError::invalid("tree is not mounted"));
        };
        let result = self.create_views(ids, host.as_mut());
        self.hosts.insert(root, host);
        result
    }

    /// Tell each node's view about the children it already has.
    pub(super) fn notify_children(&mut self, ids: &[NodeId]) {
        for &id in ids {
            let count = self.children(id).len();
            if let Some(view) = self.nodes.get_mut(id).and_then(|n| n.view.as_mut()) {
                for index in 0..count {
                    view.did_insert_child(index);
                }
            }
        }
    }

    /// Mark freshly attached nodes dirty with every key they commit.
    pub(super) fn attach_dirty(&mut self, ids: &[NodeId]) {
        for &id in ids {
            let keys = self.commit_keys(id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.phase = Phase::Dirty(keys.into_iter().collect());
            }
            self.events.push(LifecycleEvent::Mount { node: id });
        }
    }

    /// Remove `node` from its parent's child list.
    pub(super) fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        let Some(index) = self.index_in_parent(node) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.remove(index);
        }
        self.parent.remove(node);
        if let Some(view) = self.nodes.get_mut(parent).and_then(|n| n.view.as_mut()) {
            view.did_remove_child(index);
        }
        self.structure_changed(parent);
    }

    /// Invalidate readers of `parent`'s child list and of its tree's
    /// membership.
    pub(super) fn structure_changed(&mut self, parent: NodeId) {
        self.invalidate(CacheKey::new(parent, Slot::Children));
        let root = self.root_of(parent);
        self.invalidate(CacheKey::new(root, Slot::Subtree));
    }

    fn commit_keys(&self, id: NodeId) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = FRAME_KEYS.iter().map(|k| (*k).to_owned()).collect();
        if let Some(node) = self.nodes.get(id) {
            keys.extend(node.expressions.keys().cloned());
        }
        keys
    }

    /// Evaluate and commit `ids`, recording per-node errors. Returns the
    /// first fatal error.
    pub(super) fn refresh(&mut self, ids: &[NodeId]) -> Result<(), LayoutError> {
        let mut fatal = None;
        for &id in ids {
            if !self.contains(id) {
                continue;
            }
            let errors = self.commit(id);
            if fatal.is_none() {
                fatal = errors.iter().find(|e| e.is_fatal()).cloned();
            }
            if let Some(node) = self.nodes.get_mut(id) {
                node.errors = errors;
            }
        }
        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn commit(&mut self, id: NodeId) -> Vec<LayoutError> {
        let mut errors: Vec<LayoutError> = Vec::new();
        let mut record = |tree: &Self, err: LayoutError| {
            let err = tree.node_error(id, err);
            if !errors.contains(&err) {
                errors.push(err);
            }
        };
        let mut changed = false;

        let mut frame = [0.0; 4];
        let mut frame_ok = true;
        for (slot, key) in FRAME_KEYS.iter().enumerate() {
            match self.number(id, key) {
                Ok(v) => frame[slot] = v,
                Err(err) => {
                    frame_ok = false;
                    record(self, err);
                }
            }
        }
        if frame_ok {
            let frame = Rect::new(frame[0], frame[1], frame[2], frame[3]);
            let node = self.nodes.get_mut(id);
            if let Some(node) = node.filter(|n| n.committed_frame != Some(frame)) {
                node.committed_frame = Some(frame);
                if let Some(view) = node.view.as_mut() {
                    view.set_frame(frame);
                }
                changed = true;
            }
        }

        let keys: Vec<(String, bool)> = self
            .nodes
            .get(id)
            .map(|n| {
                n.expressions
                    .keys()
                    .map(|k| (k.clone(), n.types.contains(k) && !n.parameters.contains_key(k)))
                    .collect()
            })
            .unwrap_or_default();
        for (key, is_view_property) in keys {
            if FRAME_KEYS.contains(&key.as_str()) {
                continue;
            }
            let value = match self.compute(id, &key) {
                Ok(value) => value,
                Err(err) => {
                    record(self, err);
                    continue;
                }
            };
            if !is_view_property || is_layout_key(&key) || key == "center" {
                continue;
            }
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if node.committed.get(&key) == Some(&value) {
                continue;
            }
            let applied = match node.view.as_mut() {
                Some(view) => view.set_value(&key, &value),
                None => Ok(()),
            };
            match applied {
                Ok(()) => {
                    node.committed.insert(key, value);
                    changed = true;
                }
                Err(err) => {
                    let expression = node.expressions.get(&key).cloned();
                    record(
                        self,
                        LayoutError::Property {
                            property: key,
                            expression,
                            source: Box::new(LayoutError::Host(err)),
                        },
                    );
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            if node.phase.is_attached() || node.phase == Phase::Unattached {
                node.phase = Phase::Attached;
            }
        }
        if changed {
            self.events.push(LifecycleEvent::Update { node: id });
        }
        errors
    }
}
