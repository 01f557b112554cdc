//! Applying an updated template to a live subtree.
//!
//! Nodes whose class and own attributes are unchanged are reused with their
//! identity and cached values intact. A node whose attributes changed is
//! rebuilt in place; its state and constants carry over and its matching
//! children are moved under the replacement rather than rebuilt.
//!
//! A node composed from a `template="path"` element is matched against that
//! element rather than against what it was composed into. When the element
//! is unchanged the node is kept as it is and reported for refetch; its own
//! children are reconciled once the external template is merged again.

use crate::error::{LayoutError, ReleaseFailure};
use crate::template::Template;

use super::data::{LifecycleEvent, NodeId};
use super::tree::{construct_node, template_error, LayoutTree};

/// What [`LayoutTree::apply_template`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    /// The node now standing where the updated node stood.
    pub root: NodeId,
    /// Nodes kept as they were.
    pub reused: Vec<NodeId>,
    /// Nodes built for this update, including rebuilt ones.
    pub constructed: Vec<NodeId>,
    /// Nodes dropped by this update; their ids are now stale.
    pub removed: Vec<NodeId>,
    /// Composed nodes whose referencing element matched; their external
    /// template has to be fetched again.
    pub refetch: Vec<NodeId>,
    /// Views that failed to release along the way.
    pub release_failures: Vec<ReleaseFailure>,
}

impl LayoutTree {
    /// Reconcile the subtree at `node` with `template`.
    ///
    /// Children are matched by stable id when both sides have one, otherwise
    /// by class, in order. Unmatched old children are removed and unmatched
    /// templates constructed. Values are not recomputed here; changed nodes
    /// are marked dirty for the next [`update`](Self::update).
    pub fn apply_template(&mut self, node: NodeId, template: &Template) -> Result<UpdateReport, LayoutError> {
        if !self.contains(node) {
            return Err(LayoutError::StaleNode);
        }
        let mut report = UpdateReport::default();
        report.root = self.reconcile(node, template, &mut report)?;
        tracing::debug!(
            class = %template.class,
            reused = report.reused.len(),
            constructed = report.constructed.len(),
            removed = report.removed.len(),
            "applied template"
        );
        Ok(report)
    }

    /// The full template of the live subtree at `node`.
    pub fn snapshot(&self, node: NodeId) -> Option<Template> {
        let n = self.nodes.get(node)?;
        let mut template = n.template.clone();
        template.children = self
            .children(node)
            .iter()
            .filter_map(|&child| self.snapshot(child))
            .collect();
        Some(template)
    }

    fn reconcile(
        &mut self,
        node: NodeId,
        template: &Template,
        report: &mut UpdateReport,
    ) -> Result<NodeId, LayoutError> {
        let n = self.nodes.get_mut(node).ok_or(LayoutError::StaleNode)?;
        if n.class == template.class && n.template.same_attributes(template) {
            report.reused.push(node);
            self.reconcile_children(node, &template.children, report)?;
            return Ok(node);
        }
        if let Some(path) = template.template_path() {
            if n.reference.as_ref().is_some_and(|r| r.same_attributes(template)) {
                n.reference = Some(template.clone());
                n.pending_template = Some(path.to_owned());
                report.reused.push(node);
                report.refetch.push(node);
                return Ok(node);
            }
        }
        tracing::trace!(class = %template.class, "attributes changed, rebuilding node");
        self.reconstruct(node, template, report)
    }

    fn reconstruct(
        &mut self,
        old: NodeId,
        template: &Template,
        report: &mut UpdateReport,
    ) -> Result<NodeId, LayoutError> {
        let parent = self.parent(old);
        let parent_resource = parent
            .and_then(|p| self.nodes.get(p))
            .and_then(|p| p.root_resource.clone());
        let mut fresh = construct_node(template, parent_resource.clone())
            .map_err(|err| template_error(template, parent_resource.as_deref(), err))?;

        let previous = self.nodes.get_mut(old).ok_or(LayoutError::StaleNode)?;
        // A changed reference to an external template: the composed children
        // wait for the merged template instead of the bare element.
        let keep_children = previous.reference.is_some() && template.template_path().is_some();
        if keep_children {
            fresh.reference = Some(template.clone());
        }
        fresh.state = std::mem::take(&mut previous.state);
        fresh.constants = std::mem::take(&mut previous.constants);
        let attached = previous.phase.is_attached();
        let old_view = previous.view.take();
        let old_class = previous.class.clone();

        let new = self.nodes.insert(fresh);
        let moved = self.children.remove(old).unwrap_or_default();
        for &child in &moved {
            self.parent.insert(child, new);
        }
        self.children.insert(new, moved);
        let index = self.index_in_parent(old);
        if let Some(parent) = parent {
            self.parent.insert(new, parent);
            if let Some(slot) = self
                .children
                .get_mut(parent)
                .and_then(|siblings| siblings.iter_mut().find(|c| **c == old))
            {
                *slot = new;
            }
        }
        self.parent.remove(old);
        if let Some(host) = self.hosts.remove(old) {
            self.hosts.insert(new, host);
        }
        if let Some(size) = self.containers.remove(old) {
            self.containers.insert(new, size);
        }
        let dropped = self.graph.remove_node(old);
        self.nodes.remove(old);
        self.mark_dirty(dropped);

        if let Some(mut view) = old_view {
            if let Err(error) = view.release() {
                tracing::warn!(class = %old_class, %error, "failed to release replaced view");
                report.release_failures.push(ReleaseFailure {
                    class: old_class,
                    error,
                });
            }
        }
        report.removed.push(old);
        report.constructed.push(new);

        if attached {
            self.events.push(LifecycleEvent::Unmount { node: old });
            self.attach_dirty(&[new]);
            if let (Some(parent), Some(index)) = (parent, index) {
                if let Some(view) = self.nodes.get_mut(parent).and_then(|n| n.view.as_mut()) {
                    view.did_remove_child(index);
                    view.did_insert_child(index);
                }
            }
        }

        if !keep_children {
            self.reconcile_children(new, &template.children, report)?;
        }

        if attached {
            self.create_views_in_place(&[new])?;
            self.notify_children(&[new]);
        }
        match parent {
            Some(parent) => self.structure_changed(parent),
            None => self.structure_changed(new),
        }
        Ok(new)
    }

    fn reconcile_children(
        &mut self,
        parent: NodeId,
        templates: &[Template],
        report: &mut UpdateReport,
    ) -> Result<(), LayoutError> {
        let mut unmatched: Vec<Option<NodeId>> = self.children(parent).iter().copied().map(Some).collect();
        let mut plan = Vec::with_capacity(templates.len());
        for template in templates {
            let found = unmatched
                .iter()
                .position(|slot| matches!(slot, Some(child) if self.matches(*child, template)));
            plan.push(found.and_then(|i| unmatched[i].take()));
        }

        for child in unmatched.into_iter().flatten() {
            report.removed.extend(self.walk_depth_first(child));
            match self.unmount(child) {
                Ok(()) => {}
                Err(LayoutError::Release { failures }) => report.release_failures.extend(failures),
                Err(err) => return Err(err),
            }
        }

        let mut order = Vec::with_capacity(templates.len());
        for (index, (template, matched)) in templates.iter().zip(plan).enumerate() {
            let id = match matched {
                Some(child) => self.reconcile(child, template, report)?,
                None => {
                    let id = self.insert_subtree(parent, index, template)?;
                    report.constructed.extend(self.walk_depth_first(id));
                    id
                }
            };
            order.push(id);
        }

        if self.children(parent) != order.as_slice() {
            self.children.insert(parent, order);
            self.structure_changed(parent);
        }
        Ok(())
    }

    fn matches(&self, child: NodeId, template: &Template) -> bool {
        let Some(node) = self.nodes.get(child) else {
            return false;
        };
        let own = match (&node.reference, template.template_path()) {
            (Some(reference), Some(_)) => reference,
            _ => &node.template,
        };
        match (own.id.as_deref(), template.id.as_deref()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => own.class == template.class,
            _ => false,
        }
    }

    /// Record that `node` now stands for the external template `reference`
    /// names, and that nothing is pending for it.
    pub(crate) fn mark_composed(&mut self, node: NodeId, reference: Template) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.reference = Some(reference);
            n.pending_template = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::node::Phase;
    use crate::testing::RecordingHost;
    use crate::types::Value;
    use pretty_assertions::assert_eq;

    fn screen(title: &str) -> Template {
        Template::new("View")
            .with_id("screen")
            .with_expression("width", "100%")
            .with_child(
                Template::new("Label")
                    .with_id("title")
                    .with_expression("text", title)
                    .with_expression("height", "20"),
            )
            .with_child(
                Template::new("View")
                    .with_id("body")
                    .with_expression("top", "title.bottom")
                    .with_child(Template::new("Label").with_expression("text", "a"))
                    .with_child(Template::new("Label").with_expression("text", "b")),
            )
    }

    fn mounted(template: &Template) -> (LayoutTree, NodeId, RecordingHost) {
        let host = RecordingHost::new(Size::new(320.0, 480.0));
        let mut tree = LayoutTree::new();
        let root = tree.insert_root(template).unwrap();
        tree.mount(root, Box::new(host.clone())).unwrap();
        (tree, root, host)
    }

    #[test]
    fn unchanged_template_reuses_everything() {
        let (mut tree, root, host) = mounted(&screen("Hi"));
        let before = tree.walk_depth_first(root);
        host.clear_calls();

        let report = tree.apply_template(root, &screen("Hi")).unwrap();
        assert_eq!(report.root, root);
        assert_eq!(report.reused, before);
        assert!(report.constructed.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(tree.walk_depth_first(root), before);
        assert!(tree.is_cached(root, "width"));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn changed_node_is_rebuilt_and_children_move() {
        let (mut tree, root, host) = mounted(&screen("Hi"));
        let title = tree.find_by_id(root, "title").unwrap();
        let body = tree.find_by_id(root, "body").unwrap();
        let body_children = tree.children(body).to_vec();
        tree.set_state(title, [("mood", Value::from("happy"))]).unwrap();

        let report = tree.apply_template(root, &screen("Hello")).unwrap();
        let new_title = tree.find_by_id(root, "title").unwrap();
        assert_ne!(new_title, title);
        assert!(!tree.contains(title));
        assert_eq!(report.removed, vec![title]);
        assert_eq!(report.constructed, vec![new_title]);
        assert_eq!(tree.find_by_id(root, "body"), Some(body));
        assert_eq!(tree.children(body), body_children.as_slice());
        assert_eq!(tree.get(new_title).unwrap().state().get("mood"), Some(&Value::from("happy")));
        assert!(!tree.is_cached(body, "top"));

        tree.update().unwrap();
        assert_eq!(tree.phase(new_title), Some(&Phase::Attached));
        assert_eq!(tree.value(new_title, "text").unwrap(), Value::from("Hello"));
        assert!(host.released().contains(&"title".to_owned()));
    }

    #[test]
    fn unmatched_children_are_removed_and_new_ones_built() {
        let (mut tree, root, _) = mounted(&screen("Hi"));
        let body = tree.find_by_id(root, "body").unwrap();
        let kept = tree.children(body)[0];

        let mut updated = screen("Hi");
        updated.children[1].children = vec![
            Template::new("Label").with_expression("text", "a"),
            Template::new("Button").with_id("go"),
        ];
        let report = tree.apply_template(root, &updated).unwrap();

        assert_eq!(tree.children(body).len(), 2);
        assert_eq!(tree.children(body)[0], kept);
        let go = tree.find_by_id(root, "go").unwrap();
        assert!(report.constructed.contains(&go));
        assert_eq!(report.removed.len(), 1);
        assert!(!tree.contains(report.removed[0]));
        tree.update().unwrap();
        assert!(tree.get(go).unwrap().has_view());
    }

    #[test]
    fn rebuilt_root_keeps_its_host() {
        let (mut tree, root, _) = mounted(&screen("Hi"));
        let updated = screen("Hi").with_expression("alpha", "0.5");
        let report = tree.apply_template(root, &updated).unwrap();
        assert_ne!(report.root, root);
        tree.update().unwrap();
        assert_eq!(tree.frame(report.root).unwrap().width, 320.0);
        assert_eq!(tree.value(report.root, "alpha").unwrap(), Value::Number(0.5));
    }

    fn card_reference() -> Template {
        Template::new("View").with_expression("template", "card.xml")
    }

    fn page(reference: Template) -> Template {
        Template::new("View")
            .with_expression("width", "100%")
            .with_child(reference)
            .with_child(Template::new("Label").with_id("body").with_expression("top", "card.bottom"))
    }

    /// A page whose card is already composed from `card.xml`.
    fn composed_page() -> (LayoutTree, NodeId, NodeId, RecordingHost) {
        let base = Template::new("View")
            .with_id("card")
            .with_expression("height", "40")
            .with_child(Template::new("Label").with_id("caption").with_expression("text", "Card"));
        let composed = card_reference().merged_into(&base).unwrap();
        let (mut tree, root, host) = mounted(&page(composed));
        let card = tree.find_by_id(root, "card").unwrap();
        tree.mark_composed(card, card_reference());
        (tree, root, card, host)
    }

    #[test]
    fn composed_node_matches_its_reference() {
        let (mut tree, root, card, host) = composed_page();
        let caption = tree.find_by_id(root, "caption").unwrap();
        host.clear_calls();

        let report = tree.apply_template(root, &page(card_reference())).unwrap();
        assert_eq!(report.root, root);
        assert_eq!(report.refetch, vec![card]);
        assert!(report.constructed.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(tree.find_by_id(root, "card"), Some(card));
        assert_eq!(tree.find_by_id(root, "caption"), Some(caption));
        assert_eq!(tree.get(card).unwrap().pending_template(), Some("card.xml"));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn changed_reference_keeps_composed_children() {
        let (mut tree, root, card, _) = composed_page();
        let caption = tree.find_by_id(root, "caption").unwrap();

        let changed = card_reference().with_expression("top", "10");
        let report = tree.apply_template(root, &page(changed.clone())).unwrap();
        let placeholder = tree.children(root)[0];
        assert_ne!(placeholder, card);
        assert!(report.removed.contains(&card));
        assert_eq!(tree.children(placeholder), &[caption]);
        assert_eq!(tree.get(placeholder).unwrap().pending_template(), Some("card.xml"));
        assert_eq!(tree.get(placeholder).unwrap().reference(), Some(&changed));
    }

    #[test]
    fn snapshot_round_trips_structure() {
        let (tree, root, _) = mounted(&screen("Hi"));
        let snapshot = tree.snapshot(root).unwrap();
        assert_eq!(snapshot, screen("Hi"));
    }
}
