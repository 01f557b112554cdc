//! Hot reload: a registry of observers and the standard document observer.
//!
//! The registry only holds weak references; an observer that has been
//! dropped is pruned on the next reload. [`LayoutDocument`] owns a tree, a
//! loader and the path of its root template, and re-requests that template
//! when reloaded. The fetched template is reconciled with the live tree, so
//! unchanged nodes keep their identity and cached values.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use crate::error::LayoutError;
use crate::host::Host;
use crate::loader::{self, LoadOutcome, TemplateLoader, TemplateResolver};
use crate::node::{LayoutTree, NodeId};
use crate::template::{Template, TEMPLATE_KEY};
use crate::types::Value;

new_key_type! {
    /// Handle returned by [`ReloadRegistry::register`].
    pub struct ObserverId;
}

/// Something that rebuilds itself when layouts are reloaded.
pub trait ReloadObserver {
    /// Re-request whatever templates this observer depends on.
    fn reload(&mut self, hard: bool) -> Result<(), LayoutError>;
}

/// Registered reload observers.
#[derive(Default)]
pub struct ReloadRegistry {
    observers: SlotMap<ObserverId, Weak<RefCell<dyn ReloadObserver>>>,
}

impl ReloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` without taking ownership of it.
    pub fn register<O: ReloadObserver + 'static>(&mut self, observer: &Rc<RefCell<O>>) -> ObserverId {
        let observer: Rc<RefCell<dyn ReloadObserver>> = observer.clone();
        self.observers.insert(Rc::downgrade(&observer))
    }

    /// Returns whether `id` was registered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id).is_some()
    }

    /// Number of registered observers still alive.
    pub fn len(&self) -> usize {
        self.observers.values().filter(|o| o.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reload every observer. A hard reload first forgets resolved source
    /// locations. Observer failures are collected; every observer is visited.
    pub fn reload(&mut self, hard: bool) -> Vec<LayoutError> {
        if hard {
            loader::cache::clear_locations();
        }
        self.observers.retain(|_, observer| observer.strong_count() > 0);

        let mut errors = Vec::new();
        for observer in self.observers.values() {
            let Some(observer) = observer.upgrade() else {
                continue;
            };
            let result = match observer.try_borrow_mut() {
                Ok(mut observer) => observer.reload(hard),
                Err(_) => Err(LayoutError::invalid("observer is busy and cannot reload")),
            };
            if let Err(err) = result {
                tracing::warn!(%err, "reload observer failed");
                errors.push(err);
            }
        }
        tracing::debug!(observers = self.observers.len(), hard, failures = errors.len(), "reloaded layouts");
        errors
    }
}

/// A layout tree rooted at an external template.
///
/// The root starts as a plain `View` placeholder and becomes the fetched
/// template once the first completion is applied.
pub struct LayoutDocument {
    tree: LayoutTree,
    loader: TemplateLoader,
    path: String,
    reference: Template,
    root: NodeId,
}

impl LayoutDocument {
    /// Build the placeholder root for `path` and request the template.
    pub fn open(
        resolver: Arc<dyn TemplateResolver>,
        path: impl Into<String>,
        state: BTreeMap<String, Value>,
        constants: &[BTreeMap<String, Value>],
    ) -> Result<Self, LayoutError> {
        let path = path.into();
        let reference = Template::new("View").with_expression(TEMPLATE_KEY, path.clone());
        let mut tree = LayoutTree::new();
        let mut loader = TemplateLoader::with_shared(resolver);
        let root = loader.load(&mut tree, &reference, state, constants)?;
        Ok(Self {
            tree,
            loader,
            path,
            reference,
            root,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The current root. Changes when a reload rebuilds it.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn tree(&self) -> &LayoutTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut LayoutTree {
        &mut self.tree
    }

    pub fn mount(&mut self, host: Box<dyn Host>) -> Result<(), LayoutError> {
        self.tree.mount(self.root, host)
    }

    /// Apply arrived completions, then commit the changes to a mounted tree.
    pub fn drain(&mut self) -> Result<Vec<LoadOutcome>, LayoutError> {
        let outcomes = self.loader.drain(&mut self.tree);
        self.finish(outcomes)
    }

    /// Wait until every outstanding request has been applied, then commit.
    pub async fn settle(&mut self) -> Result<Vec<LoadOutcome>, LayoutError> {
        let outcomes = self.loader.settle(&mut self.tree).await;
        self.finish(outcomes)
    }

    fn finish(&mut self, outcomes: Vec<LoadOutcome>) -> Result<Vec<LoadOutcome>, LayoutError> {
        for outcome in &outcomes {
            if let LoadOutcome::Applied { node, report, .. } = outcome {
                if *node == self.root {
                    self.root = report.root;
                }
            }
        }
        let mounted = self
            .tree
            .phase(self.root)
            .is_some_and(|phase| phase.is_attached());
        if mounted {
            self.tree.update()?;
        }
        Ok(outcomes)
    }
}

impl ReloadObserver for LayoutDocument {
    fn reload(&mut self, hard: bool) -> Result<(), LayoutError> {
        loader::cache::clear_templates();
        tracing::debug!(path = %self.path, hard, "reloading document");
        if !self.tree.contains(self.root) {
            return Err(LayoutError::StaleNode);
        }
        self.loader.request(self.root, self.reference.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::loader::MemoryResolver;
    use crate::testing::RecordingHost;
    use pretty_assertions::assert_eq;

    struct Counter {
        reloads: Vec<bool>,
        fail: bool,
    }

    impl ReloadObserver for Counter {
        fn reload(&mut self, hard: bool) -> Result<(), LayoutError> {
            self.reloads.push(hard);
            if self.fail {
                Err(LayoutError::invalid("nope"))
            } else {
                Ok(())
            }
        }
    }

    fn counter(fail: bool) -> Rc<RefCell<Counter>> {
        Rc::new(RefCell::new(Counter { reloads: Vec::new(), fail }))
    }

    #[test]
    fn failures_are_collected_and_every_observer_runs() {
        let mut registry = ReloadRegistry::new();
        let failing = counter(true);
        let fine = counter(false);
        registry.register(&failing);
        registry.register(&fine);

        let errors = registry.reload(true);
        assert_eq!(errors.len(), 1);
        assert_eq!(failing.borrow().reloads, vec![true]);
        assert_eq!(fine.borrow().reloads, vec![true]);
    }

    #[test]
    fn registry_does_not_keep_observers_alive() {
        let mut registry = ReloadRegistry::new();
        let kept = counter(false);
        let dropped = counter(false);
        let id = registry.register(&kept);
        registry.register(&dropped);
        drop(dropped);
        assert_eq!(registry.len(), 1);

        assert!(registry.reload(false).is_empty());
        assert!(registry.unregister(id));
        registry.reload(false);
        assert_eq!(kept.borrow().reloads, vec![false]);
        assert!(registry.is_empty());
    }

    #[test]
    fn hard_reload_clears_locations() {
        loader::cache::location("a.xml", |p| crate::template::SourceLocation::at(p));
        let mut registry = ReloadRegistry::new();
        registry.reload(false);
        assert_eq!(loader::cache::stats().locations, 1);
        registry.reload(true);
        assert_eq!(loader::cache::stats().locations, 0);
    }

    fn screen(title: &str) -> Template {
        Template::new("View")
            .with_expression("width", "100%")
            .with_expression("height", "100%")
            .with_child(Template::new("Label").with_id("title").with_expression("text", title))
            .with_child(Template::new("Button").with_id("ok").with_expression("top", "title.bottom"))
    }

    #[tokio::test]
    async fn document_reload_reuses_unchanged_nodes() {
        let resolver = MemoryResolver::new();
        resolver.insert("screen.xml", screen("Hello"));
        let host = RecordingHost::new(Size::new(320.0, 480.0));
        let document = Rc::new(RefCell::new(
            LayoutDocument::open(Arc::new(resolver.clone()), "screen.xml", BTreeMap::new(), &[]).unwrap(),
        ));
        document.borrow_mut().mount(Box::new(host.clone())).unwrap();
        document.borrow_mut().settle().await.unwrap();

        let (root, ok) = {
            let doc = document.borrow();
            let root = doc.root();
            (root, doc.tree().find_by_id(root, "ok").unwrap())
        };
        assert_eq!(host.value_of("title", "text"), Some(Value::from("Hello")));

        let mut registry = ReloadRegistry::new();
        registry.register(&document);
        resolver.insert("screen.xml", screen("Bonjour"));
        assert!(registry.reload(false).is_empty());
        let outcomes = document.borrow_mut().settle().await.unwrap();
        assert_eq!(outcomes.len(), 1);

        let doc = document.borrow();
        assert_eq!(doc.root(), root);
        assert_eq!(doc.tree().find_by_id(root, "ok"), Some(ok));
        assert_eq!(host.value_of("title", "text"), Some(Value::from("Bonjour")));
    }
}
