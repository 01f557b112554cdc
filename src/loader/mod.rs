//! Template loading: synchronous construction plus deferred nested templates.
//!
//! [`TemplateLoader::load`] builds a root from a template right away. An
//! element carrying `template="path"` stays a placeholder while the
//! [`TemplateResolver`] fetches that path on a tokio task; the result comes
//! back over an unbounded channel and is applied on the owning thread by
//! [`drain`](TemplateLoader::drain) or
//! [`next_completion`](TemplateLoader::next_completion). Applying a
//! completion composes the placeholder with the fetched base
//! ([`Template::merged_into`]) and reconciles the live subtree with
//! [`LayoutTree::apply_template`].
//!
//! A completion whose node was dropped in the meantime is discarded; the
//! slotmap key simply stops resolving.

pub mod cache;
pub mod resolver;

pub use cache::CacheStats;
pub use resolver::{MemoryResolver, ResolveFuture, TemplateResolver};

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::LayoutError;
use crate::node::{LayoutTree, NodeId, UpdateReport};
use crate::template::{SourceLocation, Template};
use crate::types::Value;

/// A fetched (or failed) template on its way back to the owning thread.
struct Completion {
    node: NodeId,
    path: String,
    /// The referencing element, children included, as it was requested.
    reference: Template,
    location: SourceLocation,
    result: Result<Template, LayoutError>,
    /// Served from the composed cache; nothing new to store.
    cached: bool,
}

/// What applying one completion did.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The template was composed into the tree.
    Applied {
        node: NodeId,
        path: String,
        report: UpdateReport,
    },
    /// The requesting node no longer exists.
    Discarded { node: NodeId, path: String },
    /// Fetching or composing failed; `error` carries the node's context.
    Failed {
        node: NodeId,
        path: String,
        error: LayoutError,
    },
}

impl LoadOutcome {
    pub fn node(&self) -> NodeId {
        match self {
            LoadOutcome::Applied { node, .. }
            | LoadOutcome::Discarded { node, .. }
            | LoadOutcome::Failed { node, .. } => *node,
        }
    }

    pub fn error(&self) -> Option<&LayoutError> {
        match self {
            LoadOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Builds trees from templates and resolves their nested template
/// references asynchronously.
pub struct TemplateLoader {
    resolver: Arc<dyn TemplateResolver>,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl TemplateLoader {
    pub fn new(resolver: impl TemplateResolver + 'static) -> Self {
        Self::with_shared(Arc::new(resolver))
    }

    /// A loader over a resolver shared with other loaders.
    pub fn with_shared(resolver: Arc<dyn TemplateResolver>) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            resolver,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Requests sent but not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Build a root from `template`, seed its state and constants, and
    /// request every nested template it references.
    ///
    /// `constants` are merged in order; a later map wins for a key present
    /// in several.
    pub fn load(
        &mut self,
        tree: &mut LayoutTree,
        template: &Template,
        state: BTreeMap<String, Value>,
        constants: &[BTreeMap<String, Value>],
    ) -> Result<NodeId, LayoutError> {
        let root = tree.insert_root(template)?;
        let merged: BTreeMap<String, Value> = constants
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect();
        tree.set_constants(root, merged)?;
        tree.set_state(root, state)?;
        self.request_pending(tree, root)?;
        tracing::debug!(class = %template.class, pending = self.in_flight, "loaded template");
        Ok(root)
    }

    /// Request every placeholder in the subtree at `node`.
    pub fn request_pending(&mut self, tree: &LayoutTree, node: NodeId) -> Result<(), LayoutError> {
        let pending: Vec<NodeId> = tree
            .walk_depth_first(node)
            .into_iter()
            .filter(|&id| tree.get(id).is_some_and(|n| n.pending_template().is_some()))
            .collect();
        for id in pending {
            let reference = reference_for(tree, id).ok_or(LayoutError::StaleNode)?;
            self.request(id, reference)?;
        }
        Ok(())
    }

    /// Fetch the template `reference` names and compose it into `node` once
    /// it arrives. Served from the caches when possible; a parsed template
    /// whose location was forgotten is stamped with the fresh one.
    pub fn request(&mut self, node: NodeId, reference: Template) -> Result<(), LayoutError> {
        let path = reference
            .template_path()
            .ok_or_else(|| LayoutError::invalid(format!("{} does not reference a template", reference.class)))?
            .to_owned();
        let location = cache::location(&path, |p| self.resolver.locate(p));
        self.in_flight += 1;

        let cached = cache::composed(&path).or_else(|| {
            cache::parsed(&path).map(|parsed| cache::store(&path, (*parsed).clone(), location.clone()))
        });
        if let Some(base) = cached {
            tracing::trace!(%path, "template served from cache");
            let _ = self.sender.send(Completion {
                node,
                path,
                reference,
                location,
                result: Ok((*base).clone()),
                cached: true,
            });
            return Ok(());
        }

        let mut completion = Completion {
            node,
            path: path.clone(),
            reference,
            location,
            result: Err(LayoutError::Load {
                path: path.clone(),
                message: "no async runtime to load on".into(),
            }),
            cached: false,
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%path, "template requested outside a tokio runtime");
            let _ = self.sender.send(completion);
            return Ok(());
        };
        let future = self.resolver.resolve(&path);
        let sender = self.sender.clone();
        handle.spawn(async move {
            completion.result = future.await;
            let _ = sender.send(completion);
        });
        tracing::debug!(%path, "requested template");
        Ok(())
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain(&mut self, tree: &mut LayoutTree) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            outcomes.push(self.apply(tree, completion));
        }
        outcomes
    }

    /// Wait for the next completion and apply it. `None` when nothing is in
    /// flight.
    pub async fn next_completion(&mut self, tree: &mut LayoutTree) -> Option<LoadOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.receiver.recv().await?;
        Some(self.apply(tree, completion))
    }

    /// Apply completions until nothing is left in flight, including
    /// requests made by the completions themselves.
    pub async fn settle(&mut self, tree: &mut LayoutTree) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_completion(tree).await {
            outcomes.push(outcome);
        }
        outcomes
    }

    fn apply(&mut self, tree: &mut LayoutTree, completion: Completion) -> LoadOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion {
            node,
            path,
            reference,
            location,
            result,
            cached,
        } = completion;

        if !tree.contains(node) {
            tracing::debug!(%path, "discarding template for a dropped node");
            return LoadOutcome::Discarded { node, path };
        }

        let composed = result
            .map(|template| {
                if cached {
                    template
                } else {
                    (*cache::store(&path, template, location)).clone()
                }
            })
            .and_then(|base| reference.merged_into(&base))
            .and_then(|merged| tree.apply_template(node, &merged));

        let report = match composed {
            Ok(report) => {
                tree.mark_composed(report.root, reference);
                report
            }
            Err(err) => {
                let error = tree.node_error(
                    node,
                    LayoutError::AsyncLoad {
                        path: path.clone(),
                        source: Box::new(err),
                    },
                );
                tracing::warn!(%path, %error, "template load failed");
                return LoadOutcome::Failed { node, path, error };
            }
        };

        for &id in report.constructed.iter().chain(&report.refetch) {
            let Some(reference) = tree
                .get(id)
                .filter(|n| n.pending_template().is_some())
                .and_then(|_| reference_for(tree, id))
            else {
                continue;
            };
            if let Err(err) = self.request(id, reference) {
                tracing::warn!(%err, "failed to request nested template");
            }
        }
        tracing::debug!(%path, constructed = report.constructed.len(), "applied template");
        LoadOutcome::Applied { node, path, report }
    }
}

/// The element to request for a pending node: the reference it was
/// composed from, else the placeholder as built.
fn reference_for(tree: &LayoutTree, id: NodeId) -> Option<Template> {
    tree.get(id)?.reference().cloned().or_else(|| tree.snapshot(id))
}
