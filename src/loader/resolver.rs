//! Where templates come from.
//!
//! Fetching and parsing markup belongs to the embedder; the engine only
//! needs a future per path. Futures run on tokio tasks, so they must be
//! `Send`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::LayoutError;
use crate::template::{SourceLocation, Template};

pub type ResolveFuture = Pin<Box<dyn Future<Output = Result<Template, LayoutError>> + Send>>;

/// Supplies templates by path.
pub trait TemplateResolver: Send + Sync {
    /// Fetch and parse the template at `path`.
    fn resolve(&self, path: &str) -> ResolveFuture;

    /// Where `path` is read from. Called on the owning thread and cached
    /// until a hard reload.
    fn locate(&self, path: &str) -> SourceLocation {
        SourceLocation::at(path)
    }
}

/// In-memory resolver for tests and embedded layouts.
///
/// Clones share the same table, so a test can edit templates after handing
/// the resolver to a loader and then trigger a reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    templates: Arc<Mutex<HashMap<String, Template>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    root: Option<String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix reported in source locations (builder).
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Add or replace the template at `path`.
    pub fn insert(&self, path: impl Into<String>, template: Template) {
        if let Ok(mut templates) = self.templates.lock() {
            templates.insert(path.into(), template);
        }
    }

    pub fn remove(&self, path: &str) {
        if let Ok(mut templates) = self.templates.lock() {
            templates.remove(path);
        }
    }

    /// Delay every resolution of `path` by `delay`.
    pub fn delay(&self, path: impl Into<String>, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(path.into(), delay);
        }
    }
}

impl TemplateResolver for MemoryResolver {
    fn resolve(&self, path: &str) -> ResolveFuture {
        let found = self
            .templates
            .lock()
            .map_err(|_| LayoutError::Load {
                path: path.to_owned(),
                message: "template table poisoned".into(),
            })
            .and_then(|templates| {
                templates.get(path).cloned().ok_or_else(|| LayoutError::Load {
                    path: path.to_owned(),
                    message: "not found".into(),
                })
            });
        let delay = self
            .delays
            .lock()
            .ok()
            .and_then(|delays| delays.get(path).copied());
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            found
        })
    }

    fn locate(&self, path: &str) -> SourceLocation {
        let mut location = SourceLocation::at(path);
        if let Some(root) = &self.root {
            location.template_path = Some(format!("{}/{path}", root.trim_end_matches('/')));
            location.relative_path = Some(path.to_owned());
        }
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_inserted_templates() {
        let resolver = MemoryResolver::new();
        resolver.insert("card.xml", Template::new("View").with_id("card"));
        let template = resolver.resolve("card.xml").await.unwrap();
        assert_eq!(template.id.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn missing_template_is_a_load_error() {
        let err = MemoryResolver::new().resolve("nope.xml").await.unwrap_err();
        assert!(matches!(err, LayoutError::Load { ref path, .. } if path == "nope.xml"));
    }

    #[test]
    fn locate_uses_root() {
        let resolver = MemoryResolver::new().with_root("/bundle/");
        let location = resolver.locate("card.xml");
        assert_eq!(location.template_path.as_deref(), Some("/bundle/card.xml"));
        assert_eq!(location.origin.as_deref(), Some("card.xml"));
        assert_eq!(location.relative_path.as_deref(), Some("card.xml"));
    }
}
