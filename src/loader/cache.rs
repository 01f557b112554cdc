//! Template caches shared by every loader on the UI thread.
//!
//! - parsed templates: what the resolver returned for a path;
//! - composed layouts: the parsed template stamped with its resolved source
//!   location, ready to merge into a referencing element;
//! - source locations: where each path resolves to.
//!
//! Forgetting locations also forgets composed layouts, since each carries
//! one; the parsed template is stamped again on the next request.
//!
//! Completions are applied on the owning thread, so the caches are
//! thread-local like the type registry and the expression cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::template::{SourceLocation, Template};

thread_local! {
    static PARSED: RefCell<HashMap<String, Rc<Template>>> = RefCell::new(HashMap::new());
    static COMPOSED: RefCell<HashMap<String, Rc<Template>>> = RefCell::new(HashMap::new());
    static LOCATIONS: RefCell<HashMap<String, SourceLocation>> = RefCell::new(HashMap::new());
}

/// Entry counts, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub parsed: usize,
    pub composed: usize,
    pub locations: usize,
}

pub fn parsed(path: &str) -> Option<Rc<Template>> {
    PARSED.with(|c| c.borrow().get(path).cloned())
}

pub fn composed(path: &str) -> Option<Rc<Template>> {
    COMPOSED.with(|c| c.borrow().get(path).cloned())
}

/// Record a freshly resolved template and derive its composed form.
pub(crate) fn store(path: &str, template: Template, location: SourceLocation) -> Rc<Template> {
    let mut base = template.clone();
    if base.source.is_none() {
        base.source = Some(location);
    }
    let base = Rc::new(base);
    PARSED.with(|c| c.borrow_mut().insert(path.to_owned(), Rc::new(template)));
    COMPOSED.with(|c| c.borrow_mut().insert(path.to_owned(), Rc::clone(&base)));
    base
}

/// The source location of `path`, resolving it with `locate` on a miss.
pub fn location(path: &str, locate: impl FnOnce(&str) -> SourceLocation) -> SourceLocation {
    if let Some(hit) = LOCATIONS.with(|c| c.borrow().get(path).cloned()) {
        return hit;
    }
    let resolved = locate(path);
    LOCATIONS.with(|c| c.borrow_mut().insert(path.to_owned(), resolved.clone()));
    resolved
}

/// Forget parsed and composed templates so the next request re-fetches.
pub fn clear_templates() {
    PARSED.with(|c| c.borrow_mut().clear());
    COMPOSED.with(|c| c.borrow_mut().clear());
}

/// Forget resolved source locations and the composed layouts stamped with
/// them.
pub fn clear_locations() {
    LOCATIONS.with(|c| c.borrow_mut().clear());
    COMPOSED.with(|c| c.borrow_mut().clear());
}

pub fn clear() {
    clear_templates();
    clear_locations();
}

pub fn stats() -> CacheStats {
    CacheStats {
        parsed: PARSED.with(|c| c.borrow().len()),
        composed: COMPOSED.with(|c| c.borrow().len()),
        locations: LOCATIONS.with(|c| c.borrow().len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_stamps_location_on_composed_only() {
        clear();
        let base = store("card.xml", Template::new("View"), SourceLocation::at("/res/card.xml"));
        assert_eq!(base.source.as_ref().and_then(|s| s.resource()), Some("/res/card.xml"));
        assert!(parsed("card.xml").unwrap().source.is_none());
        assert!(Rc::ptr_eq(&composed("card.xml").unwrap(), &base));
    }

    #[test]
    fn location_resolves_once() {
        clear();
        let mut calls = 0;
        let first = location("a.xml", |p| {
            calls += 1;
            SourceLocation::at(format!("/res/{p}"))
        });
        let second = location("a.xml", |_| unreachable!("cached"));
        assert_eq!(first, second);
        assert_eq!(calls, 1);

        clear_locations();
        assert_eq!(stats().locations, 0);
    }

    #[test]
    fn clear_locations_keeps_parsed_templates() {
        clear();
        store("c.xml", Template::new("View"), SourceLocation::at("/old/c.xml"));
        clear_locations();
        assert_eq!(stats(), CacheStats { parsed: 1, composed: 0, locations: 0 });
        assert!(parsed("c.xml").is_some());
    }

    #[test]
    fn clear_templates_keeps_locations() {
        clear();
        store("b.xml", Template::new("Label"), SourceLocation::at("b.xml"));
        location("b.xml", |p| SourceLocation::at(p));
        clear_templates();
        assert_eq!(stats(), CacheStats { parsed: 0, composed: 0, locations: 1 });
    }
}
