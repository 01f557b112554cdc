//! One switch for every process-wide cache the engine keeps.

use crate::{expr, loader, types};

/// Drop compiled expressions, parsed templates, composed layouts, source
/// locations, runtime type tables and per-class expression types.
///
/// Registrations survive; whatever is asked for next is rebuilt equal to
/// what was dropped, but not identical. Calling it twice is harmless.
pub fn clear_all_caches() {
    let compiled = expr::cache::len();
    let templates = loader::cache::stats();
    expr::cache::clear();
    loader::cache::clear();
    types::registry::clear();
    tracing::debug!(
        compiled,
        parsed = templates.parsed,
        composed = templates.composed,
        locations = templates.locations,
        "cleared all caches"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::expr::ParseMode;
    use crate::template::{SourceLocation, Template};

    #[test]
    fn clear_is_equality_not_identity() {
        let table = types::types_for("Label").unwrap();
        let compiled = expr::compile("parent.width / 2", ParseMode::Expression).unwrap();
        loader::cache::store("card.xml", Template::new("View"), SourceLocation::at("card.xml"));

        clear_all_caches();
        assert_eq!(expr::cache::len(), 0);
        assert_eq!(loader::cache::stats(), loader::CacheStats::default());

        let rebuilt = types::types_for("Label").unwrap();
        assert!(!Rc::ptr_eq(&table, &rebuilt));
        assert_eq!(*table, *rebuilt);
        let recompiled = expr::compile("parent.width / 2", ParseMode::Expression).unwrap();
        assert!(!Rc::ptr_eq(&compiled, &recompiled));
        assert_eq!(*compiled, *recompiled);

        clear_all_caches();
        clear_all_caches();
        assert_eq!(expr::cache::len(), 0);
    }
}
