//! Integration tests for relayout.
//!
//! These tests exercise the public API from outside the crate, verifying that
//! the type registry, expression engine, layout tree, loader and reload
//! registry work together correctly.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use relayout::cache::clear_all_caches;
use relayout::diagnostics::best_matches;
use relayout::expr::{self, ParseMode, Scope};
use relayout::geometry::{Rect, Size};
use relayout::loader::{LoadOutcome, MemoryResolver, TemplateLoader, TemplateResolver};
use relayout::node::Phase;
use relayout::reload::{LayoutDocument, ReloadRegistry};
use relayout::template::{SourceLocation, Template};
use relayout::testing::{frames_to_string, HostCall, RecordingHost};
use relayout::types::{self, TypeDescriptor, Value};
use relayout::{LayoutError, LayoutTree, NodeId, SymbolErrorKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn mounted(template: &Template, size: Size) -> (LayoutTree, NodeId, RecordingHost) {
    let host = RecordingHost::new(size);
    let mut tree = LayoutTree::new();
    let root = tree.insert_root(template).unwrap();
    tree.mount(root, Box::new(host.clone())).unwrap();
    (tree, root, host)
}

// ---------------------------------------------------------------------------
// Type registry
// ---------------------------------------------------------------------------

#[test]
fn subclass_tables_are_supersets_with_masks() {
    let view = types::types_for("View").unwrap();
    let button = types::types_for("Button").unwrap();
    for name in view.available_names() {
        assert!(button.contains(name), "Button lost {name}");
    }
    assert_eq!(
        button.get("titleLabel.text"),
        Some(&TypeDescriptor::Unavailable("use title instead".into()))
    );
}

#[test]
fn masked_property_fails_construction_with_reason() {
    let template = Template::new("View").with_child(
        Template::new("Button")
            .with_source(SourceLocation::at("buttons.xml"))
            .with_expression("titleLabel.text", "Go"),
    );
    let err = LayoutTree::new().insert_root(&template).unwrap_err();
    assert_eq!(err.resource(), Some("buttons.xml"));
    let LayoutError::Unavailable { property, reason } = err.root_cause() else {
        panic!("expected an unavailable property, got {err:?}");
    };
    assert_eq!(property, "titleLabel.text");
    assert_eq!(reason, "use title instead");
}

// ---------------------------------------------------------------------------
// Expressions and diagnostics
// ---------------------------------------------------------------------------

struct MapScope(HashMap<String, Value>);

impl Scope for MapScope {
    fn resolve(&mut self, path: &str) -> Result<Option<Value>, LayoutError> {
        Ok(self.0.get(path).cloned())
    }

    fn candidates(&mut self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

#[test]
fn evaluation_is_deterministic() {
    let mut scope = MapScope(HashMap::from([
        ("width".to_owned(), Value::Number(100.0)),
        ("name".to_owned(), Value::from("Ada")),
    ]));
    let formula = expr::compile("max(width / 2, 10) + 1", ParseMode::Expression).unwrap();
    let first = expr::evaluate(&formula, &mut scope, None).unwrap();
    let second = expr::evaluate(&formula, &mut scope, None).unwrap();
    assert_eq!(first, Value::Number(51.0));
    assert_eq!(first, second);

    let broken = expr::compile("widht + 1", ParseMode::Expression).unwrap();
    let a = expr::evaluate(&broken, &mut scope, None).unwrap_err();
    let b = expr::evaluate(&broken, &mut scope, None).unwrap_err();
    assert_eq!(a, b);
    let symbol = a.symbol_error().unwrap();
    assert_eq!(symbol.kind, SymbolErrorKind::UnknownExpression);
    assert_eq!(symbol.suggestions.first().map(String::as_str), Some("width"));
}

#[test]
fn best_matches_ranks_by_distance_then_name() {
    let matches = best_matches("witdh", ["height", "width", "layer.borderWidth", "widths"]);
    assert_eq!(matches, vec!["width", "widths", "height"]);
}

#[test]
fn unknown_property_lists_suggestions() {
    let template = Template::new("Label").with_expression("txet", "Hello");
    let err = LayoutTree::new().insert_root(&template).unwrap_err();
    let symbol = err.symbol_error().unwrap();
    assert_eq!(symbol.kind, SymbolErrorKind::UnknownProperty);
    assert_eq!(symbol.suggestions.first().map(String::as_str), Some("text"));
    assert!(symbol.suggestions.len() <= 3);
}

// ---------------------------------------------------------------------------
// Layout tree
// ---------------------------------------------------------------------------

#[test]
fn mutations_invalidate_exactly_their_dependents() {
    init_tracing();
    let template = Template::new("View")
        .with_expression("width", "100%")
        .with_expression("height", "100%")
        .with_child(Template::new("View").with_id("a").with_expression("width", "40"))
        .with_child(Template::new("View").with_id("b").with_expression("width", "a.width + 10"))
        .with_child(Template::new("View").with_id("c").with_expression("width", "50"))
        .with_child(Template::new("Label").with_id("d").with_expression("text", "Hi {name}"));
    let (mut tree, root, host) = mounted(&template, Size::new(200.0, 100.0));
    let [a, b, c, d] = ["a", "b", "c", "d"].map(|id| tree.find_by_id(root, id).unwrap());
    tree.set_state(root, [("name", Value::from("Ada"))]).unwrap();
    tree.update().unwrap();
    host.clear_calls();

    tree.set_expression(a, "width", "30").unwrap();
    assert!(!tree.is_cached(a, "width"));
    assert!(!tree.is_cached(b, "width"));
    assert!(tree.is_cached(c, "width"));
    assert!(tree.is_cached(d, "text"));
    assert_eq!(tree.dirty_properties(b).into_iter().collect::<Vec<_>>(), vec!["width".to_owned()]);
    assert_eq!(tree.phase(c), Some(&Phase::Attached));

    tree.set_state(root, [("name", Value::from("Grace"))]).unwrap();
    assert!(!tree.is_cached(d, "text"));
    assert!(tree.is_cached(c, "width"));

    tree.update().unwrap();
    assert_eq!(tree.frame(b).unwrap().width, 40.0);
    assert_eq!(host.value_of("d", "text"), Some(Value::from("Hi Grace")));
    assert!(!host.calls().iter().any(|call| matches!(call, HostCall::SetFrame { node, .. } if node == "c")));
}

#[test]
fn cycles_are_reported_with_their_path() {
    let template = Template::new("View")
        .with_expression("width", "height")
        .with_expression("height", "width");
    let mut tree = LayoutTree::new();
    let root = tree.insert_root(&template).unwrap();
    let err = tree.value(root, "width").unwrap_err();
    assert!(err.is_cycle());
    let LayoutError::CyclicDependency { cycle } = err.root_cause() else {
        unreachable!();
    };
    assert_eq!(cycle.first(), cycle.last());
    assert!(cycle.iter().any(|step| step.ends_with("height")));
}

#[test]
fn sibling_and_count_expressions_follow_structure() {
    let template = Template::new("View")
        .with_id("list")
        .with_expression("width", "100%")
        .with_expression("height", "auto")
        .with_expression("tag", "children.count")
        .with_child(Template::new("View").with_id("one").with_expression("height", "10"))
        .with_child(
            Template::new("View")
                .with_id("two")
                .with_expression("top", "previous.bottom")
                .with_expression("height", "10"),
        );
    let (mut tree, root, _) = mounted(&template, Size::new(100.0, 100.0));
    assert_eq!(tree.value(root, "tag").unwrap(), Value::Number(2.0));

    tree.insert_child(root, 0, &Template::new("View").with_expression("height", "5")).unwrap();
    tree.update().unwrap();
    let one = tree.find_by_id(root, "one").unwrap();
    tree.set_expression(one, "top", "previous.bottom").unwrap();
    tree.update().unwrap();

    insta::assert_snapshot!(frames_to_string(&mut tree, root), @r"
    View#list {0, 0, 100, 25}
      View {0, 0, 0, 5}
      View#one {0, 5, 0, 10}
      View#two {0, 15, 0, 10}
    ");
    assert_eq!(tree.value(root, "tag").unwrap(), Value::Number(3.0));
}

#[test]
fn partial_unmount_releases_remaining_views() {
    let template = Template::new("View")
        .with_id("root")
        .with_child(Template::new("Label").with_id("first"))
        .with_child(Template::new("Label").with_id("stuck"))
        .with_child(Template::new("Label").with_id("last"));
    let host = RecordingHost::new(Size::new(10.0, 10.0)).fail_release("stuck");
    let mut tree = LayoutTree::new();
    let root = tree.insert_root(&template).unwrap();
    tree.mount(root, Box::new(host.clone())).unwrap();

    let err = tree.unmount(root).unwrap_err();
    let LayoutError::Release { failures } = &err else {
        panic!("expected release failures, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(host.released(), vec!["root", "first", "last"]);
    assert!(tree.is_empty());
    assert!(matches!(tree.value(root, "width"), Err(LayoutError::StaleNode)));
}

#[test]
fn hot_reload_keeps_identity_of_unchanged_nodes() {
    let v1 = Template::new("View")
        .with_expression("width", "100%")
        .with_child(Template::new("Label").with_id("title").with_expression("text", "One"))
        .with_child(Template::new("Button").with_id("ok").with_expression("title", "OK"));
    let v2 = Template::new("View")
        .with_expression("width", "100%")
        .with_child(Template::new("Label").with_id("title").with_expression("text", "Two"))
        .with_child(Template::new("Button").with_id("ok").with_expression("title", "OK"));
    let (mut tree, root, host) = mounted(&v1, Size::new(100.0, 100.0));
    let ok = tree.find_by_id(root, "ok").unwrap();
    let title = tree.find_by_id(root, "title").unwrap();

    let report = tree.apply_template(root, &v2).unwrap();
    assert_eq!(report.root, root);
    assert!(report.reused.contains(&ok));
    assert_eq!(report.removed, vec![title]);
    assert!(tree.is_cached(ok, "title"));

    tree.update().unwrap();
    assert_eq!(host.value_of("title", "text"), Some(Value::from("Two")));
    assert_eq!(host.frame_of("title").map(|f| f.width), Some(0.0));
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

#[test]
fn clearing_caches_gives_equal_not_identical_results() {
    let before = types::types_for("ScrollView").unwrap();
    let compiled = expr::compile("Hello {name}", ParseMode::Interpolated).unwrap();
    clear_all_caches();
    let after = types::types_for("ScrollView").unwrap();
    let recompiled = expr::compile("Hello {name}", ParseMode::Interpolated).unwrap();
    assert!(!Rc::ptr_eq(&before, &after));
    assert_eq!(before, after);
    assert!(!Rc::ptr_eq(&compiled, &recompiled));
    assert_eq!(compiled, recompiled);
}

// ---------------------------------------------------------------------------
// Loading and reload
// ---------------------------------------------------------------------------

fn header() -> Template {
    Template::new("View")
        .with_id("header")
        .with_expression("width", "parent.width")
        .with_expression("height", "44")
        .with_child(Template::new("Label").with_id("caption").with_expression("text", "{title}"))
}

fn page(extra: &str) -> Template {
    Template::new("View")
        .with_expression("width", "100%")
        .with_expression("height", "100%")
        .with_child(Template::new("View").with_expression("template", "header.xml"))
        .with_child(
            Template::new("Label")
                .with_id("body")
                .with_expression("top", "header.bottom")
                .with_expression("text", extra),
        )
}

#[test]
fn resolver_futures_can_be_stepped_without_a_runtime() {
    let resolver = MemoryResolver::new();
    resolver.insert("header.xml", header());
    let template = tokio_test::block_on(resolver.resolve("header.xml")).unwrap();
    assert_eq!(template, header());
}

#[tokio::test]
async fn loader_composes_nested_templates_with_inherited_state() {
    init_tracing();
    let resolver = MemoryResolver::new();
    resolver.insert("header.xml", header());
    let mut tree = LayoutTree::new();
    let mut loader = TemplateLoader::new(resolver);
    let state = BTreeMap::from([("title".to_owned(), Value::from("Inbox"))]);
    let root = loader.load(&mut tree, &page("Body"), state, &[]).unwrap();
    let host = RecordingHost::new(Size::new(320.0, 480.0));
    tree.mount(root, Box::new(host.clone())).unwrap();

    let outcomes = loader.settle(&mut tree).await;
    assert!(matches!(outcomes.as_slice(), [LoadOutcome::Applied { .. }]));
    tree.update().unwrap();

    assert_eq!(host.frame_of("header"), Some(Rect::new(0.0, 0.0, 320.0, 44.0)));
    assert_eq!(host.frame_of("body").map(|f| f.y), Some(44.0));
    assert_eq!(host.value_of("caption", "text"), Some(Value::from("Inbox")));
    assert!(host.calls().contains(&HostCall::MakeView {
        node: "caption".into(),
        class: "Label".into()
    }));
}

#[tokio::test]
async fn failed_nested_load_reports_node_and_path() {
    let mut tree = LayoutTree::new();
    let mut loader = TemplateLoader::new(MemoryResolver::new());
    loader.load(&mut tree, &page("Body"), BTreeMap::new(), &[]).unwrap();
    let outcomes = loader.settle(&mut tree).await;
    let error = outcomes[0].error().unwrap();
    assert!(error.to_string().contains("header.xml"), "got {error}");
    assert!(matches!(error.root_cause(), LayoutError::Load { .. }));
}

#[tokio::test]
async fn registry_reload_updates_documents_in_place() {
    let resolver = MemoryResolver::new();
    resolver.insert("header.xml", header());
    resolver.insert("page.xml", page("Before"));
    let shared: Arc<dyn TemplateResolver> = Arc::new(resolver.clone());

    let document = Rc::new(RefCell::new(
        LayoutDocument::open(Arc::clone(&shared), "page.xml", BTreeMap::new(), &[]).unwrap(),
    ));
    let host = RecordingHost::new(Size::new(200.0, 300.0));
    document.borrow_mut().mount(Box::new(host.clone())).unwrap();
    // Page first, then the header it references.
    document.borrow_mut().settle().await.unwrap();

    let (root, header, caption) = {
        let doc = document.borrow();
        let root = doc.root();
        (
            root,
            doc.tree().find_by_id(root, "header").unwrap(),
            doc.tree().find_by_id(root, "caption").unwrap(),
        )
    };
    assert_eq!(host.value_of("body", "text"), Some(Value::from("Before")));

    let mut registry = ReloadRegistry::new();
    registry.register(&document);
    resolver.insert("page.xml", page("After"));
    assert!(registry.reload(true).is_empty());
    document.borrow_mut().settle().await.unwrap();

    let doc = document.borrow();
    assert_eq!(doc.root(), root);
    assert_eq!(host.value_of("body", "text"), Some(Value::from("After")));
    assert_eq!(doc.tree().find_by_id(root, "header"), Some(header));
    assert_eq!(doc.tree().find_by_id(root, "caption"), Some(caption));
}

#[tokio::test]
async fn unchanged_reload_keeps_nested_templates_and_views() {
    let resolver = MemoryResolver::new();
    resolver.insert("header.xml", header());
    resolver.insert("page.xml", page("Same"));

    let document = Rc::new(RefCell::new(
        LayoutDocument::open(Arc::new(resolver.clone()), "page.xml", BTreeMap::new(), &[]).unwrap(),
    ));
    let host = RecordingHost::new(Size::new(200.0, 300.0));
    document.borrow_mut().mount(Box::new(host.clone())).unwrap();
    document.borrow_mut().settle().await.unwrap();

    let before = {
        let doc = document.borrow();
        doc.tree().walk_depth_first(doc.root())
    };
    host.clear_calls();

    let mut registry = ReloadRegistry::new();
    registry.register(&document);
    assert!(registry.reload(false).is_empty());
    let outcomes = document.borrow_mut().settle().await.unwrap();
    // The page, then the header it still references.
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| matches!(o, LoadOutcome::Applied { .. })));

    let doc = document.borrow();
    assert_eq!(doc.tree().walk_depth_first(doc.root()), before);
    let churn: Vec<_> = host
        .calls()
        .into_iter()
        .filter(|call| matches!(call, HostCall::MakeView { .. } | HostCall::Release { .. }))
        .collect();
    assert_eq!(churn, Vec::new());
}

// ---------------------------------------------------------------------------
// template! macro
// ---------------------------------------------------------------------------

#[cfg(feature = "macros")]
#[test]
fn template_macro_builds_templates() {
    let built = relayout::template! {
        <View id="screen" width="100%">
            <Label id="title" left="10" width="parent.width - 20" layer.cornerRadius="4" />
            <View template="card.xml" />
        </View>
    };
    let expected = Template::new("View")
        .with_id("screen")
        .with_expression("width", "100%")
        .with_child(
            Template::new("Label")
                .with_id("title")
                .with_expression("left", "10")
                .with_expression("width", "parent.width - 20")
                .with_expression("layer.cornerRadius", "4"),
        )
        .with_child(Template::new("View").with_expression("template", "card.xml"));
    assert_eq!(built, expected);
}
