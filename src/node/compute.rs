//! Lazy, memoized property evaluation and the layout default rules.

use crate::error::{LayoutError, SymbolError, SymbolErrorKind};
use crate::expr::{self, ParseMode};
use crate::geometry::{Point, Rect, Size};
use crate::types::{cast, StructValue, TypeDescriptor, Value};

use super::data::NodeId;
use super::deps::{CacheKey, Slot};
use super::scope::NodeScope;
use super::tree::{is_layout_key, LayoutTree, LAYOUT_KEYS};

/// The four keys of one layout axis.
#[derive(Clone, Copy)]
struct Axis {
    start: &'static str,
    end: &'static str,
    size: &'static str,
    center: &'static str,
    horizontal: bool,
}

const HORIZONTAL: Axis = Axis {
    start: "left",
    end: "right",
    size: "width",
    center: "center.x",
    horizontal: true,
};

const VERTICAL: Axis = Axis {
    start: "top",
    end: "bottom",
    size: "height",
    center: "center.y",
    horizontal: false,
};

fn axis_of(key: &str) -> Axis {
    match key {
        "top" | "bottom" | "height" | "center.y" => VERTICAL,
        _ => HORIZONTAL,
    }
}

/// Whether `n%` on `key` resolves against the parent's width (`Some(true)`),
/// its height (`Some(false)`), or not at all.
pub(crate) fn percent_axis(key: &str) -> Option<bool> {
    match key {
        "left" | "right" | "width" | "center.x" => Some(true),
        "top" | "bottom" | "height" | "center.y" => Some(false),
        _ => None,
    }
}

impl LayoutTree {
    /// The current value of `key` on `node`, computing and memoizing it (and
    /// whatever it reads) if needed.
    pub fn value(&mut self, node: NodeId, key: &str) -> Result<Value, LayoutError> {
        if key == "frame" && self.contains(node) {
            return self.frame(node).map(Value::rect);
        }
        let known = self.nodes.get(node).ok_or(LayoutError::StaleNode)?;
        if !known.knows(key) && !is_layout_key(key) {
            let candidates: Vec<String> = LAYOUT_KEYS
                .iter()
                .map(|k| (*k).to_owned())
                .chain(known.types.available_names().map(str::to_owned))
                .chain(known.parameters.keys().cloned())
                .collect();
            let mut suggestions = crate::diagnostics::best_matches(key, &candidates);
            suggestions.truncate(crate::types::registry::config().max_suggestions);
            return Err(SymbolError::new(SymbolErrorKind::UnknownProperty, key)
                .with_suggestions(suggestions)
                .into());
        }
        self.compute(node, key)
    }

    /// The node's frame: `left`, `top`, `width`, `height`.
    pub fn frame(&mut self, node: NodeId) -> Result<Rect, LayoutError> {
        Ok(Rect::new(
            self.number(node, "left")?,
            self.number(node, "top")?,
            self.number(node, "width")?,
            self.number(node, "height")?,
        ))
    }

    /// Container size of the tree `root` belongs to; zero until mounted or
    /// set explicitly.
    pub fn container_size(&self, root: NodeId) -> Size {
        self.containers.get(root).copied().unwrap_or(Size::ZERO)
    }

    // ── Memoization ──────────────────────────────────────────────────

    pub(crate) fn compute(&mut self, node: NodeId, key: &str) -> Result<Value, LayoutError> {
        if !self.nodes.contains_key(node) {
            return Err(LayoutError::StaleNode);
        }
        self.memoize(CacheKey::property(node, key), |tree| tree.evaluate_property(node, key))
    }

    pub(crate) fn number(&mut self, node: NodeId, key: &str) -> Result<f64, LayoutError> {
        let value = self.compute(node, key)?;
        value
            .as_number()
            .ok_or_else(|| LayoutError::mismatch("Number", value.kind_name()))
    }

    /// Return the cached result for `key`, or compute it with `f` while
    /// recording everything `f` reads.
    pub(crate) fn memoize(
        &mut self,
        key: CacheKey,
        f: impl FnOnce(&mut Self) -> Result<Value, LayoutError>,
    ) -> Result<Value, LayoutError> {
        self.graph.record_read(&key);
        if let Some(result) = self.graph.get(&key) {
            return result.clone();
        }
        if let Some(cycle) = self.graph.cycle_through(&key) {
            let cycle = cycle.iter().map(|k| self.describe(k)).collect();
            return Err(LayoutError::CyclicDependency { cycle });
        }
        self.graph.enter(key);
        let result = f(self);
        self.graph.leave(&result);
        result
    }

    fn describe(&self, key: &CacheKey) -> String {
        let label = self.nodes.get(key.node).map(|n| n.label()).unwrap_or("?");
        format!("{label}.{}", key.slot)
    }

    // ── Property evaluation ──────────────────────────────────────────

    fn evaluate_property(&mut self, node: NodeId, key: &str) -> Result<Value, LayoutError> {
        let source = self.bound_expression(node, key)?;
        if let Some(source) = source {
            let expected = if is_layout_key(key) {
                Some(TypeDescriptor::Number)
            } else {
                self.nodes.get(node).and_then(|n| n.type_of(key))
            };
            return self
                .evaluate_bound(node, key, &source, expected.as_ref())
                .map_err(|err| match err {
                    err @ (LayoutError::Property { .. } | LayoutError::Node { .. }) => err,
                    err => LayoutError::Property {
                        property: key.to_owned(),
                        expression: Some(source.clone()),
                        source: Box::new(err),
                    },
                });
        }
        if is_layout_key(key) {
            return self.layout_default(node, key);
        }
        if key == "center" {
            let point = Point::new(self.number(node, "center.x")?, self.number(node, "center.y")?);
            return Ok(Value::point(point));
        }
        self.unbound_value(node, key)
    }

    /// The expression bound to `key`, recorded as a dependency so binding or
    /// unbinding it later invalidates the reader.
    fn bound_expression(&mut self, node: NodeId, key: &str) -> Result<Option<String>, LayoutError> {
        self.record_source(node, Slot::Expression(key.to_owned()));
        let n = self.nodes.get(node).ok_or(LayoutError::StaleNode)?;
        Ok(n.expressions.get(key).cloned())
    }

    fn has_expression(&mut self, node: NodeId, key: &str) -> bool {
        matches!(self.bound_expression(node, key), Ok(Some(_)))
    }

    fn evaluate_bound(
        &mut self,
        node: NodeId,
        key: &str,
        source: &str,
        expected: Option<&TypeDescriptor>,
    ) -> Result<Value, LayoutError> {
        let compiled = expr::compile(source, expr::mode_for(expected))?;
        let value = {
            let mut scope = NodeScope::new(self, node, key);
            expr::evaluate(&compiled, &mut scope, expected)?
        };
        match expected {
            Some(ty) => cast(value, ty),
            None => Ok(value),
        }
    }

    /// Expand macro `name` in the scope of `node`.
    pub(crate) fn expand_macro(
        &mut self,
        node: NodeId,
        name: &str,
        expansion: &str,
    ) -> Result<Value, LayoutError> {
        let key = CacheKey::new(node, Slot::Macro(name.to_owned()));
        self.memoize(key, |tree| {
            let compiled = expr::compile(expansion, ParseMode::Expression)?;
            let mut scope = NodeScope::new(tree, node, name);
            expr::evaluate(&compiled, &mut scope, None)
        })
    }

    // ── Layout defaults ──────────────────────────────────────────────

    fn layout_default(&mut self, node: NodeId, key: &str) -> Result<Value, LayoutError> {
        let axis = axis_of(key);
        let value = if key == axis.size {
            if self.has_expression(node, axis.start) && self.has_expression(node, axis.end) {
                self.number(node, axis.end)? - self.number(node, axis.start)?
            } else {
                self.auto_size(node, axis.horizontal)?
            }
        } else if key == axis.start {
            if self.has_expression(node, axis.end) {
                self.number(node, axis.end)? - self.number(node, axis.size)?
            } else if self.has_center(node, axis) {
                self.number(node, axis.center)? - self.number(node, axis.size)? / 2.0
            } else {
                0.0
            }
        } else if key == axis.end {
            self.number(node, axis.start)? + self.number(node, axis.size)?
        } else if self.has_expression(node, "center") {
            let center = self.compute(node, "center")?;
            let field = if axis.horizontal { "x" } else { "y" };
            center.member(field).and_then(|v| v.as_number()).unwrap_or(0.0)
        } else {
            self.number(node, axis.start)? + self.number(node, axis.size)? / 2.0
        };
        Ok(Value::Number(value))
    }

    fn has_center(&mut self, node: NodeId, axis: Axis) -> bool {
        self.has_expression(node, axis.center) || self.has_expression(node, "center")
    }

    /// Bounding extent of the children along one axis, else the view's
    /// intrinsic size, else zero.
    pub(crate) fn auto_size(&mut self, node: NodeId, horizontal: bool) -> Result<f64, LayoutError> {
        self.record_source(node, Slot::Children);
        let children = self.children(node).to_vec();
        if !children.is_empty() {
            let edge = if horizontal { "right" } else { "bottom" };
            let mut extent: f64 = 0.0;
            for child in children {
                extent = extent.max(self.number(child, edge)?);
            }
            return Ok(extent);
        }
        let intrinsic = self
            .nodes
            .get(node)
            .and_then(|n| n.view.as_ref())
            .and_then(|view| view.intrinsic_size());
        Ok(match intrinsic {
            Some(size) if horizontal => size.width,
            Some(size) => size.height,
            None => 0.0,
        })
    }

    // ── Unbound properties ───────────────────────────────────────────

    fn unbound_value(&mut self, node: NodeId, key: &str) -> Result<Value, LayoutError> {
        // A field of a bound composite: `contentInset.top` under `contentInset`.
        let mut prefix = key;
        while let Some((head, _)) = prefix.rsplit_once('.') {
            if self.has_expression(node, head) {
                let member = &key[head.len() + 1..];
                let whole = self.compute(node, head)?;
                return member_path(&whole, member).ok_or_else(|| {
                    SymbolError::new(SymbolErrorKind::UnknownMember, key).into()
                });
            }
            prefix = head;
        }

        let n = self.nodes.get(node).ok_or(LayoutError::StaleNode)?;
        let ty = n.type_of(key);

        // A composite assembled from bound fields.
        if let Some(TypeDescriptor::Composite(composite)) = &ty {
            let fields: Vec<String> = composite.fields.iter().map(|(name, _)| name.clone()).collect();
            let mut any_bound = false;
            for field in &fields {
                any_bound |= self.has_expression(node, &format!("{key}.{field}"));
            }
            if any_bound {
                let mut value = StructValue::new(composite.name.clone());
                for field in fields {
                    let v = self.compute(node, &format!("{key}.{field}"))?;
                    value = value.with(field, v);
                }
                return Ok(Value::Struct(value));
            }
        }

        let n = self.nodes.get(node).ok_or(LayoutError::StaleNode)?;
        if let Some(TypeDescriptor::Unavailable(reason)) = &ty {
            return Err(LayoutError::Unavailable {
                property: key.to_owned(),
                reason: reason.clone(),
            });
        }
        if let Some(current) = n.view.as_ref().and_then(|view| view.value(key)) {
            return Ok(current);
        }
        if let Some(default) = n.types.default_for(key) {
            return Ok(default);
        }
        Ok(ty.map(|t| t.default_value()).unwrap_or_default())
    }
}

/// Follow a dotted member path into a value.
pub(crate) fn member_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value.clone();
    for part in path.split('.') {
        current = current.member(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use crate::testing::RecordingHost;
    use pretty_assertions::assert_eq;

    fn mounted(template: Template, size: Size) -> (LayoutTree, NodeId) {
        let mut tree = LayoutTree::new();
        let root = tree.insert_root(&template).unwrap();
        tree.mount(root, Box::new(RecordingHost::new(size))).unwrap();
        (tree, root)
    }

    #[test]
    fn root_fills_container_by_percent() {
        let (mut tree, root) = mounted(
            Template::new("View").with_expression("width", "100%").with_expression("height", "50%"),
            Size::new(320.0, 480.0),
        );
        assert_eq!(tree.frame(root).unwrap(), Rect::new(0.0, 0.0, 320.0, 240.0));
    }

    #[test]
    fn left_from_right_and_width() {
        let (mut tree, root) = mounted(
            Template::new("View")
                .with_expression("width", "100")
                .with_expression("height", "100")
                .with_child(
                    Template::new("View")
                        .with_expression("right", "parent.width - 10")
                        .with_expression("width", "30"),
                ),
            Size::new(320.0, 480.0),
        );
        let child = tree.children(root)[0];
        assert_eq!(tree.value(child, "left").unwrap(), Value::Number(60.0));
        assert_eq!(tree.value(child, "center.x").unwrap(), Value::Number(75.0));
    }

    #[test]
    fn width_from_left_and_right() {
        let (mut tree, root) = mounted(
            Template::new("View").with_expression("left", "10").with_expression("right", "110"),
            Size::new(320.0, 480.0),
        );
        assert_eq!(tree.value(root, "width").unwrap(), Value::Number(100.0));
    }

    #[test]
    fn left_from_center() {
        let (mut tree, root) = mounted(
            Template::new("View")
                .with_expression("center.x", "parent.width / 2")
                .with_expression("width", "100"),
            Size::new(320.0, 480.0),
        );
        assert_eq!(tree.value(root, "left").unwrap(), Value::Number(110.0));
    }

    #[test]
    fn auto_size_wraps_children() {
        let (mut tree, root) = mounted(
            Template::new("View")
                .with_child(
                    Template::new("View")
                        .with_expression("left", "10")
                        .with_expression("width", "50")
                        .with_expression("height", "20"),
                )
                .with_child(
                    Template::new("View")
                        .with_expression("top", "previous.bottom + 5")
                        .with_expression("width", "30")
                        .with_expression("height", "20"),
                ),
            Size::new(320.0, 480.0),
        );
        assert_eq!(tree.frame(root).unwrap(), Rect::new(0.0, 0.0, 60.0, 45.0));
    }

    #[test]
    fn auto_size_uses_intrinsic_size_for_leaves() {
        let host = RecordingHost::new(Size::new(320.0, 480.0)).with_intrinsic_size("Label", Size::new(42.0, 17.0));
        let mut tree = LayoutTree::new();
        let root = tree
            .insert_root(&Template::new("Label").with_expression("text", "Hello"))
            .unwrap();
        tree.mount(root, Box::new(host)).unwrap();
        assert_eq!(tree.frame(root).unwrap().size(), Size::new(42.0, 17.0));
    }

    #[test]
    fn unbound_properties_fall_back_to_defaults() {
        let (mut tree, root) = mounted(Template::new("Label"), Size::new(100.0, 100.0));
        assert_eq!(tree.value(root, "alpha").unwrap(), Value::Number(1.0));
        assert_eq!(tree.value(root, "numberOfLines").unwrap(), Value::Number(1.0));
        assert_eq!(tree.value(root, "isHidden").unwrap(), Value::Bool(false));
    }

    #[test]
    fn composite_from_bound_fields() {
        let (mut tree, root) = mounted(
            Template::new("ScrollView").with_expression("contentInset.top", "20"),
            Size::new(100.0, 100.0),
        );
        let inset = tree.value(root, "contentInset").unwrap();
        assert_eq!(inset.member("top"), Some(Value::Number(20.0)));
        assert_eq!(inset.member("left"), Some(Value::Number(0.0)));
    }

    #[test]
    fn field_of_bound_composite() {
        let (mut tree, root) = mounted(
            Template::new("View").with_expression("layoutMargins", "8"),
            Size::new(100.0, 100.0),
        );
        assert_eq!(tree.value(root, "layoutMargins.top").unwrap(), Value::Number(8.0));
        assert_eq!(tree.value(root, "layoutMargins.right").unwrap(), Value::Number(8.0));
    }

    #[test]
    fn unknown_property_read() {
        let (mut tree, root) = mounted(Template::new("View"), Size::new(100.0, 100.0));
        let err = tree.value(root, "hieght").unwrap_err();
        let symbol = err.symbol_error().unwrap();
        assert_eq!(symbol.kind, SymbolErrorKind::UnknownProperty);
        assert_eq!(symbol.suggestions.first().map(String::as_str), Some("height"));
    }

    #[test]
    fn percent_outside_geometry_is_a_fraction() {
        let (mut tree, root) = mounted(
            Template::new("View").with_expression("alpha", "50%"),
            Size::new(100.0, 100.0),
        );
        assert_eq!(tree.value(root, "alpha").unwrap(), Value::Number(0.5));
    }

    #[test]
    fn values_are_memoized() {
        let (mut tree, root) = mounted(
            Template::new("View").with_expression("width", "parent.width - 20"),
            Size::new(100.0, 100.0),
        );
        assert!(tree.is_cached(root, "width"));
        assert_eq!(tree.value(root, "width").unwrap(), Value::Number(80.0));
    }

    #[test]
    fn stale_node() {
        let (mut tree, root) = mounted(Template::new("View"), Size::new(100.0, 100.0));
        tree.unmount(root).unwrap();
        assert_eq!(tree.value(root, "width"), Err(LayoutError::StaleNode));
    }
}
