//! Symbol resolution for expressions evaluated on a node.

use std::collections::BTreeMap;

use crate::diagnostics::best_matches;
use crate::error::{LayoutError, SymbolError, SymbolErrorKind};
use crate::expr::Scope;
use crate::types::registry;
use crate::types::Value;

use super::compute::{member_path, percent_axis};
use super::data::{LayoutNode, NodeId};
use super::deps::Slot;
use super::tree::{is_layout_key, LayoutTree, LAYOUT_KEYS};

/// Names every node answers besides its class properties.
const RELATIVE_NAMES: &[&str] = &["frame", "auto", "parent", "previous", "next", "children.count"];

/// The scope of one property (or macro) evaluation on `node`.
pub(crate) struct NodeScope<'a> {
    tree: &'a mut LayoutTree,
    node: NodeId,
    key: &'a str,
}

impl<'a> NodeScope<'a> {
    pub(crate) fn new(tree: &'a mut LayoutTree, node: NodeId, key: &'a str) -> Self {
        Self { tree, node, key }
    }

    /// Read `path` as a property of another node.
    fn read_on(&mut self, target: NodeId, path: &str, written: &str) -> Result<Value, LayoutError> {
        if path == "frame" {
            return self.tree.frame(target).map(Value::rect);
        }
        let knows = self.tree.get(target).ok_or(LayoutError::StaleNode)?.knows(path);
        if knows || is_layout_key(path) || path == "center" {
            return self.tree.compute(target, path);
        }
        let mut prefix = path;
        while let Some((head, _)) = prefix.rsplit_once('.') {
            let known = self.tree.get(target).is_some_and(|n| n.knows(head));
            if known || is_layout_key(head) || head == "center" || head == "frame" {
                let whole = if head == "frame" {
                    Value::rect(self.tree.frame(target)?)
                } else {
                    self.tree.compute(target, head)?
                };
                if let Some(value) = member_path(&whole, &path[head.len() + 1..]) {
                    return Ok(value);
                }
                break;
            }
            prefix = head;
        }
        Err(self.unknown_member(target, path, written))
    }

    fn unknown_member(&self, target: NodeId, member: &str, written: &str) -> LayoutError {
        let mut candidates: Vec<String> = LAYOUT_KEYS.iter().map(|k| (*k).to_owned()).collect();
        candidates.push("frame".into());
        if let Some(node) = self.tree.get(target) {
            candidates.extend(node.types.available_names().map(str::to_owned));
            candidates.extend(node.parameters.keys().cloned());
        }
        let mut suggestions = best_matches(member, &candidates);
        suggestions.truncate(registry::config().max_suggestions);
        let inner = SymbolError::new(SymbolErrorKind::UnknownExpression, member)
            .with_suggestions(suggestions.clone());
        let prefix = &written[..written.len() - member.len()];
        SymbolError::new(SymbolErrorKind::UnknownExpression, written)
            .with_suggestions(suggestions.iter().map(|s| format!("{prefix}{s}")).collect())
            .with_inner(inner)
            .into()
    }

    /// `parent.X` on a root reads the container.
    fn read_container(&mut self, path: &str, written: &str) -> Result<Value, LayoutError> {
        let root = self.tree.root_of(self.node);
        self.tree.record_source(root, Slot::Container);
        let size = self.tree.container_size(root);
        let value = match path {
            "left" | "top" => 0.0,
            "width" | "right" => size.width,
            "height" | "bottom" => size.height,
            "center.x" => size.width / 2.0,
            "center.y" => size.height / 2.0,
            _ => {
                let inner = SymbolError::new(SymbolErrorKind::UnknownExpression, path)
                    .with_suggestions(best_matches(path, LAYOUT_KEYS));
                return Err(SymbolError::new(SymbolErrorKind::UnknownExpression, written)
                    .with_inner(inner)
                    .into());
            }
        };
        Ok(Value::Number(value))
    }

    fn sibling(&mut self, offset: isize, path: &str, written: &str) -> Result<Value, LayoutError> {
        let Some(parent) = self.tree.parent(self.node) else {
            return Ok(missing_sibling(path));
        };
        self.tree.record_source(parent, Slot::Children);
        let siblings = self.tree.children(parent);
        let sibling = siblings
            .iter()
            .position(|&c| c == self.node)
            .and_then(|i| i.checked_add_signed(offset))
            .and_then(|i| siblings.get(i).copied());
        match sibling {
            Some(sibling) => self.read_on(sibling, path, written),
            None => Ok(missing_sibling(path)),
        }
    }

    /// Look `path` up in a per-node map (state or constants) on the node and
    /// its ancestors, recording every slot consulted.
    fn inherited(
        &mut self,
        path: &str,
        slot: fn(String) -> Slot,
        pick: fn(&LayoutNode) -> &BTreeMap<String, Value>,
    ) -> Option<Value> {
        let chain: Vec<NodeId> = std::iter::once(self.node)
            .chain(self.tree.ancestors(self.node))
            .collect();
        for id in chain {
            let mut prefix = path;
            loop {
                self.tree.record_source(id, slot(prefix.to_owned()));
                let found = self.tree.get(id).and_then(|n| pick(n).get(prefix).cloned());
                if let Some(value) = found {
                    if prefix.len() == path.len() {
                        return Some(value);
                    }
                    return member_path(&value, &path[prefix.len() + 1..]);
                }
                match prefix.rsplit_once('.') {
                    Some((head, _)) => prefix = head,
                    None => break,
                }
            }
        }
        None
    }

    fn find_macro(&self, name: &str) -> Option<String> {
        std::iter::once(self.node)
            .chain(self.tree.ancestors(self.node))
            .find_map(|id| self.tree.get(id).and_then(|n| n.macros.get(name).cloned()))
    }

    fn chain_names(&self, pick: fn(&LayoutNode) -> Vec<String>) -> Vec<String> {
        std::iter::once(self.node)
            .chain(self.tree.ancestors(self.node))
            .filter_map(|id| self.tree.get(id))
            .flat_map(pick)
            .collect()
    }
}

fn missing_sibling(path: &str) -> Value {
    if is_layout_key(path) {
        Value::Number(0.0)
    } else {
        Value::Nil
    }
}

impl Scope for NodeScope<'_> {
    fn resolve(&mut self, path: &str) -> Result<Option<Value>, LayoutError> {
        if path == "auto" && (self.key == "width" || self.key == "height") {
            let horizontal = self.key == "width";
            return self.tree.auto_size(self.node, horizontal).map(|v| Some(Value::Number(v)));
        }
        if is_layout_key(path) || path == "center" {
            return self.tree.compute(self.node, path).map(Some);
        }
        if path == "frame" {
            return self.tree.frame(self.node).map(|r| Some(Value::rect(r)));
        }

        if let Some((head, rest)) = path.split_once('.') {
            match head {
                "parent" => {
                    return match self.tree.parent(self.node) {
                        Some(parent) => self.read_on(parent, rest, path).map(Some),
                        None => self.read_container(rest, path).map(Some),
                    };
                }
                "previous" => return self.sibling(-1, rest, path).map(Some),
                "next" => return self.sibling(1, rest, path).map(Some),
                "children" if rest == "count" => {
                    self.tree.record_source(self.node, Slot::Children);
                    let count = self.tree.children(self.node).len();
                    return Ok(Some(Value::Number(count as f64)));
                }
                _ => {}
            }
            let root = self.tree.root_of(self.node);
            self.tree.record_source(root, Slot::Subtree);
            if let Some(target) = self.tree.find_by_id(self.node, head) {
                return self.read_on(target, rest, path).map(Some);
            }
        }

        if self.tree.get(self.node).is_some_and(|n| n.knows(path)) {
            return self.tree.compute(self.node, path).map(Some);
        }

        if let Some(expansion) = self.find_macro(path) {
            return self.tree.expand_macro(self.node, path, &expansion).map(Some);
        }

        if let Some(value) = self.inherited(path, Slot::State, |n| &n.state) {
            return Ok(Some(value));
        }
        if let Some(value) = self.inherited(path, Slot::Constant, |n| &n.constants) {
            return Ok(Some(value));
        }

        let root = self.tree.root_of(self.node);
        Ok(self.tree.hosts.get(root).and_then(|host| host.layout_value(path)))
    }

    fn percent(&mut self, value: f64) -> Result<Value, LayoutError> {
        let axis = percent_axis(self.key).filter(|_| registry::config().percent_of_parent);
        let Some(horizontal) = axis else {
            return Ok(Value::Number(value / 100.0));
        };
        let dimension = if horizontal { "width" } else { "height" };
        let base = match self.tree.parent(self.node) {
            Some(parent) => self.tree.number(parent, dimension)?,
            None => {
                let root = self.tree.root_of(self.node);
                self.tree.record_source(root, Slot::Container);
                let size = self.tree.container_size(root);
                if horizontal { size.width } else { size.height }
            }
        };
        Ok(Value::Number(base * value / 100.0))
    }

    fn candidates(&mut self) -> Vec<String> {
        let mut names: Vec<String> = LAYOUT_KEYS
            .iter()
            .chain(RELATIVE_NAMES)
            .map(|k| (*k).to_owned())
            .collect();
        if let Some(node) = self.tree.get(self.node) {
            names.extend(node.types.available_names().map(str::to_owned));
            names.extend(node.parameters.keys().cloned());
        }
        names.extend(self.chain_names(|n| n.macros.keys().cloned().collect()));
        names.extend(self.chain_names(|n| n.state.keys().cloned().collect()));
        names.extend(self.chain_names(|n| n.constants.keys().cloned().collect()));
        names
    }
}
