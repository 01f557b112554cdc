//! Dependency-tracked value cache.
//!
//! Every computed `(node, slot)` entry records the keys it read while being
//! computed; `dependents` is the reverse edge set. Invalidating a key drops
//! exactly the entries that transitively read it. Sources (state, constants,
//! child lists, container size, expression presence) have no entry of their
//! own; they only appear as dependencies.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::LayoutError;
use crate::types::Value;

use super::data::NodeId;

/// What a cache key refers to on its node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// A computed property value (entry).
    Property(String),
    /// A macro expanded in the node's scope (entry).
    Macro(String),
    /// A state value set on the node (source).
    State(String),
    /// A constant set on the node (source).
    Constant(String),
    /// Whether the node has an expression bound to this key (source).
    Expression(String),
    /// The node's ordered child list (source).
    Children,
    /// The container size of a root node (source).
    Container,
    /// Membership of the whole tree, keyed on its root (source). Read by
    /// `<id>.X` lookups.
    Subtree,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub node: NodeId,
    pub slot: Slot,
}

impl CacheKey {
    pub fn property(node: NodeId, key: &str) -> Self {
        Self { node, slot: Slot::Property(key.to_owned()) }
    }

    pub fn new(node: NodeId, slot: Slot) -> Self {
        Self { node, slot }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Property(key) | Slot::Macro(key) | Slot::State(key) | Slot::Constant(key) => {
                write!(f, "{key}")
            }
            Slot::Expression(key) => write!(f, "{key} (expression)"),
            Slot::Children => write!(f, "children"),
            Slot::Container => write!(f, "container"),
            Slot::Subtree => write!(f, "subtree"),
        }
    }
}

/// Cached results plus the read graph between them.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    entries: HashMap<CacheKey, Result<Value, LayoutError>>,
    /// key -> keys it read.
    dependencies: HashMap<CacheKey, HashSet<CacheKey>>,
    /// key -> keys that read it.
    dependents: HashMap<CacheKey, HashSet<CacheKey>>,
    /// Entries currently being computed, innermost last.
    stack: Vec<CacheKey>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&Result<Value, LayoutError>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Record that the entry being computed read `key`.
    pub fn record_read(&mut self, key: &CacheKey) {
        let Some(reader) = self.stack.last().cloned() else {
            return;
        };
        if reader == *key {
            return;
        }
        self.dependencies.entry(reader.clone()).or_default().insert(key.clone());
        self.dependents.entry(key.clone()).or_default().insert(reader);
    }

    /// Keys from the first occurrence of `key` on the stack to the top, if
    /// `key` is being computed.
    pub fn cycle_through(&self, key: &CacheKey) -> Option<Vec<CacheKey>> {
        let start = self.stack.iter().position(|k| k == key)?;
        let mut cycle: Vec<CacheKey> = self.stack[start..].to_vec();
        cycle.push(key.clone());
        Some(cycle)
    }

    /// Start computing `key`.
    pub fn enter(&mut self, key: CacheKey) {
        self.stack.push(key);
    }

    /// Finish computing the innermost entry and memoize its result.
    pub fn leave(&mut self, result: &Result<Value, LayoutError>) {
        if let Some(key) = self.stack.pop() {
            self.entries.insert(key, result.clone());
        }
    }

    /// Drop `start` and every entry that transitively read it. Returns the
    /// dropped entries.
    pub fn invalidate(&mut self, start: &CacheKey) -> Vec<CacheKey> {
        let mut invalidated = Vec::new();
        let mut seen: HashSet<CacheKey> = HashSet::new();
        let mut pending = vec![start.clone()];
        seen.insert(start.clone());

        while let Some(key) = pending.pop() {
            if let Some(readers) = self.dependents.remove(&key) {
                for reader in readers {
                    if seen.insert(reader.clone()) {
                        pending.push(reader);
                    }
                }
            }
            if self.entries.remove(&key).is_some() {
                invalidated.push(key.clone());
            }
            self.forget_dependencies(&key);
        }
        invalidated
    }

    /// Invalidate every key that belongs to `node` and drop its edges.
    pub fn remove_node(&mut self, node: NodeId) -> Vec<CacheKey> {
        let owned: HashSet<CacheKey> = self
            .entries
            .keys()
            .chain(self.dependents.keys())
            .chain(self.dependencies.keys())
            .filter(|k| k.node == node)
            .cloned()
            .collect();
        let mut invalidated = Vec::new();
        for key in owned {
            invalidated.extend(self.invalidate(&key));
        }
        invalidated
    }

    /// Drop everything, including any in-flight computation.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dependencies.clear();
        self.dependents.clear();
        self.stack.clear();
    }

    /// Keys `key` read the last time it was computed.
    pub fn dependencies_of(&self, key: &CacheKey) -> Vec<CacheKey> {
        self.dependencies
            .get(key)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn forget_dependencies(&mut self, key: &CacheKey) {
        if let Some(deps) = self.dependencies.remove(key) {
            for dep in deps {
                if let Some(readers) = self.dependents.get_mut(&dep) {
                    readers.remove(key);
                    if readers.is_empty() {
                        self.dependents.remove(&dep);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids() -> (NodeId, NodeId) {
        let mut sm: SlotMap<NodeId, ()> = SlotMap::with_key();
        (sm.insert(()), sm.insert(()))
    }

    fn compute(graph: &mut DependencyGraph, key: &CacheKey, reads: &[CacheKey], value: f64) {
        graph.enter(key.clone());
        for read in reads {
            graph.record_read(read);
        }
        graph.leave(&Ok(Value::Number(value)));
    }

    #[test]
    fn invalidation_is_transitive_and_precise() {
        let (n, m) = ids();
        let mut graph = DependencyGraph::new();
        let n_width = CacheKey::property(n, "width");
        let m_left = CacheKey::property(m, "left");
        let m_right = CacheKey::property(m, "right");
        let m_top = CacheKey::property(m, "top");

        compute(&mut graph, &n_width, &[], 100.0);
        compute(&mut graph, &m_left, &[n_width.clone()], 100.0);
        compute(&mut graph, &m_right, &[m_left.clone()], 150.0);
        compute(&mut graph, &m_top, &[], 10.0);

        let mut dropped = graph.invalidate(&n_width);
        dropped.sort_by_key(|k| k.slot.to_string());
        assert_eq!(dropped.len(), 3);
        assert!(!graph.contains(&m_left));
        assert!(!graph.contains(&m_right));
        assert!(graph.contains(&m_top));
    }

    #[test]
    fn sources_invalidate_readers() {
        let (n, _) = ids();
        let mut graph = DependencyGraph::new();
        let state = CacheKey::new(n, Slot::State("count".into()));
        let text = CacheKey::property(n, "text");
        compute(&mut graph, &text, &[state.clone()], 1.0);
        assert_eq!(graph.invalidate(&state), vec![text.clone()]);
        assert!(graph.is_empty());
    }

    #[test]
    fn cycle_through_reports_path() {
        let (n, m) = ids();
        let mut graph = DependencyGraph::new();
        let a = CacheKey::property(n, "width");
        let b = CacheKey::property(m, "width");
        graph.enter(a.clone());
        graph.enter(b.clone());
        assert_eq!(graph.cycle_through(&a), Some(vec![a.clone(), b.clone(), a.clone()]));
        assert_eq!(graph.cycle_through(&CacheKey::property(n, "height")), None);
    }

    #[test]
    fn remove_node_drops_its_entries_and_readers() {
        let (n, m) = ids();
        let mut graph = DependencyGraph::new();
        let n_height = CacheKey::property(n, "height");
        let m_top = CacheKey::property(m, "top");
        compute(&mut graph, &n_height, &[], 44.0);
        compute(&mut graph, &m_top, &[n_height.clone()], 44.0);
        graph.remove_node(n);
        assert!(graph.is_empty());
    }

    #[test]
    fn recompute_replaces_edges() {
        let (n, _) = ids();
        let mut graph = DependencyGraph::new();
        let a = CacheKey::property(n, "a");
        let b = CacheKey::property(n, "b");
        let c = CacheKey::property(n, "c");
        compute(&mut graph, &c, &[a.clone()], 1.0);
        graph.invalidate(&c);
        compute(&mut graph, &c, &[b.clone()], 2.0);
        assert_eq!(graph.dependencies_of(&c), vec![b.clone()]);
        // `a` no longer feeds `c`.
        assert!(graph.invalidate(&a).is_empty());
        assert!(graph.contains(&c));
    }
}
