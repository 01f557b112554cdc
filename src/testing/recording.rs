//! A headless [`Host`] that records every call made into the view layer.
//!
//! Clones share one recorder, so a test keeps a clone while the tree owns the
//! boxed original. Nodes are identified by label (stable id, else class).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::HostError;
use crate::geometry::{Rect, Size};
use crate::host::{Host, ViewAdapter};
use crate::node::{LayoutNode, NodeId};
use crate::types::Value;

/// One call into the host layer.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    MakeView { node: String, class: String },
    SetValue { node: String, key: String, value: Value },
    SetFrame { node: String, frame: Rect },
    InsertChild { parent: String, index: usize },
    RemoveChild { parent: String, index: usize },
    Release { node: String },
}

#[derive(Debug, Default)]
struct Recorder {
    container: Size,
    calls: Vec<HostCall>,
    layout_values: HashMap<String, Value>,
    /// Keyed by label or class.
    intrinsic_sizes: HashMap<String, Size>,
    fail_release: HashSet<String>,
    fail_make_view: HashSet<String>,
}

/// Recording host for tests and embedders without a real view layer.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    inner: Rc<RefCell<Recorder>>,
}

impl RecordingHost {
    /// A host whose container has the given size.
    pub fn new(container: Size) -> Self {
        let host = Self::default();
        host.inner.borrow_mut().container = container;
        host
    }

    /// Answer `layout_value(key)` with `value` (builder).
    pub fn with_layout_value(self, key: impl Into<String>, value: Value) -> Self {
        self.inner.borrow_mut().layout_values.insert(key.into(), value);
        self
    }

    /// Give views with this label or class an intrinsic size (builder).
    pub fn with_intrinsic_size(self, label_or_class: impl Into<String>, size: Size) -> Self {
        self.inner
            .borrow_mut()
            .intrinsic_sizes
            .insert(label_or_class.into(), size);
        self
    }

    /// Make releasing views with this label or class fail (builder).
    pub fn fail_release(self, label_or_class: impl Into<String>) -> Self {
        self.inner.borrow_mut().fail_release.insert(label_or_class.into());
        self
    }

    /// Make creating views with this label or class fail (builder).
    pub fn fail_make_view(self, label_or_class: impl Into<String>) -> Self {
        self.inner.borrow_mut().fail_make_view.insert(label_or_class.into());
        self
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    /// Labels of views released successfully, in release order.
    pub fn released(&self) -> Vec<String> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Release { node } => Some(node.clone()),
                _ => None,
            })
            .collect()
    }

    /// The last frame committed to the view labeled `label`.
    pub fn frame_of(&self, label: &str) -> Option<Rect> {
        self.inner.borrow().calls.iter().rev().find_map(|call| match call {
            HostCall::SetFrame { node, frame } if node == label => Some(*frame),
            _ => None,
        })
    }

    /// The last value committed for `key` to the view labeled `label`.
    pub fn value_of(&self, label: &str, key: &str) -> Option<Value> {
        self.inner.borrow().calls.iter().rev().find_map(|call| match call {
            HostCall::SetValue { node, key: k, value } if node == label && k == key => {
                Some(value.clone())
            }
            _ => None,
        })
    }
}

impl Host for RecordingHost {
    fn container_size(&self) -> Size {
        self.inner.borrow().container
    }

    fn layout_value(&self, key: &str) -> Option<Value> {
        self.inner.borrow().layout_values.get(key).cloned()
    }

    fn make_view(&mut self, _id: NodeId, node: &LayoutNode) -> Result<Box<dyn ViewAdapter>, HostError> {
        let label = node.label().to_owned();
        let class = node.class().to_owned();
        let mut recorder = self.inner.borrow_mut();
        if recorder.fail_make_view.contains(&label) || recorder.fail_make_view.contains(&class) {
            return Err(HostError::new(format!("cannot create a view for {label}")));
        }
        recorder.calls.push(HostCall::MakeView {
            node: label.clone(),
            class: class.clone(),
        });
        Ok(Box::new(RecordingView {
            label,
            class,
            values: HashMap::new(),
            recorder: Rc::clone(&self.inner),
        }))
    }
}

struct RecordingView {
    label: String,
    class: String,
    values: HashMap<String, Value>,
    recorder: Rc<RefCell<Recorder>>,
}

impl RecordingView {
    fn record(&self, call: HostCall) {
        self.recorder.borrow_mut().calls.push(call);
    }
}

impl ViewAdapter for RecordingView {
    fn set_value(&mut self, key: &str, value: &Value) -> Result<(), HostError> {
        self.values.insert(key.to_owned(), value.clone());
        self.record(HostCall::SetValue {
            node: self.label.clone(),
            key: key.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn set_frame(&mut self, frame: Rect) {
        self.record(HostCall::SetFrame {
            node: self.label.clone(),
            frame,
        });
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn intrinsic_size(&self) -> Option<Size> {
        let recorder = self.recorder.borrow();
        recorder
            .intrinsic_sizes
            .get(&self.label)
            .or_else(|| recorder.intrinsic_sizes.get(&self.class))
            .copied()
    }

    fn did_insert_child(&mut self, index: usize) {
        self.record(HostCall::InsertChild {
            parent: self.label.clone(),
            index,
        });
    }

    fn did_remove_child(&mut self, index: usize) {
        self.record(HostCall::RemoveChild {
            parent: self.label.clone(),
            index,
        });
    }

    fn release(&mut self) -> Result<(), HostError> {
        let failing = {
            let recorder = self.recorder.borrow();
            recorder.fail_release.contains(&self.label) || recorder.fail_release.contains(&self.class)
        };
        if failing {
            return Err(HostError::new(format!("{} refused to release", self.label)));
        }
        self.record(HostCall::Release {
            node: self.label.clone(),
        });
        Ok(())
    }
}
