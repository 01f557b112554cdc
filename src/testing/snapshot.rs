//! Snapshot rendering helpers.
//!
//! Functions for turning a laid-out tree into plain text suitable for
//! `insta` snapshots and assertions.

use crate::node::{LayoutTree, NodeId};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render the frames of the subtree at `root`, one node per line.
///
/// Each line is the node's class, `#id` when it has a stable id, and its
/// frame as `{x, y, w, h}`. Children are indented by two spaces per level.
/// A node whose frame fails to compute shows the error instead.
///
/// ```ignore
/// View#screen {0, 0, 320, 480}
///   Label#title {10, 10, 300, 20}
/// ```
pub fn frames_to_string(tree: &mut LayoutTree, root: NodeId) -> String {
    let mut lines = Vec::new();
    render_frames(tree, root, 0, &mut lines);
    lines.join("\n")
}

/// Render the recorded property errors of every node under `root`, one per
/// line, prefixed with the node's label. Nodes without errors are skipped.
pub fn errors_to_string(tree: &LayoutTree, root: NodeId) -> String {
    let mut lines = Vec::new();
    for id in tree.walk_depth_first(root) {
        let Some(node) = tree.get(id) else {
            continue;
        };
        for err in tree.property_errors(id) {
            lines.push(format!("{}: {err}", node.label()));
        }
    }
    lines.join("\n")
}

fn render_frames(tree: &mut LayoutTree, id: NodeId, depth: usize, lines: &mut Vec<String>) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let mut head = node.class().to_owned();
    if let Some(stable) = node.id() {
        head.push('#');
        head.push_str(stable);
    }
    let indent = "  ".repeat(depth);
    match tree.frame(id) {
        Ok(frame) => lines.push(format!("{indent}{head} {frame}")),
        Err(err) => lines.push(format!("{indent}{head} <{err}>")),
    }
    for child in tree.children(id).to_vec() {
        render_frames(tree, child, depth + 1, lines);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::template::Template;
    use crate::testing::RecordingHost;

    // ── frames_to_string ─────────────────────────────────────────────

    #[test]
    fn renders_nested_frames() {
        let template = Template::new("View")
            .with_id("screen")
            .with_expression("width", "100%")
            .with_expression("height", "100%")
            .with_child(
                Template::new("Label")
                    .with_id("title")
                    .with_expression("left", "10")
                    .with_expression("top", "10")
                    .with_expression("width", "parent.width - 20")
                    .with_expression("height", "20"),
            )
            .with_child(
                Template::new("Button")
                    .with_expression("top", "previous.bottom + 8")
                    .with_expression("width", "50%")
                    .with_expression("height", "44"),
            );
        let mut tree = LayoutTree::new();
        let root = tree.insert_root(&template).unwrap();
        tree.mount(root, Box::new(RecordingHost::new(Size::new(320.0, 480.0)))).unwrap();

        insta::assert_snapshot!(frames_to_string(&mut tree, root), @r"
        View#screen {0, 0, 320, 480}
          Label#title {10, 10, 300, 20}
          Button {0, 38, 160, 44}
        ");
    }

    #[test]
    fn frame_errors_are_shown_inline() {
        let template = Template::new("View").with_expression("width", "missing + 1");
        let mut tree = LayoutTree::new();
        let root = tree.insert_root(&template).unwrap();
        let text = frames_to_string(&mut tree, root);
        assert!(text.starts_with("View <width: "), "got {text}");
    }

    // ── errors_to_string ─────────────────────────────────────────────

    #[test]
    fn lists_property_errors_by_node() {
        let template = Template::new("View")
            .with_child(Template::new("Label").with_id("broken").with_expression("text", "{nope}"))
            .with_child(Template::new("Label").with_expression("text", "fine"));
        let mut tree = LayoutTree::new();
        let root = tree.insert_root(&template).unwrap();
        tree.mount(root, Box::new(RecordingHost::new(Size::new(10.0, 10.0)))).unwrap();

        let text = errors_to_string(&tree, root);
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("broken: "), "got {text}");
    }
}
