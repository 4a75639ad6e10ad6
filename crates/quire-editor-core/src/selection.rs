//! Selection bridge between document ranges and the native selection.

use tracing::{trace, warn};

use crate::document::TextDocument;
use crate::dom::DomTree;
use crate::error::{EditorError, Result};
use crate::position::{get_node_and_offset, get_node_and_offset_index};
use crate::types::EditorRange;
use crate::typeset::Paper;

/// Native selection endpoints in DOM units: UTF-16 offsets in text nodes,
/// child indexes in elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRange<N> {
    pub anchor_node: N,
    pub anchor_offset: u32,
    pub focus_node: N,
    pub focus_offset: u32,
    pub collapsed: bool,
}

/// Host selection and focus primitives.
pub trait NativeSelection {
    type Node: Clone + PartialEq;

    fn range(&self) -> Option<NativeRange<Self::Node>>;
    fn set_base_and_extent(
        &mut self,
        anchor: &Self::Node,
        anchor_offset: u32,
        focus: &Self::Node,
        focus_offset: u32,
    );
    fn remove_all_ranges(&mut self);
    fn has_focus(&self, root: &Self::Node) -> bool;
    fn focus(&mut self, root: &Self::Node);
    fn blur(&mut self, root: &Self::Node);
}

fn document_offset<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    node: &D::Node,
    offset: u32,
) -> usize {
    let offset = if dom.is_text(node) {
        dom.from_dom_offset(node, offset)
    } else {
        offset as usize
    };
    get_node_and_offset_index(dom, root, paper, node, offset)
}

/// DOM position for a document offset, if the rendered tree has one.
pub fn dom_position<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    index: usize,
) -> Option<(D::Node, u32)> {
    let (node, offset) = get_node_and_offset(dom, root, paper, index);
    let node = node?;
    let offset = if dom.is_text(&node) {
        dom.to_dom_offset(&node, offset)
    } else {
        offset as u32
    };
    Some((node, offset))
}

/// Document range of a native selection, `None` when it lies outside `root`.
pub fn get_selection<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    native: Option<&NativeRange<D::Node>>,
) -> Option<EditorRange> {
    let native = native?;
    if !dom.contains(root, &native.anchor_node) {
        trace!("native selection outside editor root");
        return None;
    }
    let anchor = document_offset(dom, root, paper, &native.anchor_node, native.anchor_offset);
    let focus = if native.collapsed || !dom.contains(root, &native.focus_node) {
        anchor
    } else {
        document_offset(dom, root, paper, &native.focus_node, native.focus_offset)
    };
    trace!(anchor, focus, "read native selection");
    Some(EditorRange::new(anchor, focus))
}

/// Point the native selection at `range`. `None` clears it and blurs `root`.
///
/// Returns whether the native selection was changed. A range the rendered
/// tree cannot represent leaves the native selection alone.
pub fn set_selection<D, S>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    native: &mut S,
    range: Option<EditorRange>,
) -> bool
where
    D: DomTree,
    S: NativeSelection<Node = D::Node>,
{
    let Some(range) = range else {
        let had_focus = native.has_focus(root);
        native.remove_all_ranges();
        if had_focus {
            native.blur(root);
        }
        return had_focus;
    };

    let Some((anchor_node, anchor_offset)) = dom_position(dom, root, paper, range.anchor) else {
        warn!(?range, "selection anchor not representable in DOM");
        return false;
    };
    let (focus_node, focus_offset) = if range.is_collapsed() {
        (anchor_node.clone(), anchor_offset)
    } else {
        match dom_position(dom, root, paper, range.focus) {
            Some(position) => position,
            None => {
                warn!(?range, "selection focus not representable in DOM");
                return false;
            }
        }
    };

    if !native.has_focus(root) {
        native.focus(root);
    }
    let unchanged = native.range().is_some_and(|current| {
        current.anchor_node == anchor_node
            && current.anchor_offset == anchor_offset
            && current.focus_node == focus_node
            && current.focus_offset == focus_offset
            && current.collapsed == range.is_collapsed()
    });
    if unchanged {
        return false;
    }
    native.set_base_and_extent(&anchor_node, anchor_offset, &focus_node, focus_offset);
    true
}

/// Expand a caret inside a frozen line to cover the whole line.
pub fn snap_to_frozen(doc: &TextDocument, paper: &Paper, range: EditorRange) -> EditorRange {
    if !range.is_collapsed() {
        return range;
    }
    let (_, line, start) = doc.line_at(range.focus);
    let frozen = paper
        .line_type(&line.attributes)
        .is_some_and(|def| def.frozen);
    if !frozen {
        return range;
    }
    EditorRange::new(start, start + line.length)
}

/// A native selection that can be paused while focus is elsewhere, such
/// as in a modal overlay.
#[derive(Debug)]
pub struct SelectionBridge<S> {
    native: S,
    paused: bool,
}

impl<S: NativeSelection> SelectionBridge<S> {
    pub fn new(native: S) -> Self {
        Self {
            native,
            paused: false,
        }
    }

    pub fn native(&self) -> &S {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut S {
        &mut self.native
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.paused {
            return Err(EditorError::SelectionPaused);
        }
        self.paused = true;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.paused {
            return Err(EditorError::SelectionNotPaused);
        }
        self.paused = false;
        Ok(())
    }

    /// Current document selection. Always `None` while paused.
    pub fn read<D>(&self, dom: &D, root: &D::Node, paper: &Paper) -> Option<EditorRange>
    where
        D: DomTree<Node = S::Node>,
    {
        if self.paused {
            return None;
        }
        get_selection(dom, root, paper, self.native.range().as_ref())
    }

    /// Write a document selection. Dropped while paused.
    pub fn write<D>(
        &mut self,
        dom: &D,
        root: &D::Node,
        paper: &Paper,
        range: Option<EditorRange>,
    ) -> bool
    where
        D: DomTree<Node = S::Node>,
    {
        if self.paused {
            trace!("selection paused, dropping write");
            return false;
        }
        set_selection(dom, root, paper, &mut self.native, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_paper;
    use crate::delta::{Delta, attrs};
    use crate::dom::{Fragment, NodeId};
    use serde_json::json;

    #[derive(Debug, Default)]
    struct FakeSelection {
        range: Option<NativeRange<NodeId>>,
        focused: bool,
        writes: usize,
    }

    impl NativeSelection for FakeSelection {
        type Node = NodeId;

        fn range(&self) -> Option<NativeRange<NodeId>> {
            self.range.clone()
        }

        fn set_base_and_extent(
            &mut self,
            anchor: &NodeId,
            anchor_offset: u32,
            focus: &NodeId,
            focus_offset: u32,
        ) {
            self.writes += 1;
            self.range = Some(NativeRange {
                anchor_node: *anchor,
                anchor_offset,
                focus_node: *focus,
                focus_offset,
                collapsed: anchor == focus && anchor_offset == focus_offset,
            });
        }

        fn remove_all_ranges(&mut self) {
            self.range = None;
        }

        fn has_focus(&self, _root: &NodeId) -> bool {
            self.focused
        }

        fn focus(&mut self, _root: &NodeId) {
            self.focused = true;
        }

        fn blur(&mut self, _root: &NodeId) {
            self.focused = false;
        }
    }

    fn fixture() -> (Fragment, NodeId, NodeId, NodeId) {
        let fragment = Fragment::parse_html("<p>Hello <strong>World</strong></p><p>Two</p>");
        let root = fragment.root();
        let first = fragment.first_child(&root).unwrap();
        let world = fragment
            .first_child(&fragment.last_child(&first).unwrap())
            .unwrap();
        let two = fragment
            .first_child(&fragment.last_child(&root).unwrap())
            .unwrap();
        (fragment, root, world, two)
    }

    #[test]
    fn test_get_selection_collapsed_ignores_focus() {
        let (dom, root, world, _) = fixture();
        let native = NativeRange {
            anchor_node: world,
            anchor_offset: 2,
            focus_node: root,
            focus_offset: 99,
            collapsed: true,
        };
        assert_eq!(
            get_selection(&dom, &root, &default_paper(), Some(&native)),
            Some(EditorRange::caret(8))
        );
    }

    #[test]
    fn test_get_selection_backwards_range() {
        let (dom, root, world, two) = fixture();
        let native = NativeRange {
            anchor_node: two,
            anchor_offset: 1,
            focus_node: world,
            focus_offset: 0,
            collapsed: false,
        };
        let range = get_selection(&dom, &root, &default_paper(), Some(&native)).unwrap();
        assert_eq!(range, EditorRange::new(13, 6));
        assert!(range.is_backwards());
    }

    #[test]
    fn test_get_selection_outside_root() {
        let (mut dom, root, _, _) = fixture();
        let detached = dom.create_element("span");
        let native = NativeRange {
            anchor_node: detached,
            anchor_offset: 0,
            focus_node: detached,
            focus_offset: 0,
            collapsed: true,
        };
        assert_eq!(get_selection(&dom, &root, &default_paper(), Some(&native)), None);
        assert_eq!(get_selection(&dom, &root, &default_paper(), None), None);
    }

    #[test]
    fn test_set_selection_is_idempotent() {
        let (dom, root, world, two) = fixture();
        let paper = default_paper();
        let mut native = FakeSelection::default();
        assert!(set_selection(&dom, &root, &paper, &mut native, Some(EditorRange::new(8, 13))));
        assert!(native.focused);
        assert_eq!(
            native.range,
            Some(NativeRange {
                anchor_node: world,
                anchor_offset: 2,
                focus_node: two,
                focus_offset: 1,
                collapsed: false,
            })
        );
        assert!(!set_selection(&dom, &root, &paper, &mut native, Some(EditorRange::new(8, 13))));
        assert_eq!(native.writes, 1);
        assert_eq!(get_selection(&dom, &root, &paper, native.range.as_ref()), Some(EditorRange::new(8, 13)));
    }

    #[test]
    fn test_set_selection_none_blurs() {
        let (dom, root, _, _) = fixture();
        let paper = default_paper();
        let mut native = FakeSelection::default();
        set_selection(&dom, &root, &paper, &mut native, Some(EditorRange::caret(0)));
        assert!(set_selection(&dom, &root, &paper, &mut native, None));
        assert!(!native.focused);
        assert!(native.range.is_none());
    }

    #[test]
    fn test_unrepresentable_selection_degrades() {
        let (dom, root, _, _) = fixture();
        let paper = default_paper();
        let mut native = FakeSelection::default();
        assert!(!set_selection(&dom, &root, &paper, &mut native, Some(EditorRange::caret(50))));
        assert_eq!(native.writes, 0);
        assert!(native.range.is_none());
    }

    #[test]
    fn test_snap_to_frozen_line() {
        let doc = TextDocument::from_delta(
            &Delta::new()
                .insert("a\n", None)
                .insert("\n", Some(attrs(json!({"hr": true}))))
                .insert("b\n", None),
        );
        let paper = default_paper();
        assert_eq!(
            snap_to_frozen(&doc, &paper, EditorRange::caret(2)),
            EditorRange::new(2, 3)
        );
        assert_eq!(
            snap_to_frozen(&doc, &paper, EditorRange::caret(1)),
            EditorRange::caret(1)
        );
        assert_eq!(
            snap_to_frozen(&doc, &paper, EditorRange::new(0, 2)),
            EditorRange::new(0, 2)
        );
    }

    #[test]
    fn test_snap_to_trailing_frozen_line() {
        let doc = TextDocument::from_delta(
            &Delta::new()
                .insert("a\n", None)
                .insert("\n", Some(attrs(json!({"hr": true})))),
        );
        let paper = default_paper();
        assert_eq!(doc.len(), 3);
        assert_eq!(
            snap_to_frozen(&doc, &paper, EditorRange::caret(2)),
            EditorRange::new(2, 3)
        );
        assert_eq!(
            snap_to_frozen(&doc, &paper, EditorRange::caret(3)),
            EditorRange::new(2, 3)
        );
    }

    #[test]
    fn test_bridge_pause_resume() {
        let (dom, root, world, _) = fixture();
        let paper = default_paper();
        let mut bridge = SelectionBridge::new(FakeSelection::default());
        assert!(bridge.write(&dom, &root, &paper, Some(EditorRange::caret(8))));
        bridge.pause().unwrap();
        assert_eq!(bridge.pause(), Err(EditorError::SelectionPaused));
        assert_eq!(bridge.read(&dom, &root, &paper), None);
        assert!(!bridge.write(&dom, &root, &paper, Some(EditorRange::caret(0))));
        bridge.resume().unwrap();
        assert_eq!(bridge.resume(), Err(EditorError::SelectionNotPaused));
        assert_eq!(bridge.read(&dom, &root, &paper), Some(EditorRange::caret(8)));
        assert_eq!(bridge.native().range.as_ref().map(|r| r.anchor_node), Some(world));
    }
}
