//! Live DOM access for the core mapper and extractor.
//!
//! Browser text offsets count UTF-16 code units while the document counts
//! chars, so text offsets are converted at this boundary.

use quire_editor_core::{DomTree, NodeKind, SmolStr};
use wasm_bindgen::JsCast;
use web_sys::{Element, Node};

/// `DomTree` over `web_sys::Node`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserDom;

impl DomTree for BrowserDom {
    type Node = Node;

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &Node) -> Option<SmolStr> {
        node.dyn_ref::<Element>()
            .map(|el| SmolStr::from(el.tag_name().to_ascii_lowercase()))
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() != Node::TEXT_NODE {
            return None;
        }
        node.node_value()
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn first_child(&self, node: &Node) -> Option<Node> {
        node.first_child()
    }

    fn last_child(&self, node: &Node) -> Option<Node> {
        node.last_child()
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn previous_sibling(&self, node: &Node) -> Option<Node> {
        node.previous_sibling()
    }

    fn to_dom_offset(&self, node: &Node, offset: usize) -> u32 {
        let text = self.text(node).unwrap_or_default();
        text.chars()
            .take(offset)
            .map(|c| c.len_utf16() as u32)
            .sum()
    }

    fn from_dom_offset(&self, node: &Node, offset: u32) -> usize {
        let text = self.text(node).unwrap_or_default();
        let mut units = 0;
        let mut chars = 0;
        for c in text.chars() {
            if units >= offset {
                break;
            }
            units += c.len_utf16() as u32;
            chars += 1;
        }
        chars
    }

    fn child_count(&self, parent: &Node) -> usize {
        parent.child_nodes().length() as usize
    }

    fn child_at(&self, parent: &Node, index: usize) -> Option<Node> {
        parent.child_nodes().item(index as u32)
    }

    fn contains(&self, ancestor: &Node, node: &Node) -> bool {
        ancestor.contains(Some(node))
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }
}
