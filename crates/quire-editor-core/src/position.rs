//! Offset <-> DOM mapping.
//!
//! Converts between document offsets and `(node, offset)` pairs in a
//! rendered tree. Text contributes its length, every embed contributes 1 and
//! every block after the first contributes 1 for the newline that precedes
//! it. Decoration-only markup and the insides of embeds contribute nothing
//! and are never descended into. A `<br>` that only keeps an empty line open
//! (see [`is_br_placeholder`]) contributes nothing either.

use tracing::trace;

use crate::dom::{DomTree, NodeKind, next_node, previous_node};
use crate::typeset::Paper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Text(usize),
    Embed,
    Block,
    /// Contributes nothing, children skipped.
    Skip,
    /// Contributes nothing, children walked.
    Other,
}

fn classify<D: DomTree>(dom: &D, paper: &Paper, node: &D::Node) -> Visit {
    match dom.kind(node) {
        NodeKind::Text => Visit::Text(dom.text_len(node)),
        NodeKind::Other => Visit::Skip,
        NodeKind::Element => {
            if paper.is_decoration(dom, node) {
                Visit::Skip
            } else if paper.embeds.matches(dom, node) {
                if is_br_placeholder(dom, paper, node) {
                    Visit::Skip
                } else {
                    Visit::Embed
                }
            } else if paper.blocks.matches(dom, node) {
                Visit::Block
            } else {
                Visit::Other
            }
        }
    }
}

fn can_descend<D: DomTree>(dom: &D, paper: &Paper, node: &D::Node) -> bool {
    matches!(classify(dom, paper, node), Visit::Block | Visit::Other)
}

/// Whether a `<br>` only exists to give an empty line (or a line ending in
/// a line break) its height.
///
/// True when the `<br>` is followed only by empty text or decorations up to
/// the end of its block.
pub fn is_br_placeholder<D: DomTree>(dom: &D, paper: &Paper, node: &D::Node) -> bool {
    if dom.tag_name(node).as_deref() != Some("br") {
        return false;
    }
    let mut current = node.clone();
    loop {
        let mut sibling = dom.next_sibling(&current);
        while let Some(s) = sibling {
            let ignorable = (dom.is_text(&s) && dom.text_len(&s) == 0)
                || (dom.is_element(&s) && paper.is_decoration(dom, &s));
            if !ignorable {
                return false;
            }
            sibling = dom.next_sibling(&s);
        }
        let Some(parent) = dom.parent(&current) else {
            return false;
        };
        if paper.blocks.matches(dom, &parent) {
            return true;
        }
        current = parent;
    }
}

/// Resolve a document offset to a position in the tree under `root`.
///
/// Returns `(None, 0)` when the offset cannot be represented.
pub fn get_node_and_offset<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    index: usize,
) -> (Option<D::Node>, usize) {
    let mut count = 0;
    let mut first_block_seen = false;
    let mut next = dom.first_child(root);
    while let Some(node) = next {
        let mut descend = false;
        match classify(dom, paper, &node) {
            Visit::Text(len) => {
                if index <= count + len {
                    return (Some(node), index - count);
                }
                count += len;
            }
            Visit::Embed => {
                count += 1;
                let next_is_text = dom.next_sibling(&node).is_some_and(|s| dom.is_text(&s));
                if count == index && !next_is_text {
                    let offset = dom.child_index(&node) + 1;
                    return (dom.parent(&node), offset);
                }
            }
            Visit::Block => {
                if first_block_seen {
                    count += 1;
                } else {
                    first_block_seen = true;
                }
                let first_is_text = dom.first_child(&node).is_some_and(|c| dom.is_text(&c));
                if count == index && !first_is_text {
                    return (Some(node), 0);
                }
                descend = true;
            }
            Visit::Other => descend = true,
            Visit::Skip => {}
        }
        next = next_node(dom, root, &node, descend);
    }
    trace!(index, count, "offset not representable in DOM");
    (None, 0)
}

/// Document offset at which `node` starts. `-1` for the root itself.
///
/// For a block this is the offset of the newline before it (one less than
/// the offset of its first character).
pub fn get_node_index<D: DomTree>(dom: &D, root: &D::Node, paper: &Paper, node: &D::Node) -> isize {
    let mut index: isize = -1;
    let mut current = node.clone();
    while let Some(prev) = previous_node(dom, root, &current, |n| can_descend(dom, paper, n)) {
        if prev == *root {
            break;
        }
        index += match classify(dom, paper, &prev) {
            Visit::Text(len) => len as isize,
            Visit::Embed | Visit::Block => 1,
            Visit::Skip | Visit::Other => 0,
        };
        current = prev;
    }
    index
}

/// Document offset of a `(node, offset)` DOM position.
///
/// `offset` is in chars for text nodes and a child index for elements.
pub fn get_node_and_offset_index<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    node: &D::Node,
    offset: usize,
) -> usize {
    if dom.is_text(node) {
        return clamp(get_node_index(dom, root, paper, node) + offset as isize);
    }
    if offset == 0 {
        if node == root {
            return 0;
        }
        let own = match classify(dom, paper, node) {
            Visit::Block => 1,
            _ => 0,
        };
        return clamp(get_node_index(dom, root, paper, node) + own);
    }
    match dom
        .child_at(node, offset - 1)
        .or_else(|| dom.last_child(node))
    {
        Some(child) => index_after(dom, root, paper, &child),
        None => clamp(get_node_index(dom, root, paper, node) + 1),
    }
}

/// Offset just past the subtree of `node`.
fn index_after<D: DomTree>(dom: &D, root: &D::Node, paper: &Paper, node: &D::Node) -> usize {
    let start = get_node_index(dom, root, paper, node);
    match classify(dom, paper, node) {
        Visit::Text(len) => clamp(start + len as isize),
        Visit::Embed => clamp(start + 1),
        Visit::Skip => clamp(start),
        kind @ (Visit::Block | Visit::Other) => {
            let mut last = node.clone();
            while can_descend(dom, paper, &last) {
                match dom.last_child(&last) {
                    Some(child) => last = child,
                    None => break,
                }
            }
            if last == *node {
                clamp(start + if kind == Visit::Block { 1 } else { 0 })
            } else {
                index_after(dom, root, paper, &last)
            }
        }
    }
}

fn clamp(index: isize) -> usize {
    index.max(0) as usize
}

/// Block element holding the offset `index`.
pub fn get_line_element_at<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    index: usize,
) -> Option<D::Node> {
    let (node, _) = get_node_and_offset(dom, root, paper, index);
    let mut current = node?;
    loop {
        if current == *root {
            return None;
        }
        if paper.blocks.matches(dom, &current) {
            return Some(current);
        }
        current = dom.parent(&current)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_paper;
    use crate::delta::{Delta, attrs};
    use crate::document::TextDocument;
    use crate::dom::{Fragment, NodeId};
    use crate::render::render_document;
    use serde_json::json;

    fn setup(html: &str) -> (Fragment, NodeId, Paper) {
        let fragment = Fragment::parse_html(html);
        let root = fragment.root();
        (fragment, root, default_paper())
    }

    fn text_of(fragment: &Fragment, node: &Option<NodeId>) -> Option<String> {
        node.as_ref().and_then(|n| fragment.text(n))
    }

    #[test]
    fn test_offsets_in_text() {
        let (dom, root, paper) = setup("<p>Hello <strong>World</strong></p><p>Two</p>");
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 0);
        assert_eq!((text_of(&dom, &node).as_deref(), offset), (Some("Hello "), 0));
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 8);
        assert_eq!((text_of(&dom, &node).as_deref(), offset), (Some("World"), 2));
        // end of the first line stays in the first line
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 11);
        assert_eq!((text_of(&dom, &node).as_deref(), offset), (Some("World"), 5));
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 12);
        assert_eq!((text_of(&dom, &node).as_deref(), offset), (Some("Two"), 0));
    }

    #[test]
    fn test_block_without_leading_text() {
        let (dom, root, paper) = setup("<p>a</p><p><strong>b</strong></p>");
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 2);
        let second = dom.last_child(&root).unwrap();
        assert_eq!((node, offset), (Some(second), 0));
    }

    #[test]
    fn test_empty_line_with_placeholder() {
        let (dom, root, paper) = setup("<p>a</p><p><br></p><p>b</p>");
        let middle = dom.child_at(&root, 1).unwrap();
        assert_eq!(get_node_and_offset(&dom, &root, &paper, 2), (Some(middle), 0));
        let (node, _) = get_node_and_offset(&dom, &root, &paper, 3);
        assert_eq!(text_of(&dom, &node).as_deref(), Some("b"));
        let br = dom.first_child(&middle).unwrap();
        assert!(is_br_placeholder(&dom, &paper, &br));
    }

    #[test]
    fn test_embed_positions() {
        let (dom, root, paper) = setup(r#"<p>a<img src="x.png"></p>"#);
        let p = dom.first_child(&root).unwrap();
        // after the image, which has no text after it
        assert_eq!(get_node_and_offset(&dom, &root, &paper, 2), (Some(p), 2));
        let img = dom.last_child(&p).unwrap();
        assert_eq!(get_node_index(&dom, &root, &paper, &img), 1);
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &p, 2), 2);
    }

    #[test]
    fn test_br_followed_by_text_is_not_placeholder() {
        let (dom, root, paper) = setup("<p>a<br>b</p>");
        let p = dom.first_child(&root).unwrap();
        let br = dom.child_at(&p, 1).unwrap();
        assert!(!is_br_placeholder(&dom, &paper, &br));
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 2);
        assert_eq!((text_of(&dom, &node).as_deref(), offset), (Some("b"), 0));
    }

    #[test]
    fn test_decorations_are_skipped() {
        let (dom, root, paper) =
            setup(r#"<p>ab<span data-decoration="">WIDGET</span>cd</p>"#);
        let (node, offset) = get_node_and_offset(&dom, &root, &paper, 3);
        assert_eq!((text_of(&dom, &node).as_deref(), offset), (Some("cd"), 1));
        let p = dom.first_child(&root).unwrap();
        let cd = dom.last_child(&p).unwrap();
        assert_eq!(get_node_index(&dom, &root, &paper, &cd), 2);
    }

    #[test]
    fn test_node_index() {
        let (dom, root, paper) = setup("<p>Hello <strong>World</strong></p><p>Two</p>");
        assert_eq!(get_node_index(&dom, &root, &paper, &root), -1);
        let first = dom.first_child(&root).unwrap();
        let second = dom.last_child(&root).unwrap();
        assert_eq!(get_node_index(&dom, &root, &paper, &first), -1);
        assert_eq!(get_node_index(&dom, &root, &paper, &second), 11);
        let strong = dom.last_child(&first).unwrap();
        assert_eq!(get_node_index(&dom, &root, &paper, &strong), 6);
    }

    #[test]
    fn test_element_offsets() {
        let (dom, root, paper) = setup("<p>Hello <strong>World</strong></p><p>Two</p>");
        let first = dom.first_child(&root).unwrap();
        let second = dom.last_child(&root).unwrap();
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &root, 0), 0);
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &first, 0), 0);
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &second, 0), 12);
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &first, 2), 11);
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &root, 1), 11);
        assert_eq!(get_node_and_offset_index(&dom, &root, &paper, &root, 2), 15);
    }

    #[test]
    fn test_out_of_range_is_unrepresentable() {
        let (dom, root, paper) = setup("<p>ab</p>");
        assert_eq!(get_node_and_offset(&dom, &root, &paper, 10), (None, 0));
    }

    #[test]
    fn test_offset_inverse_law() {
        let paper = default_paper();
        let doc = TextDocument::from_delta(
            &Delta::new()
                .insert("Title", None)
                .insert("\n", Some(attrs(json!({"header": 1}))))
                .insert("Some ", None)
                .insert("bold", Some(attrs(json!({"bold": true}))))
                .insert_embed(attrs(json!({"image": "a.png"})), None)
                .insert(" text\n\n", None)
                .insert("item", None)
                .insert("\n", Some(attrs(json!({"list": "bullet"}))))
                .insert("\n", Some(attrs(json!({"hr": true}))))
                .insert("end\n", None),
        );
        let dom = render_document(&doc, &paper);
        let root = dom.root();
        for i in 0..doc.len() {
            let (node, offset) = get_node_and_offset(&dom, &root, &paper, i);
            let node = node.unwrap_or_else(|| panic!("offset {i} unresolved"));
            assert_eq!(
                get_node_and_offset_index(&dom, &root, &paper, &node, offset),
                i,
                "offset {i}"
            );
        }
    }

    #[test]
    fn test_line_element_at() {
        let (dom, root, paper) = setup("<p>ab</p><h1><em>cd</em></h1>");
        let h1 = dom.last_child(&root).unwrap();
        assert_eq!(get_line_element_at(&dom, &root, &paper, 4), Some(h1));
        let p = dom.first_child(&root).unwrap();
        assert_eq!(get_line_element_at(&dom, &root, &paper, 0), Some(p));
    }
}
