//! DOM -> document extraction.
//!
//! Walks a live or detached tree and rebuilds the document delta it
//! represents. Each recognized block closes the line before it, so a tree
//! of N blocks yields N newlines, the last one emitted when the walk ends.

use tracing::trace;

use crate::config::EditorConfig;
use crate::delta::{Attributes, Delta, Insert, Op};
use crate::dom::{DomTree, NodeKind, next_node};
use crate::position::is_br_placeholder;
use crate::typeset::Paper;

/// Subtrees never holding content.
const HIDDEN_TAGS: &[&str] = &["style", "script", "link", "meta", "title", "template"];

/// Block-level tags treated as anonymous lines when no block type claims them.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Collapse whitespace runs the way the browser renders them.
    pub collapse_whitespace: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
        }
    }
}

impl From<&EditorConfig> for ExtractOptions {
    fn from(config: &EditorConfig) -> Self {
        Self {
            collapse_whitespace: config.collapse_whitespace,
        }
    }
}

/// Build the document delta for the content under `root`.
pub fn delta_from_dom<D: DomTree>(
    dom: &D,
    root: &D::Node,
    paper: &Paper,
    options: &ExtractOptions,
) -> Delta {
    let mut extractor = Extractor {
        dom,
        root,
        paper,
        options,
        delta: Delta::new(),
        block: Attributes::new(),
        first_block_seen: false,
        unknown_block: false,
        empty: true,
    };
    let mut next = dom.first_child(root);
    while let Some(node) = next {
        let descend = extractor.visit(&node);
        next = next_node(dom, root, &node, descend);
    }
    extractor.finish()
}

struct Extractor<'a, D: DomTree> {
    dom: &'a D,
    root: &'a D::Node,
    paper: &'a Paper,
    options: &'a ExtractOptions,
    delta: Delta,
    /// Attributes of the line being collected.
    block: Attributes,
    first_block_seen: bool,
    /// The current line was opened by an element no block type claims.
    unknown_block: bool,
    /// Nothing has been collected for the current line yet.
    empty: bool,
}

impl<D: DomTree> Extractor<'_, D> {
    /// Handle one node, returning whether to walk its children.
    fn visit(&mut self, node: &D::Node) -> bool {
        match self.dom.kind(node) {
            NodeKind::Other => false,
            NodeKind::Text => {
                self.text(node);
                false
            }
            NodeKind::Element => self.element(node),
        }
    }

    fn element(&mut self, node: &D::Node) -> bool {
        let dom = self.dom;
        let paper = self.paper;
        let tag = dom.tag_name(node).unwrap_or_default();
        if HIDDEN_TAGS.contains(&tag.as_str()) || paper.is_decoration(dom, node) {
            return false;
        }
        if let Some(def) = paper.blocks.find_by_node(dom, node, false) {
            if !def.child && self.inside_block(node) {
                trace!(tag = %tag, "folding nested block into its line");
                return true;
            }
            let attributes = def.attributes_from(dom, node);
            self.start_line(attributes, false);
            return true;
        }
        if paper.embeds.matches(dom, node) {
            if !is_br_placeholder(dom, paper, node) {
                self.embed(node);
            }
            return false;
        }
        if BLOCK_TAGS.contains(&tag.as_str()) && !self.inside_block(node) {
            self.start_line(Attributes::new(), true);
        }
        true
    }

    fn start_line(&mut self, attributes: Attributes, unknown: bool) {
        if self.first_block_seen {
            if !(self.unknown_block && self.empty) {
                self.newline();
            }
        } else {
            // content ahead of the first block gets a line of its own
            if !self.empty {
                self.newline();
            }
            self.first_block_seen = true;
        }
        self.block = attributes;
        self.unknown_block = unknown;
        self.empty = true;
    }

    fn newline(&mut self) {
        let attributes = Some(self.block.clone());
        self.delta.push(Op::Insert {
            insert: Insert::Text("\n".into()),
            attributes,
        });
        self.empty = true;
    }

    fn push(&mut self, insert: Insert, attributes: Attributes) {
        self.delta.push(Op::Insert {
            insert,
            attributes: Some(attributes),
        });
        self.empty = false;
    }

    fn embed(&mut self, node: &D::Node) {
        let Some(def) = self.paper.embeds.find_by_node(self.dom, node, false) else {
            return;
        };
        let embed = def.attributes_from(self.dom, node);
        let marks = self.marks(node);
        self.push(Insert::Embed(embed), marks);
    }

    fn text(&mut self, node: &D::Node) {
        let Some(raw) = self.dom.text(node) else {
            return;
        };
        if self.is_preformatted(node) {
            let raw = raw.replace('\r', "").replace('\u{a0}', " ");
            let marks = self.marks(node);
            for (i, part) in raw.split('\n').enumerate() {
                if i > 0 {
                    self.newline();
                }
                if !part.is_empty() {
                    self.push(Insert::Text(part.into()), marks.clone());
                }
            }
            return;
        }

        let mut text = if self.options.collapse_whitespace {
            let collapsed = collapse_whitespace(&raw);
            if collapsed == " " && (self.empty || self.next_to_block(node)) {
                return;
            }
            if self.empty {
                collapsed.trim_start_matches(' ').to_string()
            } else {
                collapsed
            }
        } else {
            raw
        };
        text = text.replace('\u{a0}', " ");
        if text.is_empty() {
            return;
        }
        let marks = self.marks(node);
        self.push(Insert::Text(text), marks);
    }

    fn finish(mut self) -> Delta {
        if !(self.unknown_block && self.empty) {
            self.newline();
        }
        self.delta
    }

    /// Marks of every ancestor up to the enclosing block.
    fn marks(&self, node: &D::Node) -> Attributes {
        let mut found = Attributes::new();
        let mut current = self.dom.parent(node);
        while let Some(el) = current {
            if el == *self.root || self.is_block_level(&el) {
                break;
            }
            for def in self.paper.marks.find_all_by_node(self.dom, &el) {
                for (key, value) in def.attributes_from(self.dom, &el) {
                    found.entry(key).or_insert(value);
                }
            }
            current = self.dom.parent(&el);
        }
        // registry order, so equal formatting always serializes alike
        let mut ordered = Attributes::new();
        for def in self.paper.marks.iter() {
            if let Some((key, value)) = found.remove_entry(def.name.as_str()) {
                ordered.insert(key, value);
            }
        }
        ordered.extend(found);
        ordered
    }

    fn inside_block(&self, node: &D::Node) -> bool {
        let mut current = self.dom.parent(node);
        while let Some(el) = current {
            if el == *self.root {
                return false;
            }
            if self.paper.blocks.matches(self.dom, &el) {
                return true;
            }
            current = self.dom.parent(&el);
        }
        false
    }

    fn is_block_level(&self, node: &D::Node) -> bool {
        self.dom.is_element(node)
            && (self.paper.blocks.matches(self.dom, node)
                || self
                    .dom
                    .tag_name(node)
                    .is_some_and(|tag| BLOCK_TAGS.contains(&tag.as_str())))
    }

    /// Whitespace between blocks is formatting, not content.
    fn next_to_block(&self, node: &D::Node) -> bool {
        if self.dom.parent(node).as_ref() == Some(self.root) {
            return true;
        }
        let before = self.dom.previous_sibling(node);
        let after = self.dom.next_sibling(node);
        before.iter().chain(after.iter()).any(|s| self.is_block_level(s))
    }

    fn is_preformatted(&self, node: &D::Node) -> bool {
        let mut current = self.dom.parent(node);
        while let Some(el) = current {
            if self.dom.tag_name(&el).as_deref() == Some("pre") {
                return true;
            }
            let pre_style = self.dom.attribute(&el, "style").is_some_and(|style| {
                let style: String = style.chars().filter(|c| !c.is_whitespace()).collect();
                style.to_ascii_lowercase().contains("white-space:pre")
            });
            if pre_style {
                return true;
            }
            if el == *self.root {
                return false;
            }
            current = self.dom.parent(&el);
        }
        false
    }
}

/// Collapse runs of ASCII whitespace to one space. Non-breaking spaces
/// are left alone.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_paper;
    use crate::delta::attrs;
    use crate::document::TextDocument;
    use crate::dom::Fragment;
    use crate::render::render_document;
    use serde_json::json;

    fn extract(html: &str) -> Delta {
        let fragment = Fragment::parse_html(html);
        delta_from_dom(
            &fragment,
            &fragment.root(),
            &default_paper(),
            &ExtractOptions::default(),
        )
    }

    #[test]
    fn test_paragraphs_and_marks() {
        assert_eq!(
            extract("<p>Hello <strong>World</strong></p><p><em>two</em></p>"),
            Delta::new()
                .insert("Hello ", None)
                .insert("World", Some(attrs(json!({"bold": true}))))
                .insert("\n", None)
                .insert("two", Some(attrs(json!({"italic": true}))))
                .insert("\n", None)
        );
    }

    #[test]
    fn test_one_newline_per_block() {
        let delta = extract("<h2>Title</h2><ul><li>a</li><li>b</li></ul><hr><p>end</p>");
        assert_eq!(
            delta,
            Delta::new()
                .insert("Title", None)
                .insert("\n", Some(attrs(json!({"header": 2}))))
                .insert("a", None)
                .insert("\n", Some(attrs(json!({"list": "bullet"}))))
                .insert("b", None)
                .insert("\n", Some(attrs(json!({"list": "bullet"}))))
                .insert("\n", Some(attrs(json!({"hr": true}))))
                .insert("end\n", None)
        );
    }

    #[test]
    fn test_empty_root_is_one_empty_line() {
        assert_eq!(extract(""), Delta::new().insert("\n", None));
        assert_eq!(extract("<p><br></p>"), Delta::new().insert("\n", None));
    }

    #[test]
    fn test_nested_child_blocks_start_lines() {
        let bullet = Some(attrs(json!({"list": "bullet"})));
        assert_eq!(
            extract("<ul><li>a<ul><li>b</li></ul></li></ul>"),
            Delta::new()
                .insert("a", None)
                .insert("\n", bullet.clone())
                .insert("b", None)
                .insert("\n", bullet)
        );
    }

    #[test]
    fn test_nested_blocks_fold_into_line() {
        assert_eq!(
            extract("<blockquote><div>a</div><p>b</p></blockquote>"),
            Delta::new()
                .insert("ab", None)
                .insert("\n", Some(attrs(json!({"blockquote": true}))))
        );
    }

    #[test]
    fn test_anonymous_blocks() {
        assert_eq!(
            extract("<p>x</p><div>y</div>"),
            Delta::new().insert("x\ny\n", None)
        );
        // an empty anonymous block at the end adds nothing
        assert_eq!(extract("<p>a</p><div></div>"), Delta::new().insert("a\n", None));
    }

    #[test]
    fn test_text_before_first_block() {
        assert_eq!(extract("lead<p>x</p>"), Delta::new().insert("lead\nx\n", None));
    }

    #[test]
    fn test_whitespace_collapsing() {
        assert_eq!(
            extract("<p>  Hello\n   world </p>\n<p>x&nbsp;&nbsp;y</p>"),
            Delta::new().insert("Hello world \nx  y\n", None)
        );
        let fragment = Fragment::parse_html("<p>a  b</p>");
        let delta = delta_from_dom(
            &fragment,
            &fragment.root(),
            &default_paper(),
            &ExtractOptions {
                collapse_whitespace: false,
            },
        );
        assert_eq!(delta, Delta::new().insert("a  b\n", None));
    }

    #[test]
    fn test_inline_whitespace_is_kept() {
        assert_eq!(
            extract("<p><strong>a</strong> <em>b</em></p>"),
            Delta::new()
                .insert("a", Some(attrs(json!({"bold": true}))))
                .insert(" ", None)
                .insert("b", Some(attrs(json!({"italic": true}))))
                .insert("\n", None)
        );
    }

    #[test]
    fn test_preformatted_text_splits_lines() {
        let code = Some(attrs(json!({"code-block": true})));
        assert_eq!(
            extract("<pre>a  1\nb</pre>"),
            Delta::new()
                .insert("a  1", None)
                .insert("\n", code.clone())
                .insert("b", None)
                .insert("\n", code)
        );
    }

    #[test]
    fn test_skips_hidden_and_decorations() {
        assert_eq!(
            extract(r#"<style>p{}</style><p>a<script>x()</script><span data-decoration="">W</span>b</p>"#),
            Delta::new().insert("ab\n", None)
        );
    }

    #[test]
    fn test_style_marks_and_links() {
        assert_eq!(
            extract(r#"<p><span style="font-weight: bold">x</span><a href="/y"><i>y</i></a></p>"#),
            Delta::new()
                .insert("x", Some(attrs(json!({"bold": true}))))
                .insert("y", Some(attrs(json!({"italic": true, "link": "/y"}))))
                .insert("\n", None)
        );
    }

    #[test]
    fn test_link_with_bracket_in_href() {
        assert_eq!(
            extract(r#"<p><a href="/q?a>b">x</a></p>"#),
            Delta::new()
                .insert("x", Some(attrs(json!({"link": "/q?a>b"}))))
                .insert("\n", None)
        );
    }

    #[test]
    fn test_embeds() {
        assert_eq!(
            extract(r#"<p><b><img src="a.png" alt="A"></b>x<br>y</p>"#),
            Delta::new()
                .insert_embed(
                    attrs(json!({"image": "a.png", "alt": "A"})),
                    Some(attrs(json!({"bold": true})))
                )
                .insert("x", None)
                .insert_embed(attrs(json!({"br": true})), None)
                .insert("y\n", None)
        );
    }

    #[test]
    fn test_round_trip_through_render() {
        let paper = default_paper();
        let doc = TextDocument::from_delta(
            &Delta::new()
                .insert("Title", None)
                .insert("\n", Some(attrs(json!({"header": 1}))))
                .insert("Some ", None)
                .insert("bold", Some(attrs(json!({"bold": true, "italic": true}))))
                .insert_embed(attrs(json!({"image": "a.png"})), None)
                .insert(" and ", None)
                .insert("a link", Some(attrs(json!({"link": "https://example.com"}))))
                .insert("\n\n", None)
                .insert("one", None)
                .insert("\n", Some(attrs(json!({"list": "ordered"}))))
                .insert("two", None)
                .insert("\n", Some(attrs(json!({"list": "ordered"}))))
                .insert("quote", None)
                .insert("\n", Some(attrs(json!({"blockquote": true}))))
                .insert("\n", Some(attrs(json!({"hr": true}))))
                .insert("line", None)
                .insert_embed(attrs(json!({"br": true})), None)
                .insert("\n", None),
        );
        let fragment = render_document(&doc, &paper);
        let extracted =
            delta_from_dom(&fragment, &fragment.root(), &paper, &ExtractOptions::default());
        assert_eq!(extracted, doc.to_delta());
    }

    #[test]
    fn test_extract_render_extract_is_stable() {
        let paper = default_paper();
        let html = r#"<h3>Head</h3><p>a <b>b</b> <i>c</i></p><ul><li>x</li></ul><p><img src="i.png"></p>"#;
        let first = extract(html);
        let fragment = render_document(&TextDocument::from_delta(&first), &paper);
        let second =
            delta_from_dom(&fragment, &fragment.root(), &paper, &ExtractOptions::default());
        assert_eq!(first, second);
    }
}
