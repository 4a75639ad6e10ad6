//! Reference renderer.
//!
//! Turns a (decorated) document into virtual nodes and from there into a
//! [`Fragment`]. The browser layer patches the live DOM from the keyed
//! top-level blocks produced here, and tests use it as the round-trip oracle
//! for extraction.

use serde_json::Value;
use smol_str::SmolStr;

use crate::decorations::{DECORATOR_KEY, WIDGET_KEY};
use crate::delta::{Attributes, Delta, Insert, Op};
use crate::document::{Line, TextDocument};
use crate::dom::{Fragment, NodeId};
use crate::typeset::Paper;

/// Attribute carrying a line's id on its block element.
pub const LINE_ID_ATTR: &str = "data-line";

/// Attribute marking decoration widgets.
pub const DECORATION_ATTR: &str = "data-decoration";

#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Element {
        tag: SmolStr,
        attributes: Vec<(SmolStr, String)>,
        children: Vec<VNode>,
    },
    Text(String),
}

impl VNode {
    pub fn element(tag: &str) -> Self {
        VNode::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(text.into())
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_children(mut self, new_children: Vec<VNode>) -> Self {
        if let VNode::Element { children, .. } = &mut self {
            children.extend(new_children);
        }
        self
    }

    pub fn push_child(&mut self, child: VNode) {
        if let VNode::Element { children, .. } = self {
            children.push(child);
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            VNode::Text(_) => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            VNode::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            VNode::Text(_) => None,
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        if let VNode::Element { attributes, .. } = self {
            let value = value.into();
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value,
                None => attributes.push((name.into(), value)),
            }
        }
    }

    /// Merge decoration attributes onto this element. Classes accumulate,
    /// `true` becomes an empty attribute, `false` and `null` are skipped.
    pub fn merge_attributes(&mut self, extra: &Attributes) {
        for (name, value) in extra {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Bool(true) => String::new(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if name == "class" {
                let merged = match self.attribute("class") {
                    Some(existing) if !existing.is_empty() => format!("{existing} {value}"),
                    _ => value,
                };
                self.set_attribute("class", merged);
            } else {
                self.set_attribute(name, value);
            }
        }
    }

    /// Build this node under `parent`.
    pub fn append_to(&self, fragment: &mut Fragment, parent: NodeId) -> NodeId {
        match self {
            VNode::Text(text) => fragment.text_node(parent, text),
            VNode::Element {
                tag,
                attributes,
                children,
            } => {
                let node = fragment.create_element(tag);
                for (name, value) in attributes {
                    fragment.set_attribute(node, name, value);
                }
                fragment.append(parent, node);
                for child in children {
                    child.append_to(fragment, node);
                }
                node
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut fragment = Fragment::default();
        let root = fragment.root();
        let node = self.append_to(&mut fragment, root);
        fragment.outer_html(node)
    }
}

/// Render line content: text wrapped in its marks, and embeds.
pub fn render_inline(content: &Delta, paper: &Paper) -> Vec<VNode> {
    let empty = Attributes::new();
    let mut nodes = Vec::new();
    for op in &content.ops {
        let Op::Insert { insert, attributes } = op else {
            continue;
        };
        let attributes = attributes.as_ref().unwrap_or(&empty);
        let mut node = match insert {
            Insert::Text(text) => VNode::text(text.clone()),
            Insert::Embed(embed) => match render_embed(embed, paper) {
                Some(node) => node,
                None => continue,
            },
        };
        let is_text = matches!(node, VNode::Text(_));
        for def in paper.marks.iter() {
            if let (true, Some(render)) = (attributes.contains_key(def.name.as_str()), def.render) {
                node = render(attributes, vec![node]);
            }
        }
        if let Some(Value::Object(decorator)) = attributes.get(DECORATOR_KEY) {
            if is_text {
                let mut span = VNode::element("span");
                span.merge_attributes(decorator);
                node = span.with_children(vec![node]);
            } else {
                node.merge_attributes(decorator);
            }
        }
        nodes.push(node);
    }
    nodes
}

fn render_embed(embed: &Attributes, paper: &Paper) -> Option<VNode> {
    if let Some(widget) = embed.get(WIDGET_KEY) {
        let mut node = VNode::element("span")
            .attr(DECORATION_ATTR, "")
            .attr("contenteditable", "false");
        if let Value::Object(widget) = widget {
            let mut attributes = widget.clone();
            if let Some(Value::String(text)) = attributes.get("text") {
                node.push_child(VNode::text(text.clone()));
            }
            attributes.retain(|key, _| key != "text");
            node.merge_attributes(&attributes);
        }
        return Some(node);
    }
    let def = paper.embeds.find_by_attributes(embed, false)?;
    def.render.map(|render| render(embed, Vec::new()))
}

fn needs_placeholder(line: &Line) -> bool {
    match line.content.ops.last() {
        None => true,
        Some(Op::Insert {
            insert: Insert::Embed(embed),
            ..
        }) => embed.contains_key("br"),
        Some(_) => false,
    }
}

/// Render one line as its block element.
pub fn render_line(line: &Line, paper: &Paper) -> VNode {
    let mut children = render_inline(&line.content, paper);
    if needs_placeholder(line) {
        children.push(VNode::element("br"));
    }
    let mut node = match paper.line_type(&line.attributes).and_then(|d| d.render) {
        Some(render) => render(&line.attributes, children),
        None => VNode::element("p").with_children(children),
    };
    node.set_attribute(LINE_ID_ATTR, line.id.as_str());
    if let Some(Value::Object(decorator)) = line.attributes.get(DECORATOR_KEY) {
        node.merge_attributes(decorator);
    }
    node
}

/// A top-level rendered node keyed by the id of its first line.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBlock {
    pub key: SmolStr,
    pub node: VNode,
}

/// Render every line, grouping consecutive contained lines into their
/// shared container.
pub fn render_blocks(doc: &TextDocument, paper: &Paper) -> Vec<RenderedBlock> {
    let mut blocks: Vec<RenderedBlock> = Vec::new();
    let mut open: Option<SmolStr> = None;
    for line in doc.lines() {
        let node = render_line(line, paper);
        let container = paper
            .line_type(&line.attributes)
            .filter(|d| d.contained)
            .and_then(|d| d.render_container.map(|render| (d.name.clone(), render)));
        let Some((name, render_container)) = container else {
            blocks.push(RenderedBlock {
                key: line.id.clone(),
                node,
            });
            open = None;
            continue;
        };
        let mut container = render_container(&line.attributes);
        if let Some(last) = blocks.last_mut() {
            if open.as_ref() == Some(&name) && last.node.tag() == container.tag() {
                last.node.push_child(node);
                continue;
            }
        }
        container.push_child(node);
        blocks.push(RenderedBlock {
            key: line.id.clone(),
            node: container,
        });
        open = Some(name);
    }
    blocks
}

/// Render a whole document into a fresh fragment.
pub fn render_document(doc: &TextDocument, paper: &Paper) -> Fragment {
    let mut fragment = Fragment::default();
    let root = fragment.root();
    for block in render_blocks(doc, paper) {
        block.node.append_to(&mut fragment, root);
    }
    fragment
}
