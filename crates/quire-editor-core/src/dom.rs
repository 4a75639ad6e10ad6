//! DOM abstraction.
//!
//! The mapper, extractor and selection bridge walk documents through the
//! [`DomTree`] trait so they run the same against the live browser DOM and
//! against [`Fragment`], an in-memory tree used for detached content,
//! rendering output and tests.
//!
//! Offsets exchanged with the DOM on text nodes go through
//! [`DomTree::to_dom_offset`] / [`DomTree::from_dom_offset`]; document
//! offsets are always counted in chars.

use smol_str::SmolStr;

// === DomTree ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Comments, processing instructions and anything else.
    Other,
}

pub trait DomTree {
    type Node: Clone + PartialEq + std::fmt::Debug;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Lower-case tag name of an element.
    fn tag_name(&self, node: &Self::Node) -> Option<SmolStr>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Data of a text node.
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn last_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn is_element(&self, node: &Self::Node) -> bool {
        self.kind(node) == NodeKind::Element
    }

    fn is_text(&self, node: &Self::Node) -> bool {
        self.kind(node) == NodeKind::Text
    }

    /// Length of a text node in chars.
    fn text_len(&self, node: &Self::Node) -> usize {
        self.text(node).map(|t| t.chars().count()).unwrap_or(0)
    }

    /// Convert a char offset within a text node to the DOM's offset unit.
    fn to_dom_offset(&self, _node: &Self::Node, offset: usize) -> u32 {
        offset as u32
    }

    /// Convert a DOM offset within a text node to chars.
    fn from_dom_offset(&self, _node: &Self::Node, offset: u32) -> usize {
        offset as usize
    }

    fn child_index(&self, node: &Self::Node) -> usize {
        let mut index = 0;
        let mut current = self.previous_sibling(node);
        while let Some(prev) = current {
            index += 1;
            current = self.previous_sibling(&prev);
        }
        index
    }

    fn child_at(&self, parent: &Self::Node, index: usize) -> Option<Self::Node> {
        let mut current = self.first_child(parent);
        for _ in 0..index {
            current = self.next_sibling(&current?);
        }
        current
    }

    fn child_count(&self, parent: &Self::Node) -> usize {
        let mut count = 0;
        let mut current = self.first_child(parent);
        while let Some(child) = current {
            count += 1;
            current = self.next_sibling(&child);
        }
        count
    }

    /// Inclusive: a node contains itself.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if n == *ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }

    /// Concatenated text of all descendant text nodes.
    fn text_content(&self, node: &Self::Node) -> String {
        if self.is_text(node) {
            return self.text(node).unwrap_or_default();
        }
        let mut out = String::new();
        let mut current = self.first_child(node);
        while let Some(child) = current {
            out.push_str(&self.text_content(&child));
            current = self.next_sibling(&child);
        }
        out
    }
}

/// Next node in document order within `root`.
///
/// With `descend` false the children of `node` are skipped.
pub fn next_node<D: DomTree>(
    dom: &D,
    root: &D::Node,
    node: &D::Node,
    descend: bool,
) -> Option<D::Node> {
    if descend {
        if let Some(child) = dom.first_child(node) {
            return Some(child);
        }
    }
    let mut current = node.clone();
    loop {
        if current == *root {
            return None;
        }
        if let Some(sibling) = dom.next_sibling(&current) {
            return Some(sibling);
        }
        current = dom.parent(&current)?;
    }
}

/// Previous node in document order within `root`, ending at `root` itself.
///
/// Only descends into previous siblings for which `can_descend` holds.
pub fn previous_node<D, F>(dom: &D, root: &D::Node, node: &D::Node, can_descend: F) -> Option<D::Node>
where
    D: DomTree,
    F: Fn(&D::Node) -> bool,
{
    if node == root {
        return None;
    }
    match dom.previous_sibling(node) {
        Some(mut prev) => {
            while can_descend(&prev) {
                match dom.last_child(&prev) {
                    Some(child) => prev = child,
                    None => break,
                }
            }
            Some(prev)
        }
        None => dom.parent(node),
    }
}

// === ElementView ===

/// Read-only view of an element handed to type `from_dom` hooks.
pub trait ElementView {
    fn tag_name(&self) -> SmolStr;
    fn attribute(&self, name: &str) -> Option<String>;
    fn parent_tag_name(&self) -> Option<SmolStr>;
    fn text_content(&self) -> String;
}

pub struct NodeRef<'a, D: DomTree> {
    pub dom: &'a D,
    pub node: &'a D::Node,
}

impl<'a, D: DomTree> NodeRef<'a, D> {
    pub fn new(dom: &'a D, node: &'a D::Node) -> Self {
        Self { dom, node }
    }
}

impl<D: DomTree> ElementView for NodeRef<'_, D> {
    fn tag_name(&self) -> SmolStr {
        self.dom.tag_name(self.node).unwrap_or_default()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.dom.attribute(self.node, name)
    }

    fn parent_tag_name(&self) -> Option<SmolStr> {
        self.dom
            .parent(self.node)
            .and_then(|p| self.dom.tag_name(&p))
    }

    fn text_content(&self) -> String {
        self.dom.text_content(self.node)
    }
}

// === Fragment ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
enum NodeContent {
    Element {
        tag: SmolStr,
        attributes: Vec<(SmolStr, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    content: NodeContent,
}

/// In-memory DOM tree rooted at a single element.
#[derive(Debug, Clone)]
pub struct Fragment {
    nodes: Vec<NodeData>,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

impl Default for Fragment {
    fn default() -> Self {
        Self::new("div")
    }
}

impl Fragment {
    /// Empty fragment with a root element of the given tag.
    pub fn new(root_tag: &str) -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                content: NodeContent::Element {
                    tag: root_tag.to_ascii_lowercase().into(),
                    attributes: Vec::new(),
                },
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn add(&mut self, content: NodeContent) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            content,
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.add(NodeContent::Element {
            tag: tag.to_ascii_lowercase().into(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.add(NodeContent::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.add(NodeContent::Comment(text.to_string()))
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn element(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(node, name, value);
        }
        self.append(parent, node);
        node
    }

    /// Create a text node and append it to `parent`.
    pub fn text_node(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        self.append(parent, node);
        node
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeContent::Element { attributes, .. } = &mut self.nodes[node.0].content {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((name.into(), value.to_string())),
            }
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeContent::Text(data) = &mut self.nodes[node.0].content {
            *data = text.to_string();
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Serialized children of the root.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in &self.nodes[node.0].children {
            self.write_html(*child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.0];
        match &data.content {
            NodeContent::Text(text) => escape_into(text, false, out),
            NodeContent::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeContent::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(tag) {
                    return;
                }
                for child in &data.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Parse an HTML snippet into a fragment whose root holds the parsed
    /// nodes.
    ///
    /// Lenient: unclosed elements are closed at the end of input and a stray
    /// end tag closes up to its matching open element (or is dropped).
    pub fn parse_html(html: &str) -> Self {
        let mut fragment = Fragment::default();
        let mut stack = vec![fragment.root()];
        let mut rest = html;

        while !rest.is_empty() {
            let Some(lt) = rest.find('<') else {
                let parent = stack[stack.len() - 1];
                fragment.text_node(parent, &decode_entities(rest));
                break;
            };
            if lt > 0 {
                let parent = stack[stack.len() - 1];
                fragment.text_node(parent, &decode_entities(&rest[..lt]));
            }
            rest = &rest[lt..];

            if let Some(body) = rest.strip_prefix("<!--") {
                let end = body.find("-->").unwrap_or(body.len());
                let parent = stack[stack.len() - 1];
                let comment = fragment.create_comment(&body[..end]);
                fragment.append(parent, comment);
                rest = body.get(end + 3..).unwrap_or("");
                continue;
            }

            let Some(gt) = tag_end(rest) else {
                let parent = stack[stack.len() - 1];
                fragment.text_node(parent, &decode_entities(rest));
                break;
            };
            let tag_src = &rest[1..gt];
            rest = &rest[gt + 1..];

            if let Some(name) = tag_src.strip_prefix('/') {
                let name = name.trim().to_ascii_lowercase();
                if let Some(pos) = stack
                    .iter()
                    .rposition(|id| fragment.tag_of(*id).is_some_and(|t| t == name))
                {
                    if pos > 0 {
                        stack.truncate(pos);
                    }
                }
                continue;
            }
            if tag_src.starts_with('!') || tag_src.starts_with('?') {
                continue;
            }

            let self_closing = tag_src.ends_with('/');
            let tag_src = tag_src.trim_end_matches('/');
            let (name, attributes) = parse_tag(tag_src);
            if name.is_empty() {
                continue;
            }
            let parent = stack[stack.len() - 1];
            let node = fragment.create_element(&name);
            for (attr, value) in attributes {
                fragment.set_attribute(node, &attr, &value);
            }
            fragment.append(parent, node);

            if matches!(name.as_str(), "script" | "style") {
                // raw text content
                let close = format!("</{name}");
                let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
                if end > 0 {
                    fragment.text_node(node, &rest[..end]);
                }
                rest = &rest[end..];
                if let Some(gt) = rest.find('>') {
                    rest = &rest[gt + 1..];
                }
                continue;
            }
            if !self_closing && !is_void_tag(&name) {
                stack.push(node);
            }
        }
        fragment
    }

    fn tag_of(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].content {
            NodeContent::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

/// Byte offset of the `>` closing the tag at the start of `src`. A `>`
/// inside a quoted attribute value does not count. An unterminated quote
/// falls back to the first `>`.
fn tag_end(src: &str) -> Option<usize> {
    let mut quote = None;
    let mut after_eq = false;
    for (i, c) in src.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '>' => return Some(i),
                '"' | '\'' if after_eq => quote = Some(c),
                '=' => {
                    after_eq = true;
                    continue;
                }
                c if c.is_ascii_whitespace() && after_eq => continue,
                _ => {}
            },
        }
        after_eq = false;
    }
    src.find('>')
}

fn parse_tag(src: &str) -> (String, Vec<(String, String)>) {
    let src = src.trim();
    let name_end = src
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(src.len());
    let name = src[..name_end].to_ascii_lowercase();
    let mut attributes = Vec::new();
    let mut rest = src[name_end..].trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();
        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body.find(quote).unwrap_or(body.len());
                    (&body[..end], body.get(end + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining.trim_start();
            decode_entities(value)
        } else {
            String::new()
        };
        if !key.is_empty() {
            attributes.push((key, value));
        }
    }
    (name, attributes)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest
            .char_indices()
            .take(12)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i);
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

impl DomTree for Fragment {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.nodes[node.0].content {
            NodeContent::Element { .. } => NodeKind::Element,
            NodeContent::Text(_) => NodeKind::Text,
            NodeContent::Comment(_) => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<SmolStr> {
        match &self.nodes[node.0].content {
            NodeContent::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.nodes[node.0].content {
            NodeContent::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.nodes[node.0].content {
            NodeContent::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn first_child(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.first().copied()
    }

    fn last_child(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.last().copied()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn previous_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let index = siblings.iter().position(|c| c == node)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    fn child_index(&self, node: &NodeId) -> usize {
        self.nodes[node.0]
            .parent
            .and_then(|p| self.nodes[p.0].children.iter().position(|c| c == node))
            .unwrap_or(0)
    }

    fn child_at(&self, parent: &NodeId, index: usize) -> Option<NodeId> {
        self.nodes[parent.0].children.get(index).copied()
    }

    fn child_count(&self, parent: &NodeId) -> usize {
        self.nodes[parent.0].children.len()
    }
}
