//! Type registry.
//!
//! A [`Typeset`] holds the registered block, mark or embed types of one
//! role. Types are identified in the DOM by selector and in the document by
//! attribute name. [`Paper`] bundles the three typesets plus the selector
//! for decoration-only markup.

use std::collections::HashMap;

use serde_json::Value;
use smol_str::SmolStr;
use tracing::trace;

use crate::config::DEFAULT_DECORATION_SELECTOR;
use crate::delta::Attributes;
use crate::dom::{DomTree, ElementView, NodeRef};
use crate::error::{EditorError, Result};
use crate::render::VNode;
use crate::selector::SelectorList;

/// Reads a type's attributes off a matched element.
pub type FromDom = fn(&dyn ElementView) -> Attributes;

/// Renders a type given the attributes in effect and the rendered children.
pub type Render = fn(&Attributes, Vec<VNode>) -> VNode;

/// Renders the shared container of consecutive contained lines.
pub type RenderContainer = fn(&Attributes) -> VNode;

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: SmolStr,
    pub selector: String,
    /// Extra selector tried when `selector` does not match, typically for
    /// inline-style based formats.
    pub style_selector: Option<String>,
    pub from_dom: Option<FromDom>,
    pub render: Option<Render>,
    pub render_container: Option<RenderContainer>,
    /// Atomic unit the caret cannot enter.
    pub frozen: bool,
    /// Consecutive lines of this type share a container element.
    pub contained: bool,
    pub indentable: bool,
    /// Enter at the end of the line continues with the default block.
    pub default_follows: bool,
    /// May nest inside another recognized block and still start a new line.
    pub child: bool,
    matcher: Option<SelectorList>,
    style_matcher: Option<SelectorList>,
}

impl TypeDef {
    pub fn new(name: impl Into<SmolStr>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            style_selector: None,
            from_dom: None,
            render: None,
            render_container: None,
            frozen: false,
            contained: false,
            indentable: false,
            default_follows: false,
            child: false,
            matcher: None,
            style_matcher: None,
        }
    }

    pub fn style_selector(mut self, selector: impl Into<String>) -> Self {
        self.style_selector = Some(selector.into());
        self
    }

    pub fn from_dom(mut self, from_dom: FromDom) -> Self {
        self.from_dom = Some(from_dom);
        self
    }

    pub fn render(mut self, render: Render) -> Self {
        self.render = Some(render);
        self
    }

    pub fn render_container(mut self, render_container: RenderContainer) -> Self {
        self.render_container = Some(render_container);
        self
    }

    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn contained(mut self) -> Self {
        self.contained = true;
        self
    }

    pub fn indentable(mut self) -> Self {
        self.indentable = true;
        self
    }

    pub fn default_follows(mut self) -> Self {
        self.default_follows = true;
        self
    }

    pub fn child(mut self) -> Self {
        self.child = true;
        self
    }

    fn compile(&mut self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EditorError::MissingTypeName);
        }
        if self.selector.trim().is_empty() {
            return Err(EditorError::MissingTypeSelector(self.name.to_string()));
        }
        self.matcher = Some(SelectorList::parse(&self.selector)?);
        self.style_matcher = match &self.style_selector {
            Some(s) if !s.trim().is_empty() => Some(SelectorList::parse(s)?),
            _ => None,
        };
        Ok(())
    }

    /// Whether `node` is an element of this type.
    pub fn matches<D: DomTree>(&self, dom: &D, node: &D::Node) -> bool {
        self.matcher.as_ref().is_some_and(|m| m.matches(dom, node))
            || self.style_matcher.as_ref().is_some_and(|m| m.matches(dom, node))
    }

    /// Attributes this type contributes for `node`: the `from_dom` result,
    /// or `{name: true}` when there is no hook.
    pub fn attributes_from<D: DomTree>(&self, dom: &D, node: &D::Node) -> Attributes {
        match self.from_dom {
            Some(from_dom) => from_dom(&NodeRef::new(dom, node)),
            None => {
                let mut attributes = Attributes::new();
                attributes.insert(self.name.to_string(), Value::Bool(true));
                attributes
            }
        }
    }
}

/// Registered types of one role, in priority order.
#[derive(Debug, Clone)]
pub struct Typeset {
    types: Vec<TypeDef>,
    priorities: HashMap<SmolStr, usize>,
    selector: SelectorList,
}

impl Default for Typeset {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            priorities: HashMap::new(),
            selector: SelectorList::empty(),
        }
    }
}

impl Typeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type at `priority` (an insertion index), or last.
    ///
    /// A type with the same name is replaced.
    pub fn add(&mut self, mut def: TypeDef, priority: Option<usize>) -> Result<()> {
        def.compile()?;
        if let Some(existing) = self.types.iter().position(|t| t.name == def.name) {
            self.types.remove(existing);
        }
        let index = priority.unwrap_or(self.types.len()).min(self.types.len());
        trace!(name = %def.name, index, "registering type");
        self.types.insert(index, def);
        self.rebuild();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(index) = self.types.iter().position(|t| t.name == name) {
            self.types.remove(index);
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.priorities = self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        let lists: Vec<SelectorList> = self
            .types
            .iter()
            .flat_map(|t| t.matcher.iter().chain(t.style_matcher.iter()).cloned())
            .collect();
        self.selector = SelectorList::union(&lists);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.priorities.get(name).map(|&i| &self.types[i])
    }

    /// The first registered type.
    pub fn get_default(&self) -> Option<&TypeDef> {
        self.types.first()
    }

    pub fn priority(&self, name: &str) -> Option<usize> {
        self.priorities.get(name).copied()
    }

    /// Combined selector of every registered type.
    pub fn selector(&self) -> &SelectorList {
        &self.selector
    }

    /// Whether any registered type matches `node`. Always false for
    /// non-element nodes.
    pub fn matches<D: DomTree>(&self, dom: &D, node: &D::Node) -> bool {
        self.selector.matches(dom, node)
    }

    /// Type of an element. Later registrations win; with `fallback` the
    /// default type stands in when nothing matches.
    pub fn find_by_node<D: DomTree>(
        &self,
        dom: &D,
        node: &D::Node,
        fallback: bool,
    ) -> Option<&TypeDef> {
        self.types
            .iter()
            .rev()
            .find(|t| t.matches(dom, node))
            .or_else(|| if fallback { self.get_default() } else { None })
    }

    /// Every type matching `node`, latest registration first.
    pub fn find_all_by_node<D: DomTree>(&self, dom: &D, node: &D::Node) -> Vec<&TypeDef> {
        self.types
            .iter()
            .rev()
            .filter(|t| t.matches(dom, node))
            .collect()
    }

    /// Type named by the first attribute key that is a registered type.
    pub fn find_by_attributes(&self, attributes: &Attributes, fallback: bool) -> Option<&TypeDef> {
        attributes
            .keys()
            .find_map(|key| self.get(key))
            .or_else(|| if fallback { self.get_default() } else { None })
    }
}

/// Block, mark and embed typesets plus decoration markup recognition.
#[derive(Debug, Clone)]
pub struct Paper {
    pub blocks: Typeset,
    pub marks: Typeset,
    pub embeds: Typeset,
    decoration: SelectorList,
}

impl Default for Paper {
    fn default() -> Self {
        Self {
            blocks: Typeset::new(),
            marks: Typeset::new(),
            embeds: Typeset::new(),
            decoration: SelectorList::parse(DEFAULT_DECORATION_SELECTOR)
                .unwrap_or_else(|_| SelectorList::empty()),
        }
    }
}

impl Paper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_decoration_selector(&mut self, selector: &str) -> Result<()> {
        self.decoration = SelectorList::parse(selector)?;
        Ok(())
    }

    pub fn decoration_selector(&self) -> &SelectorList {
        &self.decoration
    }

    /// Whether `node` is decoration-only markup.
    pub fn is_decoration<D: DomTree>(&self, dom: &D, node: &D::Node) -> bool {
        self.decoration.matches(dom, node)
    }

    /// Default block type for a line's attributes.
    pub fn line_type(&self, attributes: &Attributes) -> Option<&TypeDef> {
        self.blocks.find_by_attributes(attributes, true)
    }

    /// Whether a line with these attributes is the default block type.
    pub fn is_default_line(&self, attributes: &Attributes) -> bool {
        match (self.line_type(attributes), self.blocks.get_default()) {
            (Some(line), Some(default)) => line.name == default.name,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::attrs;
    use crate::dom::Fragment;
    use serde_json::json;

    fn node(html: &str) -> (Fragment, crate::dom::NodeId) {
        let fragment = Fragment::parse_html(html);
        let node = fragment.first_child(&fragment.root()).unwrap();
        (fragment, node)
    }

    #[test]
    fn test_add_requires_name_and_selector() {
        let mut set = Typeset::new();
        assert_eq!(
            set.add(TypeDef::new("", "p"), None),
            Err(EditorError::MissingTypeName)
        );
        assert_eq!(
            set.add(TypeDef::new("paragraph", " "), None),
            Err(EditorError::MissingTypeSelector("paragraph".into()))
        );
        assert!(matches!(
            set.add(TypeDef::new("paragraph", "p["), None),
            Err(EditorError::InvalidSelector { .. })
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_priority_and_default() {
        let mut set = Typeset::new();
        set.add(TypeDef::new("paragraph", "p"), None).unwrap();
        set.add(TypeDef::new("header", "h1"), None).unwrap();
        set.add(TypeDef::new("quote", "blockquote"), Some(0)).unwrap();
        assert_eq!(set.get_default().unwrap().name, "quote");
        assert_eq!(set.priority("paragraph"), Some(1));
        assert_eq!(set.priority("header"), Some(2));
        assert_eq!(set.selector().as_str(), "blockquote, p, h1");
    }

    #[test]
    fn test_readd_replaces() {
        let mut set = Typeset::new();
        set.add(TypeDef::new("paragraph", "p"), None).unwrap();
        set.add(TypeDef::new("paragraph", "div"), None).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("paragraph").unwrap().selector, "div");
    }

    #[test]
    fn test_find_by_node_last_registered_wins() {
        let mut set = Typeset::new();
        set.add(TypeDef::new("paragraph", "p"), None).unwrap();
        set.add(TypeDef::new("note", "p.note"), None).unwrap();
        let (fragment, p) = node(r#"<p class="note">x</p>"#);
        assert_eq!(set.find_by_node(&fragment, &p, false).unwrap().name, "note");

        let (fragment, div) = node("<div>x</div>");
        assert!(set.find_by_node(&fragment, &div, false).is_none());
        assert_eq!(set.find_by_node(&fragment, &div, true).unwrap().name, "paragraph");
    }

    #[test]
    fn test_style_selector_matches() {
        let mut set = Typeset::new();
        set.add(
            TypeDef::new("bold", "strong, b").style_selector("[style*=\"font-weight:bold\"]"),
            None,
        )
        .unwrap();
        let (fragment, span) = node(r#"<span style="font-weight: bold">x</span>"#);
        assert!(set.matches(&fragment, &span));
        assert_eq!(set.find_by_node(&fragment, &span, false).unwrap().name, "bold");
    }

    #[test]
    fn test_matches_is_false_for_text() {
        let mut set = Typeset::new();
        set.add(TypeDef::new("any", "*"), None).unwrap();
        let (fragment, text) = node("plain");
        assert!(!set.matches(&fragment, &text));
    }

    #[test]
    fn test_find_by_attributes_uses_key_order() {
        let mut set = Typeset::new();
        set.add(TypeDef::new("paragraph", "p"), None).unwrap();
        set.add(TypeDef::new("header", "h1"), None).unwrap();
        set.add(TypeDef::new("list", "li"), None).unwrap();
        let attributes = attrs(json!({"indent": 1, "list": "bullet", "header": 1}));
        assert_eq!(set.find_by_attributes(&attributes, false).unwrap().name, "list");
        assert!(set.find_by_attributes(&attrs(json!({"x": 1})), false).is_none());
        assert_eq!(
            set.find_by_attributes(&Attributes::new(), true).unwrap().name,
            "paragraph"
        );
    }

    #[test]
    fn test_attributes_from_defaults_to_name() {
        let def = TypeDef::new("underline", "u");
        let (fragment, u) = node("<u>x</u>");
        assert_eq!(def.attributes_from(&fragment, &u), attrs(json!({"underline": true})));
    }

    #[test]
    fn test_paper_decoration_selector() {
        let mut paper = Paper::new();
        let (fragment, span) = node(r#"<span data-decoration="">x</span>"#);
        assert!(paper.is_decoration(&fragment, &span));
        paper.set_decoration_selector(".widget").unwrap();
        assert!(!paper.is_decoration(&fragment, &span));
    }
}
