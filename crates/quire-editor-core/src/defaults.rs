//! Default block, mark and embed types.

use serde_json::{Value, json};
use tracing::warn;

use crate::delta::{Attributes, attrs};
use crate::dom::ElementView;
use crate::render::VNode;
use crate::typeset::{Paper, TypeDef, Typeset};

// === Blocks ===

fn paragraph_from_dom(_: &dyn ElementView) -> Attributes {
    Attributes::new()
}

fn paragraph_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("p").with_children(children)
}

fn header_level(attributes: &Attributes) -> u64 {
    attributes
        .get("header")
        .and_then(Value::as_u64)
        .unwrap_or(1)
        .clamp(1, 6)
}

fn header_from_dom(el: &dyn ElementView) -> Attributes {
    let level = el
        .tag_name()
        .strip_prefix('h')
        .and_then(|l| l.parse::<u64>().ok())
        .unwrap_or(1);
    attrs(json!({ "header": level }))
}

fn header_render(attributes: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element(&format!("h{}", header_level(attributes))).with_children(children)
}

fn indent_of(attributes: &Attributes) -> u64 {
    attributes.get("indent").and_then(Value::as_u64).unwrap_or(0)
}

fn list_from_dom(el: &dyn ElementView) -> Attributes {
    let kind = match el.parent_tag_name().as_deref() {
        Some("ol") => "ordered",
        _ => "bullet",
    };
    let mut attributes = attrs(json!({ "list": kind }));
    let indent = el
        .attribute("data-indent")
        .and_then(|i| i.parse::<u64>().ok())
        .unwrap_or(0);
    if indent > 0 {
        attributes.insert("indent".into(), indent.into());
    }
    attributes
}

fn list_render(attributes: &Attributes, children: Vec<VNode>) -> VNode {
    let node = VNode::element("li").with_children(children);
    match indent_of(attributes) {
        0 => node,
        indent => node.attr("data-indent", indent.to_string()),
    }
}

fn list_container(attributes: &Attributes) -> VNode {
    match attributes.get("list").and_then(Value::as_str) {
        Some("ordered") => VNode::element("ol"),
        _ => VNode::element("ul"),
    }
}

fn blockquote_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("blockquote").with_children(children)
}

fn code_block_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("pre").with_children(children)
}

fn hr_render(_: &Attributes, _: Vec<VNode>) -> VNode {
    VNode::element("hr")
}

pub fn default_blocks() -> Vec<TypeDef> {
    vec![
        TypeDef::new("paragraph", "p")
            .from_dom(paragraph_from_dom)
            .render(paragraph_render),
        TypeDef::new("header", "h1, h2, h3, h4, h5, h6")
            .from_dom(header_from_dom)
            .render(header_render)
            .default_follows(),
        TypeDef::new("list", "li")
            .from_dom(list_from_dom)
            .render(list_render)
            .render_container(list_container)
            .contained()
            .indentable()
            .child(),
        TypeDef::new("blockquote", "blockquote").render(blockquote_render),
        TypeDef::new("code-block", "pre").render(code_block_render),
        TypeDef::new("hr", "hr").render(hr_render).frozen(),
    ]
}

// === Marks ===

fn bold_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("strong").with_children(children)
}

fn italic_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("em").with_children(children)
}

fn underline_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("u").with_children(children)
}

fn strike_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("s").with_children(children)
}

fn code_render(_: &Attributes, children: Vec<VNode>) -> VNode {
    VNode::element("code").with_children(children)
}

fn link_from_dom(el: &dyn ElementView) -> Attributes {
    attrs(json!({ "link": el.attribute("href").unwrap_or_default() }))
}

fn link_render(attributes: &Attributes, children: Vec<VNode>) -> VNode {
    let href = attributes
        .get("link")
        .and_then(Value::as_str)
        .unwrap_or_default();
    VNode::element("a").attr("href", href).with_children(children)
}

pub fn default_marks() -> Vec<TypeDef> {
    vec![
        TypeDef::new("bold", "strong, b")
            .style_selector(r#"[style*="font-weight:bold"], [style*="font-weight:700"]"#)
            .render(bold_render),
        TypeDef::new("italic", "em, i")
            .style_selector(r#"[style*="font-style:italic"]"#)
            .render(italic_render),
        TypeDef::new("underline", "u")
            .style_selector(r#"[style*="text-decoration:underline"]"#)
            .render(underline_render),
        TypeDef::new("strike", "s, del, strike")
            .style_selector(r#"[style*="text-decoration:line-through"]"#)
            .render(strike_render),
        TypeDef::new("code", "code").render(code_render),
        TypeDef::new("link", "a[href]")
            .from_dom(link_from_dom)
            .render(link_render),
    ]
}

// === Embeds ===

fn image_from_dom(el: &dyn ElementView) -> Attributes {
    let mut attributes = attrs(json!({ "image": el.attribute("src").unwrap_or_default() }));
    if let Some(alt) = el.attribute("alt").filter(|a| !a.is_empty()) {
        attributes.insert("alt".into(), alt.into());
    }
    attributes
}

fn image_render(attributes: &Attributes, _: Vec<VNode>) -> VNode {
    let mut node = VNode::element("img").attr(
        "src",
        attributes
            .get("image")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );
    if let Some(alt) = attributes.get("alt").and_then(Value::as_str) {
        node.set_attribute("alt", alt);
    }
    node
}

fn br_render(_: &Attributes, _: Vec<VNode>) -> VNode {
    VNode::element("br")
}

pub fn default_embeds() -> Vec<TypeDef> {
    vec![
        TypeDef::new("image", "img")
            .from_dom(image_from_dom)
            .render(image_render),
        TypeDef::new("br", "br").render(br_render),
    ]
}

fn register(set: &mut Typeset, defs: Vec<TypeDef>) {
    for def in defs {
        let name = def.name.clone();
        if let Err(err) = set.add(def, None) {
            warn!(%name, %err, "skipping default type");
        }
    }
}

/// Registry holding the default types.
pub fn default_paper() -> Paper {
    let mut paper = Paper::new();
    register(&mut paper.blocks, default_blocks());
    register(&mut paper.marks, default_marks());
    register(&mut paper.embeds, default_embeds());
    paper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, Fragment, NodeRef};

    #[test]
    fn test_default_paper_registers_everything() {
        let paper = default_paper();
        assert_eq!(
            paper.blocks.names().collect::<Vec<_>>(),
            ["paragraph", "header", "list", "blockquote", "code-block", "hr"]
        );
        assert_eq!(paper.marks.len(), 6);
        assert_eq!(paper.embeds.len(), 2);
        assert_eq!(paper.blocks.get_default().unwrap().name, "paragraph");
        assert!(paper.blocks.get("hr").unwrap().frozen);
        assert!(paper.blocks.get("list").unwrap().child);
    }

    #[test]
    fn test_header_and_list_from_dom() {
        let fragment = Fragment::parse_html(r#"<h3>x</h3><ol><li data-indent="2">y</li></ol>"#);
        let root = fragment.root();
        let h3 = fragment.first_child(&root).unwrap();
        assert_eq!(header_from_dom(&NodeRef::new(&fragment, &h3)), attrs(json!({"header": 3})));

        let li = fragment.first_child(&fragment.last_child(&root).unwrap()).unwrap();
        assert_eq!(
            list_from_dom(&NodeRef::new(&fragment, &li)),
            attrs(json!({"list": "ordered", "indent": 2}))
        );
    }

    #[test]
    fn test_image_from_dom() {
        let fragment = Fragment::parse_html(r#"<img src="a.png" alt="">"#);
        let img = fragment.first_child(&fragment.root()).unwrap();
        assert_eq!(
            image_from_dom(&NodeRef::new(&fragment, &img)),
            attrs(json!({"image": "a.png"}))
        );
    }
}
