//! Keyed DOM patching.
//!
//! Top-level blocks are keyed by the id of their first line. A block whose
//! key and rendered tree are unchanged keeps its live node, so unedited
//! lines are never rebuilt and the native selection inside them survives.

use std::collections::HashMap;

use quire_editor_core::{RenderedBlock, SmolStr, VNode};
use web_sys::{Document, Node};

use crate::platform::PlatformError;

struct Rendered {
    key: SmolStr,
    vnode: VNode,
    node: Node,
}

/// Remembers what was last rendered into a root.
#[derive(Default)]
pub struct DomPatcher {
    rendered: Vec<Rendered>,
}

impl std::fmt::Debug for DomPatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomPatcher")
            .field("blocks", &self.rendered.len())
            .finish()
    }
}

impl DomPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget cached nodes, forcing the next patch to rebuild every block.
    /// Needed after the browser edited the DOM itself.
    pub fn invalidate(&mut self) {
        self.rendered.clear();
    }

    /// Bring the children of `root` in line with `blocks`. Returns how many
    /// blocks were built from scratch.
    pub fn patch(
        &mut self,
        document: &Document,
        root: &Node,
        blocks: Vec<RenderedBlock>,
    ) -> Result<usize, PlatformError> {
        let mut previous: HashMap<SmolStr, Rendered> = self
            .rendered
            .drain(..)
            .map(|r| (r.key.clone(), r))
            .collect();

        let mut built = 0;
        let mut next = Vec::with_capacity(blocks.len());
        for block in blocks {
            let reused = previous.remove(&block.key).filter(|prev| {
                prev.vnode == block.node && prev.node.parent_node().as_ref() == Some(root)
            });
            let node = match reused {
                Some(prev) => prev.node,
                None => {
                    built += 1;
                    build_node(document, &block.node)?
                }
            };
            next.push(Rendered {
                key: block.key,
                vnode: block.node,
                node,
            });
        }

        for stale in previous.into_values() {
            if let Some(parent) = stale.node.parent_node() {
                parent.remove_child(&stale.node)?;
            }
        }

        let mut cursor = root.first_child();
        for rendered in &next {
            if cursor.as_ref() == Some(&rendered.node) {
                cursor = rendered.node.next_sibling();
                continue;
            }
            root.insert_before(&rendered.node, cursor.as_ref())?;
        }
        // Anything left over was put there by the browser.
        while let Some(extra) = cursor {
            cursor = extra.next_sibling();
            root.remove_child(&extra)?;
        }

        tracing::trace!(blocks = next.len(), built, "patched editor root");
        self.rendered = next;
        Ok(built)
    }
}

/// Build a live node for `vnode`.
pub fn build_node(document: &Document, vnode: &VNode) -> Result<Node, PlatformError> {
    match vnode {
        VNode::Text(text) => Ok(document.create_text_node(text).into()),
        VNode::Element {
            tag,
            attributes,
            children,
        } => {
            let element = document.create_element(tag)?;
            for (name, value) in attributes {
                element.set_attribute(name, value)?;
            }
            for child in children {
                element.append_child(&build_node(document, child)?)?;
            }
            Ok(element.into())
        }
    }
}

/// Render `blocks` into `root` with a one-off patcher.
pub fn patch_blocks(
    document: &Document,
    root: &Node,
    blocks: Vec<RenderedBlock>,
) -> Result<usize, PlatformError> {
    DomPatcher::new().patch(document, root, blocks)
}
