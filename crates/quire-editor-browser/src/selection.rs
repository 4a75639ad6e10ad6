//! Native selection over `window.getSelection()`.

use quire_editor_core::{NativeRange, NativeSelection};
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, Node, Selection};

#[derive(Debug, Clone)]
pub struct BrowserSelection {
    window: web_sys::Window,
}

impl BrowserSelection {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }

    /// Selection of the global window, if there is one.
    pub fn global() -> Option<Self> {
        web_sys::window().map(Self::new)
    }

    fn selection(&self) -> Option<Selection> {
        match self.window.get_selection() {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!("getSelection failed: {:?}", e);
                None
            }
        }
    }

    fn active_element(&self) -> Option<Node> {
        let document = self.window.document()?;
        document.active_element().map(Node::from)
    }
}

impl NativeSelection for BrowserSelection {
    type Node = Node;

    fn range(&self) -> Option<NativeRange<Node>> {
        let selection = self.selection()?;
        if selection.range_count() == 0 {
            return None;
        }
        Some(NativeRange {
            anchor_node: selection.anchor_node()?,
            anchor_offset: selection.anchor_offset(),
            focus_node: selection.focus_node()?,
            focus_offset: selection.focus_offset(),
            collapsed: selection.is_collapsed(),
        })
    }

    fn set_base_and_extent(&mut self, anchor: &Node, anchor_offset: u32, focus: &Node, focus_offset: u32) {
        let Some(selection) = self.selection() else {
            return;
        };
        if let Err(e) = selection.set_base_and_extent(anchor, anchor_offset, focus, focus_offset) {
            tracing::warn!("setBaseAndExtent failed: {:?}", e);
        }
    }

    fn remove_all_ranges(&mut self) {
        if let Some(selection) = self.selection() {
            if let Err(e) = selection.remove_all_ranges() {
                tracing::warn!("removeAllRanges failed: {:?}", e);
            }
        }
    }

    fn has_focus(&self, root: &Node) -> bool {
        self.active_element()
            .is_some_and(|active| root.contains(Some(&active)))
    }

    fn focus(&mut self, root: &Node) {
        if let Some(el) = root.dyn_ref::<HtmlElement>() {
            if let Err(e) = el.focus() {
                tracing::warn!("focus failed: {:?}", e);
            }
        }
    }

    fn blur(&mut self, root: &Node) {
        if let Some(el) = root.dyn_ref::<HtmlElement>() {
            if let Err(e) = el.blur() {
                tracing::warn!("blur failed: {:?}", e);
            }
        }
    }
}
