//! Clipboard handling.
//!
//! Paste prefers `text/html`, parsed into a detached `<template>` and
//! extracted with the editor's types, over `text/plain`. Copy and cut
//! write both representations of the selected content.

use quire_editor_core::{
    DeleteUnit, Delta, Editor, ExtractOptions, TextDocument, delta_from_dom, paste_delta,
    paste_text, render_document,
};
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlTemplateElement};

use crate::dom::BrowserDom;
use crate::platform::PlatformError;

/// Clipboard context wrapping a ClipboardEvent's DataTransfer.
pub struct BrowserClipboard {
    data_transfer: Option<web_sys::DataTransfer>,
}

impl BrowserClipboard {
    /// Create from a ClipboardEvent.
    pub fn from_event(evt: &web_sys::ClipboardEvent) -> Self {
        Self {
            data_transfer: evt.clipboard_data(),
        }
    }

    /// A context with nothing to read and nowhere to write.
    pub fn empty() -> Self {
        Self {
            data_transfer: None,
        }
    }

    fn get(&self, format: &str) -> Option<String> {
        self.data_transfer
            .as_ref()?
            .get_data(format)
            .ok()
            .filter(|s| !s.is_empty())
    }

    pub fn read_html(&self) -> Option<String> {
        self.get("text/html")
    }

    pub fn read_text(&self) -> Option<String> {
        self.get("text/plain")
    }

    /// Write HTML with a plain text fallback. Returns false without a
    /// DataTransfer.
    pub fn write(&self, html: &str, plain_text: &str) -> bool {
        let Some(dt) = &self.data_transfer else {
            return false;
        };
        if let Err(e) = dt.set_data("text/plain", plain_text) {
            tracing::warn!("Clipboard write (plain) failed: {:?}", e);
            return false;
        }
        if let Err(e) = dt.set_data("text/html", html) {
            tracing::warn!("Clipboard write (html) failed: {:?}", e);
        }
        true
    }
}

/// Extract document content from an HTML string through the live parser.
pub fn delta_from_html(
    document: &Document,
    editor: &Editor,
    html: &str,
) -> Result<Delta, PlatformError> {
    let template: HtmlTemplateElement = document
        .create_element("template")?
        .dyn_into()
        .map_err(|_| PlatformError::from("template element has the wrong type"))?;
    template.set_inner_html(html);
    let content: web_sys::Node = template.content().into();
    let options = ExtractOptions::from(editor.config());
    Ok(delta_from_dom(&BrowserDom, &content, editor.paper(), &options))
}

/// Paste clipboard content at the selection. Returns whether the
/// document changed.
pub fn paste(
    editor: &mut Editor,
    clipboard: &BrowserClipboard,
    document: &Document,
) -> Result<bool, PlatformError> {
    if let Some(html) = clipboard.read_html() {
        let content = delta_from_html(document, editor, &html)?;
        tracing::debug!(ops = content.ops.len(), "pasting html");
        return Ok(paste_delta(editor, &content)?);
    }
    match clipboard.read_text() {
        Some(text) => Ok(paste_text(editor, &text)?),
        None => Ok(false),
    }
}

/// Handle a paste event. Default is always prevented so the browser never
/// inserts its own markup.
pub fn handle_paste(
    editor: &mut Editor,
    evt: &web_sys::ClipboardEvent,
    document: &Document,
) -> Result<bool, PlatformError> {
    evt.prevent_default();
    paste(editor, &BrowserClipboard::from_event(evt), document)
}

/// Selected content as (html, plain text), if the selection is a range.
pub fn selected_content(editor: &Editor) -> Option<(String, String)> {
    let range = editor.selection().filter(|s| !s.is_collapsed())?;
    let doc = editor.doc();
    let slice = doc.to_delta().slice(range.start(), range.end());
    let fragment = render_document(&TextDocument::from_delta(&slice), editor.paper());
    let html = fragment.inner_html(fragment.root());
    Some((html, doc.get_text(range.to_range())))
}

/// Handle a copy event. Default is prevented only when there was a
/// selection to copy.
pub fn handle_copy(editor: &Editor, evt: &web_sys::ClipboardEvent) -> bool {
    let Some((html, text)) = selected_content(editor) else {
        return false;
    };
    if BrowserClipboard::from_event(evt).write(&html, &text) {
        evt.prevent_default();
        return true;
    }
    false
}

/// Handle a cut event: copy, then delete the selection.
pub fn handle_cut(
    editor: &mut Editor,
    evt: &web_sys::ClipboardEvent,
) -> Result<bool, PlatformError> {
    if !handle_copy(editor, evt) {
        return Ok(false);
    }
    Ok(editor.delete_backward(DeleteUnit::Char)?)
}
