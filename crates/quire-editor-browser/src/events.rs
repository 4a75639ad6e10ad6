//! Browser event handling for the editor.
//!
//! Provides browser-specific event extraction and input type parsing for
//! the `beforeinput` event.

use quire_editor_core::{
    Editor, EditorRange, InputType, NativeRange, Paper, Source, execute_input, get_selection,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::dom::BrowserDom;
use crate::platform::Platform;

// === StaticRange binding ===
//
// web-sys does not expose StaticRange, which InputEvent.getTargetRanges()
// returns. It is a fixed range that doesn't update when the DOM changes.

#[wasm_bindgen]
extern "C" {
    /// The StaticRange interface represents a static range of text in the DOM.
    pub type StaticRange;

    #[wasm_bindgen(method, getter, structural)]
    pub fn startContainer(this: &StaticRange) -> web_sys::Node;

    #[wasm_bindgen(method, getter, structural)]
    pub fn startOffset(this: &StaticRange) -> u32;

    #[wasm_bindgen(method, getter, structural)]
    pub fn endContainer(this: &StaticRange) -> web_sys::Node;

    #[wasm_bindgen(method, getter, structural)]
    pub fn endOffset(this: &StaticRange) -> u32;

    #[wasm_bindgen(method, getter, structural)]
    pub fn collapsed(this: &StaticRange) -> bool;
}

/// Parse a browser `inputType` string.
///
/// `deleteEntireSoftLine` has no dedicated variant and maps onto the soft
/// line deletion.
pub fn parse_browser_input_type(s: &str) -> InputType {
    match s {
        "deleteEntireSoftLine" => InputType::DeleteSoftLineBackward,
        other => other.parse().unwrap_or_else(|never| match never {}),
    }
}

// === BeforeInput event handling ===

/// Result of handling a beforeinput event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeforeInputResult {
    /// Event was handled, prevent default browser behavior.
    Handled,
    /// Let the browser act, then re-read the DOM (composition, drop).
    PassThrough,
    /// Android backspace workaround: let the browser act, then run
    /// `fallback` if the document did not change.
    DeferredCheck { fallback: InputType },
}

/// Context for beforeinput handling.
#[derive(Debug)]
pub struct BeforeInputContext<'a> {
    pub input_type: InputType,
    /// The data (text to insert, if any).
    pub data: Option<String>,
    /// Range from getTargetRanges(), if the browser gave one.
    pub target_range: Option<EditorRange>,
    /// Whether the event is part of an IME composition.
    pub is_composing: bool,
    /// Platform info for quirks handling.
    pub platform: &'a Platform,
}

impl<'a> BeforeInputContext<'a> {
    /// Read everything handling needs from a live event.
    pub fn from_event(
        event: &web_sys::InputEvent,
        root: &web_sys::Node,
        paper: &Paper,
        platform: &'a Platform,
    ) -> Self {
        Self {
            input_type: parse_browser_input_type(&event.input_type()),
            data: get_data_from_event(event),
            target_range: get_target_range_from_event(event, root, paper),
            is_composing: event.is_composing(),
            platform,
        }
    }
}

/// Document range the browser intends to modify, from getTargetRanges().
pub fn get_target_range_from_event(
    event: &web_sys::InputEvent,
    root: &web_sys::Node,
    paper: &Paper,
) -> Option<EditorRange> {
    let ranges = event.get_target_ranges();
    if ranges.length() == 0 {
        return None;
    }
    let static_range: StaticRange = ranges.get(0).unchecked_into();
    let native = NativeRange {
        anchor_node: static_range.startContainer(),
        anchor_offset: static_range.startOffset(),
        focus_node: static_range.endContainer(),
        focus_offset: static_range.endOffset(),
        collapsed: static_range.collapsed(),
    };
    get_selection(&BrowserDom, root, paper, Some(&native))
}

/// Get data from a beforeinput event, handling different sources.
pub fn get_data_from_event(event: &web_sys::InputEvent) -> Option<String> {
    if let Some(data) = event.data() {
        if !data.is_empty() {
            return Some(data);
        }
    }

    // Replacement text and drops carry theirs in dataTransfer.
    if let Some(data_transfer) = event.data_transfer() {
        if let Ok(text) = data_transfer.get_data("text/plain") {
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    None
}

/// Handle a beforeinput event against the editor.
///
/// A deletion target range inside one line is deleted directly, so a burst
/// of backspaces stays one undo step. Any other target range becomes the
/// selection before the input runs. Returns whether default browser
/// behavior should be prevented.
pub fn handle_beforeinput(
    editor: &mut Editor,
    ctx: &BeforeInputContext<'_>,
) -> quire_editor_core::Result<BeforeInputResult> {
    // During composition, let the browser handle all but history.
    if ctx.is_composing
        && !matches!(ctx.input_type, InputType::HistoryUndo | InputType::HistoryRedo)
    {
        return Ok(BeforeInputResult::PassThrough);
    }

    match &ctx.input_type {
        InputType::InsertCompositionText | InputType::InsertFromDrop | InputType::Unknown(_) => {
            return Ok(BeforeInputResult::PassThrough);
        }
        InputType::InsertText | InputType::InsertReplacementText if ctx.data.is_none() => {
            return Ok(BeforeInputResult::PassThrough);
        }
        _ => {}
    }

    let caret = editor.selection().filter(|s| s.is_collapsed());

    // Android Chrome sometimes swallows backspace when it is prevented.
    if ctx.input_type == InputType::DeleteContentBackward
        && ctx.platform.android
        && ctx.platform.chrome
        && caret.is_some()
    {
        return Ok(BeforeInputResult::DeferredCheck {
            fallback: InputType::DeleteContentBackward,
        });
    }

    let changed = match ctx.target_range {
        Some(range)
            if ctx.input_type.is_deletion()
                && caret.is_some()
                && !range.is_collapsed()
                && !editor.doc().get_text(range.to_range()).contains('\n') =>
        {
            editor.delete_range(range)?
        }
        // A caret deletion across lines runs from the caret so line format
        // and frozen line handling apply.
        Some(_) if ctx.input_type.is_deletion() && caret.is_some() => {
            execute_input(editor, &ctx.input_type, ctx.data.as_deref())?
        }
        target => {
            if let Some(range) = target.filter(|r| editor.selection() != Some(*r)) {
                editor.select(Some(range), Source::User);
            }
            execute_input(editor, &ctx.input_type, ctx.data.as_deref())?
        }
    };
    if !changed {
        tracing::trace!(input = ?ctx.input_type, "input left the document unchanged");
    }
    Ok(BeforeInputResult::Handled)
}
