//! Input dispatch.
//!
//! Maps the semantic intent of input events (W3C `inputType` values),
//! keyboard shortcuts and pasted content onto editor operations.

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::delta::{Delta, Insert, Op};
use crate::dom::Fragment;
use crate::editing::DeleteUnit;
use crate::editor::Editor;
use crate::error::Result;
use crate::extract::{ExtractOptions, delta_from_dom};
use crate::types::{EditorRange, InputMode};

/// Semantic input types from input events.
///
/// Based on the W3C Input Events specification. Browser `beforeinput`
/// events and programmatic input both produce these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    // === Insertion ===
    /// Insert typed text.
    InsertText,
    /// Insert text from IME composition.
    InsertCompositionText,
    /// Insert a line break (`<br>`, Shift+Enter).
    InsertLineBreak,
    /// Insert a paragraph break (Enter).
    InsertParagraph,
    InsertFromPaste,
    InsertFromDrop,
    /// Insert replacement text (e.g., spell check correction).
    InsertReplacementText,
    InsertFromYank,
    InsertHorizontalRule,
    InsertOrderedList,
    InsertUnorderedList,

    // === Deletion ===
    /// Delete content backward (Backspace).
    DeleteContentBackward,
    /// Delete content forward (Delete key).
    DeleteContentForward,
    DeleteWordBackward,
    DeleteWordForward,
    DeleteSoftLineBackward,
    DeleteSoftLineForward,
    DeleteHardLineBackward,
    DeleteHardLineForward,
    DeleteByCut,
    DeleteByDrag,
    DeleteContent,
    DeleteEntireWordBackward,
    DeleteEntireWordForward,

    // === History ===
    HistoryUndo,
    HistoryRedo,

    // === Formatting ===
    FormatBold,
    FormatItalic,
    FormatUnderline,
    FormatStrikethrough,
    FormatIndent,
    FormatOutdent,
    FormatRemove,

    /// Unrecognized input type.
    Unknown(String),
}

impl InputType {
    /// Whether this input type is a deletion operation.
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            Self::DeleteContentBackward
                | Self::DeleteContentForward
                | Self::DeleteWordBackward
                | Self::DeleteWordForward
                | Self::DeleteSoftLineBackward
                | Self::DeleteSoftLineForward
                | Self::DeleteHardLineBackward
                | Self::DeleteHardLineForward
                | Self::DeleteByCut
                | Self::DeleteByDrag
                | Self::DeleteContent
                | Self::DeleteEntireWordBackward
                | Self::DeleteEntireWordForward
        )
    }

    /// Whether this input type is an insertion operation.
    pub fn is_insertion(&self) -> bool {
        matches!(
            self,
            Self::InsertText
                | Self::InsertCompositionText
                | Self::InsertLineBreak
                | Self::InsertParagraph
                | Self::InsertFromPaste
                | Self::InsertFromDrop
                | Self::InsertReplacementText
                | Self::InsertFromYank
        )
    }
}

impl FromStr for InputType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "insertText" => Self::InsertText,
            "insertCompositionText" => Self::InsertCompositionText,
            "insertLineBreak" => Self::InsertLineBreak,
            "insertParagraph" => Self::InsertParagraph,
            "insertFromPaste" => Self::InsertFromPaste,
            "insertFromDrop" => Self::InsertFromDrop,
            "insertReplacementText" => Self::InsertReplacementText,
            "insertFromYank" => Self::InsertFromYank,
            "insertHorizontalRule" => Self::InsertHorizontalRule,
            "insertOrderedList" => Self::InsertOrderedList,
            "insertUnorderedList" => Self::InsertUnorderedList,
            "deleteContentBackward" => Self::DeleteContentBackward,
            "deleteContentForward" => Self::DeleteContentForward,
            "deleteWordBackward" => Self::DeleteWordBackward,
            "deleteWordForward" => Self::DeleteWordForward,
            "deleteSoftLineBackward" => Self::DeleteSoftLineBackward,
            "deleteSoftLineForward" => Self::DeleteSoftLineForward,
            "deleteHardLineBackward" => Self::DeleteHardLineBackward,
            "deleteHardLineForward" => Self::DeleteHardLineForward,
            "deleteByCut" => Self::DeleteByCut,
            "deleteByDrag" => Self::DeleteByDrag,
            "deleteContent" => Self::DeleteContent,
            "deleteEntireWordBackward" => Self::DeleteEntireWordBackward,
            "deleteEntireWordForward" => Self::DeleteEntireWordForward,
            "historyUndo" => Self::HistoryUndo,
            "historyRedo" => Self::HistoryRedo,
            "formatBold" => Self::FormatBold,
            "formatItalic" => Self::FormatItalic,
            "formatUnderline" => Self::FormatUnderline,
            "formatStrikeThrough" => Self::FormatStrikethrough,
            "formatIndent" => Self::FormatIndent,
            "formatOutdent" => Self::FormatOutdent,
            "formatRemove" => Self::FormatRemove,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Run the editor operation for an input event. `data` is the event's
/// text payload, if any.
///
/// Returns whether the input was handled.
pub fn execute_input(editor: &mut Editor, input: &InputType, data: Option<&str>) -> Result<bool> {
    trace!(?input, "executing input");
    match input {
        InputType::InsertText
        | InputType::InsertCompositionText
        | InputType::InsertReplacementText
        | InputType::InsertFromYank
        | InputType::InsertFromDrop => match data {
            Some(text) => editor.insert_text(text),
            None => Ok(false),
        },
        InputType::InsertFromPaste => match data {
            Some(text) => paste_text(editor, text),
            None => Ok(false),
        },
        InputType::InsertParagraph => editor.enter(),
        InputType::InsertLineBreak => editor.insert_line_break(),
        InputType::InsertHorizontalRule => editor.insert_rule(),
        InputType::InsertOrderedList => {
            editor.toggle_line_format("list", serde_json::Value::from("ordered"))
        }
        InputType::InsertUnorderedList => {
            editor.toggle_line_format("list", serde_json::Value::from("bullet"))
        }
        InputType::DeleteContentBackward => editor.delete_backward(DeleteUnit::Char),
        InputType::DeleteContentForward => editor.delete_forward(DeleteUnit::Char),
        InputType::DeleteWordBackward | InputType::DeleteEntireWordBackward => {
            editor.delete_backward(DeleteUnit::Word)
        }
        InputType::DeleteWordForward | InputType::DeleteEntireWordForward => {
            editor.delete_forward(DeleteUnit::Word)
        }
        InputType::DeleteSoftLineBackward | InputType::DeleteHardLineBackward => {
            editor.delete_backward(DeleteUnit::Line)
        }
        InputType::DeleteSoftLineForward | InputType::DeleteHardLineForward => {
            editor.delete_forward(DeleteUnit::Line)
        }
        InputType::DeleteByCut | InputType::DeleteByDrag | InputType::DeleteContent => {
            match editor.selection() {
                Some(range) if !range.is_collapsed() => {
                    editor.delete_backward(DeleteUnit::Char)
                }
                _ => Ok(false),
            }
        }
        InputType::HistoryUndo => editor.undo(),
        InputType::HistoryRedo => editor.redo(),
        InputType::FormatBold => editor.toggle_text_format("bold"),
        InputType::FormatItalic => editor.toggle_text_format("italic"),
        InputType::FormatUnderline => editor.toggle_text_format("underline"),
        InputType::FormatStrikethrough => editor.toggle_text_format("strike"),
        InputType::FormatIndent => editor.indent(),
        InputType::FormatOutdent => editor.outdent(),
        InputType::FormatRemove => editor.remove_format(),
        InputType::Unknown(name) => {
            debug!(%name, "unhandled input type");
            Ok(false)
        }
    }
}

// === Shortcuts ===

/// A key combination written as `Mod+Shift+Z`.
///
/// `Mod` is the platform's primary modifier: Cmd on Mac, Ctrl elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    pub key: SmolStr,
    pub primary: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Shortcut {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self {
            key: normalize_key(&key.into()),
            primary: false,
            alt: false,
            shift: false,
        }
    }

    /// Shortcut for a key event. On Mac the primary modifier is Meta.
    pub fn from_key_event(key: &str, ctrl: bool, alt: bool, shift: bool, meta: bool, is_mac: bool) -> Self {
        Self {
            key: normalize_key(key),
            primary: if is_mac { meta } else { ctrl },
            alt,
            shift,
        }
    }

    /// Parse `Mod+Alt+Shift+Key`. Modifiers may come in any order.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts: Vec<&str> = s.split('+').collect();
        // `Mod++` names the plus key.
        if s.ends_with("++") {
            parts.truncate(parts.len() - 2);
            parts.push("+");
        }
        let key = parts.pop().filter(|k| !k.is_empty())?;
        let mut shortcut = Shortcut::new(key);
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "mod" | "ctrl" | "cmd" | "meta" => shortcut.primary = true,
                "alt" | "option" => shortcut.alt = true,
                "shift" => shortcut.shift = true,
                _ => return None,
            }
        }
        Some(shortcut)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.primary {
            f.write_str("Mod+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        f.write_str(&self.key)
    }
}

/// Single letters are upper-cased so `Mod+b` and `Mod+B` match.
fn normalize_key(key: &str) -> SmolStr {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_alphabetic() => c.to_uppercase().collect::<String>().into(),
        _ => key.into(),
    }
}

/// Run the editor operation bound to `shortcut`. Unknown shortcuts are
/// no-ops.
pub fn handle_shortcut(editor: &mut Editor, shortcut: &Shortcut) -> Result<bool> {
    let Shortcut {
        key,
        primary,
        alt,
        shift,
    } = shortcut;
    match (key.as_str(), *primary, *alt, *shift) {
        ("B", true, false, false) => editor.toggle_text_format("bold"),
        ("I", true, false, false) => editor.toggle_text_format("italic"),
        ("U", true, false, false) => editor.toggle_text_format("underline"),
        ("X", true, false, true) => editor.toggle_text_format("strike"),
        ("E", true, false, false) => editor.toggle_text_format("code"),
        ("Z", true, false, false) => editor.undo(),
        ("Z", true, false, true) | ("Y", true, false, false) => editor.redo(),
        ("A", true, false, false) => Ok(editor.select_all()),
        ("Enter", false, false, true) => editor.insert_line_break(),
        ("Tab", false, false, false) => {
            if editor.indent()? {
                Ok(true)
            } else {
                editor.insert_text("\t")
            }
        }
        ("Tab", false, false, true) => editor.outdent(),
        _ => {
            trace!(%shortcut, "no binding");
            Ok(false)
        }
    }
}

// === Paste ===

/// Paste plain text. Line endings are normalized and each line break
/// splits the line.
pub fn paste_text(editor: &mut Editor, text: &str) -> Result<bool> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let Some(range) = editor.selection() else {
        return Ok(false);
    };
    let at = range.start();
    let end = at + text.chars().count();
    editor.change(None, |c| {
        c.delete(range.to_range())
            .insert(at, &text, None)
            .select(EditorRange::caret(end));
    })
}

/// Paste document content at the selection. A trailing newline without
/// a format is dropped so a single pasted line joins the current one.
pub fn paste_delta(editor: &mut Editor, content: &Delta) -> Result<bool> {
    let Some(range) = editor.selection() else {
        return Ok(false);
    };
    let content = trim_trailing_newline(content);
    if content.is_empty() {
        return Ok(false);
    }
    let at = range.start();
    let end = at + content.length();
    editor.change(None, |c| {
        c.delete(range.to_range())
            .insert_content(at, &content)
            .select(EditorRange::caret(end));
    })
}

/// Paste HTML, extracting its content with the editor's types.
pub fn paste_html(editor: &mut Editor, html: &str) -> Result<bool> {
    let fragment = Fragment::parse_html(html);
    let options = ExtractOptions::from(editor.config());
    let content = delta_from_dom(&fragment, &fragment.root(), editor.paper(), &options);
    debug!(ops = content.ops.len(), "pasting extracted html");
    paste_delta(editor, &content)
}

fn trim_trailing_newline(content: &Delta) -> Delta {
    let mut ops = content.ops.clone();
    if let Some(Op::Insert {
        insert: Insert::Text(text),
        attributes: None,
    }) = ops.last_mut()
    {
        if text.ends_with('\n') {
            text.pop();
        }
    }
    Delta::from(ops)
}

/// Typing mode an input type commits with, for callers that batch input.
pub fn input_mode(input: &InputType) -> Option<InputMode> {
    match input {
        InputType::InsertText | InputType::InsertCompositionText => Some(InputMode::Typing),
        InputType::DeleteContentBackward | InputType::DeleteContentForward => {
            Some(InputMode::Deleting)
        }
        _ => None,
    }
}
