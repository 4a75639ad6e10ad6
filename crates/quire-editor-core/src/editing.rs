//! User editing operations on an [`Editor`].
//!
//! Each operation reads the current selection, builds one change and
//! applies it as a user edit. Operations return `Ok(false)` when there is
//! nothing to do, such as with no selection.

use serde_json::{Value, json};
use tracing::trace;
use unicode_segmentation::UnicodeSegmentation;

use crate::change::TextChange;
use crate::delta::{Attributes, Delta, attrs};
use crate::editor::Editor;
use crate::error::Result;
use crate::types::{EditorRange, InputMode, Source};

/// Maximum indent level of indentable lines.
pub const MAX_INDENT: u64 = 8;

const INDENT_KEY: &str = "indent";

/// How far a single delete reaches from a collapsed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteUnit {
    /// One grapheme cluster.
    Char,
    Word,
    /// To the start or end of the line.
    Line,
}

impl Editor {
    fn commit(
        &mut self,
        (delta, selection): (Delta, Option<EditorRange>),
        mode: Option<InputMode>,
    ) -> Result<bool> {
        self.update(&delta, selection, mode, Source::User)
    }

    // === Text ===

    /// Insert text at the selection, replacing selected content.
    ///
    /// The text takes the pending formats, or the format of the text it
    /// follows.
    pub fn insert_text(&mut self, text: &str) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if text.is_empty() && range.is_collapsed() {
            return Ok(false);
        }
        let at = range.start();
        let mut format = match &self.active_formats {
            Some(formats) => formats.clone(),
            None => self.doc.get_text_format(at..at),
        };
        format.retain(|key, value| !value.is_null() && self.paper.marks.get(key).is_some());
        let mode = if text.contains('\n') {
            None
        } else {
            Some(InputMode::Typing)
        };

        let mut change = TextChange::new(&self.doc);
        change
            .delete(range.to_range())
            .insert(at, text, Some(format))
            .select(EditorRange::caret(at + text.chars().count()));
        let parts = change.into_parts();
        self.commit(parts, mode)
    }

    /// Delete the selection, or from the caret backward by `unit`.
    pub fn delete_backward(&mut self, unit: DeleteUnit) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if !range.is_collapsed() {
            return self.delete_range(range);
        }
        let at = range.start();
        let (index, line, start) = self.doc.line_at(at);

        if at > start {
            let offset = at - start;
            let text = line.text();
            let from = start
                + match unit {
                    DeleteUnit::Char => previous_grapheme(&text, offset),
                    DeleteUnit::Word => previous_word(&text, offset),
                    DeleteUnit::Line => 0,
                };
            let mut change = TextChange::new(&self.doc);
            change.delete(from..at).select(EditorRange::caret(from));
            let parts = change.into_parts();
            return self.commit(parts, Some(InputMode::Deleting));
        }

        // Caret at the start of a line.
        if !line.attributes.is_empty() {
            let indent = indent_of(&line.attributes);
            let mut change = TextChange::new(&self.doc);
            if indent > 0 {
                change.format_line(at..at, &indent_format(indent - 1));
            } else {
                change.set_line_format(at..at, &Attributes::new());
            }
            trace!(line = index, "removing line format before merging");
            let parts = change.into_parts();
            return self.commit(parts, None);
        }
        if index == 0 {
            return Ok(false);
        }
        let previous = &self.doc.lines()[index - 1];
        let previous_start = start - previous.length;
        let mut change = TextChange::new(&self.doc);
        if self.is_frozen(&previous.attributes) {
            change
                .delete(previous_start..start)
                .select(EditorRange::caret(previous_start));
        } else {
            let attributes = previous.attributes.clone();
            change
                .delete(start - 1..start)
                .set_line_format(start - 1..start - 1, &attributes)
                .select(EditorRange::caret(start - 1));
        }
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    /// Delete the selection, or from the caret forward by `unit`.
    pub fn delete_forward(&mut self, unit: DeleteUnit) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if !range.is_collapsed() {
            return self.delete_range(range);
        }
        let at = range.start();
        let (index, line, start) = self.doc.line_at(at);
        let end = start + line.length - 1;

        if at < end {
            let offset = at - start;
            let text = line.text();
            let to = start
                + match unit {
                    DeleteUnit::Char => next_grapheme(&text, offset),
                    DeleteUnit::Word => next_word(&text, offset),
                    DeleteUnit::Line => line.length - 1,
                };
            let mut change = TextChange::new(&self.doc);
            change.delete(at..to).select(EditorRange::caret(at));
            let parts = change.into_parts();
            return self.commit(parts, Some(InputMode::Deleting));
        }

        let Some(next) = self.doc.line(index + 1) else {
            return Ok(false);
        };
        // The merged line keeps this line's format.
        let attributes = line.attributes.clone();
        let removed = if self.is_frozen(&next.attributes) {
            next.length
        } else {
            1
        };
        let mut change = TextChange::new(&self.doc);
        change
            .delete(end..end + removed)
            .set_line_format(end..end, &attributes)
            .select(EditorRange::caret(at));
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    /// Delete `range` as part of a deleting burst, leaving the caret at its
    /// start. The selection is not consulted, so consecutive deletes keep
    /// coalescing.
    pub fn delete_range(&mut self, range: EditorRange) -> Result<bool> {
        if range.is_collapsed() {
            return Ok(false);
        }
        let mut change = TextChange::new(&self.doc);
        change
            .delete(range.to_range())
            .select(EditorRange::caret(range.start()));
        let parts = change.into_parts();
        self.commit(parts, Some(InputMode::Deleting))
    }

    // === Lines ===

    /// Split the line at the selection.
    ///
    /// An empty formatted line is reset to the default block instead, and
    /// a frozen line gets an empty line after it.
    pub fn enter(&mut self) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        let at = range.start();
        let (_, line, start) = self.doc.line_at(at);
        let line_type = self.paper.line_type(&line.attributes);
        let mut change = TextChange::new(&self.doc);

        if line_type.is_some_and(|def| def.frozen) {
            let after = start + line.length;
            change
                .insert_content(after, &Delta::new().insert("\n", None))
                .select(EditorRange::caret(after));
            let parts = change.into_parts();
            return self.commit(parts, None);
        }

        if range.is_collapsed() && line.is_empty() && !line.attributes.is_empty() {
            change.set_line_format(at..at, &Attributes::new());
            let parts = change.into_parts();
            return self.commit(parts, None);
        }

        let default_follows = line_type.is_some_and(|def| def.default_follows);
        change.delete(range.to_range());
        let (_, line, start) = change.result().line_at(at);
        let at_line_end = at == start + line.length - 1;
        change.insert(at, "\n", None);
        if default_follows && at_line_end {
            change.set_line_format(at + 1..at + 1, &Attributes::new());
        }
        change.select(EditorRange::caret(at + 1));
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    /// Insert a soft line break inside the current line.
    pub fn insert_line_break(&mut self) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if self.paper.embeds.get("br").is_none() {
            return Ok(false);
        }
        let at = range.start();
        let mut change = TextChange::new(&self.doc);
        change
            .delete(range.to_range())
            .insert_content(at, &Delta::new().insert_embed(attrs(json!({"br": true})), None))
            .select(EditorRange::caret(at + 1));
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    /// Insert a horizontal rule line after the current line. An empty
    /// current line becomes the rule. A paragraph follows a rule that
    /// would otherwise end the document.
    pub fn insert_rule(&mut self) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if self.paper.blocks.get("hr").is_none() {
            return Ok(false);
        }
        let rule = attrs(json!({"hr": true}));
        let (_, line, start) = self.doc.line_at(range.start());
        let mut change = TextChange::new(&self.doc);
        let rule_start = if line.is_empty() {
            change.set_line_format(start..start, &rule);
            start
        } else {
            let after = start + line.length;
            change.insert_content(after, &Delta::new().insert("\n", Some(rule)));
            after
        };
        let caret = rule_start + 1;
        if caret >= change.result().len() {
            change.insert_content(caret, &Delta::new().insert("\n", None));
        }
        change.select(EditorRange::caret(caret));
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    // === Formatting ===

    /// Set an inline format over the selection. On a collapsed selection
    /// the format applies to the next inserted text. Unknown formats are
    /// ignored.
    pub fn format_text(&mut self, name: &str, value: Value) -> Result<bool> {
        if self.paper.marks.get(name).is_none() {
            trace!(%name, "ignoring unknown text format");
            return Ok(false);
        }
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if range.is_collapsed() {
            let mut formats = self.get_active_formats();
            formats.insert(name.to_string(), value);
            self.active_formats = Some(formats);
            return Ok(true);
        }
        let mut format = Attributes::new();
        format.insert(name.to_string(), value);
        let mut change = TextChange::new(&self.doc);
        change.format_text(range.to_range(), &format).select(range);
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    pub fn toggle_text_format(&mut self, name: &str) -> Result<bool> {
        let active = self
            .get_active_formats()
            .get(name)
            .is_some_and(|value| !value.is_null());
        let value = if active { Value::Null } else { Value::Bool(true) };
        self.format_text(name, value)
    }

    /// Turn the selected lines into block type `name`.
    ///
    /// Other block formats are removed, as is the indent when the type is
    /// not indentable. Unknown types are ignored.
    pub fn format_line(&mut self, name: &str, value: Value) -> Result<bool> {
        let Some(def) = self.paper.blocks.get(name) else {
            trace!(%name, "ignoring unknown line format");
            return Ok(false);
        };
        let Some(range) = self.selection else {
            return Ok(false);
        };
        let is_default = self
            .paper
            .blocks
            .get_default()
            .is_some_and(|default| default.name == def.name);
        let mut format: Attributes = self
            .paper
            .blocks
            .names()
            .filter(|other| *other != name)
            .map(|other| (other.to_string(), Value::Null))
            .collect();
        if !is_default {
            format.insert(name.to_string(), value);
        }
        if !def.indentable {
            format.insert(INDENT_KEY.to_string(), Value::Null);
        }
        let mut change = TextChange::new(&self.doc);
        change.format_line(range.to_range(), &format).select(range);
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    /// Apply block type `name`, or return to the default block when every
    /// selected line already has it.
    pub fn toggle_line_format(&mut self, name: &str, value: Value) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        let current = self.doc.get_line_format(range.to_range());
        if current.get(name) == Some(&value) {
            let Some(default) = self.paper.blocks.get_default() else {
                return Ok(false);
            };
            let default = default.name.clone();
            return self.format_line(&default, Value::Bool(true));
        }
        self.format_line(name, value)
    }

    pub fn indent(&mut self) -> Result<bool> {
        self.shift_indent(1)
    }

    pub fn outdent(&mut self) -> Result<bool> {
        self.shift_indent(-1)
    }

    fn shift_indent(&mut self, by: i64) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        let mut change = TextChange::new(&self.doc);
        let mut touched = false;
        for (_, line, start) in self.doc.lines_at(range.to_range()) {
            let indentable = self
                .paper
                .line_type(&line.attributes)
                .is_some_and(|def| def.indentable);
            if !indentable {
                continue;
            }
            let current = indent_of(&line.attributes);
            let next = current.saturating_add_signed(by).min(MAX_INDENT);
            if next != current {
                change.format_line(start..start, &indent_format(next));
                touched = true;
            }
        }
        if !touched {
            return Ok(false);
        }
        change.select(range);
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    /// Remove every inline format from the selection.
    pub fn remove_format(&mut self) -> Result<bool> {
        let Some(range) = self.selection else {
            return Ok(false);
        };
        if range.is_collapsed() {
            return Ok(self.active_formats.take().is_some());
        }
        let format: Attributes = self
            .paper
            .marks
            .names()
            .map(|name| (name.to_string(), Value::Null))
            .collect();
        let mut change = TextChange::new(&self.doc);
        change.format_text(range.to_range(), &format).select(range);
        let parts = change.into_parts();
        self.commit(parts, None)
    }

    pub fn select_all(&mut self) -> bool {
        let end = self.doc.len().saturating_sub(1);
        self.select(Some(EditorRange::new(0, end)), Source::User)
    }

    fn is_frozen(&self, attributes: &Attributes) -> bool {
        self.paper
            .line_type(attributes)
            .is_some_and(|def| def.frozen)
    }
}

fn indent_of(attributes: &Attributes) -> u64 {
    attributes
        .get(INDENT_KEY)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn indent_format(indent: u64) -> Attributes {
    let value = if indent == 0 {
        Value::Null
    } else {
        indent.into()
    };
    let mut format = Attributes::new();
    format.insert(INDENT_KEY.to_string(), value);
    format
}

// === Boundaries within a line, in char offsets ===

fn previous_grapheme(text: &str, offset: usize) -> usize {
    let mut boundary = 0;
    for grapheme in text.graphemes(true) {
        let next = boundary + grapheme.chars().count();
        if next >= offset {
            break;
        }
        boundary = next;
    }
    boundary
}

fn next_grapheme(text: &str, offset: usize) -> usize {
    let mut boundary = 0;
    for grapheme in text.graphemes(true) {
        boundary += grapheme.chars().count();
        if boundary > offset {
            break;
        }
    }
    boundary
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn previous_word(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().take(offset).collect();
    let mut pos = chars.len();
    while pos > 0 && !is_word_char(chars[pos - 1]) {
        pos -= 1;
    }
    while pos > 0 && is_word_char(chars[pos - 1]) {
        pos -= 1;
    }
    pos
}

fn next_word(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = offset.min(chars.len());
    while pos < chars.len() && is_word_char(chars[pos]) {
        pos += 1;
    }
    while pos < chars.len() && !is_word_char(chars[pos]) {
        pos += 1;
    }
    pos
}
