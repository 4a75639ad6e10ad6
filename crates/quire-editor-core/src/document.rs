//! Line-oriented document model.
//!
//! A `TextDocument` is the change-log of a document split into `Line`s. Each
//! line owns its content (a delta of inserts) and the attributes carried by
//! its trailing newline, which decide the line's block type.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::{SmolStr, format_smolstr};
use tracing::warn;

use crate::delta::{Attributes, Delta, Insert, Op};
use crate::error::{EditorError, Result};

static NEXT_LINE_ID: AtomicU64 = AtomicU64::new(1);

fn next_line_id() -> SmolStr {
    format_smolstr!("l{}", NEXT_LINE_ID.fetch_add(1, Ordering::Relaxed))
}

/// One line of a document: content plus the attributes of its newline.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Identity of the line, kept across edits that don't touch it.
    pub id: SmolStr,
    pub attributes: Attributes,
    pub content: Delta,
    /// Content length plus the trailing newline.
    pub length: usize,
}

impl Line {
    pub fn new(content: Delta, attributes: Attributes) -> Self {
        let length = content.length() + 1;
        Self {
            id: next_line_id(),
            attributes,
            content,
            length,
        }
    }

    pub fn empty() -> Self {
        Self::new(Delta::new(), Attributes::new())
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    /// True when the line holds nothing but its newline.
    pub fn is_empty(&self) -> bool {
        self.length == 1
    }

    /// Equal content and attributes, ignoring identity.
    pub fn same_content(&self, other: &Line) -> bool {
        self.attributes == other.attributes && self.content == other.content
    }

    pub fn to_delta(&self) -> Delta {
        let mut delta = self.content.clone();
        delta.push(Op::Insert {
            insert: Insert::Text("\n".into()),
            attributes: Some(self.attributes.clone()),
        });
        delta
    }
}

/// Lines matching at the start and at the end of two line lists.
///
/// The two counts never overlap.
pub(crate) fn common_bounds(old: &[Line], new: &[Line]) -> (usize, usize) {
    let max = old.len().min(new.len());
    let prefix = (0..max)
        .take_while(|&i| old[i].same_content(&new[i]))
        .count();
    let suffix = (0..max - prefix)
        .take_while(|&i| old[old.len() - 1 - i].same_content(&new[new.len() - 1 - i]))
        .count();
    (prefix, suffix)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextDocument {
    lines: Vec<Line>,
    length: usize,
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::from_lines(Vec::new())
    }
}

impl TextDocument {
    /// An empty document: a single empty line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a delta of inserts.
    ///
    /// Content after the last newline becomes a final line with default
    /// attributes. Non-insert ops end the document.
    pub fn from_delta(delta: &Delta) -> Self {
        if delta.ops.iter().any(|op| !op.is_insert()) {
            warn!("document delta contains retain or delete ops; ignoring from the first one");
        }
        let mut lines = Vec::new();
        delta.each_line(|content, attributes, _| {
            lines.push(Line::new(content.clone(), attributes.clone()));
            true
        });
        Self::from_lines(lines)
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_delta(&Delta::new().insert(text, None))
    }

    pub fn from_lines(lines: Vec<Line>) -> Self {
        let lines = if lines.is_empty() {
            vec![Line::empty()]
        } else {
            lines
        };
        let length = lines.iter().map(|l| l.length).sum();
        Self { lines, length }
    }

    // === Queries ===

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    /// True for the single-empty-line document.
    pub fn is_empty(&self) -> bool {
        self.length <= 1
    }

    pub fn to_delta(&self) -> Delta {
        let mut delta = Delta::new();
        for line in &self.lines {
            for op in line.to_delta().ops {
                delta.push(op);
            }
        }
        delta
    }

    pub fn text(&self) -> String {
        self.to_delta().text()
    }

    pub fn get_text(&self, range: Range<usize>) -> String {
        self.to_delta().slice(range.start, range.end).text()
    }

    /// Offset at which line `index` starts.
    pub fn line_start(&self, index: usize) -> usize {
        self.lines.iter().take(index).map(|l| l.length).sum()
    }

    /// Offsets covered by line `index`, including its newline.
    pub fn line_range(&self, index: usize) -> Option<Range<usize>> {
        let line = self.lines.get(index)?;
        let start = self.line_start(index);
        Some(start..start + line.length)
    }

    /// Line holding `index` as `(line index, line, line start)`.
    ///
    /// Offsets past the end resolve to the last line.
    pub fn line_at(&self, index: usize) -> (usize, &Line, usize) {
        let mut start = 0;
        for (i, line) in self.lines.iter().enumerate() {
            if index < start + line.length || i + 1 == self.lines.len() {
                return (i, line, start);
            }
            start += line.length;
        }
        // from_lines guarantees at least one line
        (0, &self.lines[0], 0)
    }

    /// Lines touched by `range`. A collapsed range touches the line holding it.
    pub fn lines_at(&self, range: Range<usize>) -> Vec<(usize, &Line, usize)> {
        if range.start >= range.end {
            return vec![self.line_at(range.start)];
        }
        let mut found = Vec::new();
        let mut start = 0;
        for (i, line) in self.lines.iter().enumerate() {
            let end = start + line.length;
            if range.start < end && range.end > start {
                found.push((i, line, start));
            }
            start = end;
        }
        found
    }

    /// Attributes shared by all text in `range`, excluding newlines.
    ///
    /// For a collapsed range this is the format of the character before the
    /// caret, or after it at the start of a line.
    pub fn get_text_format(&self, range: Range<usize>) -> Attributes {
        if range.start >= range.end {
            let (_, line, start) = self.line_at(range.start);
            let offset = range.start - start;
            let at = if offset == 0 {
                line.content.slice(0, 1)
            } else {
                line.content.slice(offset - 1, offset)
            };
            return at
                .ops
                .first()
                .and_then(|op| op.attributes().cloned())
                .unwrap_or_default();
        }

        let mut shared: Option<Attributes> = None;
        for (_, line, start) in self.lines_at(range.clone()) {
            let from = range.start.saturating_sub(start);
            let to = (range.end - start).min(line.length - 1);
            if from >= to {
                continue;
            }
            for op in line.content.slice(from, to).ops {
                let attributes = op.attributes().cloned().unwrap_or_default();
                shared = Some(match shared {
                    None => attributes,
                    Some(prev) => intersect(prev, &attributes),
                });
            }
        }
        shared.unwrap_or_default()
    }

    /// Line attributes shared by every line in `range`.
    pub fn get_line_format(&self, range: Range<usize>) -> Attributes {
        let mut shared: Option<Attributes> = None;
        for (_, line, _) in self.lines_at(range) {
            shared = Some(match shared {
                None => line.attributes.clone(),
                Some(prev) => intersect(prev, &line.attributes),
            });
        }
        shared.unwrap_or_default()
    }

    // === Changes ===

    /// Apply a change, producing the next document.
    ///
    /// Lines the change does not touch keep their ids.
    pub fn apply(&self, change: &Delta) -> Result<TextDocument> {
        let span = change.base_span();
        if span > self.length {
            return Err(EditorError::ChangeOutOfBounds {
                span,
                length: self.length,
            });
        }
        let mut doc = TextDocument::from_delta(&self.to_delta().compose(change));
        doc.adopt_ids(self);
        Ok(doc)
    }

    fn adopt_ids(&mut self, old: &TextDocument) {
        let (prefix, suffix) = common_bounds(&old.lines, &self.lines);
        let (old_len, new_len) = (old.lines.len(), self.lines.len());
        for i in 0..prefix {
            self.lines[i].id = old.lines[i].id.clone();
        }
        for i in 0..suffix {
            self.lines[new_len - 1 - i].id = old.lines[old_len - 1 - i].id.clone();
        }
        // Edited lines keep the identity of the line they replace.
        let paired = (old_len - prefix - suffix).min(new_len - prefix - suffix);
        for i in prefix..prefix + paired {
            self.lines[i].id = old.lines[i].id.clone();
        }
    }

    /// Coarse change turning `self` into `other`, replacing whole lines
    /// between the common prefix and suffix.
    pub fn diff(&self, other: &TextDocument) -> Delta {
        let (prefix, suffix) = common_bounds(&self.lines, &other.lines);
        let start = self.line_start(prefix);
        let removed: usize = self.lines[prefix..self.lines.len() - suffix]
            .iter()
            .map(|l| l.length)
            .sum();
        let mut delta = Delta::new().retain(start, None);
        for line in &other.lines[prefix..other.lines.len() - suffix] {
            for op in line.to_delta().ops {
                delta.push(op);
            }
        }
        delta.delete(removed).chop()
    }

    // === Line mutation (used by history commands) ===

    pub fn insert_line(&mut self, index: usize, line: Line) -> Result<()> {
        if index > self.lines.len() {
            return Err(EditorError::InvalidCommand(format!(
                "cannot insert line at {index}, document has {} lines",
                self.lines.len()
            )));
        }
        self.length += line.length;
        self.lines.insert(index, line);
        Ok(())
    }

    pub fn remove_line(&mut self, index: usize) -> Result<Line> {
        if index >= self.lines.len() {
            return Err(EditorError::InvalidCommand(format!(
                "cannot remove line {index}, document has {} lines",
                self.lines.len()
            )));
        }
        let line = self.lines.remove(index);
        self.length -= line.length;
        Ok(line)
    }

    pub fn replace_line(&mut self, index: usize, line: Line) -> Result<Line> {
        let Some(slot) = self.lines.get_mut(index) else {
            return Err(EditorError::InvalidCommand(format!(
                "cannot update line {index}, document has {} lines",
                self.lines.len()
            )));
        };
        self.length = self.length - slot.length + line.length;
        Ok(std::mem::replace(slot, line))
    }
}

fn intersect(mut a: Attributes, b: &Attributes) -> Attributes {
    a.retain(|key, value| b.get(key) == Some(value));
    a
}
