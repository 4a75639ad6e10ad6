//! Builder for document changes.

use std::ops::Range;

use serde_json::Value;
use tracing::warn;

use crate::delta::{Attributes, Delta, Insert, Op};
use crate::document::TextDocument;
use crate::types::EditorRange;

/// Accumulates edits against a document into a single change.
///
/// Offsets passed to each call refer to the document as changed by the
/// calls before it.
#[derive(Debug, Clone)]
pub struct TextChange<'a> {
    base: &'a TextDocument,
    result: TextDocument,
    delta: Delta,
    selection: Option<EditorRange>,
}

impl<'a> TextChange<'a> {
    pub fn new(doc: &'a TextDocument) -> Self {
        Self {
            base: doc,
            result: doc.clone(),
            delta: Delta::new(),
            selection: None,
        }
    }

    /// The document the change started from.
    pub fn base(&self) -> &TextDocument {
        self.base
    }

    /// The document with every step so far applied.
    pub fn result(&self) -> &TextDocument {
        &self.result
    }

    pub fn delta(&self) -> &Delta {
        &self.delta
    }

    pub fn selection(&self) -> Option<EditorRange> {
        self.selection
    }

    fn step(&mut self, step: Delta) -> &mut Self {
        let step = step.chop();
        if step.is_empty() {
            return self;
        }
        match self.result.apply(&step) {
            Ok(result) => {
                self.result = result;
                self.delta = self.delta.compose(&step);
            }
            Err(err) => warn!(%err, "dropping change step"),
        }
        self
    }

    /// Insert text at `at`. Text takes `format`; newlines take the
    /// attributes of the line they split.
    pub fn insert(&mut self, at: usize, text: &str, format: Option<Attributes>) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        let at = self.clamp_insert(at, text.ends_with('\n'));
        let (_, line, _) = self.result.line_at(at.min(self.result.len().saturating_sub(1)));
        let line_format = Some(line.attributes.clone());
        let mut step = Delta::new().retain(at, None);
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                step.push(text_op("\n", line_format.clone()));
            }
            step.push(text_op(part, format.clone()));
        }
        self.step(step)
    }

    /// Insert document content (text, embeds and formatted newlines) as is.
    pub fn insert_content(&mut self, at: usize, content: &Delta) -> &mut Self {
        let ends_with_newline = content.ops.last().is_some_and(|op| match op {
            Op::Insert {
                insert: Insert::Text(text),
                ..
            } => text.ends_with('\n'),
            _ => false,
        });
        let at = self.clamp_insert(at, ends_with_newline);
        let mut step = Delta::new().retain(at, None);
        for op in content.ops.iter().filter(|op| op.is_insert()) {
            step.push(op.clone());
        }
        self.step(step)
    }

    pub fn delete(&mut self, range: Range<usize>) -> &mut Self {
        let range = self.clamp(range);
        if range.is_empty() {
            return self;
        }
        self.step(Delta::new().retain(range.start, None).delete(range.len()))
    }

    /// Apply inline `format` to the text in `range`. Newlines are left
    /// alone. A `null` value removes that format.
    pub fn format_text(&mut self, range: Range<usize>, format: &Attributes) -> &mut Self {
        let range = self.clamp(range);
        if range.is_empty() || format.is_empty() {
            return self;
        }
        let mut step = Delta::new();
        let mut position = 0;
        for (_, line, start) in self.result.lines_at(range.clone()) {
            let from = range.start.max(start);
            let to = range.end.min(start + line.length - 1);
            if from >= to {
                continue;
            }
            step.push(Op::Retain {
                retain: from - position,
                attributes: None,
            });
            step.push(Op::Retain {
                retain: to - from,
                attributes: Some(format.clone()),
            });
            position = to;
        }
        self.step(step)
    }

    /// Apply `format` to every line touched by `range`. A `null` value
    /// removes that format.
    pub fn format_line(&mut self, range: Range<usize>, format: &Attributes) -> &mut Self {
        if format.is_empty() {
            return self;
        }
        let mut step = Delta::new();
        let mut position = 0;
        for (_, line, start) in self.result.lines_at(range) {
            let newline = start + line.length - 1;
            step.push(Op::Retain {
                retain: newline - position,
                attributes: None,
            });
            step.push(Op::Retain {
                retain: 1,
                attributes: Some(format.clone()),
            });
            position = newline + 1;
        }
        self.step(step)
    }

    /// Replace every attribute of the lines touched by `range` with
    /// `attributes`.
    pub fn set_line_format(&mut self, range: Range<usize>, attributes: &Attributes) -> &mut Self {
        let mut step = Delta::new();
        let mut position = 0;
        for (_, line, start) in self.result.lines_at(range) {
            let mut format = attributes.clone();
            for key in line.attributes.keys() {
                if !format.contains_key(key) {
                    format.insert(key.clone(), Value::Null);
                }
            }
            let newline = start + line.length - 1;
            step.push(Op::Retain {
                retain: newline - position,
                attributes: None,
            });
            step.push(Op::Retain {
                retain: 1,
                attributes: Some(format),
            });
            position = newline + 1;
        }
        self.step(step)
    }

    pub fn select(&mut self, selection: EditorRange) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    pub fn into_parts(self) -> (Delta, Option<EditorRange>) {
        (self.delta, self.selection)
    }

    /// Keep ranges off the final newline.
    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let max = self.result.len().saturating_sub(1);
        let start = range.start.min(range.end).min(max);
        let end = range.start.max(range.end).min(max);
        start..end
    }

    /// Inserts go before the final newline unless they bring their own.
    fn clamp_insert(&self, at: usize, ends_with_newline: bool) -> usize {
        let len = self.result.len();
        if ends_with_newline {
            at.min(len)
        } else {
            at.min(len.saturating_sub(1))
        }
    }
}

fn text_op(text: &str, attributes: Option<Attributes>) -> Op {
    Op::Insert {
        insert: Insert::Text(text.to_string()),
        attributes,
    }
}
