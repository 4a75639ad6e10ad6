//! Change-log algebra.
//!
//! A [`Delta`] is an ordered list of insert, retain and delete operations.
//! A delta made only of inserts describes a document; a delta mixing retains
//! and deletes describes a change to one. Lengths are counted in Unicode
//! scalar values and every embed has length 1.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Insertion-ordered attribute map. A `null` value in a retain removes the
/// attribute.
pub type Attributes = Map<String, Value>;

/// Character used to stand in for an embed in plain text.
pub const EMBED_CHAR: char = '\u{FFFC}';

/// Inserted content: a run of text or a single embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Insert {
    Text(String),
    Embed(Attributes),
}

impl Insert {
    pub fn len(&self) -> usize {
        match self {
            Insert::Text(text) => text.chars().count(),
            Insert::Embed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Insert::Text(text) => Some(text),
            Insert::Embed(_) => None,
        }
    }

    pub fn as_embed(&self) -> Option<&Attributes> {
        match self {
            Insert::Text(_) => None,
            Insert::Embed(embed) => Some(embed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    Insert {
        insert: Insert,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Delete {
        delete: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Retain,
    Delete,
}

impl Op {
    pub fn len(&self) -> usize {
        match self {
            Op::Insert { insert, .. } => insert.len(),
            Op::Retain { retain, .. } => *retain,
            Op::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Insert { .. } => OpKind::Insert,
            Op::Retain { .. } => OpKind::Retain,
            Op::Delete { .. } => OpKind::Delete,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Op::Insert { attributes, .. } | Op::Retain { attributes, .. } => attributes.as_ref(),
            Op::Delete { .. } => None,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Op::Insert { .. })
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Op::Retain { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete { .. })
    }

    fn normalized(self) -> Self {
        match self {
            Op::Insert { insert, attributes } => Op::Insert {
                insert,
                attributes: non_empty(attributes),
            },
            Op::Retain { retain, attributes } => Op::Retain {
                retain,
                attributes: non_empty(attributes),
            },
            op => op,
        }
    }
}

fn non_empty(attributes: Option<Attributes>) -> Option<Attributes> {
    attributes.filter(|a| !a.is_empty())
}

/// Substring by character offset and length.
fn char_slice(text: &str, start: usize, len: usize) -> &str {
    let mut bounds = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()));
    let begin = bounds.nth(start).unwrap_or(text.len());
    let end = if len == 0 {
        begin
    } else {
        bounds.nth(len - 1).unwrap_or(text.len())
    };
    &text[begin..end]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub ops: Vec<Op>,
}

impl From<Vec<Op>> for Delta {
    fn from(ops: Vec<Op>) -> Self {
        let mut delta = Delta::new();
        for op in ops {
            delta.push(op);
        }
        delta
    }
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    // === Builders ===

    pub fn insert(mut self, text: impl Into<String>, attributes: Option<Attributes>) -> Self {
        self.push(Op::Insert {
            insert: Insert::Text(text.into()),
            attributes,
        });
        self
    }

    pub fn insert_embed(mut self, embed: Attributes, attributes: Option<Attributes>) -> Self {
        self.push(Op::Insert {
            insert: Insert::Embed(embed),
            attributes,
        });
        self
    }

    pub fn retain(mut self, length: usize, attributes: Option<Attributes>) -> Self {
        self.push(Op::Retain {
            retain: length,
            attributes,
        });
        self
    }

    pub fn delete(mut self, length: usize) -> Self {
        self.push(Op::Delete { delete: length });
        self
    }

    /// Append an op, merging it into the previous one where possible.
    ///
    /// Inserts are kept ahead of an adjacent delete so equivalent changes
    /// always have the same shape.
    pub fn push(&mut self, op: Op) -> &mut Self {
        if op.is_empty() {
            return self;
        }
        let op = op.normalized();
        let mut index = self.ops.len();
        let Some(last) = self.ops.last_mut() else {
            self.ops.push(op);
            return self;
        };

        if let (Op::Delete { delete: last_len }, Op::Delete { delete }) = (&mut *last, &op) {
            *last_len += *delete;
            return self;
        }

        if last.is_delete() && op.is_insert() {
            index -= 1;
            if index == 0 {
                self.ops.insert(0, op);
                return self;
            }
        }

        let prev = &mut self.ops[index - 1];
        if prev.attributes() == op.attributes() {
            match (prev, &op) {
                (
                    Op::Insert {
                        insert: Insert::Text(prev_text),
                        ..
                    },
                    Op::Insert {
                        insert: Insert::Text(text),
                        ..
                    },
                ) => {
                    prev_text.push_str(text);
                    return self;
                }
                (Op::Retain { retain: prev_len, .. }, Op::Retain { retain, .. }) => {
                    *prev_len += *retain;
                    return self;
                }
                _ => {}
            }
        }

        self.ops.insert(index, op);
        self
    }

    /// Drop a trailing retain that carries no attributes.
    pub fn chop(mut self) -> Self {
        if let Some(Op::Retain {
            attributes: None, ..
        }) = self.ops.last()
        {
            self.ops.pop();
        }
        self
    }

    // === Queries ===

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn length(&self) -> usize {
        self.ops.iter().map(Op::len).sum()
    }

    /// Net change in document length this delta produces.
    pub fn change_length(&self) -> isize {
        self.ops.iter().fold(0, |acc, op| match op {
            Op::Insert { insert, .. } => acc + insert.len() as isize,
            Op::Delete { delete } => acc - *delete as isize,
            Op::Retain { .. } => acc,
        })
    }

    /// Characters of the base document this change reads (retained or deleted).
    pub fn base_span(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| !op.is_insert())
            .map(Op::len)
            .sum()
    }

    /// Plain text of a document delta. Embeds become [`EMBED_CHAR`].
    pub fn text(&self) -> String {
        let mut out = String::new();
        for op in &self.ops {
            match op {
                Op::Insert {
                    insert: Insert::Text(text),
                    ..
                } => out.push_str(text),
                Op::Insert {
                    insert: Insert::Embed(_),
                    ..
                } => out.push(EMBED_CHAR),
                _ => {}
            }
        }
        out
    }

    pub fn iter(&self) -> OpIter<'_> {
        OpIter::new(&self.ops)
    }

    // === Algebra ===

    pub fn slice(&self, start: usize, end: usize) -> Delta {
        let mut delta = Delta::new();
        let mut iter = self.iter();
        let mut index = 0;
        while index < end && iter.has_next() {
            let op = if index < start {
                iter.next(start - index)
            } else {
                let op = iter.next(end - index);
                delta.push(op.clone());
                op
            };
            index += op.len();
        }
        delta
    }

    pub fn concat(&self, other: &Delta) -> Delta {
        let mut delta = self.clone();
        let mut rest = other.ops.iter();
        if let Some(first) = rest.next() {
            delta.push(first.clone());
            delta.ops.extend(rest.cloned());
        }
        delta
    }

    /// Apply `other` after `self`, producing a single equivalent delta.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut this_iter = self.iter();
        let mut other_iter = other.iter();
        let mut ops = Vec::new();

        // Leading inserts covered by a plain retain pass through untouched.
        if let Some(Op::Retain {
            retain,
            attributes: None,
        }) = other_iter.peek()
        {
            let retain = *retain;
            let mut first_left = retain;
            while this_iter.peek_kind() == OpKind::Insert && this_iter.peek_len() <= first_left {
                first_left -= this_iter.peek_len();
                ops.push(this_iter.next(usize::MAX));
            }
            if retain > first_left {
                other_iter.next(retain - first_left);
            }
        }

        let mut delta = Delta { ops };
        while this_iter.has_next() || other_iter.has_next() {
            if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next(usize::MAX));
            } else if this_iter.peek_kind() == OpKind::Delete {
                delta.push(this_iter.next(usize::MAX));
            } else {
                let length = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next(length);
                let other_op = other_iter.next(length);
                match other_op {
                    Op::Retain {
                        attributes: other_attrs,
                        ..
                    } => {
                        let op = match this_op {
                            Op::Retain { attributes, .. } => Op::Retain {
                                retain: length,
                                attributes: compose_attributes(
                                    attributes.as_ref(),
                                    other_attrs.as_ref(),
                                    true,
                                ),
                            },
                            Op::Insert { insert, attributes } => Op::Insert {
                                insert,
                                attributes: compose_attributes(
                                    attributes.as_ref(),
                                    other_attrs.as_ref(),
                                    false,
                                ),
                            },
                            Op::Delete { .. } => continue,
                        };
                        delta.push(op);
                    }
                    Op::Delete { .. } if this_op.is_retain() => {
                        delta.push(other_op);
                    }
                    // An insert deleted by `other` cancels out.
                    _ => {}
                }
            }
        }
        delta.chop()
    }

    /// The change that undoes `self` when applied after it to `base`.
    pub fn invert(&self, base: &Delta) -> Delta {
        let mut inverted = Delta::new();
        let mut base_index = 0;
        for op in &self.ops {
            match op {
                Op::Insert { insert, .. } => {
                    inverted.push(Op::Delete {
                        delete: insert.len(),
                    });
                }
                Op::Retain {
                    retain,
                    attributes: None,
                } => {
                    inverted.push(Op::Retain {
                        retain: *retain,
                        attributes: None,
                    });
                    base_index += retain;
                }
                Op::Delete { delete: length }
                | Op::Retain {
                    retain: length,
                    attributes: Some(_),
                } => {
                    let slice = base.slice(base_index, base_index + length);
                    for base_op in slice.ops {
                        match op {
                            Op::Delete { .. } => {
                                inverted.push(base_op);
                            }
                            _ => {
                                let attributes = invert_attributes(
                                    op.attributes(),
                                    base_op.attributes(),
                                );
                                inverted.push(Op::Retain {
                                    retain: base_op.len(),
                                    attributes,
                                });
                            }
                        }
                    }
                    base_index += length;
                }
            }
        }
        inverted.chop()
    }

    /// Rewrite `other` so it applies after `self`.
    ///
    /// `priority` decides ties: when true, inserts in `self` are treated as
    /// having happened first.
    pub fn transform(&self, other: &Delta, priority: bool) -> Delta {
        let mut this_iter = self.iter();
        let mut other_iter = other.iter();
        let mut delta = Delta::new();
        while this_iter.has_next() || other_iter.has_next() {
            if this_iter.peek_kind() == OpKind::Insert
                && (priority || other_iter.peek_kind() != OpKind::Insert)
            {
                let length = this_iter.next(usize::MAX).len();
                delta.push(Op::Retain {
                    retain: length,
                    attributes: None,
                });
            } else if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next(usize::MAX));
            } else {
                let length = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next(length);
                let other_op = other_iter.next(length);
                if this_op.is_delete() {
                    continue;
                }
                if other_op.is_delete() {
                    delta.push(other_op);
                } else {
                    delta.push(Op::Retain {
                        retain: length,
                        attributes: transform_attributes(
                            this_op.attributes(),
                            other_op.attributes(),
                            priority,
                        ),
                    });
                }
            }
        }
        delta.chop()
    }

    /// Map a document offset through this change.
    ///
    /// With `priority`, an insert exactly at `index` does not push it forward.
    pub fn transform_position(&self, index: usize, priority: bool) -> usize {
        let mut iter = self.iter();
        let mut index = index;
        let mut offset = 0;
        while iter.has_next() && offset <= index {
            let length = iter.peek_len();
            let kind = iter.peek_kind();
            iter.next(usize::MAX);
            match kind {
                OpKind::Delete => {
                    index -= length.min(index - offset);
                    continue;
                }
                OpKind::Insert if offset < index || !priority => {
                    index += length;
                }
                _ => {}
            }
            offset += length;
        }
        index
    }

    /// Walk the lines of a document delta.
    ///
    /// `f` receives each line's content, the attributes of its newline and
    /// the line number; returning `false` stops the walk. Content after the
    /// last newline is reported with empty attributes. Stops at the first
    /// non-insert op.
    pub fn each_line<F>(&self, mut f: F)
    where
        F: FnMut(&Delta, &Attributes, usize) -> bool,
    {
        let mut iter = self.iter();
        let mut line = Delta::new();
        let mut i = 0;
        while iter.has_next() {
            if iter.peek_kind() != OpKind::Insert {
                return;
            }
            let newline = iter
                .peek_text()
                .and_then(|text| text.chars().position(|c| c == '\n'));
            match newline {
                None => {
                    line.push(iter.next(usize::MAX));
                }
                Some(0) => {
                    let attributes = iter.next(1).attributes().cloned().unwrap_or_default();
                    if !f(&line, &attributes, i) {
                        return;
                    }
                    i += 1;
                    line = Delta::new();
                }
                Some(at) => {
                    line.push(iter.next(at));
                }
            }
        }
        if line.length() > 0 {
            f(&line, &Attributes::new(), i);
        }
    }
}

/// Merge attribute maps; `b` wins. Nulls are dropped unless `keep_null`.
pub fn compose_attributes(
    a: Option<&Attributes>,
    b: Option<&Attributes>,
    keep_null: bool,
) -> Option<Attributes> {
    let mut attributes = a.cloned().unwrap_or_default();
    if let Some(b) = b {
        for (key, value) in b {
            attributes.insert(key.clone(), value.clone());
        }
    }
    if !keep_null {
        attributes.retain(|_, value| !value.is_null());
    }
    non_empty(Some(attributes))
}

/// Attributes that restore `base` after `attributes` was applied over it.
pub fn invert_attributes(
    attributes: Option<&Attributes>,
    base: Option<&Attributes>,
) -> Option<Attributes> {
    let empty = Attributes::new();
    let attributes = attributes.unwrap_or(&empty);
    let base = base.unwrap_or(&empty);
    let mut inverted = Attributes::new();
    for (key, value) in base {
        if attributes.get(key).is_some_and(|v| v != value) {
            inverted.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in attributes {
        if !base.contains_key(key) && !value.is_null() {
            inverted.insert(key.clone(), Value::Null);
        }
    }
    non_empty(Some(inverted))
}

fn transform_attributes(
    a: Option<&Attributes>,
    b: Option<&Attributes>,
    priority: bool,
) -> Option<Attributes> {
    let Some(a) = a else {
        return b.cloned();
    };
    let b = b?;
    if !priority {
        return Some(b.clone());
    }
    let mut attributes = b.clone();
    attributes.retain(|key, _| !a.contains_key(key));
    non_empty(Some(attributes))
}

/// Cursor over a list of ops that can split them at arbitrary lengths.
pub struct OpIter<'a> {
    ops: &'a [Op],
    index: usize,
    offset: usize,
}

impl<'a> OpIter<'a> {
    pub fn new(ops: &'a [Op]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.index < self.ops.len()
    }

    pub fn peek(&self) -> Option<&'a Op> {
        self.ops.get(self.index)
    }

    /// Remaining length of the current op, `usize::MAX` when exhausted.
    pub fn peek_len(&self) -> usize {
        self.peek()
            .map(|op| op.len() - self.offset)
            .unwrap_or(usize::MAX)
    }

    /// Kind of the current op. An exhausted iterator behaves as an endless
    /// retain.
    pub fn peek_kind(&self) -> OpKind {
        self.peek().map(Op::kind).unwrap_or(OpKind::Retain)
    }

    fn peek_text(&self) -> Option<&'a str> {
        match self.peek()? {
            Op::Insert {
                insert: Insert::Text(text),
                ..
            } => Some(char_slice(text, self.offset, usize::MAX)),
            _ => None,
        }
    }

    /// Take up to `length` from the current op.
    pub fn next(&mut self, length: usize) -> Op {
        let Some(op) = self.ops.get(self.index) else {
            return Op::Retain {
                retain: length,
                attributes: None,
            };
        };
        let offset = self.offset;
        let remaining = op.len() - offset;
        let length = length.min(remaining);
        if length == remaining {
            self.index += 1;
            self.offset = 0;
        } else {
            self.offset += length;
        }
        match op {
            Op::Delete { .. } => Op::Delete { delete: length },
            Op::Retain { attributes, .. } => Op::Retain {
                retain: length,
                attributes: attributes.clone(),
            },
            Op::Insert {
                insert: Insert::Text(text),
                attributes,
            } => Op::Insert {
                insert: Insert::Text(char_slice(text, offset, length).to_string()),
                attributes: attributes.clone(),
            },
            Op::Insert {
                insert: Insert::Embed(embed),
                attributes,
            } => Op::Insert {
                insert: Insert::Embed(embed.clone()),
                attributes: attributes.clone(),
            },
        }
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> Vec<Op> {
        let mut rest = Vec::new();
        while self.has_next() {
            rest.push(self.next(usize::MAX));
        }
        rest
    }
}

/// Build an attribute map from a JSON object literal.
///
/// Non-object values produce an empty map.
pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bold() -> Option<Attributes> {
        Some(attrs(json!({"bold": true})))
    }

    #[test]
    fn test_push_merges_adjacent_text() {
        let delta = Delta::new().insert("Hel", None).insert("lo", None);
        assert_eq!(delta.ops.len(), 1);
        assert_eq!(delta.text(), "Hello");
    }

    #[test]
    fn test_push_keeps_different_attributes_apart() {
        let delta = Delta::new().insert("a", None).insert("b", bold());
        assert_eq!(delta.ops.len(), 2);
    }

    #[test]
    fn test_push_insert_moves_before_delete() {
        let delta = Delta::new().retain(2, None).delete(3).insert("x", None);
        assert_eq!(
            delta.ops,
            vec![
                Op::Retain {
                    retain: 2,
                    attributes: None
                },
                Op::Insert {
                    insert: Insert::Text("x".into()),
                    attributes: None
                },
                Op::Delete { delete: 3 },
            ]
        );
    }

    #[test]
    fn test_empty_attributes_normalize_to_none() {
        let delta = Delta::new().insert("a", Some(Attributes::new()));
        assert_eq!(delta.ops[0].attributes(), None);
    }

    #[test]
    fn test_length_counts_chars_and_embeds() {
        let delta = Delta::new()
            .insert("héllo", None)
            .insert_embed(attrs(json!({"image": "a.png"})), None)
            .insert("\n", None);
        assert_eq!(delta.length(), 7);
    }

    #[test]
    fn test_compose_insert_then_delete() {
        let doc = Delta::new().insert("Testing this out\n", None);
        let change = Delta::new().retain(2, None).delete(5);
        let result = doc.compose(&change);
        assert_eq!(result.text(), "Te this out\n");
    }

    #[test]
    fn test_compose_retain_applies_and_removes_attributes() {
        let doc = Delta::new().insert("abc\n", None);
        let formatted = doc.compose(&Delta::new().retain(1, None).retain(2, bold()));
        assert_eq!(
            formatted,
            Delta::new().insert("a", None).insert("bc", bold()).insert("\n", None)
        );

        let unformat = Delta::new().retain(1, None).retain(2, Some(attrs(json!({"bold": null}))));
        assert_eq!(formatted.compose(&unformat), doc);
    }

    #[test]
    fn test_compose_two_changes() {
        let a = Delta::new().retain(1, None).insert("X", None);
        let b = Delta::new().retain(2, None).insert("Y", None);
        let doc = Delta::new().insert("ab\n", None);
        let sequential = doc.compose(&a).compose(&b);
        let combined = doc.compose(&a.compose(&b));
        assert_eq!(sequential, combined);
        assert_eq!(combined.text(), "aXYb\n");
    }

    #[test]
    fn test_invert_restores_base() {
        let doc = Delta::new().insert("Hello ", None).insert("World", bold()).insert("\n", None);
        let change = Delta::new()
            .retain(2, None)
            .delete(5)
            .insert("y", None)
            .retain(3, Some(attrs(json!({"italic": true, "bold": null}))));
        let inverted = change.invert(&doc);
        assert_eq!(doc.compose(&change).compose(&inverted), doc);
    }

    #[test]
    fn test_transform_priority() {
        let a = Delta::new().insert("a", None);
        let b = Delta::new().insert("b", None);
        assert_eq!(a.transform(&b, true), Delta::new().retain(1, None).insert("b", None));
        assert_eq!(a.transform(&b, false), Delta::new().insert("b", None));
    }

    #[test]
    fn test_transform_converges() {
        let doc = Delta::new().insert("abcdef\n", None);
        let a = Delta::new().retain(1, None).delete(2);
        let b = Delta::new().retain(2, None).insert("X", None).retain(2, bold());
        let left = doc.compose(&a).compose(&a.transform(&b, true));
        let right = doc.compose(&b).compose(&b.transform(&a, false));
        assert_eq!(left, right);
    }

    #[test]
    fn test_transform_position() {
        let change = Delta::new().retain(2, None).insert("XX", None).delete(1);
        assert_eq!(change.transform_position(1, false), 1);
        assert_eq!(change.transform_position(2, false), 4);
        assert_eq!(change.transform_position(2, true), 2);
        assert_eq!(change.transform_position(3, false), 4);
        assert_eq!(change.transform_position(5, false), 6);
    }

    #[test]
    fn test_slice_splits_ops() {
        let doc = Delta::new().insert("Hello", bold()).insert(" World\n", None);
        assert_eq!(
            doc.slice(3, 8),
            Delta::new().insert("lo", bold()).insert(" Wo", None)
        );
    }

    #[test]
    fn test_each_line() {
        let doc = Delta::new()
            .insert("Title", None)
            .insert("\n", Some(attrs(json!({"header": 1}))))
            .insert("body\nmore", None);
        let mut lines = Vec::new();
        doc.each_line(|line, attributes, i| {
            lines.push((i, line.text(), attributes.clone()));
            true
        });
        assert_eq!(
            lines,
            vec![
                (0, "Title".to_string(), attrs(json!({"header": 1}))),
                (1, "body".to_string(), Attributes::new()),
                (2, "more".to_string(), Attributes::new()),
            ]
        );
    }

    #[test]
    fn test_serde_quill_form() {
        let delta = Delta::new()
            .retain(3, None)
            .insert("x", bold())
            .delete(2)
            .insert_embed(attrs(json!({"image": "a.png"})), None);
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            json,
            json!({"ops": [
                {"retain": 3},
                {"insert": "x", "attributes": {"bold": true}},
                {"insert": {"image": "a.png"}},
                {"delete": 2},
            ]})
        );
        let back: Delta = serde_json::from_value(json).unwrap();
        assert_eq!(back, delta);
    }
}
