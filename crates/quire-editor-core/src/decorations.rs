//! Decoration overlays.
//!
//! Decorations are named, transient patches layered over the document for
//! UI state such as selection highlights or search hits. They may only add
//! `decorator` attributes to existing content or insert decoration widgets,
//! never change the content itself.

use serde_json::Value;
use smol_str::SmolStr;
use tracing::debug;

use crate::delta::{Attributes, Delta, Insert, Op};
use crate::document::TextDocument;
use crate::error::{EditorError, Result};

/// Retain attribute carrying decoration markup for a range or line.
pub const DECORATOR_KEY: &str = "decorator";

/// Embed key identifying a decoration widget.
pub const WIDGET_KEY: &str = "decoration";

/// Committed overlays, composed in the order they were first applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decorations {
    overlays: Vec<(SmolStr, Delta)>,
}

impl Decorations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building the overlay `name` over `doc`. Applying it replaces
    /// any earlier overlay with the same name.
    pub fn decorator<'a>(&'a mut self, name: &str, doc: &'a TextDocument) -> Decorator<'a> {
        Decorator {
            decorations: self,
            doc,
            name: name.into(),
            change: Delta::new(),
            position: 0,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Delta> {
        self.overlays
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, overlay)| overlay)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.overlays.iter().map(|(n, _)| n.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<Delta> {
        let index = self.overlays.iter().position(|(n, _)| n == name)?;
        Some(self.overlays.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.overlays.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.iter().all(|(_, overlay)| overlay.is_empty())
    }

    /// All overlays as one change against the undecorated document.
    ///
    /// Where overlays decorate the same content the earlier one wins, and
    /// its widgets come first.
    pub fn change(&self) -> Delta {
        let mut total = Delta::new();
        for (_, overlay) in &self.overlays {
            let overlay = total.transform(overlay, true);
            total = total.compose(&overlay);
        }
        total
    }

    /// `doc` with every overlay applied.
    pub fn decorated(&self, doc: &TextDocument) -> Result<TextDocument> {
        if self.is_empty() {
            return Ok(doc.clone());
        }
        doc.apply(&self.change())
    }

    /// Keep overlays aligned with the document after `change` is applied
    /// to it.
    pub fn map_through(&mut self, change: &Delta) {
        for (_, overlay) in &mut self.overlays {
            *overlay = change.transform(overlay, true);
        }
    }

    fn commit(&mut self, name: SmolStr, change: Delta) {
        match self.overlays.iter_mut().find(|(n, _)| *n == name) {
            Some((_, overlay)) => *overlay = change,
            None => self.overlays.push((name, change)),
        }
    }
}

/// Builder for one named overlay.
///
/// Offsets are document offsets. Widgets inserted earlier are accounted
/// for, so calls may come in any order.
#[derive(Debug)]
pub struct Decorator<'a> {
    decorations: &'a mut Decorations,
    doc: &'a TextDocument,
    name: SmolStr,
    change: Delta,
    /// End of the region `change` spells out, in decorated offsets.
    position: usize,
}

impl Decorator<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decorate the text between `from` and `to`.
    pub fn mark(mut self, from: usize, to: usize, attributes: Attributes) -> Self {
        let length = self.doc.len();
        let (from, to) = (from.min(to).min(length), from.max(to).min(length));
        if from == to {
            return self;
        }
        let from = self.change.transform_position(from, false);
        let to = self.change.transform_position(to, true);
        self.apply_op(
            from,
            Op::Retain {
                retain: to - from,
                attributes: Some(decorator(attributes)),
            },
        );
        self
    }

    /// Decorate the embed at `at`.
    pub fn embed(self, at: usize, attributes: Attributes) -> Self {
        self.mark(at, at + 1, attributes)
    }

    /// Decorate the line holding `at`. Lines carry their attributes on
    /// their newline.
    pub fn line(self, at: usize, attributes: Attributes) -> Self {
        let (_, line, start) = self.doc.line_at(at);
        let newline = start + line.length - 1;
        self.mark(newline, newline + 1, attributes)
    }

    /// Insert a widget at `at`. Widgets at the same offset keep call order.
    pub fn insert(mut self, at: usize, widget: Attributes) -> Self {
        let at = self
            .change
            .transform_position(at.min(self.doc.len().saturating_sub(1)), false);
        let mut embed = Attributes::new();
        embed.insert(WIDGET_KEY.into(), Value::Object(widget));
        self.apply_op(
            at,
            Op::Insert {
                insert: Insert::Embed(embed),
                attributes: None,
            },
        );
        self
    }

    fn apply_op(&mut self, at: usize, op: Op) {
        let end = at + op.len();
        if at >= self.position {
            self.change.push(Op::Retain {
                retain: at - self.position,
                attributes: None,
            });
            self.change.push(op);
            self.position = end;
        } else {
            let mut delta = Delta::new().retain(at, None);
            delta.push(op);
            self.change = self.change.compose(&delta);
            self.position = self
                .change
                .ops
                .iter()
                .filter(|op| !op.is_delete())
                .map(Op::len)
                .sum();
        }
    }

    /// The overlay built so far.
    pub fn change(&self) -> &Delta {
        &self.change
    }

    /// Validate the overlay and commit it under this decorator's name.
    pub fn apply(self) -> Result<()> {
        validate_decoration(&self.name, &self.change)?;
        debug!(name = %self.name, ops = self.change.ops.len(), "applying decoration");
        self.decorations.commit(self.name, self.change);
        Ok(())
    }
}

fn decorator(attributes: Attributes) -> Attributes {
    let mut wrapped = Attributes::new();
    wrapped.insert(DECORATOR_KEY.into(), Value::Object(attributes));
    wrapped
}

/// Check that an overlay leaves the document content alone.
pub fn validate_decoration(name: &str, change: &Delta) -> Result<()> {
    for op in &change.ops {
        match op {
            Op::Delete { .. } => {
                return Err(EditorError::decoration(name, "decorations cannot delete content"));
            }
            Op::Retain {
                attributes: Some(attributes),
                ..
            } => {
                if let Some(key) = attributes.keys().find(|k| *k != DECORATOR_KEY) {
                    return Err(EditorError::decoration(
                        name,
                        format!("decorations cannot set the `{key}` attribute"),
                    ));
                }
            }
            Op::Retain { .. } => {}
            Op::Insert {
                insert: Insert::Text(_),
                ..
            } => {
                return Err(EditorError::decoration(name, "decorations cannot insert text"));
            }
            Op::Insert {
                insert: Insert::Embed(embed),
                ..
            } => {
                if !embed.contains_key(WIDGET_KEY) {
                    return Err(EditorError::decoration(
                        name,
                        "decorations can only insert decoration widgets",
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::attrs;
    use serde_json::json;

    fn class(name: &str) -> Attributes {
        attrs(json!({ "class": name }))
    }

    fn deco(name: &str) -> Option<Attributes> {
        Some(attrs(json!({ "decorator": { "class": name } })))
    }

    #[test]
    fn test_mark_in_order() {
        let doc = TextDocument::from_text("Hello world\n");
        let mut decorations = Decorations::new();
        decorations
            .decorator("search", &doc)
            .mark(0, 2, class("a"))
            .mark(6, 11, class("b"))
            .apply()
            .unwrap();
        assert_eq!(
            decorations.change(),
            Delta::new()
                .retain(2, deco("a"))
                .retain(4, None)
                .retain(5, deco("b"))
        );
    }

    #[test]
    fn test_mark_out_of_order_composes() {
        let doc = TextDocument::from_text("Hello world\n");
        let mut decorations = Decorations::new();
        decorations
            .decorator("search", &doc)
            .mark(6, 11, class("b"))
            .mark(8, 4, class("a"))
            .apply()
            .unwrap();
        assert_eq!(
            decorations.change(),
            Delta::new()
                .retain(4, None)
                .retain(4, deco("a"))
                .retain(3, deco("b"))
        );
    }

    #[test]
    fn test_line_decorates_newline() {
        let doc = TextDocument::from_text("ab\ncd\n");
        let mut decorations = Decorations::new();
        decorations
            .decorator("current", &doc)
            .line(4, class("active"))
            .apply()
            .unwrap();
        let decorated = decorations.decorated(&doc).unwrap();
        assert_eq!(
            decorated.lines()[1].attributes,
            attrs(json!({"decorator": {"class": "active"}}))
        );
        assert!(decorated.lines()[0].attributes.is_empty());
    }

    #[test]
    fn test_widgets_shift_later_offsets() {
        let doc = TextDocument::from_text("abcd\n");
        let mut decorations = Decorations::new();
        decorations
            .decorator("hints", &doc)
            .insert(1, attrs(json!({"text": "x"})))
            .mark(1, 3, class("m"))
            .insert(1, attrs(json!({"text": "y"})))
            .apply()
            .unwrap();
        let decorated = decorations.decorated(&doc).unwrap();
        assert_eq!(decorated.len(), doc.len() + 2);
        let ops = &decorated.lines()[0].content.ops;
        assert_eq!(ops[0], Op::Insert { insert: Insert::Text("a".into()), attributes: None });
        assert_eq!(
            ops[1].clone(),
            Op::Insert {
                insert: Insert::Embed(attrs(json!({"decoration": {"text": "x"}}))),
                attributes: None
            }
        );
        assert_eq!(
            ops[2].clone(),
            Op::Insert {
                insert: Insert::Embed(attrs(json!({"decoration": {"text": "y"}}))),
                attributes: None
            }
        );
        assert_eq!(
            ops[3].clone(),
            Op::Insert { insert: Insert::Text("bc".into()), attributes: deco("m") }
        );
    }

    #[test]
    fn test_decoration_neutrality() {
        let doc = TextDocument::from_delta(
            &Delta::new()
                .insert("one ", None)
                .insert("two", Some(attrs(json!({"bold": true}))))
                .insert("\n", None)
                .insert_embed(attrs(json!({"image": "a.png"})), None)
                .insert("three\n", None),
        );
        let mut decorations = Decorations::new();
        decorations
            .decorator("a", &doc)
            .mark(2, 6, class("x"))
            .embed(8, class("img"))
            .line(9, class("line"))
            .mark(0, 1, class("y"))
            .apply()
            .unwrap();
        decorations
            .decorator("b", &doc)
            .mark(3, 12, class("z"))
            .apply()
            .unwrap();
        let change = decorations.change();
        assert_eq!(change.change_length(), 0);
        for op in &change.ops {
            match op {
                Op::Retain { attributes, .. } => {
                    assert!(attributes.iter().flat_map(|a| a.keys()).all(|k| k == "decorator"));
                }
                other => panic!("unexpected op {other:?}"),
            }
        }
        let decorated = decorations.decorated(&doc).unwrap();
        assert_eq!(decorated.len(), doc.len());
        assert_eq!(decorated.text(), doc.text());
        // where overlays overlap the first one applied wins
        let ops = &decorated.lines()[0].content.ops;
        assert_eq!(
            ops[3].attributes(),
            Some(&attrs(json!({"bold": true, "decorator": {"class": "x"}})))
        );
        assert_eq!(
            ops[4].attributes(),
            Some(&attrs(json!({"bold": true, "decorator": {"class": "z"}})))
        );
    }

    #[test]
    fn test_reapplying_replaces_overlay() {
        let doc = TextDocument::from_text("abc\n");
        let mut decorations = Decorations::new();
        decorations.decorator("sel", &doc).mark(0, 1, class("a")).apply().unwrap();
        decorations.decorator("sel", &doc).mark(1, 2, class("a")).apply().unwrap();
        assert_eq!(decorations.names().count(), 1);
        assert_eq!(
            decorations.get("sel"),
            Some(&Delta::new().retain(1, None).retain(1, deco("a")))
        );
        decorations.remove("sel");
        assert!(decorations.is_empty());
    }

    #[test]
    fn test_map_through_edit() {
        let doc = TextDocument::from_text("abc\n");
        let mut decorations = Decorations::new();
        decorations.decorator("sel", &doc).mark(1, 3, class("a")).apply().unwrap();
        decorations.map_through(&Delta::new().insert("xx", None));
        assert_eq!(
            decorations.get("sel"),
            Some(&Delta::new().retain(3, None).retain(2, deco("a")))
        );
    }

    #[test]
    fn test_validation_rejects_content_changes() {
        let bad = [
            Delta::new().retain(1, None).delete(1),
            Delta::new().retain(1, Some(attrs(json!({"bold": true})))),
            Delta::new().insert("x", None),
            Delta::new().insert_embed(attrs(json!({"image": "a.png"})), None),
        ];
        for change in &bad {
            assert!(matches!(
                validate_decoration("bad", change),
                Err(EditorError::DecorationViolation { .. })
            ));
        }
        assert!(validate_decoration(
            "ok",
            &Delta::new()
                .retain(2, deco("a"))
                .insert_embed(attrs(json!({"decoration": {}})), None)
        )
        .is_ok());
    }
}
