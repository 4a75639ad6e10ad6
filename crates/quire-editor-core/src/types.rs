//! Core editor types: selection ranges, input modes and change sources.
//!
//! These types are framework-agnostic and shared by the history engine,
//! the selection bridge and the editor facade.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::delta::Delta;

/// Document selection with anchor and focus offsets.
///
/// The anchor is where the selection started, the focus is where the caret
/// is now. They may be in any order - use `start()` and `end()` for ordered
/// bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorRange {
    pub anchor: usize,
    pub focus: usize,
}

impl EditorRange {
    pub fn new(anchor: usize, focus: usize) -> Self {
        Self { anchor, focus }
    }

    /// Create a collapsed range (caret position).
    pub fn caret(offset: usize) -> Self {
        Self {
            anchor: offset,
            focus: offset,
        }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.focus)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Same range with anchor <= focus.
    pub fn normalized(&self) -> Self {
        Self::new(self.start(), self.end())
    }

    /// Check if the focus sits before the anchor.
    pub fn is_backwards(&self) -> bool {
        self.focus < self.anchor
    }

    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Clamp both ends to a document of `length`.
    ///
    /// The final newline is not selectable, so offsets stop at `length - 1`.
    pub fn clamp(&self, length: usize) -> Self {
        let max = length.saturating_sub(1);
        Self::new(self.anchor.min(max), self.focus.min(max))
    }

    /// Map this range through a change.
    ///
    /// A caret sitting where text was inserted ends up after the insert.
    pub fn transform(&self, change: &Delta) -> Self {
        Self::new(
            change.transform_position(self.anchor, false),
            change.transform_position(self.focus, false),
        )
    }
}

impl From<Range<usize>> for EditorRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Kind of edit, used to decide whether consecutive commits coalesce.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Typing,
    Deleting,
}

/// Who caused a change or selection update.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum Source {
    /// Direct user interaction with the editable surface.
    #[default]
    User,
    /// Programmatic calls through the editor API.
    Api,
    /// Undo or redo.
    History,
}
