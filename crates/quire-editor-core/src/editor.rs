//! The editor facade.
//!
//! An [`Editor`] owns a document, its selection, the undo history, the
//! decoration overlays and the listeners of one editing surface. Every
//! content change goes through [`Editor::update`], which records history,
//! maps decorations and emits events.

use tracing::{debug, trace};

use crate::change::TextChange;
use crate::config::EditorConfig;
use crate::decorations::Decorations;
use crate::defaults::default_paper;
use crate::delta::{Attributes, Delta};
use crate::document::TextDocument;
use crate::dom::Fragment;
use crate::error::Result;
use crate::events::{ChangeEvent, Dispatcher, EditorEvent, EventKind, ListenerId};
use crate::history::{History, diff_lines};
use crate::render::render_document;
use crate::selection::snap_to_frozen;
use crate::typeset::Paper;
use crate::types::{EditorRange, InputMode, Source};

#[derive(Debug)]
pub struct Editor {
    pub(crate) paper: Paper,
    config: EditorConfig,
    pub(crate) doc: TextDocument,
    pub(crate) selection: Option<EditorRange>,
    /// Formats applied to the next inserted text, set when formatting a
    /// collapsed selection.
    pub(crate) active_formats: Option<Attributes>,
    history: History,
    decorations: Decorations,
    dispatcher: Dispatcher,
}

impl Editor {
    pub fn new(mut paper: Paper, config: EditorConfig) -> Result<Self> {
        paper.set_decoration_selector(&config.decoration_selector)?;
        Ok(Self::build(paper, config))
    }

    /// An editor with the default types and configuration.
    pub fn with_defaults() -> Self {
        Self::build(default_paper(), EditorConfig::default())
    }

    fn build(paper: Paper, config: EditorConfig) -> Self {
        Self {
            history: History::new(config.history.clone()),
            paper,
            config,
            doc: TextDocument::new(),
            selection: None,
            active_formats: None,
            decorations: Decorations::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn paper(&self) -> &Paper {
        &self.paper
    }

    pub fn paper_mut(&mut self) -> &mut Paper {
        &mut self.paper
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn doc(&self) -> &TextDocument {
        &self.doc
    }

    pub fn selection(&self) -> Option<EditorRange> {
        self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn decorations(&self) -> &Decorations {
        &self.decorations
    }

    pub fn decorations_mut(&mut self) -> &mut Decorations {
        &mut self.decorations
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&mut EditorEvent<'_>) + 'static,
    {
        self.dispatcher.on(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.dispatcher.off(id)
    }

    // === Content ===

    /// Replace the document without recording history or emitting events.
    pub fn reset(&mut self, delta: &Delta) {
        self.doc = TextDocument::from_delta(delta);
        self.selection = self.selection.map(|s| s.clamp(self.doc.len()));
        self.active_formats = None;
        self.history.clear_history();
        self.decorations.clear();
    }

    /// Replace the document content as an undoable change.
    pub fn set_delta(&mut self, delta: &Delta) -> Result<bool> {
        let next = TextDocument::from_delta(delta);
        let change = self.doc.diff(&next);
        self.update(&change, None, None, Source::Api)
    }

    /// Build a change with [`TextChange`] and apply it.
    pub fn change<F>(&mut self, mode: Option<InputMode>, build: F) -> Result<bool>
    where
        F: FnOnce(&mut TextChange<'_>),
    {
        let mut change = TextChange::new(&self.doc);
        build(&mut change);
        let (delta, selection) = change.into_parts();
        self.update(&delta, selection, mode, Source::Api)
    }

    /// Apply `change` as one transaction.
    ///
    /// Without an explicit `selection` the current one is mapped through
    /// the change. Edits sharing `mode` may coalesce into the previous undo
    /// step. Returns whether the document changed.
    pub fn update(
        &mut self,
        change: &Delta,
        selection: Option<EditorRange>,
        mode: Option<InputMode>,
        source: Source,
    ) -> Result<bool> {
        let next = self.doc.apply(change)?;
        let old_selection = self.selection;
        let selection = selection
            .or_else(|| old_selection.map(|s| s.transform(change)))
            .map(|s| snap_to_frozen(&next, &self.paper, s.clamp(next.len())));

        let commands = diff_lines(&self.doc, &next);
        if commands.is_empty() {
            trace!("change left the document untouched");
            self.select(selection, source);
            return Ok(false);
        }

        let old_doc = self.doc.clone();
        self.history.start_transaction(old_selection)?;
        for command in commands {
            if let Err(err) = self.history.exec(&mut self.doc, command) {
                self.history.abort(&mut self.doc)?;
                return Err(err);
            }
        }
        self.history.set_transaction_selection(selection)?;
        let merged = self.history.commit(mode)?;
        debug!(?source, ?mode, merged, "applied change");

        self.decorations.map_through(change);
        self.selection = selection;
        self.active_formats = None;
        self.emit_change(&old_doc, change, old_selection, source);
        Ok(true)
    }

    fn emit_change(
        &mut self,
        old_doc: &TextDocument,
        change: &Delta,
        old_selection: Option<EditorRange>,
        source: Source,
    ) {
        self.dispatcher.emit(&mut EditorEvent::Change(ChangeEvent {
            old_doc,
            doc: &self.doc,
            change,
            old_selection,
            selection: self.selection,
            source,
        }));
        if old_selection != self.selection {
            self.dispatcher.emit(&mut EditorEvent::SelectionChange {
                old: old_selection,
                selection: self.selection,
                source,
            });
        }
    }

    // === Selection ===

    /// Move the selection without editing. Breaks typing coalescing.
    ///
    /// Returns whether the selection changed.
    pub fn select(&mut self, selection: Option<EditorRange>, source: Source) -> bool {
        let selection =
            selection.map(|s| snap_to_frozen(&self.doc, &self.paper, s.clamp(self.doc.len())));
        if selection == self.selection {
            return false;
        }
        let old = self.selection;
        self.selection = selection;
        self.active_formats = None;
        self.history.break_coalescing();
        self.dispatcher.emit(&mut EditorEvent::SelectionChange {
            old,
            selection,
            source,
        });
        true
    }

    /// Formats in effect at the selection: the line format overlaid with
    /// the shared text format, or the pending formats for the next insert.
    pub fn get_active_formats(&self) -> Attributes {
        if let Some(formats) = &self.active_formats {
            return formats.clone();
        }
        let Some(selection) = self.selection else {
            return Attributes::new();
        };
        let range = selection.to_range();
        let mut formats = self.doc.get_line_format(range.clone());
        formats.extend(self.doc.get_text_format(range));
        formats
    }

    // === History ===

    pub fn undo(&mut self) -> Result<bool> {
        let old_doc = self.doc.clone();
        let Some(outcome) = self.history.undo(&mut self.doc)? else {
            return Ok(false);
        };
        self.after_history(old_doc, outcome.selection);
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let old_doc = self.doc.clone();
        let Some(outcome) = self.history.redo(&mut self.doc)? else {
            return Ok(false);
        };
        self.after_history(old_doc, outcome.selection);
        Ok(true)
    }

    fn after_history(&mut self, old_doc: TextDocument, selection: Option<EditorRange>) {
        let change = old_doc.diff(&self.doc);
        let old_selection = self.selection;
        self.decorations.map_through(&change);
        self.selection = selection.map(|s| s.clamp(self.doc.len()));
        self.active_formats = None;
        self.emit_change(&old_doc, &change, old_selection, Source::History);
    }

    // === Rendering ===

    /// Let listeners rebuild their overlays for the current document.
    pub fn decorate(&mut self) {
        let Self {
            dispatcher,
            doc,
            decorations,
            ..
        } = self;
        dispatcher.emit(&mut EditorEvent::Decorate { doc, decorations });
    }

    /// The document with every decoration overlay applied.
    pub fn decorated_doc(&self) -> Result<TextDocument> {
        self.decorations.decorated(&self.doc)
    }

    /// Decorate, then render the decorated document.
    pub fn render(&mut self) -> Result<Fragment> {
        self.decorate();
        let doc = self.decorated_doc()?;
        Ok(render_document(&doc, &self.paper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::attrs;
    use crate::error::EditorError;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor_with(text: &str) -> Editor {
        let mut editor = Editor::with_defaults();
        editor.reset(&Delta::new().insert(text, None));
        editor
    }

    #[test]
    fn test_typing_two_words_undoes_in_one_step() {
        let mut editor = Editor::with_defaults();
        editor.select(Some(EditorRange::caret(0)), Source::User);
        editor
            .change(Some(InputMode::Typing), |c| {
                c.insert(0, "Hello", None).select(EditorRange::caret(5));
            })
            .unwrap();
        editor
            .change(Some(InputMode::Typing), |c| {
                c.insert(5, " World", None).select(EditorRange::caret(11));
            })
            .unwrap();
        assert_eq!(editor.doc().text(), "Hello World\n");
        assert_eq!(editor.history().undo_len(), 1);

        assert!(editor.undo().unwrap());
        assert_eq!(editor.doc().to_delta(), Delta::new().insert("\n", None));
        assert_eq!(editor.selection(), Some(EditorRange::caret(0)));
        assert!(!editor.undo().unwrap());

        assert!(editor.redo().unwrap());
        assert_eq!(editor.doc().text(), "Hello World\n");
        assert_eq!(editor.selection(), Some(EditorRange::caret(11)));
    }

    #[test]
    fn test_delete_selection_and_undo() {
        let mut editor = Editor::with_defaults();
        editor
            .set_delta(&Delta::new().insert("Testing this out\n", None))
            .unwrap();
        editor.select(Some(EditorRange::new(2, 7)), Source::User);
        editor
            .change(Some(InputMode::Deleting), |c| {
                c.delete(2..7).select(EditorRange::caret(2));
            })
            .unwrap();
        assert_eq!(editor.doc().text(), "Te this out\n");

        editor.undo().unwrap();
        assert_eq!(editor.doc().text(), "Testing this out\n");
        assert_eq!(editor.selection(), Some(EditorRange::new(2, 7)));
    }

    #[test]
    fn test_selection_change_breaks_coalescing() {
        let mut editor = editor_with("ab\n");
        editor.select(Some(EditorRange::caret(2)), Source::User);
        for (at, text) in [(2, "c"), (3, "d")] {
            editor
                .change(Some(InputMode::Typing), |c| {
                    c.insert(at, text, None);
                })
                .unwrap();
        }
        assert_eq!(editor.history().undo_len(), 1);
        editor.select(Some(EditorRange::caret(0)), Source::User);
        editor
            .change(Some(InputMode::Typing), |c| {
                c.insert(0, "x", None);
            })
            .unwrap();
        assert_eq!(editor.history().undo_len(), 2);
    }

    #[test]
    fn test_selection_maps_through_changes() {
        let mut editor = editor_with("hello\n");
        editor.select(Some(EditorRange::new(1, 3)), Source::Api);
        editor
            .change(None, |c| {
                c.insert(0, ">> ", None);
            })
            .unwrap();
        assert_eq!(editor.selection(), Some(EditorRange::new(4, 6)));
    }

    #[test]
    fn test_events_follow_changes() {
        let mut editor = editor_with("ab\n");
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = log.clone();
        editor.on(EventKind::Change, move |event| {
            if let EditorEvent::Change(change) = event {
                seen.borrow_mut()
                    .push((change.old_doc.text(), change.doc.text(), change.source));
            }
        });
        let seen = log.clone();
        editor.on(EventKind::SelectionChange, move |event| {
            if let EditorEvent::SelectionChange { selection, .. } = event {
                seen.borrow_mut()
                    .push((format!("{selection:?}"), String::new(), Source::User));
            }
        });
        editor
            .change(None, |c| {
                c.insert(2, "c", None).select(EditorRange::caret(3));
            })
            .unwrap();
        editor.undo().unwrap();
        let log = log.borrow();
        assert_eq!(log[0], ("ab\n".into(), "abc\n".into(), Source::Api));
        assert_eq!(log[1].0, "Some(EditorRange { anchor: 3, focus: 3 })");
        assert_eq!(log[2], ("abc\n".into(), "ab\n".into(), Source::History));
        assert_eq!(log[3].0, "None");
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_out_of_bounds_change_is_rejected() {
        let mut editor = editor_with("ab\n");
        let err = editor
            .update(&Delta::new().retain(10, None).insert("x", None), None, None, Source::Api)
            .unwrap_err();
        assert!(matches!(err, EditorError::ChangeOutOfBounds { .. }));
        assert_eq!(editor.doc().text(), "ab\n");
        assert!(!editor.history().can_undo());
    }

    #[test]
    fn test_active_formats() {
        let mut editor = Editor::with_defaults();
        editor.reset(
            &Delta::new()
                .insert("bold", Some(attrs(json!({"bold": true}))))
                .insert("\n", Some(attrs(json!({"header": 2})))),
        );
        editor.select(Some(EditorRange::caret(2)), Source::User);
        assert_eq!(
            editor.get_active_formats(),
            attrs(json!({"header": 2, "bold": true}))
        );
        editor.select(None, Source::User);
        assert!(editor.get_active_formats().is_empty());
    }

    #[test]
    fn test_decorations_render_and_follow_edits() {
        let mut editor = editor_with("one\ntwo\n");
        editor.on(EventKind::Decorate, |event| {
            if let EditorEvent::Decorate { doc, decorations } = event {
                let _ = decorations
                    .decorator("first", *doc)
                    .line(0, attrs(json!({"class": "first"})))
                    .apply();
            }
        });
        let html = editor.render().unwrap().to_html();
        assert!(html.contains(r#"class="first""#));
        assert_eq!(editor.doc().lines()[0].attributes, Attributes::new());

        editor
            .change(None, |c| {
                c.insert(0, "zero\n", None);
            })
            .unwrap();
        let decorated = editor.decorated_doc().unwrap();
        assert!(decorated.lines()[1].attributes.contains_key("decorator"));
    }

    #[test]
    fn test_selection_on_frozen_line_snaps() {
        let mut editor = Editor::with_defaults();
        editor.reset(
            &Delta::new()
                .insert("a\n", None)
                .insert("\n", Some(attrs(json!({"hr": true}))))
                .insert("b\n", None),
        );
        editor.select(Some(EditorRange::caret(2)), Source::User);
        assert_eq!(editor.selection(), Some(EditorRange::new(2, 3)));
    }

    #[test]
    fn test_invalid_decoration_selector() {
        let config = EditorConfig {
            decoration_selector: "[".into(),
            ..EditorConfig::default()
        };
        assert!(matches!(
            Editor::new(default_paper(), config),
            Err(EditorError::InvalidSelector { .. })
        ));
    }
}
