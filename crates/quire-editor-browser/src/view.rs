//! Mounting an editor on a live root element.
//!
//! The view owns the DOM side: it renders the editor's document into the
//! root, keeps the native selection and the editor's selection in sync and
//! routes DOM events into the editor. The editor is shared as
//! `Rc<RefCell<Editor>>` and only borrowed inside event callbacks and the
//! re-checks they schedule.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo_events::{EventListener, EventListenerOptions};
use quire_editor_core::{
    Editor, EditorError, EditorRange, EventKind, ExtractOptions, InputType, ListenerId, Paper,
    SelectionBridge, Shortcut, Source, TextDocument, delta_from_dom, execute_input,
    handle_shortcut, input_mode, render_blocks,
};
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, Node};

use crate::clipboard::{handle_copy, handle_cut, handle_paste};
use crate::dom::BrowserDom;
use crate::events::{BeforeInputContext, BeforeInputResult, handle_beforeinput};
use crate::platform::{PlatformError, platform};
use crate::render::DomPatcher;
use crate::schedule::defer;
use crate::selection::BrowserSelection;

struct ViewInner {
    editor: Rc<RefCell<Editor>>,
    root: HtmlElement,
    document: Document,
    selection: RefCell<SelectionBridge<BrowserSelection>>,
    patcher: RefCell<DomPatcher>,
    /// Set by the editor's change listener, cleared by render.
    dirty: Rc<Cell<bool>>,
    mouse_down: Cell<bool>,
    composing: Cell<bool>,
}

/// An editor mounted on a contenteditable root.
pub struct EditorView {
    inner: Rc<ViewInner>,
    change_listener: ListenerId,
    _listeners: Vec<EventListener>,
}

impl std::fmt::Debug for EditorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorView")
            .field("root", &self.inner.root.id())
            .field("listeners", &self._listeners.len())
            .finish()
    }
}

impl EditorView {
    /// Make `root` editable, render the editor into it and start listening.
    pub fn mount(root: HtmlElement, editor: Rc<RefCell<Editor>>) -> Result<Self, PlatformError> {
        let window = web_sys::window().ok_or_else(|| PlatformError::from("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| PlatformError::from("no document"))?;
        root.set_attribute("contenteditable", "true")?;

        let dirty = Rc::new(Cell::new(true));
        let change_listener = {
            let dirty = dirty.clone();
            editor
                .borrow_mut()
                .on(EventKind::Change, move |_| dirty.set(true))
        };

        let inner = Rc::new(ViewInner {
            editor,
            root,
            document,
            selection: RefCell::new(SelectionBridge::new(BrowserSelection::new(window.clone()))),
            patcher: RefCell::new(DomPatcher::new()),
            dirty,
            mouse_down: Cell::new(false),
            composing: Cell::new(false),
        });
        inner.render();

        let listeners = inner.listen(&window);
        tracing::debug!(listeners = listeners.len(), "mounted editor view");
        Ok(Self {
            inner,
            change_listener,
            _listeners: listeners,
        })
    }

    pub fn editor(&self) -> Rc<RefCell<Editor>> {
        self.inner.editor.clone()
    }

    pub fn root(&self) -> &HtmlElement {
        &self.inner.root
    }

    /// Re-render after changes made through the editor API.
    pub fn render(&self) {
        self.inner.render();
    }

    /// Stop reading and writing the native selection, e.g. while a modal
    /// overlay has focus.
    pub fn pause_selection(&self) -> Result<(), EditorError> {
        self.inner.selection.borrow_mut().pause()
    }

    /// Resume selection sync and restore the editor's selection.
    pub fn resume_selection(&self) -> Result<(), EditorError> {
        self.inner.selection.borrow_mut().resume()?;
        self.inner.write_selection();
        Ok(())
    }

    /// Pull the native selection into the editor.
    pub fn read_selection(&self) {
        self.inner.read_selection();
    }

    /// Pull the document and selection back out of the DOM.
    pub fn sync_from_dom(&self) {
        self.inner.sync_from_dom(None);
    }
}

impl Drop for EditorView {
    fn drop(&mut self) {
        match self.inner.editor.try_borrow_mut() {
            Ok(mut editor) => {
                editor.off(self.change_listener);
            }
            Err(_) => tracing::warn!("editor busy, change listener left registered"),
        }
    }
}

impl ViewInner {
    fn root_node(&self) -> &Node {
        self.root.as_ref()
    }

    fn listen(self: &Rc<Self>, window: &web_sys::Window) -> Vec<EventListener> {
        let prevent = EventListenerOptions::enable_prevent_default();
        let mut listeners = Vec::new();

        let view = self.clone();
        listeners.push(EventListener::new_with_options(
            &self.root,
            "beforeinput",
            prevent,
            move |event| {
                if let Some(event) = event.dyn_ref::<web_sys::InputEvent>() {
                    view.on_beforeinput(event);
                }
            },
        ));

        let view = self.clone();
        listeners.push(EventListener::new(&self.root, "input", move |_| {
            if !view.composing.get() {
                let view = view.clone();
                defer(move || view.sync_from_dom(None));
            }
        }));

        let view = self.clone();
        listeners.push(EventListener::new(&self.root, "compositionstart", move |_| {
            view.composing.set(true);
        }));

        let view = self.clone();
        listeners.push(EventListener::new(&self.root, "compositionend", move |_| {
            view.composing.set(false);
            let view = view.clone();
            defer(move || view.sync_from_dom(None));
        }));

        let view = self.clone();
        listeners.push(EventListener::new_with_options(
            &self.root,
            "keydown",
            prevent,
            move |event| {
                if let Some(event) = event.dyn_ref::<web_sys::KeyboardEvent>() {
                    view.on_keydown(event);
                }
            },
        ));

        for name in ["paste", "copy", "cut"] {
            let view = self.clone();
            listeners.push(EventListener::new_with_options(
                &self.root,
                name,
                prevent,
                move |event| {
                    if let Some(event) = event.dyn_ref::<web_sys::ClipboardEvent>() {
                        view.on_clipboard(name, event);
                    }
                },
            ));
        }

        let view = self.clone();
        listeners.push(EventListener::new(&self.root, "mousedown", move |_| {
            view.mouse_down.set(true);
        }));

        // Selection settles only after mouseup, wherever the pointer ends up.
        let view = self.clone();
        listeners.push(EventListener::new(window, "mouseup", move |_| {
            if view.mouse_down.replace(false) {
                let view = view.clone();
                defer(move || view.read_selection());
            }
        }));

        let view = self.clone();
        listeners.push(EventListener::new(&self.document, "selectionchange", move |_| {
            if !view.mouse_down.get() && !view.composing.get() {
                view.read_selection();
            }
        }));

        let view = self.clone();
        listeners.push(EventListener::new(window, "focus", move |_| {
            view.read_selection();
        }));

        let view = self.clone();
        listeners.push(EventListener::new(window, "blur", move |_| {
            if let Ok(mut editor) = view.editor.try_borrow_mut() {
                editor.history_mut().break_coalescing();
            }
        }));

        listeners
    }

    // === Rendering ===

    fn render(&self) {
        let blocks = {
            let mut editor = self.editor.borrow_mut();
            editor.decorate();
            match editor.decorated_doc() {
                Ok(doc) => render_blocks(&doc, editor.paper()),
                Err(e) => {
                    tracing::warn!("decorations rejected, rendering without them: {}", e);
                    render_blocks(editor.doc(), editor.paper())
                }
            }
        };
        let patched = self
            .patcher
            .borrow_mut()
            .patch(&self.document, self.root_node(), blocks);
        if let Err(e) = patched {
            tracing::warn!("render failed: {}", e);
            self.patcher.borrow_mut().invalidate();
        }
        self.dirty.set(false);
        self.write_selection();
    }

    /// Render if the document changed, otherwise only move the native
    /// selection.
    fn after_edit(&self) {
        if self.dirty.get() {
            self.render();
        } else {
            self.write_selection();
        }
    }

    // === Selection ===

    fn write_selection(&self) {
        let editor = self.editor.borrow();
        self.selection.borrow_mut().write(
            &BrowserDom,
            self.root_node(),
            editor.paper(),
            editor.selection(),
        );
    }

    fn dom_selection(&self, paper: &Paper) -> Option<EditorRange> {
        self.selection
            .borrow()
            .read(&BrowserDom, self.root_node(), paper)
    }

    /// Pull the native selection into the editor. A range the editor
    /// snapped, e.g. onto a frozen line, is written back to the DOM.
    fn read_selection(&self) {
        if self.selection.borrow().is_paused() {
            return;
        }
        let snapped = {
            let Ok(mut editor) = self.editor.try_borrow_mut() else {
                return;
            };
            let range = self.dom_selection(editor.paper());
            editor.select(range, Source::User);
            range.is_some() && editor.selection() != range
        };
        if snapped {
            self.write_selection();
        }
    }

    /// Fold edits the browser made on its own back into the editor, then
    /// re-render from the model. With `fallback`, an unchanged DOM means
    /// the browser dropped the input and `fallback` runs instead.
    fn sync_from_dom(&self, fallback: Option<InputType>) {
        let result = {
            let mut editor = self.editor.borrow_mut();
            let options = ExtractOptions::from(editor.config());
            let extracted = delta_from_dom(&BrowserDom, self.root_node(), editor.paper(), &options);
            let change = editor.doc().diff(&TextDocument::from_delta(&extracted));
            let selection = self.dom_selection(editor.paper());
            match fallback {
                Some(input) if change.is_empty() => {
                    tracing::debug!(?input, "browser ignored input, running fallback");
                    execute_input(&mut editor, &input, None)
                }
                _ => editor.update(&change, selection, None, Source::User),
            }
        };
        match result {
            Ok(true) => {
                self.patcher.borrow_mut().invalidate();
                self.render();
            }
            Ok(false) => self.write_selection(),
            Err(e) => {
                tracing::warn!("could not read edits back from the DOM: {}", e);
                self.patcher.borrow_mut().invalidate();
                self.render();
            }
        }
    }

    // === Events ===

    fn on_beforeinput(self: &Rc<Self>, event: &web_sys::InputEvent) {
        let result = {
            let mut editor = self.editor.borrow_mut();
            let ctx = BeforeInputContext::from_event(event, self.root_node(), editor.paper(), platform());
            tracing::trace!(input = ?ctx.input_type, mode = ?input_mode(&ctx.input_type), "beforeinput");
            handle_beforeinput(&mut editor, &ctx)
        };
        match result {
            Ok(BeforeInputResult::Handled) => {
                event.prevent_default();
                self.after_edit();
            }
            Ok(BeforeInputResult::PassThrough) => {}
            Ok(BeforeInputResult::DeferredCheck { fallback }) => {
                let view = self.clone();
                defer(move || view.sync_from_dom(Some(fallback)));
            }
            Err(e) => {
                event.prevent_default();
                tracing::warn!("input failed: {}", e);
            }
        }
    }

    fn on_keydown(&self, event: &web_sys::KeyboardEvent) {
        if event.is_composing() {
            return;
        }
        let shortcut = Shortcut::from_key_event(
            &event.key(),
            event.ctrl_key(),
            event.alt_key(),
            event.shift_key(),
            event.meta_key(),
            platform().mac,
        );
        let handled = handle_shortcut(&mut self.editor.borrow_mut(), &shortcut);
        match handled {
            Ok(true) => {
                event.prevent_default();
                self.after_edit();
            }
            Ok(false) => {}
            Err(e) => {
                event.prevent_default();
                tracing::warn!(%shortcut, "shortcut failed: {}", e);
            }
        }
    }

    fn on_clipboard(&self, name: &str, event: &web_sys::ClipboardEvent) {
        let result = {
            let mut editor = self.editor.borrow_mut();
            match name {
                "paste" => handle_paste(&mut editor, event, &self.document),
                "cut" => handle_cut(&mut editor, event),
                _ => Ok(handle_copy(&editor, event)),
            }
        };
        match result {
            Ok(_) => self.after_edit(),
            Err(e) => tracing::warn!("{} failed: {}", name, e),
        }
    }
}
