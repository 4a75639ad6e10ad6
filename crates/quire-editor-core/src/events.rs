//! Editor events and the per-editor listener registry.

use std::collections::HashMap;
use std::fmt;

use crate::decorations::Decorations;
use crate::delta::Delta;
use crate::document::TextDocument;
use crate::types::{EditorRange, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    SelectionChange,
    Decorate,
}

/// A committed document change.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent<'a> {
    pub old_doc: &'a TextDocument,
    pub doc: &'a TextDocument,
    pub change: &'a Delta,
    pub old_selection: Option<EditorRange>,
    pub selection: Option<EditorRange>,
    pub source: Source,
}

#[derive(Debug)]
pub enum EditorEvent<'a> {
    Change(ChangeEvent<'a>),
    SelectionChange {
        old: Option<EditorRange>,
        selection: Option<EditorRange>,
        source: Source,
    },
    /// Sent before rendering so listeners can (re)build their overlays.
    Decorate {
        doc: &'a TextDocument,
        decorations: &'a mut Decorations,
    },
}

impl EditorEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            EditorEvent::Change(_) => EventKind::Change,
            EditorEvent::SelectionChange { .. } => EventKind::SelectionChange,
            EditorEvent::Decorate { .. } => EventKind::Decorate,
        }
    }
}

/// Handle returned by [`Dispatcher::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&mut EditorEvent<'_>)>;

/// Listeners owned by one editor, called in registration order.
#[derive(Default)]
pub struct Dispatcher {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self
            .listeners
            .iter()
            .map(|(kind, listeners)| (kind, listeners.len()))
            .collect();
        f.debug_struct("Dispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&mut EditorEvent<'_>) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(index) = listeners.iter().position(|(l, _)| *l == id) {
                let _listener = listeners.remove(index);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn emit(&mut self, event: &mut EditorEvent<'_>) {
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in listeners.iter_mut() {
                listener(event);
            }
        }
    }
}
