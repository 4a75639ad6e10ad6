//! quire-editor-core: structured-text editor logic without browser dependencies.
//!
//! This crate provides:
//! - `Delta` change-log algebra and the line-oriented `TextDocument`
//! - `Paper`/`Typeset` - registry of block, mark and embed types
//! - Offset↔DOM mapping and DOM→document extraction over any `DomTree`
//! - Decoration overlays, the selection bridge and transactional history
//! - `Editor` - the facade tying them together, plus input dispatch

pub mod change;
pub mod config;
pub mod decorations;
pub mod defaults;
pub mod delta;
pub mod document;
pub mod dom;
pub mod editing;
pub mod editor;
pub mod error;
pub mod events;
pub mod extract;
pub mod history;
pub mod input;
pub mod position;
pub mod render;
pub mod selection;
pub mod selector;
pub mod types;
pub mod typeset;

pub use change::TextChange;
pub use config::{EditorConfig, HistoryConfig};
pub use decorations::{DECORATOR_KEY, Decorations, Decorator, WIDGET_KEY, validate_decoration};
pub use defaults::default_paper;
pub use delta::{Attributes, Delta, Insert, Op, attrs};
pub use document::{Line, TextDocument};
pub use dom::{DomTree, ElementView, Fragment, NodeId, NodeKind};
pub use editing::DeleteUnit;
pub use editor::Editor;
pub use error::{EditorError, Result};
pub use events::{ChangeEvent, Dispatcher, EditorEvent, EventKind, ListenerId};
pub use extract::{ExtractOptions, delta_from_dom};
pub use history::{Command, History, UndoOutcome, diff_lines};
pub use input::{
    InputType, Shortcut, execute_input, handle_shortcut, input_mode, paste_delta, paste_html,
    paste_text,
};
pub use position::{
    get_line_element_at, get_node_and_offset, get_node_and_offset_index, get_node_index,
};
pub use render::{
    DECORATION_ATTR, LINE_ID_ATTR, RenderedBlock, VNode, render_blocks, render_document, render_line,
};
pub use selection::{
    NativeRange, NativeSelection, SelectionBridge, dom_position, get_selection, set_selection,
    snap_to_frozen,
};
pub use smol_str::SmolStr;
pub use typeset::{Paper, TypeDef, Typeset};
pub use types::{EditorRange, InputMode, Source};
