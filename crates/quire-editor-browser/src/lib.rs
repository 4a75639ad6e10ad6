//! Browser DOM layer for the quire editor.
//!
//! This crate binds `quire-editor-core` to the live DOM. It assumes a
//! `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: `DomTree` over `web_sys::Node` with UTF-16 offsets
//! - `selection`: `NativeSelection` over `window.getSelection()`
//! - `events`: beforeinput parsing and dispatch
//! - `clipboard`: paste extraction from `DataTransfer`
//! - `render`: keyed patching of rendered blocks into the live root
//! - `schedule`: deferred and next-frame callbacks
//! - `view`: `EditorView`, mounting an editor on a root element
//! - `platform`: browser/OS detection and `PlatformError`
//!
//! # Re-exports
//!
//! This crate re-exports `quire-editor-core` for convenience, so consumers
//! only need to depend on `quire-editor-browser`.

// Re-export core crate
pub use quire_editor_core;
pub use quire_editor_core::*;

pub mod clipboard;
pub mod dom;
pub mod events;
pub mod platform;
pub mod render;
pub mod schedule;
pub mod selection;
pub mod view;

pub use clipboard::{BrowserClipboard, handle_paste};
pub use dom::BrowserDom;
pub use events::{
    BeforeInputContext, BeforeInputResult, StaticRange, get_data_from_event,
    get_target_range_from_event, handle_beforeinput, parse_browser_input_type,
};
pub use platform::{Platform, PlatformError, config_from_js, platform};
pub use render::patch_blocks;
pub use schedule::{defer, next_frame};
pub use selection::BrowserSelection;
pub use view::EditorView;

/// Install the panic hook and a `tracing-wasm` subscriber.
///
/// Safe to call more than once; only the first subscriber sticks.
pub fn init() {
    console_error_panic_hook::set_once();

    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    let _ = set_global_default(Registry::default().with(wasm_layer));
}
