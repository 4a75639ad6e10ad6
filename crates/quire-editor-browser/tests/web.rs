//! WASM browser tests for quire-editor-browser.
//!
//! Run with: `wasm-pack test --headless --firefox` or `--chrome`

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

use quire_editor_browser::clipboard::delta_from_html;
use quire_editor_browser::render::DomPatcher;
use quire_editor_browser::{
    BeforeInputContext, BeforeInputResult, BrowserDom, BrowserSelection, EditorView, Platform,
    config_from_js, handle_beforeinput, parse_browser_input_type, platform,
};
use quire_editor_core::{
    Delta, DomTree, Editor, EditorConfig, EditorRange, InputType, Source, TextDocument, attrs,
    default_paper, get_node_and_offset, get_node_and_offset_index, render_blocks, set_selection,
};
use serde_json::json;

fn make_editor(content: &str, selection: EditorRange) -> Editor {
    let mut editor = Editor::with_defaults();
    editor.reset(&Delta::new().insert(content, None));
    editor.select(Some(selection), Source::User);
    editor
}

fn ctx<'a>(input_type: InputType, data: Option<&str>, plat: &'a Platform) -> BeforeInputContext<'a> {
    BeforeInputContext {
        input_type,
        data: data.map(str::to_string),
        target_range: None,
        is_composing: false,
        platform: plat,
    }
}

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

fn div(html: &str) -> web_sys::HtmlElement {
    let el: web_sys::HtmlElement = document().create_element("div").unwrap().unchecked_into();
    el.set_inner_html(html);
    document().body().unwrap().append_child(&el).unwrap();
    el
}

// === InputType parsing tests ===

#[wasm_bindgen_test]
fn test_parse_insert_text() {
    assert_eq!(parse_browser_input_type("insertText"), InputType::InsertText);
}

#[wasm_bindgen_test]
fn test_input_modes_are_reexported() {
    use quire_editor_browser::{InputMode, input_mode};
    assert_eq!(
        input_mode(&parse_browser_input_type("deleteContentBackward")),
        Some(InputMode::Deleting)
    );
    assert_eq!(input_mode(&parse_browser_input_type("insertParagraph")), None);
}

#[wasm_bindgen_test]
fn test_parse_entire_soft_line() {
    assert_eq!(
        parse_browser_input_type("deleteEntireSoftLine"),
        InputType::DeleteSoftLineBackward
    );
}

#[wasm_bindgen_test]
fn test_parse_unknown() {
    match parse_browser_input_type("unknownType") {
        InputType::Unknown(s) => assert_eq!(s, "unknownType"),
        other => panic!("expected Unknown, got {other:?}"),
    }
}

#[wasm_bindgen_test]
fn test_platform_detection() {
    // Values depend on the browser running the test.
    let plat = platform();
    assert!(!(plat.mac && plat.ios));
}

#[wasm_bindgen_test]
fn test_config_from_js() {
    assert_eq!(
        config_from_js(wasm_bindgen::JsValue::UNDEFINED).unwrap(),
        EditorConfig::default()
    );
    let value = js_sys::JSON::parse(r#"{"history": {"maxUndo": 5}}"#).unwrap();
    let config = config_from_js(value).unwrap();
    assert_eq!(config.history.max_undo, 5);
    assert!(config.collapse_whitespace);
}

// === Live DOM tests ===

#[wasm_bindgen_test]
fn test_utf16_offsets() {
    let root = div("<p>a\u{1F600}b</p>");
    let text = root.first_child().unwrap().first_child().unwrap();
    assert!(BrowserDom.is_text(&text));
    assert_eq!(BrowserDom.text_len(&text), 3);
    assert_eq!(BrowserDom.to_dom_offset(&text, 2), 3);
    assert_eq!(BrowserDom.from_dom_offset(&text, 3), 2);
    assert_eq!(BrowserDom.to_dom_offset(&text, 3), 4);
}

#[wasm_bindgen_test]
fn test_offsets_on_live_dom() {
    let root = div("<p>ab</p><p>cd</p>");
    let root: web_sys::Node = root.into();
    let paper = default_paper();
    let (node, offset) = get_node_and_offset(&BrowserDom, &root, &paper, 4);
    let node = node.unwrap();
    assert_eq!(node.node_value().as_deref(), Some("cd"));
    assert_eq!(offset, 1);
    assert_eq!(get_node_and_offset_index(&BrowserDom, &root, &paper, &node, 1), 4);
}

#[wasm_bindgen_test]
fn test_patcher_reuses_unchanged_blocks() {
    let root: web_sys::Node = div("").into();
    let paper = default_paper();
    let doc = TextDocument::from_text("one\ntwo\n");
    let mut patcher = DomPatcher::new();
    let built = patcher
        .patch(&document(), &root, render_blocks(&doc, &paper))
        .unwrap();
    assert_eq!(built, 2);
    let first = root.first_child().unwrap();

    let edited = doc
        .apply(&Delta::new().retain(5, None).insert("!", None))
        .unwrap();
    let built = patcher
        .patch(&document(), &root, render_blocks(&edited, &paper))
        .unwrap();
    assert_eq!(built, 1);
    assert_eq!(root.first_child().unwrap(), first);
    assert_eq!(root.child_nodes().length(), 2);
    assert_eq!(root.text_content().as_deref(), Some("onet!wo"));
}

#[wasm_bindgen_test]
fn test_mount_renders_document() {
    let root = div("");
    let editor = Rc::new(RefCell::new(make_editor("hello\n", EditorRange::caret(0))));
    let view = EditorView::mount(root.clone(), editor.clone()).unwrap();
    assert_eq!(root.get_attribute("contenteditable").as_deref(), Some("true"));
    assert_eq!(root.text_content().as_deref(), Some("hello"));

    editor
        .borrow_mut()
        .set_delta(&Delta::new().insert("bye\n", None))
        .unwrap();
    view.render();
    assert_eq!(root.text_content().as_deref(), Some("bye"));
}

#[wasm_bindgen_test]
fn test_caret_on_rule_is_widened_in_dom() {
    let root = div("");
    let mut editor = Editor::with_defaults();
    editor.reset(
        &Delta::new()
            .insert("a\n", None)
            .insert("\n", Some(attrs(json!({"hr": true}))))
            .insert("b\n", None),
    );
    let editor = Rc::new(RefCell::new(editor));
    let view = EditorView::mount(root.clone(), editor.clone()).unwrap();

    let root_node: web_sys::Node = root.into();
    let mut native = BrowserSelection::global().unwrap();
    assert!(set_selection(
        &BrowserDom,
        &root_node,
        &default_paper(),
        &mut native,
        Some(EditorRange::caret(2)),
    ));
    view.read_selection();

    assert_eq!(editor.borrow().selection(), Some(EditorRange::new(2, 3)));
    let selection = web_sys::window().unwrap().get_selection().unwrap().unwrap();
    assert!(!selection.is_collapsed());
}

#[wasm_bindgen_test]
fn test_html_paste_extraction() {
    let editor = Editor::with_defaults();
    let delta = delta_from_html(
        &document(),
        &editor,
        "<p><strong>a</strong>b</p><h1>c</h1>",
    )
    .unwrap();
    assert_eq!(
        delta,
        Delta::new()
            .insert("a", Some(attrs(json!({"bold": true}))))
            .insert("b\n", None)
            .insert("c", None)
            .insert("\n", Some(attrs(json!({"header": 1}))))
    );
}

// === BeforeInput handler tests ===

#[wasm_bindgen_test]
fn test_handle_insert_text() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform::default();
    let result = handle_beforeinput(&mut editor, &ctx(InputType::InsertText, Some(" world"), &plat));
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hello world\n");
    assert_eq!(editor.selection(), Some(EditorRange::caret(11)));
}

#[wasm_bindgen_test]
fn test_handle_delete_backward() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform::default();
    let result = handle_beforeinput(&mut editor, &ctx(InputType::DeleteContentBackward, None, &plat));
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hell\n");
}

#[wasm_bindgen_test]
fn test_noop_delete_is_still_handled() {
    let mut editor = make_editor("hello\n", EditorRange::caret(0));
    let plat = Platform::default();
    let result = handle_beforeinput(&mut editor, &ctx(InputType::DeleteContentBackward, None, &plat));
    // The DOM stays owned by the editor even when nothing changed.
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hello\n");
    assert!(!editor.history().can_undo());
}

#[wasm_bindgen_test]
fn test_handle_composition_passthrough() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform::default();
    let mut context = ctx(InputType::InsertText, Some("x"), &plat);
    context.is_composing = true;
    let result = handle_beforeinput(&mut editor, &context);
    assert_eq!(result.unwrap(), BeforeInputResult::PassThrough);
    assert_eq!(editor.doc().text(), "hello\n");
}

#[wasm_bindgen_test]
fn test_handle_undo_redo() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform::default();

    handle_beforeinput(&mut editor, &ctx(InputType::InsertText, Some(" world"), &plat)).unwrap();
    assert_eq!(editor.doc().text(), "hello world\n");

    let result = handle_beforeinput(&mut editor, &ctx(InputType::HistoryUndo, None, &plat));
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hello\n");

    let result = handle_beforeinput(&mut editor, &ctx(InputType::HistoryRedo, None, &plat));
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hello world\n");
}

#[wasm_bindgen_test]
fn test_handle_insert_paragraph() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform::default();
    let result = handle_beforeinput(&mut editor, &ctx(InputType::InsertParagraph, None, &plat));
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hello\n\n");
    assert_eq!(editor.doc().line_count(), 2);
}

#[wasm_bindgen_test]
fn test_handle_target_range_delete() {
    let mut editor = make_editor("hello world\n", EditorRange::caret(0));
    let plat = Platform::default();
    let mut context = ctx(InputType::DeleteContentBackward, None, &plat);
    context.target_range = Some(EditorRange::new(5, 11));
    let result = handle_beforeinput(&mut editor, &context);
    assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    assert_eq!(editor.doc().text(), "hello\n");
}

#[wasm_bindgen_test]
fn test_backspaces_with_target_ranges_coalesce() {
    let mut editor = make_editor("abcdef\n", EditorRange::caret(6));
    let plat = Platform::default();
    for (start, end) in [(5, 6), (4, 5), (3, 4)] {
        let mut context = ctx(InputType::DeleteContentBackward, None, &plat);
        context.target_range = Some(EditorRange::new(start, end));
        let result = handle_beforeinput(&mut editor, &context);
        assert_eq!(result.unwrap(), BeforeInputResult::Handled);
    }
    assert_eq!(editor.doc().text(), "abc\n");
    assert_eq!(editor.selection(), Some(EditorRange::caret(3)));
    assert_eq!(editor.history().undo_len(), 1);
}

#[wasm_bindgen_test]
fn test_backspace_across_lines_runs_from_caret() {
    let mut editor = Editor::with_defaults();
    editor.reset(
        &Delta::new()
            .insert("a\nb", None)
            .insert("\n", Some(attrs(json!({"header": 1})))),
    );
    editor.select(Some(EditorRange::caret(2)), Source::User);
    let plat = Platform::default();
    let mut context = ctx(InputType::DeleteContentBackward, None, &plat);
    context.target_range = Some(EditorRange::new(1, 2));
    handle_beforeinput(&mut editor, &context).unwrap();
    // The header format goes first, the lines stay apart.
    assert_eq!(editor.doc().text(), "a\nb\n");
    assert_eq!(editor.doc().line_count(), 2);
}

#[wasm_bindgen_test]
fn test_android_backspace_with_target_range_is_deferred() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform {
        android: true,
        chrome: true,
        ..Platform::default()
    };
    let mut context = ctx(InputType::DeleteContentBackward, None, &plat);
    context.target_range = Some(EditorRange::new(4, 5));
    assert_eq!(
        handle_beforeinput(&mut editor, &context).unwrap(),
        BeforeInputResult::DeferredCheck {
            fallback: InputType::DeleteContentBackward
        }
    );
    assert_eq!(editor.selection(), Some(EditorRange::caret(5)));
}

#[wasm_bindgen_test]
fn test_android_backspace_is_deferred() {
    let mut editor = make_editor("hello\n", EditorRange::caret(5));
    let plat = Platform {
        android: true,
        chrome: true,
        ..Platform::default()
    };
    let result = handle_beforeinput(&mut editor, &ctx(InputType::DeleteContentBackward, None, &plat));
    assert_eq!(
        result.unwrap(),
        BeforeInputResult::DeferredCheck {
            fallback: InputType::DeleteContentBackward
        }
    );
    assert_eq!(editor.doc().text(), "hello\n");
}
