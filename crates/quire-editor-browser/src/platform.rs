//! Platform detection and browser error handling.

use std::sync::OnceLock;

use quire_editor_core::{EditorConfig, EditorError};
use wasm_bindgen::JsValue;

/// A failed browser call, carrying the stringified `JsValue`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl From<&str> for PlatformError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<JsValue> for PlatformError {
    fn from(value: JsValue) -> Self {
        Self(
            value
                .as_string()
                .unwrap_or_else(|| format!("{value:?}")),
        )
    }
}

impl From<EditorError> for PlatformError {
    fn from(err: EditorError) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for PlatformError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        Self(err.to_string())
    }
}

/// Read an `EditorConfig` from a plain JS object. `undefined` and `null`
/// give the defaults.
pub fn config_from_js(value: JsValue) -> Result<EditorConfig, PlatformError> {
    if value.is_undefined() || value.is_null() {
        return Ok(EditorConfig::default());
    }
    Ok(serde_wasm_bindgen::from_value(value)?)
}

/// Cached platform detection results.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    pub ios: bool,
    pub mac: bool,
    pub android: bool,
    pub chrome: bool,
    pub safari: bool,
    pub gecko: bool,
    pub mobile: bool,
}

static PLATFORM: OnceLock<Platform> = OnceLock::new();

/// Get cached platform info. Detection runs once on first call.
pub fn platform() -> &'static Platform {
    PLATFORM.get_or_init(detect_platform)
}

fn detect_platform() -> Platform {
    let Some(window) = web_sys::window() else {
        return Platform::default();
    };

    let navigator = window.navigator();
    let user_agent = navigator.user_agent().unwrap_or_default().to_lowercase();
    let platform_str = navigator.platform().unwrap_or_default().to_lowercase();

    // iPadOS reports a Mac platform but has touch.
    let ios = user_agent.contains("iphone")
        || user_agent.contains("ipad")
        || user_agent.contains("ipod")
        || (platform_str.contains("mac") && navigator.max_touch_points() > 0);
    let mac = platform_str.contains("mac") && !ios;
    let android = user_agent.contains("android");
    // Edge also claims Chrome.
    let chrome = user_agent.contains("chrome") && !user_agent.contains("edg");
    let safari = user_agent.contains("safari") && !user_agent.contains("chrome");
    let gecko = user_agent.contains("gecko/") && !user_agent.contains("like gecko");
    let mobile = ios || android || user_agent.contains("mobile");

    Platform {
        ios,
        mac,
        android,
        chrome,
        safari,
        gecko,
        mobile,
    }
}
