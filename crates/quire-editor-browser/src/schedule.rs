//! Deferred re-checks posted to the host event loop.
//!
//! `defer` runs after the current event and any native default action
//! (a `setTimeout(fn, 0)`), so the DOM and selection it reads are settled.
//! `next_frame` runs before the next paint, after layout.

use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::platform::PlatformError;

/// Run `f` once the current event has finished.
pub fn defer<F>(f: F)
where
    F: FnOnce() + 'static,
{
    Timeout::new(0, f).forget();
}

/// Run `f` on the next animation frame.
pub fn next_frame<F>(f: F) -> Result<(), PlatformError>
where
    F: FnOnce() + 'static,
{
    let window = web_sys::window().ok_or_else(|| PlatformError::from("no window"))?;
    let closure = Closure::once(f);
    window.request_animation_frame(closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}
