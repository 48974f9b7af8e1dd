//! Lightweight Simple Analytics event tracking.
//!
//! Calls the global `sa_event` function injected by the Simple
//! Analytics `<script>` tag.  All functions silently no-op when the
//! script is absent (e.g., blocked by an ad-blocker or during tests).
//!
//! Event names follow Simple Analytics conventions: lowercase
//! alphanumeric with underscores, max 200 characters.

use wasm_bindgen::prelude::*;

/// Fire a Simple Analytics custom event.
///
/// Silently does nothing when the analytics script is absent.
fn track_event(name: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Ok(func) = js_sys::Reflect::get(&window, &JsValue::from_str("sa_event")) else {
        return;
    };
    if !func.is_function() {
        return;
    }
    let func: js_sys::Function = func.unchecked_into();
    let _ = func.call1(&JsValue::NULL, &JsValue::from_str(name));
}

/// Record a widget lifecycle event (e.g., `"open"`, `"result"`).
///
/// Fires an event named `widget_<name>` (e.g., `widget_open`).
///
/// # Panics (debug only)
///
/// Debug-asserts that `name` is lowercase alphanumeric/underscore and
/// that the resulting event name fits within the 200-character limit.
pub fn track_widget(name: &str) {
    debug_assert!(
        name.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'),
        "event name must be lowercase alphanumeric or underscore, got: {name:?}"
    );
    let name = format!("widget_{name}");
    debug_assert!(
        name.len() <= 200,
        "event name exceeds 200-character limit: {name:?}"
    );
    track_event(&name);
}

/// Record a completed progressive studio run with its step count.
///
/// Fires an event named `studio_run_<steps>` capped at 9 steps so the
/// event namespace stays bounded.
pub fn track_studio_run(steps: usize) {
    let steps = steps.min(9);
    track_event(&format!("studio_run_{steps}"));
}
