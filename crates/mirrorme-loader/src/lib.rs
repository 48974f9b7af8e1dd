//! Host-page loader entry point.
//!
//! This crate compiles to the standalone WASM module merchants embed
//! with a single `<script>` tag. It exposes the `MirrorMe` class to
//! JavaScript, registers an idempotent page-global marker so double
//! script injection is a no-op, and wires declarative
//! `.mirrorme-button` elements on DOM ready without requiring the page
//! to call `init`/`open` itself.
//!
//! The page global holds only the loaded-version tag; every other
//! piece of state (modal DOM, config, subscriptions) lives on
//! constructed [`MirrorMe`] instances.

use std::rc::Rc;

use mirrorme_core::params;
use mirrorme_io::events::{EventKind, WidgetEvent};
use mirrorme_io::host::{self, ConfigPatch, WidgetConfig, WidgetInstance};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Page-global flag recording the loaded loader version.
const LOADED_FLAG: &str = "__mirrormeLoaded";

/// Called automatically when the WASM module is instantiated.
///
/// Safe against double injection: the first load wins, later loads
/// return before touching anything.
#[wasm_bindgen(start)]
pub fn loader_main() {
    console_error_panic_hook::set_once();

    let Some(window) = web_sys::window() else {
        return;
    };
    let already_loaded = js_sys::Reflect::get(&window, &JsValue::from_str(LOADED_FLAG))
        .is_ok_and(|v| v.is_truthy());
    if already_loaded {
        return;
    }
    let _ = js_sys::Reflect::set(
        &window,
        &JsValue::from_str(LOADED_FLAG),
        &JsValue::from_str(env!("CARGO_PKG_VERSION")),
    );

    // Shared instance backing the declarative buttons. Pages that
    // construct their own MirrorMe instances are unaffected by it.
    let instance = WidgetInstance::new(WidgetConfig::default());
    schedule_auto_init(instance);
}

/// Scan for declarative buttons now and again once the DOM is parsed.
///
/// Both scans are cheap and idempotent (wired elements carry a guard
/// attribute), so running twice is simpler than querying readyState.
fn schedule_auto_init(instance: WidgetInstance) {
    run_auto_init(&instance);
    if let Some(document) = web_sys::window().and_then(|w| w.document()) {
        let closure = Closure::<dyn FnMut()>::new(move || run_auto_init(&instance));
        let _ = document
            .add_event_listener_with_callback("DOMContentLoaded", closure.as_ref().unchecked_ref());
        closure.forget(); // leak — lives for the page lifetime
    }
}

fn run_auto_init(instance: &WidgetInstance) {
    match host::auto_init(instance) {
        Ok(0) => {}
        Ok(wired) => log(&format!("mirrorme: wired {wired} try-on button(s)")),
        Err(e) => warn(&format!("mirrorme: auto-init failed: {e}")),
    }
}

/// The public widget API, reachable as `window.MirrorMe` through the
/// wasm-bindgen module glue.
#[wasm_bindgen]
pub struct MirrorMe {
    instance: WidgetInstance,
}

#[wasm_bindgen]
impl MirrorMe {
    /// `new MirrorMe(config)`: construct an instance with `config`
    /// merged over defaults. Touches no DOM.
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new(config: JsValue) -> Self {
        let mut widget_config = WidgetConfig::default();
        if let Some(patch) = parse_json::<ConfigPatch>(&config) {
            widget_config.apply(patch);
        }
        Self {
            instance: WidgetInstance::new(widget_config),
        }
    }

    /// Open the try-on modal for a product.
    ///
    /// Preflight failures (`NO_MERCHANT_KEY`, `NO_PRODUCT_IMAGE`) emit
    /// a single `error` event synchronously and create no UI.
    pub fn open(&self, options: JsValue) {
        let json = stringify(&options).unwrap_or_else(|| "{}".to_owned());
        let fallback_key = self.instance.config().merchant_key;
        self.instance
            .open_with(params::from_json(&json, fallback_key.as_deref()));
    }

    /// Close the modal. No-op when already closed.
    pub fn close(&self, reason: Option<String>) {
        self.instance.close(reason.as_deref().unwrap_or("api"));
    }

    /// Whether the modal is currently visible.
    #[wasm_bindgen(js_name = isOpen)]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.instance.is_open()
    }

    /// Snapshot of the active session descriptor, or `null`.
    #[wasm_bindgen(js_name = getSession)]
    #[must_use]
    pub fn get_session(&self) -> JsValue {
        self.instance
            .session()
            .and_then(|session| serde_json::to_string(&session).ok())
            .and_then(|json| js_sys::JSON::parse(&json).ok())
            .unwrap_or(JsValue::NULL)
    }

    /// Merge a partial config. Takes effect on the next `open()`.
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&self, partial: JsValue) {
        if let Some(patch) = parse_json::<ConfigPatch>(&partial) {
            self.instance.set_config(patch);
        } else {
            warn("mirrorme: setConfig() expects a config object");
        }
    }

    /// Tear down all DOM, listeners, and subscriptions.
    pub fn destroy(&self) {
        self.instance.destroy();
    }

    /// Subscribe a callback to a widget event.
    ///
    /// Callback exceptions are caught and logged individually, so one
    /// failing subscriber cannot block the others.
    pub fn on(&self, event: String, callback: js_sys::Function) {
        let Some(kind) = EventKind::from_name(&event) else {
            warn(&format!("mirrorme: unknown event {event:?}"));
            return;
        };
        self.instance.on(
            kind,
            Rc::new(move |widget_event: &WidgetEvent| {
                let payload = event_payload(widget_event);
                if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                    warn(&format!(
                        "mirrorme: {} handler threw: {e:?}",
                        widget_event.kind().as_str(),
                    ));
                }
            }),
        );
    }

    /// Drop every callback registered for one event.
    pub fn off(&self, event: String) {
        if let Some(kind) = EventKind::from_name(&event) {
            self.instance.off(kind);
        }
    }
}

/// The JS argument delivered to subscribers of each event.
fn event_payload(event: &WidgetEvent) -> JsValue {
    let json = match event {
        WidgetEvent::Ready | WidgetEvent::Open | WidgetEvent::ProcessingStart => None,
        WidgetEvent::Close { reason } => Some(serde_json::json!({ "reason": reason }).to_string()),
        WidgetEvent::Result(result) => serde_json::to_string(result).ok(),
        WidgetEvent::Error(error) => serde_json::to_string(error).ok(),
        WidgetEvent::PhotoSelected { source } => serde_json::to_string(source)
            .ok()
            .map(|s| format!(r#"{{"source":{s}}}"#)),
        WidgetEvent::ProcessingProgress { progress } => {
            Some(serde_json::json!({ "progress": progress }).to_string())
        }
    };
    json.and_then(|json| js_sys::JSON::parse(&json).ok())
        .unwrap_or(JsValue::UNDEFINED)
}

fn parse_json<T: serde::de::DeserializeOwned>(value: &JsValue) -> Option<T> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    let json = stringify(value)?;
    serde_json::from_str(&json).ok()
}

fn stringify(value: &JsValue) -> Option<String> {
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
}

fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}
