//! Host-page loader: modal + iframe ownership and the public widget
//! surface.
//!
//! One [`WidgetInstance`] owns the overlay, the iframe, the Escape
//! handler, and the message listener for a page. The modal DOM is
//! created lazily on the first `open()` and reused across repeated
//! open/close cycles to avoid iframe reload flicker; only
//! [`destroy`](WidgetInstance::destroy) actually removes it.
//!
//! Closing blanks the iframe instead of aborting requests: clearing
//! the navigable context is the de facto cancellation mechanism for
//! whatever the embedded widget had in flight.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mirrorme_core::message::WidgetMessage;
use mirrorme_core::params::{self, ParsedDescriptor};
use mirrorme_core::types::{SessionDescriptor, WidgetError};
use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::channel::{self, MessageListener};
use crate::events::{EventEmitter, EventHandler, EventKind, WidgetEvent};

/// Class marking declarative try-on buttons for auto-init.
pub const MARKER_CLASS: &str = "mirrorme-button";

/// Per-element guard so repeated scans never double-wire a button.
const WIRED_ATTR: &str = "data-mirrorme-wired";

/// Marker attribute on the lazily injected stylesheet `<link>`.
const STYLE_ATTR: &str = "data-mirrorme-style";

/// Errors from host-side DOM work.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A browser API call returned an error or a required object was
    /// missing.
    #[error("browser API error: {0}")]
    JsError(String),
}

impl From<JsValue> for HostError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Instance configuration, merged over defaults at `init()` time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// URL of the embedded widget document.
    pub widget_url: String,
    /// URL of the widget stylesheet injected into the host page.
    pub stylesheet_url: String,
    /// Page-level merchant key, used when `open()` options omit one.
    pub merchant_key: Option<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            widget_url: "https://widget.mirrorme.app/embed".to_owned(),
            stylesheet_url: "https://widget.mirrorme.app/widget.css".to_owned(),
            merchant_key: None,
        }
    }
}

/// Partial config accepted by `init()` and `setConfig()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    /// Override for [`WidgetConfig::widget_url`].
    pub widget_url: Option<String>,
    /// Override for [`WidgetConfig::stylesheet_url`].
    pub stylesheet_url: Option<String>,
    /// Override for [`WidgetConfig::merchant_key`].
    pub merchant_key: Option<String>,
}

impl WidgetConfig {
    /// Merge a patch over this config, field by field.
    pub fn apply(&mut self, patch: ConfigPatch) {
        if let Some(url) = patch.widget_url {
            self.widget_url = url;
        }
        if let Some(url) = patch.stylesheet_url {
            self.stylesheet_url = url;
        }
        if let Some(key) = patch.merchant_key {
            self.merchant_key = Some(key);
        }
    }
}

/// The iframe URL for one session.
#[must_use]
pub fn widget_iframe_url(widget_url: &str, descriptor: &SessionDescriptor) -> String {
    format!("{widget_url}?{}", params::to_query_string(descriptor))
}

struct ModalDom {
    overlay: web_sys::HtmlElement,
    iframe: web_sys::HtmlIFrameElement,
}

struct InstanceState {
    config: RefCell<WidgetConfig>,
    session: RefCell<Option<SessionDescriptor>>,
    modal: RefCell<Option<ModalDom>>,
    open: Cell<bool>,
    events: EventEmitter,
    listener: RefCell<Option<MessageListener>>,
    // The keydown closure is created once and kept allocated for the
    // instance lifetime: close() runs inside it, so dropping it there
    // would tear down the closure mid-call. Registration is tracked
    // separately.
    escape: RefCell<Option<Closure<dyn FnMut(web_sys::KeyboardEvent)>>>,
    escape_attached: Cell<bool>,
}

/// A widget instance. Cheap to clone; clones share one state.
#[derive(Clone)]
pub struct WidgetInstance {
    state: Rc<InstanceState>,
}

impl WidgetInstance {
    /// Construct an instance. Touches no DOM.
    #[must_use]
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            state: Rc::new(InstanceState {
                config: RefCell::new(config),
                session: RefCell::new(None),
                modal: RefCell::new(None),
                open: Cell::new(false),
                events: EventEmitter::new(),
                listener: RefCell::new(None),
                escape: RefCell::new(None),
                escape_attached: Cell::new(false),
            }),
        }
    }

    /// Current config snapshot.
    #[must_use]
    pub fn config(&self) -> WidgetConfig {
        self.state.config.borrow().clone()
    }

    /// Merge a config patch. Takes effect on the next `open()`.
    pub fn set_config(&self, patch: ConfigPatch) {
        self.state.config.borrow_mut().apply(patch);
    }

    /// Subscribe to a widget event.
    pub fn on(&self, kind: EventKind, handler: EventHandler) {
        self.state.events.on(kind, handler);
    }

    /// Drop all handlers for one event.
    pub fn off(&self, kind: EventKind) {
        self.state.events.off(kind);
    }

    /// Whether the modal is currently visible.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.open.get()
    }

    /// The active session descriptor, while open.
    #[must_use]
    pub fn session(&self) -> Option<SessionDescriptor> {
        self.state.session.borrow().clone()
    }

    /// Open from a preflight outcome.
    ///
    /// A preflight failure (`NO_MERCHANT_KEY` / `NO_PRODUCT_IMAGE`)
    /// emits exactly one `error` event synchronously and returns
    /// without creating any UI. No partial modal is left behind.
    pub fn open_with(&self, parsed: Result<ParsedDescriptor, WidgetError>) {
        match parsed {
            Err(error) => self.state.events.emit(&WidgetEvent::Error(error)),
            Ok(ParsedDescriptor {
                descriptor,
                warnings,
            }) => {
                for warning in &warnings {
                    warn(&format!("mirrorme: {warning}"));
                }
                if let Err(error) = self.open(descriptor) {
                    warn(&format!("mirrorme: open failed: {error}"));
                }
            }
        }
    }

    /// Show the modal for a validated session.
    ///
    /// Re-invoking while already open is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when required DOM objects are missing or a
    /// DOM call fails. Nothing is left half-open: the modal only
    /// becomes visible after every setup step succeeded.
    pub fn open(&self, descriptor: SessionDescriptor) -> Result<(), HostError> {
        if self.state.open.get() {
            warn("mirrorme: open() ignored, widget is already open");
            return Ok(());
        }
        let document = document()?;
        ensure_stylesheet(&document, &self.state.config.borrow().stylesheet_url)?;
        self.ensure_modal(&document)?;
        self.attach_listener()?;
        self.attach_escape(&document)?;

        {
            let modal = self.state.modal.borrow();
            let modal = modal
                .as_ref()
                .ok_or_else(|| HostError::JsError("modal not created".into()))?;
            let url = widget_iframe_url(&self.state.config.borrow().widget_url, &descriptor);
            modal.iframe.set_src(&url);
            modal.overlay.style().set_property("display", "flex")?;
        }
        set_scroll_lock(&document, true);

        self.state.open.set(true);
        *self.state.session.borrow_mut() = Some(descriptor);
        self.state.events.emit(&WidgetEvent::Open);
        Ok(())
    }

    /// Hide the modal and abandon the embedded session.
    ///
    /// No-op when already closed. The iframe is pointed at
    /// `about:blank`, which abandons any in-flight work inside it.
    pub fn close(&self, reason: &str) {
        if !self.state.open.get() {
            return;
        }
        if let Some(modal) = self.state.modal.borrow().as_ref() {
            let _ = modal.overlay.style().set_property("display", "none");
            modal.iframe.set_src("about:blank");
        }
        if let Ok(document) = document() {
            set_scroll_lock(&document, false);
            self.detach_escape(&document);
        }
        self.state.open.set(false);
        *self.state.session.borrow_mut() = None;
        self.state.events.emit(&WidgetEvent::Close {
            reason: reason.to_owned(),
        });
    }

    /// Tear down all DOM, listeners, and subscriptions.
    pub fn destroy(&self) {
        self.close("destroy");
        if let Some(modal) = self.state.modal.borrow_mut().take() {
            modal.overlay.remove();
        }
        *self.state.listener.borrow_mut() = None;
        if let Ok(document) = document() {
            self.detach_escape(&document);
        }
        *self.state.escape.borrow_mut() = None;
        self.state.events.clear();
    }

    fn ensure_modal(&self, document: &web_sys::Document) -> Result<(), HostError> {
        if self.state.modal.borrow().is_some() {
            return Ok(());
        }

        let overlay: web_sys::HtmlElement = document
            .create_element("div")?
            .dyn_into()
            .map_err(|_| HostError::JsError("failed to create overlay".into()))?;
        overlay.set_class_name("mirrorme-overlay");
        let overlay_style = overlay.style();
        for (prop, value) in [
            ("position", "fixed"),
            ("inset", "0"),
            ("display", "none"),
            ("align-items", "center"),
            ("justify-content", "center"),
            ("background", "rgba(15, 17, 21, 0.65)"),
            ("z-index", "2147483000"),
        ] {
            overlay_style.set_property(prop, value)?;
        }

        let iframe: web_sys::HtmlIFrameElement = document
            .create_element("iframe")?
            .dyn_into()
            .map_err(|_| HostError::JsError("failed to create iframe".into()))?;
        iframe.set_class_name("mirrorme-frame");
        iframe.set_attribute("title", "MirrorMe virtual try-on")?;
        iframe.set_attribute("allow", "camera; clipboard-read")?;
        let iframe_style = iframe.style();
        for (prop, value) in [
            ("width", "420px"),
            ("height", "680px"),
            ("max-width", "94vw"),
            ("max-height", "92vh"),
            ("border", "none"),
            ("border-radius", "12px"),
            ("background", "#ffffff"),
        ] {
            iframe_style.set_property(prop, value)?;
        }

        overlay.append_child(&iframe)?;
        document
            .body()
            .ok_or_else(|| HostError::JsError("no document body".into()))?
            .append_child(&overlay)?;

        *self.state.modal.borrow_mut() = Some(ModalDom { overlay, iframe });
        Ok(())
    }

    fn attach_listener(&self) -> Result<(), HostError> {
        if self.state.listener.borrow().is_some() {
            return Ok(());
        }
        let expected_origin = channel::current_script_origin()
            .or_else(|| channel::origin_of(&self.state.config.borrow().widget_url))
            .ok_or_else(|| HostError::JsError("cannot determine widget origin".into()))?;
        let this = self.clone();
        let listener = MessageListener::attach(expected_origin, move |message| {
            this.handle_message(message);
        })
        .map_err(|e| HostError::JsError(e.to_string()))?;
        *self.state.listener.borrow_mut() = Some(listener);
        Ok(())
    }

    fn attach_escape(&self, document: &web_sys::Document) -> Result<(), HostError> {
        if self.state.escape.borrow().is_none() {
            let this = self.clone();
            let closure = Closure::<dyn FnMut(web_sys::KeyboardEvent)>::new(
                move |event: web_sys::KeyboardEvent| {
                    if event.key() == "Escape" {
                        this.close("escape");
                    }
                },
            );
            *self.state.escape.borrow_mut() = Some(closure);
        }
        if !self.state.escape_attached.get() {
            if let Some(closure) = self.state.escape.borrow().as_ref() {
                document
                    .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
                self.state.escape_attached.set(true);
            }
        }
        Ok(())
    }

    fn detach_escape(&self, document: &web_sys::Document) {
        if !self.state.escape_attached.get() {
            return;
        }
        if let Some(closure) = self.state.escape.borrow().as_ref() {
            let _ = document.remove_event_listener_with_callback(
                "keydown",
                closure.as_ref().unchecked_ref(),
            );
        }
        self.state.escape_attached.set(false);
    }

    /// Relay a validated widget message to the event surface.
    fn handle_message(&self, message: WidgetMessage) {
        match message {
            WidgetMessage::Ready => self.state.events.emit(&WidgetEvent::Ready),
            WidgetMessage::Close { reason } => self.close(&reason),
            WidgetMessage::Result(result) => {
                self.state.events.emit(&WidgetEvent::Result(result));
            }
            WidgetMessage::Error(error) => self.state.events.emit(&WidgetEvent::Error(error)),
            WidgetMessage::PhotoSelected { source } => {
                self.state.events.emit(&WidgetEvent::PhotoSelected { source });
            }
            WidgetMessage::ProcessingStart => {
                self.state.events.emit(&WidgetEvent::ProcessingStart);
            }
            WidgetMessage::ProcessingProgress { progress } => {
                self.state
                    .events
                    .emit(&WidgetEvent::ProcessingProgress { progress });
            }
            WidgetMessage::Resize { width, height } => self.apply_resize(width, height),
        }
    }

    fn apply_resize(&self, width: Option<f64>, height: Option<f64>) {
        if let Some(modal) = self.state.modal.borrow().as_ref() {
            let style = modal.iframe.style();
            if let Some(width) = width {
                let _ = style.set_property("width", &format!("{width}px"));
            }
            if let Some(height) = height {
                let _ = style.set_property("height", &format!("{height}px"));
            }
        }
    }
}

/// Wire every unwired `.mirrorme-button` element on the page.
///
/// Attributes are parsed through the declarative schema at click time,
/// so markup edits after wiring still take effect. Returns how many
/// elements were newly wired; elements already carrying the guard
/// attribute are skipped, so repeated scans are harmless.
///
/// # Errors
///
/// Returns [`HostError`] when the document is unavailable or listener
/// registration fails.
pub fn auto_init(instance: &WidgetInstance) -> Result<usize, HostError> {
    let document = document()?;
    let buttons = document.get_elements_by_class_name(MARKER_CLASS);
    let mut wired = 0;
    for index in 0..buttons.length() {
        let Some(element) = buttons.item(index) else {
            continue;
        };
        if element.has_attribute(WIRED_ATTR) {
            continue;
        }
        element.set_attribute(WIRED_ATTR, "true")?;

        let instance = instance.clone();
        let source = element.clone();
        let closure = Closure::<dyn FnMut()>::new(move || {
            let merchant_key = instance.config().merchant_key;
            let parsed = match params::from_attributes(|name| source.get_attribute(name)) {
                // A page-level merchant key from init() may stand in
                // for a missing data-merchant-key.
                Err(error)
                    if error.code == mirrorme_core::types::ErrorCode::NoMerchantKey
                        && merchant_key.is_some() =>
                {
                    params::from_attributes(|name| {
                        if name == "data-merchant-key" {
                            merchant_key.clone()
                        } else {
                            source.get_attribute(name)
                        }
                    })
                }
                other => other,
            };
            instance.open_with(parsed);
        });
        element.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget(); // leak — lives for the page lifetime
        wired += 1;
    }
    Ok(wired)
}

/// Inject the widget stylesheet once. Subsequent calls find the
/// existing `<link>` and do nothing.
fn ensure_stylesheet(document: &web_sys::Document, href: &str) -> Result<(), HostError> {
    if document
        .query_selector(&format!("link[{STYLE_ATTR}]"))?
        .is_some()
    {
        return Ok(());
    }
    let link: web_sys::HtmlLinkElement = document
        .create_element("link")?
        .dyn_into()
        .map_err(|_| HostError::JsError("failed to create link".into()))?;
    link.set_rel("stylesheet");
    link.set_href(href);
    link.set_attribute(STYLE_ATTR, "true")?;
    document
        .head()
        .ok_or_else(|| HostError::JsError("no document head".into()))?
        .append_child(&link)?;
    Ok(())
}

fn set_scroll_lock(document: &web_sys::Document, locked: bool) {
    if let Some(body) = document.body() {
        let style = body.style();
        if locked {
            let _ = style.set_property("overflow", "hidden");
        } else {
            let _ = style.remove_property("overflow");
        }
    }
}

fn document() -> Result<web_sys::Document, HostError> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| HostError::JsError("no document".into()))
}

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

#[cfg(test)]
mod tests {
    use mirrorme_core::types::ProductInfo;

    use super::*;

    #[test]
    fn config_patch_merges_field_by_field() {
        let mut config = WidgetConfig::default();
        config.apply(ConfigPatch {
            merchant_key: Some("mk_test_abc".to_owned()),
            ..ConfigPatch::default()
        });
        assert_eq!(config.merchant_key.as_deref(), Some("mk_test_abc"));
        // Unpatched fields keep their defaults.
        assert_eq!(config.widget_url, WidgetConfig::default().widget_url);

        config.apply(ConfigPatch {
            widget_url: Some("https://staging.mirrorme.app/embed".to_owned()),
            ..ConfigPatch::default()
        });
        assert_eq!(config.widget_url, "https://staging.mirrorme.app/embed");
        // A patch without merchant_key does not clear the existing one.
        assert_eq!(config.merchant_key.as_deref(), Some("mk_test_abc"));
    }

    #[test]
    fn iframe_url_carries_the_session_parameters() {
        let descriptor =
            SessionDescriptor::new("mk_test_abc", ProductInfo::from_image("https://x/y.jpg"));
        let url = widget_iframe_url("https://widget.mirrorme.app/embed", &descriptor);
        assert!(url.starts_with("https://widget.mirrorme.app/embed?"));
        assert!(url.contains("merchantKey=mk_test_abc"));
        assert!(url.contains("productImage=https%3A%2F%2Fx%2Fy.jpg"));
    }

    #[test]
    fn config_patch_deserializes_from_camel_case_json() {
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"stylesheetUrl": "https://cdn.example/w.css"}"#)
                .unwrap_or_default();
        assert_eq!(
            patch.stylesheet_url.as_deref(),
            Some("https://cdn.example/w.css"),
        );
        assert_eq!(patch.widget_url, None);
    }
}
