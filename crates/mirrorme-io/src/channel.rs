//! Cross-document message channel with origin checking.
//!
//! Both sides of the iframe boundary speak [`WidgetMessage`] envelopes
//! over `postMessage`. Sending targets a specific window with an
//! explicit target origin; receiving goes through [`MessageListener`],
//! which drops anything from an unexpected origin **before** looking at
//! the data. That drop is a security boundary, not mere filtering: a
//! well-formed `result` envelope from a foreign origin must have zero
//! effect on the host page.
//!
//! Malformed payloads for a known message type are logged and dropped
//! so one bad message cannot crash the channel. Envelopes with unknown
//! types, and unrelated `postMessage` traffic from other scripts on the
//! page, are ignored silently.

use mirrorme_core::message::{EnvelopeError, WidgetMessage};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Errors that can occur when sending on the channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The envelope could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(String),
    /// A browser API call returned an error or a required object was
    /// missing.
    #[error("browser API error: {0}")]
    JsError(String),
}

impl From<JsValue> for ChannelError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Post a message from the embedded widget to its host page.
///
/// `target_origin` restricts delivery to the host origin the widget
/// was opened from; the browser discards the message if the parent has
/// navigated elsewhere.
///
/// # Errors
///
/// Returns [`ChannelError`] if there is no parent window (the widget
/// is not embedded) or if `postMessage` itself fails.
pub fn post_to_parent(target_origin: &str, message: &WidgetMessage) -> Result<(), ChannelError> {
    let window =
        web_sys::window().ok_or_else(|| ChannelError::JsError("no global window".into()))?;
    let parent = window
        .parent()?
        .ok_or_else(|| ChannelError::JsError("no parent window".into()))?;
    post_to_window(&parent, target_origin, message)
}

/// Post a message to a specific window (host → iframe direction).
///
/// # Errors
///
/// Returns [`ChannelError`] if serialization or `postMessage` fails.
pub fn post_to_window(
    target: &web_sys::Window,
    target_origin: &str,
    message: &WidgetMessage,
) -> Result<(), ChannelError> {
    let data = to_js(message)?;
    target.post_message(&data, target_origin)?;
    Ok(())
}

/// Convert an envelope to a structured-cloneable JS object.
fn to_js(message: &WidgetMessage) -> Result<JsValue, ChannelError> {
    let json = message
        .to_json()
        .map_err(|e| ChannelError::Serialize(e.to_string()))?;
    js_sys::JSON::parse(&json).map_err(ChannelError::from)
}

/// A process-wide `message` listener bound to one expected origin.
///
/// Dropping the listener detaches it from the window, so the guard can
/// be held for exactly the time the widget is open.
pub struct MessageListener {
    window: web_sys::Window,
    closure: Closure<dyn FnMut(web_sys::MessageEvent)>,
}

impl MessageListener {
    /// Attach a listener that forwards validated envelopes to
    /// `handler`.
    ///
    /// Messages are dispatched only when all of the following hold:
    /// the event origin equals `expected_origin`, the data parses as an
    /// envelope, and the envelope's type is known with a well-formed
    /// payload. Origin mismatches are dropped without logging (hostile
    /// pages do not deserve a console feed of what was noticed).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if there is no window or the listener
    /// cannot be registered.
    pub fn attach(
        expected_origin: String,
        mut handler: impl FnMut(WidgetMessage) + 'static,
    ) -> Result<Self, ChannelError> {
        let window =
            web_sys::window().ok_or_else(|| ChannelError::JsError("no global window".into()))?;

        let closure = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(
            move |event: web_sys::MessageEvent| {
                if event.origin() != expected_origin {
                    return;
                }
                let Ok(json) = js_sys::JSON::stringify(&event.data()) else {
                    return;
                };
                let Some(json) = json.as_string() else {
                    return;
                };
                match WidgetMessage::parse(&json) {
                    Ok(Some(message)) => handler(message),
                    // Unknown tags are ignored by protocol design;
                    // non-envelope data is unrelated page traffic.
                    Ok(None) | Err(EnvelopeError::NotAnEnvelope(_)) => {}
                    Err(err @ EnvelopeError::MalformedPayload { .. }) => {
                        web_sys::console::warn_1(&JsValue::from_str(&format!(
                            "mirrorme: dropping message: {err}"
                        )));
                    }
                }
            },
        );
        window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())?;
        Ok(Self { window, closure })
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("message", self.closure.as_ref().unchecked_ref());
    }
}

/// Origin of the currently executing `<script>` tag, when available.
///
/// The loader script is served from the widget platform's domain, so
/// this is the origin embedded iframes are expected to post from.
#[must_use]
pub fn current_script_origin() -> Option<String> {
    let document = web_sys::window()?.document()?;
    let script = document.current_script()?;
    let script: web_sys::HtmlScriptElement = script.dyn_into().ok()?;
    origin_of(&script.src())
}

/// Origin component of an absolute URL.
#[must_use]
pub fn origin_of(url: &str) -> Option<String> {
    web_sys::Url::new(url).ok().map(|u| u.origin())
}
