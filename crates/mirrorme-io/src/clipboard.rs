//! Clipboard read via the browser Clipboard API.
//!
//! Backs the "paste a photo link" affordance in the photo step: the
//! shopper copies an image URL (e.g. from their own cloud gallery) and
//! the widget feeds it into the model-URL acquisition path. Requires a
//! browser environment and a user-gesture context (i.e., called from a
//! click handler).

use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Errors that can occur when accessing the clipboard.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// A browser API call returned an error or a required object was
    /// missing.
    #[error("clipboard API error: {0}")]
    JsError(String),
    /// The clipboard text does not look like an image URL.
    #[error("clipboard does not contain a link")]
    NotALink,
}

impl From<JsValue> for ClipboardError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Read an `http(s)` URL from the system clipboard.
///
/// Wraps [`navigator.clipboard.readText()`][mdn].
///
/// # Errors
///
/// Returns [`ClipboardError::JsError`] if the browser window,
/// navigator, or clipboard object is unavailable, or if the read
/// operation fails (e.g., the page lacks clipboard-read permission).
/// Returns [`ClipboardError::NotALink`] when the clipboard holds
/// something other than an absolute `http(s)` URL.
///
/// [mdn]: https://developer.mozilla.org/en-US/docs/Web/API/Clipboard/readText
#[allow(clippy::future_not_send)] // WASM is single-threaded; Clipboard is !Send
pub async fn read_photo_url() -> Result<String, ClipboardError> {
    let clipboard = get_clipboard()?;
    let promise = clipboard.read_text();
    let value = JsFuture::from(promise).await?;
    let text = value
        .as_string()
        .ok_or_else(|| ClipboardError::JsError("readText() did not return a string".into()))?;
    let text = text.trim().to_owned();
    if text.starts_with("http://") || text.starts_with("https://") {
        Ok(text)
    } else {
        Err(ClipboardError::NotALink)
    }
}

/// Obtain the `Clipboard` object from `window.navigator.clipboard`.
fn get_clipboard() -> Result<web_sys::Clipboard, ClipboardError> {
    let window =
        web_sys::window().ok_or_else(|| ClipboardError::JsError("no global window".into()))?;
    let navigator = window.navigator();
    let clipboard = navigator.clipboard();
    Ok(clipboard)
}
