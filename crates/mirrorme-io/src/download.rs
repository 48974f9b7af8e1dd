//! Result image download.
//!
//! Dioxus has no built-in file download API.  This module triggers
//! downloads by programmatically clicking a temporary
//! `<a download>` element pointed at the result's download URL.
//!
//! All functions in this module require a browser environment
//! (`wasm32-unknown-unknown` target).

use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;

/// Errors that can occur when triggering a file download.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),
}

impl From<JsValue> for DownloadError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Trigger a download of `url` under the suggested `filename`.
///
/// The try-on backend serves `download_url` with an attachment
/// disposition, so no bytes pass through the page; the anchor click
/// hands the URL straight to the browser's download machinery.
///
/// # Errors
///
/// Returns [`DownloadError::JsError`] if any browser API call fails
/// (e.g., element creation or DOM insertion).
pub fn trigger_download(url: &str, filename: &str) -> Result<(), DownloadError> {
    let window =
        web_sys::window().ok_or_else(|| DownloadError::JsError("no global window".into()))?;
    let document = window
        .document()
        .ok_or_else(|| DownloadError::JsError("no document".into()))?;

    // Create a temporary <a> element, set href and download, click it.
    let anchor: web_sys::HtmlAnchorElement = document
        .create_element("a")?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|e| DownloadError::JsError(format!("failed to cast element: {e:?}")))?;

    anchor.set_href(url);
    anchor.set_download(filename);

    // Append to body, click, and remove.
    let body = document
        .body()
        .ok_or_else(|| DownloadError::JsError("no document body".into()))?;
    body.append_child(&anchor)?;
    anchor.click();

    // Best-effort cleanup — the download is already initiated.
    // Failures here should not be reported as "download failed".
    let _ = body.remove_child(&anchor);

    Ok(())
}
