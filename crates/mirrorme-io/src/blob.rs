//! Byte buffers ↔ browser Blob URLs.
//!
//! Converts in-memory image data to displayable object URLs for use as
//! `<img src>` values inside the widget.

use wasm_bindgen::JsValue;
use web_sys::BlobPropertyBag;

/// Errors that can occur during Blob URL creation.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),
}

impl From<JsValue> for BlobError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Create an object URL for raw bytes with the given MIME type.
///
/// The returned URL must be revoked via [`revoke_blob_url`] when no
/// longer needed to avoid memory leaks.
///
/// # Errors
///
/// Returns [`BlobError::JsError`] if Blob or URL creation fails.
pub fn bytes_to_blob_url(bytes: &[u8], mime_type: &str) -> Result<String, BlobError> {
    let array = js_sys::Uint8Array::from(bytes);
    let parts = js_sys::Array::new();
    parts.push(&array);

    let opts = BlobPropertyBag::new();
    opts.set_type(mime_type);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &opts)?;

    let url = web_sys::Url::create_object_url_with_blob(&blob)?;
    Ok(url)
}

/// Revoke a Blob URL previously created by [`bytes_to_blob_url`].
///
/// Best-effort: failures are silently ignored since the URL may have
/// already been revoked or garbage collected.
pub fn revoke_blob_url(url: &str) {
    let _ = web_sys::Url::revoke_object_url(url);
}
