//! HTTP client for the try-on backend.
//!
//! Wraps the four collaborator endpoints the widget consumes:
//! `POST session`, `POST try-on`, `GET result/:id`, and the same-origin
//! image proxy `GET fetch-image?url=`. The backend itself (session
//! store, quota accounting, AI generation) is out of scope; this is
//! only its client-side contract.
//!
//! Structured backend errors (`{code, message}` bodies) pass through
//! verbatim as [`WidgetError`]s; the client never rewrites a backend
//! code. Transport failures become `PROCESSING_ERROR` with the
//! browser's own message preserved where possible.

use mirrorme_core::orchestrator::{GarmentApplier, ProgressiveStep, concat_garment_field};
use mirrorme_core::params::encode_component;
use mirrorme_core::types::{
    ErrorCode, Garment, ProductInfo, SessionDescriptor, TryOnResult, WidgetError,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit};

/// Errors produced by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (offline, DNS, CORS).
    #[error("network error: {0}")]
    Network(String),
    /// The request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),
    /// The response was not what the contract promises.
    #[error("unexpected response from the try-on service: {0}")]
    BadResponse(String),
    /// A proxied fetch returned something that is not an image.
    #[error("fetched resource is not an image: {0}")]
    NotAnImage(String),
    /// A structured `{code, message}` error from the backend.
    #[error("{0}")]
    Service(WidgetError),
}

impl From<JsValue> for ApiError {
    fn from(value: JsValue) -> Self {
        // Preserve the browser's message when the rejection is an Error.
        let message = value
            .dyn_ref::<js_sys::Error>()
            .map_or_else(|| format!("{value:?}"), |e| String::from(e.message()));
        Self::Network(message)
    }
}

impl ApiError {
    /// Collapse into the `{code, message}` shape relayed to hosts.
    ///
    /// Backend codes survive unchanged; everything else is wrapped as
    /// `PROCESSING_ERROR` (or `INVALID_FILE` for non-image proxy
    /// fetches, which are a client-side validation concern).
    #[must_use]
    pub fn into_widget_error(self) -> WidgetError {
        match self {
            Self::Service(err) => err,
            Self::NotAnImage(detail) => WidgetError::new(
                ErrorCode::InvalidFile,
                format!("The fetched file is not an image ({detail})"),
            ),
            other => WidgetError::processing(other.to_string()),
        }
    }
}

/// Bytes fetched through the image proxy, decode-validated.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Content type reported by the origin server.
    pub content_type: String,
}

/// What to submit as the try-on photo.
#[derive(Debug, Clone)]
pub enum PhotoPayload {
    /// Raw image bytes captured or picked on this device.
    Bytes {
        /// Encoded image data.
        bytes: Vec<u8>,
        /// MIME type of `bytes`.
        mime: String,
    },
    /// An image URL the backend fetches itself.
    Url(String),
}

/// Client for one backend base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
}

#[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
impl ApiClient {
    /// Create a client. A trailing slash on `base_url` is tolerated.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Create a server-tracked session for one try-on attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, a non-2xx response,
    /// or a response without a `sessionId`.
    pub async fn create_session(&self, descriptor: &SessionDescriptor) -> Result<String, ApiError> {
        let body =
            serde_json::to_string(descriptor).map_err(|e| ApiError::Encode(e.to_string()))?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&JsValue::from_str(&body));
        let headers = web_sys::Headers::new()?;
        headers.set("Content-Type", "application/json")?;
        init.set_headers(headers.as_ref());

        let request = Request::new_with_str_and_init(&self.endpoint("session"), &init)?;
        let response = send(&request).await?;
        let text = read_ok_text(&response).await?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ApiError::BadResponse(e.to_string()))?;
        value
            .get("sessionId")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadResponse("response is missing sessionId".into()))
    }

    /// Submit a photo for generation and wait for the result.
    ///
    /// The HTTP response is the true completion signal; any progress
    /// shown while this call is in flight is synthesized by the caller.
    /// `processing_time_ms` on the returned result is measured here,
    /// client-side.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Service`] with the backend's own code and
    /// message for structured failures, [`ApiError`] otherwise.
    pub async fn submit_try_on(
        &self,
        session_id: &str,
        photo: &PhotoPayload,
        style_prompt: Option<&str>,
        step_number: Option<u32>,
    ) -> Result<TryOnResult, ApiError> {
        let started = web_time::Instant::now();

        let form = web_sys::FormData::new()?;
        form.append_with_str("sessionId", session_id)?;
        match photo {
            PhotoPayload::Bytes { bytes, mime } => {
                let blob = bytes_to_blob(bytes, mime)?;
                form.append_with_blob_and_filename("photo", &blob, "photo.png")?;
            }
            PhotoPayload::Url(url) => form.append_with_str("photoUrl", url)?,
        }
        if let Some(prompt) = style_prompt {
            form.append_with_str("prompt", prompt)?;
        }
        if let Some(step) = step_number {
            form.append_with_str("step", &step.to_string())?;
        }

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(form.as_ref());
        let request = Request::new_with_str_and_init(&self.endpoint("try-on"), &init)?;
        let response = send(&request).await?;
        let text = read_ok_text(&response).await?;
        let mut result: TryOnResult =
            serde_json::from_str(&text).map_err(|e| ApiError::BadResponse(e.to_string()))?;
        result.processing_time_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(result)
    }

    /// Fetch the generated image bytes for a result.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx response.
    pub async fn fetch_result_bytes(&self, result_id: &str) -> Result<Vec<u8>, ApiError> {
        let request = Request::new_with_str(&self.endpoint(&format!("result/{result_id}")))?;
        let response = send(&request).await?;
        if !response.ok() {
            return Err(error_from_response(&response).await);
        }
        read_bytes(&response).await
    }

    /// Fetch a third-party image URL through the same-origin proxy.
    ///
    /// The response is validated twice: the content type must be
    /// `image/*` and the bytes must actually decode as an image. Either
    /// failure is [`ApiError::NotAnImage`]; the caller surfaces it as
    /// an inline photo-step error, never a dead end.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, a non-2xx response,
    /// or a body that is not a decodable image.
    pub async fn proxy_fetch_image(&self, url: &str) -> Result<FetchedImage, ApiError> {
        let endpoint = format!(
            "{}?url={}",
            self.endpoint("fetch-image"),
            encode_component(url),
        );
        let request = Request::new_with_str(&endpoint)?;
        let response = send(&request).await?;
        if !response.ok() {
            return Err(error_from_response(&response).await);
        }
        let content_type = response
            .headers()
            .get("Content-Type")?
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(ApiError::NotAnImage(format!(
                "content type {content_type:?}"
            )));
        }
        let bytes = read_bytes(&response).await?;
        image::load_from_memory(&bytes).map_err(|e| ApiError::NotAnImage(e.to_string()))?;
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }

    /// Persist a progressive chain as one aggregated record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx response.
    /// Callers fall back to the last step's raw image on failure.
    pub async fn aggregate_chain(
        &self,
        merchant_key: &str,
        base_image: &str,
        trail: &[ProgressiveStep],
        garments: &[Garment],
    ) -> Result<TryOnResult, ApiError> {
        let steps: Vec<&str> = trail.iter().map(|s| s.image_url.as_str()).collect();
        let body = serde_json::json!({
            "merchantKey": merchant_key,
            "baseImage": base_image,
            "steps": steps,
            "name": concat_garment_field(garments, |g| g.name.as_deref()),
            "category": concat_garment_field(garments, |g| g.category.as_deref()),
        });
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&JsValue::from_str(&body.to_string()));
        let headers = web_sys::Headers::new()?;
        headers.set("Content-Type", "application/json")?;
        init.set_headers(headers.as_ref());

        let request = Request::new_with_str_and_init(&self.endpoint("try-on/aggregate"), &init)?;
        let response = send(&request).await?;
        let text = read_ok_text(&response).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::BadResponse(e.to_string()))
    }
}

/// [`GarmentApplier`] backed by the real HTTP surface, used by the
/// studio's progressive runs. Each step creates its own session with
/// the garment as the session product and submits the evolving base
/// image as a photo URL.
#[derive(Debug, Clone)]
pub struct StudioApplier {
    api: ApiClient,
    merchant_key: String,
}

impl StudioApplier {
    /// Create an applier for one merchant.
    #[must_use]
    pub fn new(api: ApiClient, merchant_key: impl Into<String>) -> Self {
        Self {
            api,
            merchant_key: merchant_key.into(),
        }
    }
}

#[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
impl GarmentApplier for StudioApplier {
    async fn apply_garment(
        &self,
        base_image: &str,
        garment: &Garment,
        step_number: u32,
        style_prompt: Option<&str>,
    ) -> Result<String, WidgetError> {
        let product = ProductInfo {
            image: garment.image.clone(),
            name: garment.name.clone(),
            id: garment.id.clone(),
            category: garment.category.clone(),
            ..ProductInfo::default()
        };
        let descriptor = SessionDescriptor::new(self.merchant_key.clone(), product);
        let session_id = self
            .api
            .create_session(&descriptor)
            .await
            .map_err(ApiError::into_widget_error)?;
        let result = self
            .api
            .submit_try_on(
                &session_id,
                &PhotoPayload::Url(base_image.to_owned()),
                style_prompt,
                Some(step_number),
            )
            .await
            .map_err(ApiError::into_widget_error)?;
        Ok(result.image_url)
    }

    async fn aggregate(
        &self,
        base_image: &str,
        trail: &[ProgressiveStep],
        garments: &[Garment],
    ) -> Result<TryOnResult, WidgetError> {
        self.api
            .aggregate_chain(&self.merchant_key, base_image, trail, garments)
            .await
            .map_err(ApiError::into_widget_error)
    }
}

/// Run a request through `window.fetch`.
async fn send(request: &Request) -> Result<web_sys::Response, ApiError> {
    let window =
        web_sys::window().ok_or_else(|| ApiError::Network("no global window".into()))?;
    let response = JsFuture::from(window.fetch_with_request(request))
        .await
        .map_err(ApiError::from)?;
    response
        .dyn_into()
        .map_err(|_| ApiError::Network("fetch did not return a Response".into()))
}

/// Read the body of a 2xx response as text; map anything else to the
/// structured error path.
async fn read_ok_text(response: &web_sys::Response) -> Result<String, ApiError> {
    if !response.ok() {
        return Err(error_from_response(response).await);
    }
    read_text(response).await
}

async fn read_text(response: &web_sys::Response) -> Result<String, ApiError> {
    let text = JsFuture::from(response.text()?).await?;
    text.as_string()
        .ok_or_else(|| ApiError::BadResponse("response body is not text".into()))
}

async fn read_bytes(response: &web_sys::Response) -> Result<Vec<u8>, ApiError> {
    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

/// Turn a non-2xx response into the most structured error available:
/// a `{code, message}` body passes through verbatim, a body with only
/// a message keeps the message, anything else reports the status line.
async fn error_from_response(response: &web_sys::Response) -> ApiError {
    let status = response.status();
    let body = read_text(response).await.unwrap_or_default();
    if let Ok(err) = serde_json::from_str::<WidgetError>(&body) {
        return ApiError::Service(err);
    }
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(serde_json::Value::as_str).map(str::to_owned));
    message.map_or_else(
        || ApiError::BadResponse(format!("HTTP {status}")),
        |m| ApiError::Service(WidgetError::processing(m)),
    )
}

/// Build a Blob from raw bytes with a MIME type.
fn bytes_to_blob(bytes: &[u8], mime: &str) -> Result<web_sys::Blob, ApiError> {
    let array = js_sys::Uint8Array::from(bytes);
    let parts = js_sys::Array::new();
    parts.push(&array);
    let opts = web_sys::BlobPropertyBag::new();
    opts.set_type(mime);
    web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &opts).map_err(ApiError::from)
}
