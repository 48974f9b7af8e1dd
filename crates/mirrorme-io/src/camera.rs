//! Device camera capture for the photo step.
//!
//! Requests a video stream via `getUserMedia`, renders the live
//! preview into a caller-supplied `<video>` element, and grabs a
//! single still frame on demand. The still is mirrored horizontally so
//! the shopper sees themselves the way a mirror would show them.
//!
//! The `MediaStream` is exclusively owned by [`CameraCapture`]. Every
//! track is stopped the moment a still has been captured and again on
//! drop. A stream left running keeps the browser's camera indicator
//! lit after the shopper is done, which is a privacy bug, not just a
//! resource leak.

use image::ImageEncoder;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::blob;

/// Errors that can occur during camera capture.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// `getUserMedia` failed or was denied by the shopper.
    #[error("camera access failed: {0}")]
    Access(String),
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),
    /// The captured frame could not be encoded.
    #[error("failed to encode captured frame: {0}")]
    Encode(String),
}

impl From<JsValue> for CameraError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// A still frame captured from the camera.
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    /// PNG-encoded, horizontally mirrored frame.
    pub png_bytes: Vec<u8>,
    /// Blob URL for immediate display. Revoke via
    /// [`blob::revoke_blob_url`] when no longer shown.
    pub blob_url: String,
}

/// An active camera session bound to a `<video>` element.
pub struct CameraCapture {
    stream: web_sys::MediaStream,
    video: web_sys::HtmlVideoElement,
}

#[allow(clippy::future_not_send)] // WASM is single-threaded; MediaStream is !Send
impl CameraCapture {
    /// Request the camera and start the live preview in `video`.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::Access`] when the shopper denies the
    /// permission prompt or no camera is available.
    pub async fn start(video: web_sys::HtmlVideoElement) -> Result<Self, CameraError> {
        let window =
            web_sys::window().ok_or_else(|| CameraError::JsError("no global window".into()))?;
        let devices = window
            .navigator()
            .media_devices()
            .map_err(|e| CameraError::Access(format!("{e:?}")))?;

        let constraints = web_sys::MediaStreamConstraints::new();
        constraints.set_video(&JsValue::TRUE);
        constraints.set_audio(&JsValue::FALSE);

        let promise = devices
            .get_user_media_with_constraints(&constraints)
            .map_err(|e| CameraError::Access(format!("{e:?}")))?;
        let stream = JsFuture::from(promise)
            .await
            .map_err(|e| CameraError::Access(describe_rejection(&e)))?;
        let stream: web_sys::MediaStream = stream
            .dyn_into()
            .map_err(|_| CameraError::Access("getUserMedia did not return a stream".into()))?;

        video.set_src_object(Some(&stream));
        // Autoplay can be rejected until a user gesture; the start
        // button click that got us here counts as one.
        let _ = JsFuture::from(video.play()?).await;

        Ok(Self { stream, video })
    }

    /// Capture one still frame, mirrored horizontally, then stop the
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError`] if the video has no frames yet, canvas
    /// drawing fails, or PNG encoding fails. The stream is stopped on
    /// success only; on error the live preview stays up for another
    /// attempt.
    pub fn capture_still(&self) -> Result<CapturedPhoto, CameraError> {
        let width = self.video.video_width();
        let height = self.video.video_height();
        if width == 0 || height == 0 {
            return Err(CameraError::JsError("video stream has no frames yet".into()));
        }

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| CameraError::JsError("no document".into()))?;
        let canvas: web_sys::HtmlCanvasElement = document
            .create_element("canvas")?
            .dyn_into()
            .map_err(|_| CameraError::JsError("failed to create canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);

        let context: web_sys::CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or_else(|| CameraError::JsError("no 2d context".into()))?
            .dyn_into()
            .map_err(|_| CameraError::JsError("unexpected context type".into()))?;

        // Mirror horizontally before drawing: flip around the vertical
        // axis so the still matches the mirrored live preview.
        context.translate(f64::from(width), 0.0)?;
        context.scale(-1.0, 1.0)?;
        context.draw_image_with_html_video_element(&self.video, 0.0, 0.0)?;

        let image_data = context.get_image_data(0.0, 0.0, f64::from(width), f64::from(height))?;
        let pixels = image_data.data().0;

        let mut png_bytes = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&pixels, width, height, image::ExtendedColorType::Rgba8)
            .map_err(|e| CameraError::Encode(e.to_string()))?;

        let blob_url = blob::bytes_to_blob_url(&png_bytes, "image/png")
            .map_err(|e| CameraError::JsError(e.to_string()))?;

        // Hardware released as soon as we have the still.
        self.stop();

        Ok(CapturedPhoto {
            png_bytes,
            blob_url,
        })
    }

    /// Stop every track and detach the stream from the video element.
    /// Idempotent; also runs on drop.
    pub fn stop(&self) {
        for track in self.stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<web_sys::MediaStreamTrack>() {
                track.stop();
            }
        }
        self.video.set_src_object(None);
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Human-readable description of a `getUserMedia` rejection.
fn describe_rejection(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map_or_else(|| format!("{value:?}"), |e| String::from(e.message()))
}
