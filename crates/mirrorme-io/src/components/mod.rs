//! Dioxus UI components for the try-on widget and studio.
//!
//! One component per session step (photo, preview, processing, result,
//! error) plus the studio's step-trail strip. Components render
//! human-readable messages only; error codes stay in the protocol
//! layer.

mod error;
mod photo;
mod preview;
mod processing;
mod result;
mod trail;

pub use error::ErrorStep;
pub use photo::PhotoStep;
pub use photo::{MAX_UPLOAD_BYTES, validate_upload};
pub use preview::PreviewStep;
pub use processing::ProcessingStep;
pub use result::ResultStep;
pub use trail::TrailStrip;
