//! mirrorme-io: Browser I/O and Dioxus component library.
//!
//! Handles the cross-document message channel, the try-on backend
//! HTTP client, camera capture, Blob URLs, clipboard and downloads,
//! the host-page loader (modal + iframe + auto-init), and provides
//! the widget's step components.

pub mod analytics;
pub mod api;
pub mod blob;
pub mod camera;
pub mod channel;
pub mod clipboard;
pub mod components;
pub mod download;
pub mod events;
pub mod host;

pub use api::{ApiClient, ApiError, PhotoPayload, StudioApplier};
pub use camera::{CameraCapture, CapturedPhoto};
pub use channel::{ChannelError, MessageListener};
pub use components::{
    ErrorStep, PhotoStep, PreviewStep, ProcessingStep, ResultStep, TrailStrip,
};
pub use events::{EventEmitter, EventKind, WidgetEvent};
pub use host::{ConfigPatch, WidgetConfig, WidgetInstance, auto_init};
