//! Photo acquisition step: file picker, camera, and paste-a-link.
//!
//! All three paths converge on the same outcome, a photo handed to
//! the session controller, and every validation failure stays inside
//! this step as an inline message. Acquisition paths are gated by the
//! session's [`WidgetOptions`]: with the camera disabled only the
//! upload path renders, and vice versa.

use std::rc::Rc;

use dioxus::html::HasFileData;
use dioxus::prelude::*;
use dioxus_free_icons::Icon;
use dioxus_free_icons::icons::ld_icons::{LdCamera, LdLink};
use mirrorme_core::message::PhotoSource;
use mirrorme_core::types::{ErrorCode, WidgetError, WidgetOptions};
use wasm_bindgen::JsCast;

use crate::camera::CameraCapture;
use crate::clipboard;

/// Upload size cap.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Allowed file extensions and their MIME types.
const EXTENSION_MIME: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
];

/// DOM id of the live camera preview element.
const VIDEO_ID: &str = "mirrorme-camera-video";

/// Validate a picked file before anything leaves the component.
///
/// Returns the MIME type to submit with.
///
/// # Errors
///
/// `INVALID_FILE` for non-image files, `FILE_TOO_LARGE` above the cap.
/// Neither changes the session step.
pub fn validate_upload(filename: &str, size: u64) -> Result<&'static str, WidgetError> {
    let mime = filename.rsplit_once('.').and_then(|(_, ext)| {
        EXTENSION_MIME
            .iter()
            .find(|(allowed, _)| allowed.eq_ignore_ascii_case(ext))
            .map(|(_, mime)| *mime)
    });
    let Some(mime) = mime else {
        return Err(WidgetError::new(
            ErrorCode::InvalidFile,
            "Please choose a PNG, JPEG, BMP, or WebP image",
        ));
    };
    if size > MAX_UPLOAD_BYTES {
        return Err(WidgetError::new(
            ErrorCode::FileTooLarge,
            "Photos can be at most 10 MB",
        ));
    }
    Ok(mime)
}

/// Props for the [`PhotoStep`] component.
#[derive(Props, Clone, PartialEq)]
pub struct PhotoStepProps {
    /// Session options gating the acquisition paths.
    options: WidgetOptions,
    /// Whether a merchant model photo is still being fetched.
    fetching_model: bool,
    /// Inline error carried over from the controller (e.g. a failed
    /// model fetch).
    inline_error: Option<String>,
    /// Fired with `(bytes, mime, source)` once a photo is acquired.
    on_photo: EventHandler<(Vec<u8>, String, PhotoSource)>,
    /// Fired with a pasted photo URL (resolved by the controller
    /// through the image proxy).
    on_photo_url: EventHandler<String>,
}

/// The photo acquisition step.
#[component]
pub fn PhotoStep(props: PhotoStepProps) -> Element {
    let mut local_error = use_signal(|| Option::<String>::None);
    let mut dragging = use_signal(|| false);
    let mut camera = use_signal(|| Option::<Rc<CameraCapture>>::None);
    let camera_active = camera.read().is_some();

    // Validate, read, and forward the first file from a list.
    //
    // Shared by the file-picker and drag-and-drop paths so the
    // validation/read/callback logic lives in one place.
    let on_photo = props.on_photo;
    let process_files = move |files: Vec<dioxus::html::FileData>| async move {
        if let Some(file) = files.first() {
            let mime = match validate_upload(&file.name(), file.size()) {
                Ok(mime) => mime,
                Err(err) => {
                    local_error.set(Some(err.message));
                    return;
                }
            };
            match file.read_bytes().await {
                Ok(bytes) => {
                    local_error.set(None);
                    on_photo.call((bytes.to_vec(), mime.to_owned(), PhotoSource::Upload));
                }
                Err(e) => {
                    local_error.set(Some(format!("Failed to read file: {e}")));
                }
            }
        }
    };

    let handle_files = move |evt: FormEvent| async move {
        process_files(evt.files()).await;
    };

    let handle_drop = move |evt: DragEvent| async move {
        evt.prevent_default();
        dragging.set(false);
        process_files(evt.files()).await;
    };

    let start_camera = move |_| {
        spawn(async move {
            let Some(video) = video_element() else {
                local_error.set(Some("Camera preview is unavailable".to_owned()));
                return;
            };
            match CameraCapture::start(video).await {
                Ok(capture) => {
                    local_error.set(None);
                    camera.set(Some(Rc::new(capture)));
                }
                Err(e) => {
                    local_error.set(Some(format!("Camera access failed: {e}")));
                }
            }
        });
    };

    let capture_still = move |_| {
        let Some(capture) = (*camera.peek()).clone() else {
            return;
        };
        match capture.capture_still() {
            Ok(photo) => {
                camera.set(None);
                local_error.set(None);
                on_photo.call((photo.png_bytes, "image/png".to_owned(), PhotoSource::Camera));
            }
            Err(e) => {
                local_error.set(Some(format!("Could not capture a photo: {e}")));
            }
        }
    };

    let cancel_camera = move |_| {
        if let Some(capture) = (*camera.peek()).clone() {
            capture.stop();
        }
        camera.set(None);
    };

    let on_photo_url = props.on_photo_url;
    let paste_link = move |_| {
        spawn(async move {
            match clipboard::read_photo_url().await {
                Ok(url) => {
                    local_error.set(None);
                    on_photo_url.call(url);
                }
                Err(e) => {
                    local_error.set(Some(format!("Could not read a link: {e}")));
                }
            }
        });
    };

    let border_class = if dragging() {
        "border-[var(--border-accent)] bg-[var(--surface-active)]"
    } else {
        "border-[var(--border-muted)] bg-[var(--surface)]"
    };

    rsx! {
        div { class: "flex flex-col gap-4",
            h2 { class: "text-lg font-semibold text-[var(--text-heading)]",
                "Add your photo"
            }

            if props.fetching_model {
                p { class: "text-[var(--text-secondary)] animate-pulse",
                    "Loading your model photo..."
                }
            }

            if let Some(ref err) = props.inline_error {
                p { class: "text-[var(--text-error)] text-sm", "{err}" }
            }
            if let Some(ref err) = local_error() {
                p { class: "text-[var(--text-error)] text-sm", "{err}" }
            }

            if props.options.allow_upload && !camera_active {
                div {
                    class: "border-2 border-dashed rounded-lg p-6 text-center transition-colors {border_class}",
                    ondragover: move |evt| {
                        evt.prevent_default();
                        dragging.set(true);
                    },
                    ondragleave: move |_| {
                        dragging.set(false);
                    },
                    ondrop: handle_drop,

                    p { class: "text-[var(--text-secondary)] mb-3",
                        "Drop a photo here or "
                    }
                    label {
                        class: "inline-block px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded cursor-pointer text-white font-medium transition-colors",
                        input {
                            r#type: "file",
                            accept: ".png,.jpg,.jpeg,.bmp,.webp",
                            class: "hidden",
                            onchange: handle_files,
                        }
                        "Choose File"
                    }
                    p { class: "text-[var(--muted)] text-sm mt-2",
                        "PNG, JPEG, BMP, WebP — up to 10 MB"
                    }
                }
            }

            // The video element stays mounted so the camera has a
            // render target the moment the stream arrives.
            if props.options.allow_camera {
                div { class: "flex flex-col gap-2",
                    video {
                        id: VIDEO_ID,
                        class: if camera_active {
                            // Mirrored preview: shoppers expect to see
                            // themselves as a mirror shows them.
                            "w-full rounded-lg scale-x-[-1]"
                        } else {
                            "hidden"
                        },
                        autoplay: true,
                        muted: true,
                        "playsinline": "true",
                    }

                    if camera_active {
                        div { class: "flex gap-2 justify-center",
                            button {
                                class: "px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded text-white font-medium",
                                onclick: capture_still,
                                "Capture"
                            }
                            button {
                                class: "px-4 py-2 bg-[var(--surface)] hover:bg-[var(--surface-active)] rounded text-[var(--text-secondary)]",
                                onclick: cancel_camera,
                                "Cancel"
                            }
                        }
                    } else {
                        button {
                            class: "inline-flex items-center gap-2 px-4 py-2 bg-[var(--surface)] hover:bg-[var(--surface-active)] rounded text-[var(--text-secondary)] transition-colors",
                            onclick: start_camera,
                            Icon { icon: LdCamera, width: 16, height: 16 }
                            "Take a photo"
                        }
                    }
                }
            }

            button {
                class: "inline-flex items-center gap-2 text-sm text-[var(--text-secondary)] hover:text-[var(--text-heading)] transition-colors",
                onclick: paste_link,
                Icon { icon: LdLink, width: 14, height: 14 }
                "Paste a photo link"
            }
        }
    }
}

/// Locate the mounted camera preview element.
fn video_element() -> Option<web_sys::HtmlVideoElement> {
    web_sys::window()?
        .document()?
        .get_element_by_id(VIDEO_ID)?
        .dyn_into()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_files() {
        assert_eq!(validate_upload("me.png", 1024), Ok("image/png"));
        assert_eq!(validate_upload("me.JPG", 1024), Ok("image/jpeg"));
        assert_eq!(validate_upload("me.webp", MAX_UPLOAD_BYTES), Ok("image/webp"));
    }

    #[test]
    fn rejects_non_image_files_without_leaving_the_step() {
        let err = match validate_upload("notes.txt", 10) {
            Err(err) => err,
            Ok(mime) => unreachable!("accepted {mime}"),
        };
        assert_eq!(err.code, ErrorCode::InvalidFile);
    }

    #[test]
    fn rejects_files_over_the_cap() {
        // 10.5 MB photo.
        let size = 10 * 1024 * 1024 + 512 * 1024;
        let err = match validate_upload("me.jpg", size) {
            Err(err) => err,
            Ok(mime) => unreachable!("accepted {mime}"),
        };
        assert_eq!(err.code, ErrorCode::FileTooLarge);
    }

    #[test]
    fn cap_is_inclusive() {
        assert!(validate_upload("me.png", MAX_UPLOAD_BYTES).is_ok());
        assert!(validate_upload("me.png", MAX_UPLOAD_BYTES + 1).is_err());
    }

    #[test]
    fn extensionless_names_are_rejected() {
        assert!(validate_upload("photo", 10).is_err());
    }
}
