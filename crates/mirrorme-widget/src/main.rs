//! Embedded session controller: the application inside the iframe.
//!
//! Reconstructs the [`SessionDescriptor`] from the iframe URL, drives
//! the try-on state machine, and relays protocol events to the host
//! page. The host's copy of the descriptor and this one are only ever
//! serialization-equal; nothing is shared across the boundary except
//! messages.

use std::rc::Rc;

use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;
use mirrorme_core::fsm::{SessionEvent, Step, TryOnFsm};
use mirrorme_core::message::{PhotoSource, WidgetMessage};
use mirrorme_core::params;
use mirrorme_core::types::{ErrorCode, SessionDescriptor, Theme, TryOnResult, WidgetError};
use mirrorme_io::api::{ApiClient, ApiError, PhotoPayload};
use mirrorme_io::components::{ErrorStep, PhotoStep, PreviewStep, ProcessingStep, ResultStep};
use mirrorme_io::{analytics, blob, channel};
use wasm_bindgen::JsValue;

/// Try-on backend base URL.
const API_BASE_URL: &str = "https://api.mirrorme.app/v1";

/// Cadence of the synthetic progress ticks.
const PROGRESS_TICK_MS: u32 = 800;

/// Per-tick progress increment.
const PROGRESS_TICK_STEP: u8 = 7;

/// Synthetic progress never reaches 100 on its own; the last jump is
/// reserved for the real HTTP response.
const PROGRESS_CEILING: u8 = 95;

fn main() {
    dioxus::launch(app);
}

/// The chosen photo, however it was acquired.
#[derive(Clone)]
struct PhotoData {
    /// What to submit to the backend.
    payload: PhotoPayload,
    /// What to show in the preview step.
    display_url: String,
}

/// Root component: parse the session from the URL, then either run it
/// or show the invalid-session screen.
fn app() -> Element {
    let boot = use_signal(boot_session);

    match boot() {
        Ok((descriptor, parent_origin)) => rsx! {
            SessionView {
                descriptor,
                parent_origin,
            }
        },
        Err(error) => rsx! {
            InvalidSession { error }
        },
    }
}

/// Terminal screen for a broken iframe URL. The error is relayed once
/// so the host page can react; closing is the only way out.
#[component]
fn InvalidSession(error: WidgetError) -> Element {
    use_effect({
        let error = error.clone();
        move || post(&referrer_origin(), &WidgetMessage::Error(error.clone()))
    });

    rsx! {
        div { class: "flex flex-col gap-4 items-center py-10 text-center",
            h2 { class: "text-lg font-semibold text-[var(--text-heading)]",
                "This try-on link is not valid"
            }
            p { class: "text-[var(--text-error)]", "{error.message}" }
            button {
                class: "px-4 py-2 bg-[var(--surface)] hover:bg-[var(--surface-active)] rounded text-[var(--text-secondary)]",
                onclick: move |_| {
                    post(
                        &referrer_origin(),
                        &WidgetMessage::Close { reason: "invalid".to_owned() },
                    );
                },
                "Close"
            }
        }
    }
}

/// Reconstruct the descriptor from `location.search`.
///
/// Any reconstruction failure is an `INVALID_SESSION` here: the host
/// loader already ran the field-level preflight, so a missing required
/// field at this point means the URL itself is broken.
fn boot_session() -> Result<(SessionDescriptor, String), WidgetError> {
    let window = web_sys::window()
        .ok_or_else(|| WidgetError::new(ErrorCode::InvalidSession, "No browser window"))?;
    let search = window.location().search().unwrap_or_default();
    let parsed = params::from_query_pairs(params::parse_query_string(&search))
        .map_err(|e| WidgetError::new(ErrorCode::InvalidSession, e.message))?;
    for warning in &parsed.warnings {
        warn(&format!("mirrorme-widget: {warning}"));
    }
    apply_theme(parsed.descriptor.theme);
    Ok((parsed.descriptor, referrer_origin()))
}

/// Where widget → host messages are targeted: the embedding page's
/// origin when the referrer reveals it, `*` otherwise. The host side
/// authenticates the *sender* origin regardless.
fn referrer_origin() -> String {
    web_sys::window()
        .and_then(|w| w.document())
        .map(|d| d.referrer())
        .and_then(|r| channel::origin_of(&r))
        .unwrap_or_else(|| "*".to_owned())
}

/// Reflect the session theme on the document element.
fn apply_theme(theme: Theme) {
    if theme == Theme::Auto {
        return;
    }
    if let Some(root) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.document_element())
    {
        let _ = root.set_attribute("data-theme", theme.as_str());
    }
}

/// One running try-on session.
#[component]
#[allow(clippy::too_many_lines)]
fn SessionView(descriptor: SessionDescriptor, parent_origin: String) -> Element {
    let descriptor = Rc::new(descriptor);
    let origin = Rc::new(parent_origin);

    let mut fsm = use_signal({
        let descriptor = Rc::clone(&descriptor);
        move || TryOnFsm::new(&descriptor)
    });
    let mut photo = use_signal({
        let descriptor = Rc::clone(&descriptor);
        move || {
            // skip_photo_step sessions start in preview with the
            // ready-made user photo.
            descriptor.user_image().map(|url| PhotoData {
                payload: PhotoPayload::Url(url.to_owned()),
                display_url: url.to_owned(),
            })
        }
    });
    let mut prompt = use_signal(String::new);
    let mut progress = use_signal(|| 0u8);
    let mut result = use_signal(|| Option::<TryOnResult>::None);
    let mut error = use_signal(|| Option::<WidgetError>::None);
    let mut generation = use_signal(|| 0u64);
    let api = use_hook(|| Rc::new(ApiClient::new(API_BASE_URL)));

    // --- Boot: announce readiness, then resolve a merchant-supplied
    // model photo through the image proxy. Fetch failure keeps the
    // photo step usable underneath an inline error.
    use_effect({
        let descriptor = Rc::clone(&descriptor);
        let origin = Rc::clone(&origin);
        let api = Rc::clone(&api);
        move || {
            post(&origin, &WidgetMessage::Ready);
            analytics::track_widget("ready");

            let Some(model_url) = descriptor.model_image.clone() else {
                return;
            };
            if !fsm.peek().is_fetching_model() {
                return;
            }
            let origin = Rc::clone(&origin);
            let api = Rc::clone(&api);
            spawn(async move {
                match fetch_photo_via_proxy(&api, &model_url).await {
                    Ok(data) => {
                        photo.set(Some(data));
                        if fsm
                            .write()
                            .apply(&SessionEvent::PhotoSupplied {
                                source: PhotoSource::ModelUrl,
                            })
                            .is_ok()
                        {
                            post(
                                &origin,
                                &WidgetMessage::PhotoSelected {
                                    source: PhotoSource::ModelUrl,
                                },
                            );
                        }
                    }
                    Err(err) => {
                        fsm.write().model_fetch_failed(WidgetError::new(
                            err.code,
                            "The model photo could not be loaded — add one below",
                        ));
                    }
                }
            });
        }
    });

    // --- Photo acquired locally (upload or camera).
    let on_photo = {
        let origin = Rc::clone(&origin);
        move |(bytes, mime, source): (Vec<u8>, String, PhotoSource)| {
            match blob::bytes_to_blob_url(&bytes, &mime) {
                Ok(display_url) => {
                    photo.set(Some(PhotoData {
                        payload: PhotoPayload::Bytes { bytes, mime },
                        display_url,
                    }));
                    if fsm
                        .write()
                        .apply(&SessionEvent::PhotoSupplied { source })
                        .is_ok()
                    {
                        post(&origin, &WidgetMessage::PhotoSelected { source });
                    }
                }
                Err(e) => {
                    fsm.write().set_inline_error(WidgetError::new(
                        ErrorCode::InvalidFile,
                        format!("Could not load that photo: {e}"),
                    ));
                }
            }
        }
    };

    // --- Photo link pasted: resolve through the proxy like a model
    // image, converging on the same transition.
    let on_photo_url = {
        let origin = Rc::clone(&origin);
        let api = Rc::clone(&api);
        move |url: String| {
            let origin = Rc::clone(&origin);
            let api = Rc::clone(&api);
            spawn(async move {
                match fetch_photo_via_proxy(&api, &url).await {
                    Ok(data) => {
                        photo.set(Some(data));
                        if fsm
                            .write()
                            .apply(&SessionEvent::PhotoSupplied {
                                source: PhotoSource::ModelUrl,
                            })
                            .is_ok()
                        {
                            post(
                                &origin,
                                &WidgetMessage::PhotoSelected {
                                    source: PhotoSource::ModelUrl,
                                },
                            );
                        }
                    }
                    Err(err) => fsm.write().set_inline_error(err),
                }
            });
        }
    };

    // --- Confirmation: submit and wait, with synthetic progress.
    let on_confirm = {
        let descriptor = Rc::clone(&descriptor);
        let origin = Rc::clone(&origin);
        let api = Rc::clone(&api);
        move |()| {
            let Some(photo_data) = (*photo.peek()).clone() else {
                fsm.write().set_inline_error(WidgetError::new(
                    ErrorCode::InvalidSession,
                    "Please add a photo first",
                ));
                return;
            };
            if fsm.write().apply(&SessionEvent::Confirmed).is_err() {
                return;
            }

            generation += 1;
            let my_generation = *generation.peek();
            progress.set(0);
            post(&origin, &WidgetMessage::ProcessingStart);
            analytics::track_widget("processing");

            // Synthetic progress ticks: fabricated on a timer purely
            // for UX. The HTTP response below is the only real
            // completion signal.
            {
                let origin = Rc::clone(&origin);
                spawn(async move {
                    loop {
                        TimeoutFuture::new(PROGRESS_TICK_MS).await;
                        if *generation.peek() != my_generation
                            || fsm.peek().step() != Step::Processing
                        {
                            break;
                        }
                        let next = progress.peek().saturating_add(PROGRESS_TICK_STEP);
                        let next = next.min(PROGRESS_CEILING);
                        progress.set(next);
                        post(&origin, &WidgetMessage::progress(next));
                    }
                });
            }

            let descriptor = Rc::clone(&descriptor);
            let origin = Rc::clone(&origin);
            let api = Rc::clone(&api);
            spawn(async move {
                let style_prompt = prompt.peek().trim().to_owned();
                let style_prompt = (!style_prompt.is_empty()).then_some(style_prompt);

                let outcome = run_try_on(
                    &api,
                    &descriptor,
                    &photo_data.payload,
                    style_prompt.as_deref(),
                )
                .await;

                // A retry or close may have raced this response.
                if *generation.peek() != my_generation {
                    return;
                }
                match outcome {
                    Ok(try_on) => {
                        progress.set(100);
                        post(&origin, &WidgetMessage::progress(100));
                        result.set(Some(try_on.clone()));
                        if fsm.write().apply(&SessionEvent::ProcessingSucceeded).is_ok() {
                            post(&origin, &WidgetMessage::Result(try_on));
                            analytics::track_widget("result");
                        }
                    }
                    Err(api_error) => {
                        let widget_error = api_error.into_widget_error();
                        error.set(Some(widget_error.clone()));
                        if fsm.write().apply(&SessionEvent::ProcessingFailed).is_ok() {
                            post(&origin, &WidgetMessage::Error(widget_error));
                            analytics::track_widget("error");
                        }
                    }
                }
            });
        }
    };

    let on_change_photo = move |()| {
        if fsm.write().apply(&SessionEvent::PhotoCleared).is_ok() {
            photo.set(None);
        }
    };

    let on_retry = move |()| {
        if fsm.write().apply(&SessionEvent::Retry).is_ok() {
            photo.set(None);
            result.set(None);
            error.set(None);
            progress.set(0);
        }
    };

    let on_close = {
        let origin = Rc::clone(&origin);
        move |()| {
            let _ = fsm.write().apply(&SessionEvent::Close);
            post(
                &origin,
                &WidgetMessage::Close {
                    reason: "user".to_owned(),
                },
            );
        }
    };

    // --- Render the active step.
    let step = fsm.read().step();
    let body = match step {
        Step::Photo => rsx! {
            PhotoStep {
                options: descriptor.options.clone(),
                fetching_model: fsm.read().is_fetching_model(),
                inline_error: fsm.read().inline_error().map(|e| e.message.clone()),
                on_photo: on_photo,
                on_photo_url: on_photo_url,
            }
        },
        Step::Preview => {
            let photo_url = (*photo.read())
                .as_ref()
                .map(|p| p.display_url.clone())
                .unwrap_or_default();
            rsx! {
                PreviewStep {
                    photo_url,
                    product: (*descriptor).product.clone(),
                    prompt: prompt(),
                    on_prompt_change: move |value| prompt.set(value),
                    on_confirm: on_confirm,
                    on_change_photo: on_change_photo,
                }
            }
        }
        Step::Processing => rsx! {
            ProcessingStep { progress: progress() }
        },
        Step::Result => match result() {
            Some(try_on) => rsx! {
                ResultStep {
                    result: try_on,
                    on_retry: on_retry,
                    on_close: on_close,
                }
            },
            None => rsx! {
                ErrorStep {
                    message: "The result is no longer available".to_owned(),
                    on_retry: on_retry,
                    on_close: on_close,
                }
            },
        },
        Step::Error => {
            let message = (*error.read())
                .as_ref()
                .map_or_else(|| "Something went wrong".to_owned(), |e| e.message.clone());
            rsx! {
                ErrorStep {
                    message,
                    on_retry: on_retry,
                    on_close: on_close,
                }
            }
        }
    };

    rsx! {
        div { class: "min-h-screen bg-[var(--bg)] text-[var(--text)] p-5",
            {body}
        }
    }
}

/// Create a session and submit the photo; one awaited chain so the
/// caller sees a single outcome.
#[allow(clippy::future_not_send)] // WASM is single-threaded
async fn run_try_on(
    api: &ApiClient,
    descriptor: &SessionDescriptor,
    photo: &PhotoPayload,
    style_prompt: Option<&str>,
) -> Result<TryOnResult, ApiError> {
    let session_id = api.create_session(descriptor).await?;
    api.submit_try_on(&session_id, photo, style_prompt, None)
        .await
}

/// Proxy-fetch a photo URL and wrap it for display + submission.
#[allow(clippy::future_not_send)] // WASM is single-threaded
async fn fetch_photo_via_proxy(api: &ApiClient, url: &str) -> Result<PhotoData, WidgetError> {
    let fetched = api
        .proxy_fetch_image(url)
        .await
        .map_err(ApiError::into_widget_error)?;
    let display_url = blob::bytes_to_blob_url(&fetched.bytes, &fetched.content_type)
        .map_err(|e| WidgetError::new(ErrorCode::InvalidFile, e.to_string()))?;
    Ok(PhotoData {
        payload: PhotoPayload::Bytes {
            bytes: fetched.bytes,
            mime: fetched.content_type,
        },
        display_url,
    })
}

/// Post a message to the host, logging (never raising) failures.
fn post(origin: &str, message: &WidgetMessage) {
    if let Err(e) = channel::post_to_parent(origin, message) {
        warn(&format!("mirrorme-widget: post failed: {e}"));
    }
}

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}
