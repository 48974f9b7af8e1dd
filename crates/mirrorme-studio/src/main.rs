//! Dashboard studio: progressive multi-garment try-on.
//!
//! Applies the selected garments onto one model photo, strictly in
//! selection order ("jacket over shirt" only works after "shirt"), and
//! keeps every intermediate step visible. Unlike the embedded widget,
//! the studio drives the HTTP surface directly on this page; there is
//! no iframe and no message channel here.

use mirrorme_core::orchestrator::{CancelToken, Progress, ProgressiveOutcome, RunFailure, run_progressive};
use mirrorme_core::types::Garment;

use dioxus::prelude::*;
use mirrorme_io::analytics;
use mirrorme_io::api::{ApiClient, StudioApplier};
use mirrorme_io::components::TrailStrip;

/// Try-on backend base URL.
const API_BASE_URL: &str = "https://api.mirrorme.app/v1";

fn main() {
    dioxus::launch(app);
}

/// Root studio component.
#[allow(clippy::too_many_lines)]
fn app() -> Element {
    let mut merchant_key = use_signal(initial_merchant_key);
    let mut base_photo = use_signal(String::new);
    let mut garments = use_signal(Vec::<Garment>::new);
    let mut garment_url = use_signal(String::new);
    let mut garment_name = use_signal(String::new);
    let mut prompt = use_signal(String::new);

    let mut running = use_signal(|| false);
    let mut progress = use_signal(|| Option::<Progress>::None);
    let mut outcome = use_signal(|| Option::<ProgressiveOutcome>::None);
    let mut selected_image = use_signal(|| Option::<String>::None);
    let mut form_error = use_signal(|| Option::<String>::None);
    let mut cancel = use_signal(CancelToken::new);

    // Leaving the studio must not leave a run believing anyone is
    // watching: trip the token so the next step never starts.
    use_drop(move || cancel.peek().cancel());

    let add_garment = move |_| {
        let url = garment_url.peek().trim().to_owned();
        if url.is_empty() {
            form_error.set(Some("Enter a garment image URL first".to_owned()));
            return;
        }
        let name = garment_name.peek().trim().to_owned();
        garments.write().push(Garment {
            image: url,
            name: (!name.is_empty()).then_some(name),
            ..Garment::default()
        });
        garment_url.set(String::new());
        garment_name.set(String::new());
        form_error.set(None);
    };

    let on_generate = move |_| {
        if *running.peek() {
            return;
        }
        let key = merchant_key.peek().trim().to_owned();
        let base = base_photo.peek().trim().to_owned();
        let selection = (*garments.peek()).clone();
        if key.is_empty() {
            form_error.set(Some("A merchant key is required".to_owned()));
            return;
        }
        if base.is_empty() {
            form_error.set(Some("Add a model photo URL first".to_owned()));
            return;
        }
        if selection.is_empty() {
            form_error.set(Some("Select at least one garment".to_owned()));
            return;
        }
        form_error.set(None);

        running.set(true);
        outcome.set(None);
        selected_image.set(None);
        progress.set(Some(Progress {
            completed: 0,
            total: selection.len(),
        }));

        let token = CancelToken::new();
        cancel.set(token.clone());

        spawn(async move {
            let style = prompt.peek().trim().to_owned();
            let style = (!style.is_empty()).then_some(style);
            let applier = StudioApplier::new(ApiClient::new(API_BASE_URL), key);

            let run = run_progressive(
                &applier,
                &base,
                &selection,
                style.as_deref(),
                &token,
                move |p| progress.set(Some(p)),
            )
            .await;

            analytics::track_studio_run(run.completed());
            outcome.set(Some(run));
            running.set(false);
        });
    };

    let current: Option<ProgressiveOutcome> = outcome();
    let trail = current.as_ref().map(|o| o.trail.clone()).unwrap_or_default();
    let failed_step = current.as_ref().and_then(|o| match o.failure {
        Some(RunFailure::Step { step_number, .. }) => Some(step_number),
        _ => None,
    });
    let failure_banner = current.as_ref().and_then(|o| match &o.failure {
        Some(RunFailure::Step { step_number, error }) => Some(format!(
            "Step {step_number} failed: {}. Earlier steps are kept below.",
            error.message,
        )),
        Some(RunFailure::Cancelled { .. }) => Some("Run cancelled.".to_owned()),
        None => None,
    });
    let aggregation_note = current.as_ref().and_then(|o| {
        o.aggregation_error.as_ref().map(|_| {
            "Couldn't save the full look — showing the last step instead.".to_owned()
        })
    });
    let final_image = selected_image().or_else(|| {
        current
            .as_ref()
            .and_then(|o| o.final_image().map(str::to_owned))
    });

    rsx! {
        div { class: "min-h-screen bg-[var(--bg)] text-[var(--text)] flex flex-col",
            header { class: "px-6 py-4 border-b border-[var(--border)]",
                h1 { class: "text-2xl title-brand", "MirrorMe Studio" }
                p { class: "text-[var(--muted)] text-sm",
                    "Layer garments onto one model photo, one step at a time"
                }
            }

            div { class: "flex-1 flex flex-col lg:flex-row gap-6 p-6",
                // Left column: run setup.
                div { class: "lg:w-80 flex-shrink-0 flex flex-col gap-4",
                    label { class: "flex flex-col gap-1 text-sm text-[var(--text-secondary)]",
                        "Merchant key"
                        input {
                            r#type: "text",
                            value: "{merchant_key}",
                            class: "px-3 py-2 rounded border border-[var(--border-muted)] bg-[var(--surface)]",
                            oninput: move |evt| merchant_key.set(evt.value()),
                        }
                    }
                    label { class: "flex flex-col gap-1 text-sm text-[var(--text-secondary)]",
                        "Model photo URL"
                        input {
                            r#type: "text",
                            value: "{base_photo}",
                            placeholder: "https://...",
                            class: "px-3 py-2 rounded border border-[var(--border-muted)] bg-[var(--surface)]",
                            oninput: move |evt| base_photo.set(evt.value()),
                        }
                    }

                    div { class: "flex flex-col gap-2 p-3 rounded bg-[var(--surface)]",
                        h3 { class: "text-sm font-semibold text-[var(--text-heading)]",
                            "Garments (applied in order)"
                        }
                        for (index, garment) in garments().into_iter().enumerate() {
                            div { class: "flex items-center gap-2 text-sm",
                                span { class: "text-[var(--muted)] w-5", "{index + 1}." }
                                span { class: "flex-1 truncate",
                                    {garment.name.clone().unwrap_or_else(|| garment.image.clone())}
                                }
                                button {
                                    class: "text-[var(--text-error)] text-xs",
                                    onclick: move |_| {
                                        garments.write().remove(index);
                                    },
                                    "remove"
                                }
                            }
                        }
                        input {
                            r#type: "text",
                            value: "{garment_url}",
                            placeholder: "Garment image URL",
                            class: "px-3 py-2 rounded border border-[var(--border-muted)] bg-[var(--bg)]",
                            oninput: move |evt| garment_url.set(evt.value()),
                        }
                        input {
                            r#type: "text",
                            value: "{garment_name}",
                            placeholder: "Garment name (optional)",
                            class: "px-3 py-2 rounded border border-[var(--border-muted)] bg-[var(--bg)]",
                            oninput: move |evt| garment_name.set(evt.value()),
                        }
                        button {
                            class: "px-3 py-2 rounded bg-[var(--surface-active)] hover:bg-[var(--border-muted)] text-sm transition-colors",
                            onclick: add_garment,
                            "Add garment"
                        }
                    }

                    label { class: "flex flex-col gap-1 text-sm text-[var(--text-secondary)]",
                        "Styling notes (optional)"
                        input {
                            r#type: "text",
                            value: "{prompt}",
                            placeholder: "e.g. evening light, city street",
                            class: "px-3 py-2 rounded border border-[var(--border-muted)] bg-[var(--surface)]",
                            oninput: move |evt| prompt.set(evt.value()),
                        }
                    }

                    if let Some(ref err) = form_error() {
                        p { class: "text-[var(--text-error)] text-sm", "{err}" }
                    }

                    button {
                        class: "px-4 py-3 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded-lg text-white font-semibold transition-colors disabled:opacity-50",
                        disabled: running(),
                        onclick: on_generate,
                        if running() { "Generating..." } else { "Generate" }
                    }

                    if let Some(p) = progress() {
                        p { class: "text-sm text-[var(--text-secondary)]",
                            "{p.completed} / {p.total} garments applied"
                        }
                    }
                }

                // Right column: results.
                div { class: "flex-1 flex flex-col gap-4",
                    if let Some(ref banner) = failure_banner {
                        div { class: "bg-[var(--error-bg)] border border-[var(--error-border)] rounded p-3",
                            p { class: "text-[var(--text-error)] text-sm", "{banner}" }
                        }
                    }
                    if let Some(ref note) = aggregation_note {
                        p { class: "text-[var(--muted)] text-sm", "{note}" }
                    }

                    if let Some(ref image) = final_image {
                        img {
                            src: "{image}",
                            alt: "Progressive try-on result",
                            class: "w-full max-h-[60vh] object-contain rounded-lg bg-[var(--surface)]",
                        }
                    } else if running() {
                        div { class: "flex-1 flex items-center justify-center",
                            p { class: "text-[var(--text-secondary)] text-lg animate-pulse",
                                "Applying garments..."
                            }
                        }
                    } else {
                        div { class: "flex-1 flex items-center justify-center",
                            p { class: "text-[var(--text-placeholder)] text-lg",
                                "Add a model photo and garments to get started"
                            }
                        }
                    }

                    if !trail.is_empty() {
                        TrailStrip {
                            steps: trail,
                            failed_step,
                            on_select: move |url| selected_image.set(Some(url)),
                        }
                    }
                }
            }
        }
    }
}

/// Merchant key preset through the page URL, when the dashboard links
/// here with `?merchantKey=...`.
fn initial_merchant_key() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .map(|search| {
            mirrorme_core::params::parse_query_string(&search)
                .into_iter()
                .find(|(key, _)| key == "merchantKey")
                .map(|(_, value)| value)
                .unwrap_or_default()
        })
        .unwrap_or_default()
}
