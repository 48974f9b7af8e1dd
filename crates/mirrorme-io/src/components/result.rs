//! Result step: show the generated image with download and retry.

use dioxus::prelude::*;
use dioxus_free_icons::Icon;
use dioxus_free_icons::icons::ld_icons::LdDownload;
use mirrorme_core::types::TryOnResult;

use crate::download;

/// Props for the [`ResultStep`] component.
#[derive(Props, Clone, PartialEq)]
pub struct ResultStepProps {
    /// The completed run.
    result: TryOnResult,
    /// Fired when the shopper wants another attempt.
    on_retry: EventHandler<()>,
    /// Fired when the shopper is done.
    on_close: EventHandler<()>,
}

/// The generated try-on image with its actions.
#[component]
pub fn ResultStep(props: ResultStepProps) -> Element {
    let mut download_error = use_signal(|| Option::<String>::None);

    let download_url = props.result.download_url.clone();
    let handle_download = move |_| {
        if let Err(e) = download::trigger_download(&download_url, "mirrorme-tryon.png") {
            download_error.set(Some(format!("Download failed: {e}")));
        } else {
            download_error.set(None);
        }
    };

    rsx! {
        div { class: "flex flex-col gap-4",
            h2 { class: "text-lg font-semibold text-[var(--text-heading)]",
                "Here's your look"
            }

            img {
                src: "{props.result.image_url}",
                alt: "Your virtual try-on",
                class: "w-full rounded-lg object-cover max-h-[60vh]",
            }

            if let Some(ref err) = download_error() {
                p { class: "text-[var(--text-error)] text-sm", "{err}" }
            }

            div { class: "flex gap-2",
                button {
                    class: "flex-1 inline-flex items-center justify-center gap-2 px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded text-white font-medium transition-colors",
                    onclick: handle_download,
                    Icon { icon: LdDownload, width: 16, height: 16 }
                    "Save photo"
                }
                button {
                    class: "flex-1 px-4 py-2 bg-[var(--surface)] hover:bg-[var(--surface-active)] rounded text-[var(--text-secondary)] transition-colors",
                    onclick: move |_| props.on_retry.call(()),
                    "Try another photo"
                }
            }
            button {
                class: "text-sm text-[var(--text-secondary)] hover:text-[var(--text-heading)] transition-colors",
                onclick: move |_| props.on_close.call(()),
                "Done"
            }
        }
    }
}
