//! Error step: a failed run with retry and close affordances.
//!
//! Renders the human-readable message only. The machine code rides
//! along in the protocol for the host page's error tracking but is
//! never shown to the shopper, and the step is never a dead end:
//! retry and close are always offered.

use dioxus::prelude::*;

/// Props for the [`ErrorStep`] component.
#[derive(Props, Clone, PartialEq)]
pub struct ErrorStepProps {
    /// Human-readable failure message.
    message: String,
    /// Fired to start over from the photo step.
    on_retry: EventHandler<()>,
    /// Fired to close the widget.
    on_close: EventHandler<()>,
}

/// The failed-run step.
#[component]
pub fn ErrorStep(props: ErrorStepProps) -> Element {
    rsx! {
        div { class: "flex flex-col gap-4 items-center py-8 text-center",
            h2 { class: "text-lg font-semibold text-[var(--text-heading)]",
                "That didn't work"
            }
            p { class: "text-[var(--text-error)]", "{props.message}" }

            div { class: "flex gap-2",
                button {
                    class: "px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded text-white font-medium transition-colors",
                    onclick: move |_| props.on_retry.call(()),
                    "Try again"
                }
                button {
                    class: "px-4 py-2 bg-[var(--surface)] hover:bg-[var(--surface-active)] rounded text-[var(--text-secondary)] transition-colors",
                    onclick: move |_| props.on_close.call(()),
                    "Close"
                }
            }
        }
    }
}
