//! Processing step: progress display while the backend generates.

use dioxus::prelude::*;

/// Props for the [`ProcessingStep`] component.
#[derive(Props, Clone, PartialEq)]
pub struct ProcessingStepProps {
    /// Progress percentage in `0..=100`.
    ///
    /// These values are synthesized on a timer by the session
    /// controller; the real completion signal is the HTTP response.
    progress: u8,
}

/// Indeterminate-in-disguise progress bar for the generation call.
#[component]
pub fn ProcessingStep(props: ProcessingStepProps) -> Element {
    let percent = props.progress.min(100);

    rsx! {
        div { class: "flex flex-col gap-4 items-center py-8",
            p { class: "text-lg text-[var(--text-heading)] animate-pulse",
                "Creating your look..."
            }
            div {
                class: "w-full h-2 rounded bg-[var(--surface)] overflow-hidden",
                role: "progressbar",
                "aria-valuenow": "{percent}",
                "aria-valuemin": "0",
                "aria-valuemax": "100",
                div {
                    class: "h-full bg-[var(--btn-primary)] transition-all duration-500",
                    style: "width: {percent}%",
                }
            }
            p { class: "text-sm text-[var(--text-secondary)]",
                "{percent}%"
            }
        }
    }
}
