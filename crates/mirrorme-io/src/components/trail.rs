//! Horizontal strip of progressive-run step images.
//!
//! The studio renders one tile per completed garment step, in step
//! order. A mid-chain failure keeps every earlier tile visible
//! (partial progress is a result, not an error screen) and marks the
//! failed step in place.

use dioxus::prelude::*;
use mirrorme_core::orchestrator::ProgressiveStep;

/// Props for the [`TrailStrip`] component.
#[derive(Props, Clone, PartialEq)]
pub struct TrailStripProps {
    /// Completed steps, in step order.
    steps: Vec<ProgressiveStep>,
    /// 1-based number of the step that failed, if any.
    failed_step: Option<u32>,
    /// Fired when a tile is clicked, with that step's image URL.
    on_select: EventHandler<String>,
}

/// Scrollable strip of step-result thumbnails.
#[component]
pub fn TrailStrip(props: TrailStripProps) -> Element {
    rsx! {
        div { class: "flex flex-nowrap overflow-x-auto gap-2 py-2 scrollbar-thin",

            for step in props.steps.iter() {
                {render_tile(step, &props.on_select)}
            }

            if let Some(failed) = props.failed_step {
                div {
                    class: "flex-shrink-0 flex flex-col items-center justify-center gap-1 p-1 rounded
                            w-[80px] md:w-[100px] aspect-square border border-[var(--error-border)] bg-[var(--error-bg)]",
                    title: "Step {failed} failed",
                    span { class: "text-xs text-[var(--text-error)] text-center",
                        "Step {failed} failed"
                    }
                }
            }
        }
    }
}

/// Render a single step tile.
fn render_tile(step: &ProgressiveStep, on_select: &EventHandler<String>) -> Element {
    let number = step.step_number;
    let url = step.image_url.clone();
    let onclick = {
        let on_select = *on_select;
        let url = url.clone();
        move |_| on_select.call(url.clone())
    };

    rsx! {
        button {
            class: "flex-shrink-0 flex flex-col items-center gap-1 p-1 rounded cursor-pointer
                    w-[80px] md:w-[100px] bg-[var(--surface)] hover:bg-[var(--surface-active)]
                    border border-[var(--border)] transition-colors",
            onclick: onclick,
            title: "Step {number}",
            aria_label: "Show step {number} result",

            div { class: "w-full aspect-square overflow-hidden rounded bg-[var(--preview-bg)]",
                img {
                    src: "{url}",
                    class: "w-full h-full object-cover",
                    alt: "Step {number} result",
                }
            }
            span { class: "text-xs text-[var(--text-secondary)]", "Step {number}" }
        }
    }
}
