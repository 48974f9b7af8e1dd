//! Preview step: confirm the chosen photo before submission.

use dioxus::prelude::*;
use mirrorme_core::types::ProductInfo;

/// Props for the [`PreviewStep`] component.
#[derive(Props, Clone, PartialEq)]
pub struct PreviewStepProps {
    /// Displayable URL of the chosen photo (Blob or remote).
    photo_url: String,
    /// The product being tried on.
    product: ProductInfo,
    /// Current free-text styling prompt.
    prompt: String,
    /// Fired on every prompt edit.
    on_prompt_change: EventHandler<String>,
    /// Fired when the shopper confirms ("Mirror Me").
    on_confirm: EventHandler<()>,
    /// Fired when the shopper wants a different photo.
    on_change_photo: EventHandler<()>,
}

/// Photo confirmation with the product card and an optional styling
/// prompt.
#[component]
pub fn PreviewStep(props: PreviewStepProps) -> Element {
    let product_label = props
        .product
        .name
        .clone()
        .unwrap_or_else(|| "this item".to_owned());

    rsx! {
        div { class: "flex flex-col gap-4",
            h2 { class: "text-lg font-semibold text-[var(--text-heading)]",
                "Ready to try on {product_label}?"
            }

            div { class: "flex gap-3 items-start",
                img {
                    src: "{props.photo_url}",
                    alt: "Your photo",
                    class: "flex-1 min-w-0 rounded-lg object-cover max-h-[50vh]",
                }
                div { class: "w-24 flex flex-col gap-1 items-center",
                    img {
                        src: "{props.product.image}",
                        alt: "{product_label}",
                        class: "w-24 h-24 rounded object-cover bg-[var(--surface)]",
                    }
                    if let Some(ref price) = props.product.price {
                        span { class: "text-xs text-[var(--text-secondary)]",
                            "{price} {props.product.currency.as_deref().unwrap_or_default()}"
                        }
                    }
                }
            }

            label { class: "flex flex-col gap-1 text-sm text-[var(--text-secondary)]",
                "Styling notes (optional)"
                input {
                    r#type: "text",
                    value: "{props.prompt}",
                    placeholder: "e.g. tucked in, sleeves rolled up",
                    class: "px-3 py-2 rounded border border-[var(--border-muted)] bg-[var(--surface)] text-[var(--text-heading)]",
                    oninput: move |evt| props.on_prompt_change.call(evt.value()),
                }
            }

            button {
                class: "px-4 py-3 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded-lg text-white font-semibold transition-colors",
                onclick: move |_| props.on_confirm.call(()),
                "Mirror Me"
            }
            button {
                class: "text-sm text-[var(--text-secondary)] hover:text-[var(--text-heading)] transition-colors",
                onclick: move |_| props.on_change_photo.call(()),
                "Use a different photo"
            }
        }
    }
}
