//! mirrorme-core: widget protocol, session state machine, and
//! progressive orchestrator (sans-IO).
//!
//! Everything that crosses the iframe boundary or drives a try-on
//! session is modelled here as plain data and pure transitions. This
//! crate has **no browser dependencies** -- it operates on strings and
//! structs and is tested natively. All DOM, postMessage, camera, and
//! HTTP interaction lives in `mirrorme-io`.

pub mod fsm;
pub mod message;
pub mod orchestrator;
pub mod params;
pub mod types;

pub use fsm::{FsmError, SessionEvent, Step, Transition, TryOnFsm};
pub use message::{PhotoSource, WidgetMessage};
pub use orchestrator::{
    CancelToken, GarmentApplier, Progress, ProgressiveOutcome, ProgressiveStep, RunFailure,
    run_progressive,
};
pub use params::ParsedDescriptor;
pub use types::{
    ErrorCode, Garment, ProductInfo, SessionDescriptor, Theme, TryOnResult, UserInfo, WidgetError,
    WidgetOptions,
};
