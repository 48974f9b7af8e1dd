//! Try-on session state machine.
//!
//! The embedded widget walks the shopper through a fixed sequence of
//! steps. Transitions are one-directional except for the explicit
//! retry, which resets to the photo step:
//!
//! ```text
//! photo ──(photo supplied)──────────────▶ preview
//! preview ──(confirm)───────────────────▶ processing
//! preview ──(change photo)──────────────▶ photo
//! processing ──(success)────────────────▶ result
//! processing ──(failure)────────────────▶ error
//! result / error ──(retry)──────────────▶ photo
//! any ──(close)─────────────────────────▶ closed (terminal)
//! ```
//!
//! Client-side validation failures (bad file, denied camera) never feed
//! the machine; they surface as inline errors while the current step
//! stays active. Only the machine decides what the next step is; UI
//! code renders whatever step is current.

use std::fmt;

use crate::message::PhotoSource;
use crate::types::{SessionDescriptor, WidgetError};

/// The widget's current step. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Acquiring a photo (camera, upload, or model URL).
    Photo,
    /// Reviewing the chosen photo before submission.
    Preview,
    /// Waiting for the backend to generate the try-on image.
    Processing,
    /// Showing a successful [`crate::types::TryOnResult`].
    Result,
    /// Showing a failed run.
    Error,
}

impl Step {
    /// All steps in walk order.
    pub const ALL: [Self; 5] = [
        Self::Photo,
        Self::Preview,
        Self::Processing,
        Self::Result,
        Self::Error,
    ];

    /// Display label for the step.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Photo => "Photo",
            Self::Preview => "Preview",
            Self::Processing => "Processing",
            Self::Result => "Result",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An event fed to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A photo was acquired through one of the three paths.
    PhotoSupplied {
        /// Which acquisition path produced it.
        source: PhotoSource,
    },
    /// The shopper wants a different photo.
    PhotoCleared,
    /// The shopper confirmed the preview ("Mirror Me").
    Confirmed,
    /// The backend produced a result.
    ProcessingSucceeded,
    /// The backend call failed.
    ProcessingFailed,
    /// Start over from the photo step.
    Retry,
    /// Close the widget. Terminal for this session.
    Close,
}

impl SessionEvent {
    /// Short name for logs and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PhotoSupplied { .. } => "photoSupplied",
            Self::PhotoCleared => "photoCleared",
            Self::Confirmed => "confirmed",
            Self::ProcessingSucceeded => "processingSucceeded",
            Self::ProcessingFailed => "processingFailed",
            Self::Retry => "retry",
            Self::Close => "close",
        }
    }
}

/// A rejected event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    /// The event is not legal in the current step.
    #[error("event {event} is not valid in step {step}")]
    InvalidTransition {
        /// The step the machine was in.
        step: Step,
        /// The rejected event's name.
        event: &'static str,
    },
    /// The session was already closed.
    #[error("session is closed")]
    Closed,
}

/// A completed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Step before the event.
    pub from: Step,
    /// Step after the event.
    pub to: Step,
}

/// The try-on session state machine.
///
/// Besides the active [`Step`] it tracks two pieces of in-state
/// context: an inline error (shown without leaving the step) and the
/// transient model-image fetch that may be running while the photo
/// step is visible. A failed fetch never strands the shopper: the
/// photo step stays fully usable underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct TryOnFsm {
    step: Step,
    closed: bool,
    fetching_model: bool,
    inline_error: Option<WidgetError>,
}

impl TryOnFsm {
    /// Create the machine for a session.
    ///
    /// Starts in [`Step::Preview`] when the descriptor carries both a
    /// ready-made user photo and the skip-photo-step flag; starts in
    /// [`Step::Photo`] otherwise. A `model_image` URL additionally
    /// marks the model fetch as pending (the controller resolves it by
    /// feeding [`SessionEvent::PhotoSupplied`] or calling
    /// [`model_fetch_failed`](Self::model_fetch_failed)).
    #[must_use]
    pub fn new(descriptor: &SessionDescriptor) -> Self {
        let skip = descriptor.options.skip_photo_step && descriptor.user_image().is_some();
        Self {
            step: if skip { Step::Preview } else { Step::Photo },
            closed: false,
            fetching_model: !skip && descriptor.model_image.is_some(),
            inline_error: None,
        }
    }

    /// The active step.
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step
    }

    /// Whether the session has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a model-image fetch is still pending.
    #[must_use]
    pub const fn is_fetching_model(&self) -> bool {
        self.fetching_model
    }

    /// The current inline error, if any.
    #[must_use]
    pub const fn inline_error(&self) -> Option<&WidgetError> {
        self.inline_error.as_ref()
    }

    /// Surface an error without leaving the current step.
    ///
    /// Used for client-side validation failures: invalid file, file too
    /// large, camera denied. These must never push the machine into
    /// [`Step::Processing`] or [`Step::Error`].
    pub fn set_inline_error(&mut self, error: WidgetError) {
        self.inline_error = Some(error);
    }

    /// The pending model-image fetch failed.
    ///
    /// The machine stays in [`Step::Photo`] with an inline error so the
    /// shopper can still supply a photo manually.
    pub fn model_fetch_failed(&mut self, error: WidgetError) {
        self.fetching_model = false;
        self.set_inline_error(error);
    }

    /// Apply an event.
    ///
    /// # Errors
    ///
    /// Returns [`FsmError::Closed`] after [`SessionEvent::Close`], and
    /// [`FsmError::InvalidTransition`] for any event that is not legal
    /// in the current step. A rejected event leaves the machine
    /// untouched.
    pub fn apply(&mut self, event: &SessionEvent) -> Result<Transition, FsmError> {
        if self.closed {
            return Err(FsmError::Closed);
        }
        let from = self.step;
        let to = match (from, event) {
            (_, SessionEvent::Close) => {
                self.closed = true;
                from
            }
            (Step::Photo, SessionEvent::PhotoSupplied { .. }) => Step::Preview,
            (Step::Preview, SessionEvent::PhotoCleared) => Step::Photo,
            (Step::Preview, SessionEvent::Confirmed) => Step::Processing,
            (Step::Processing, SessionEvent::ProcessingSucceeded) => Step::Result,
            (Step::Processing, SessionEvent::ProcessingFailed) => Step::Error,
            (Step::Result | Step::Error, SessionEvent::Retry) => Step::Photo,
            _ => {
                return Err(FsmError::InvalidTransition {
                    step: from,
                    event: event.name(),
                });
            }
        };
        // A successful transition consumes the pending fetch and any
        // inline error; they belong to the step being left.
        self.fetching_model = false;
        self.inline_error = None;
        self.step = to;
        Ok(Transition { from, to })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::types::{ErrorCode, ProductInfo, UserInfo};

    fn descriptor() -> SessionDescriptor {
        SessionDescriptor::new("mk_test_abc", ProductInfo::from_image("https://x/y.jpg"))
    }

    fn supplied(source: PhotoSource) -> SessionEvent {
        SessionEvent::PhotoSupplied { source }
    }

    #[test]
    fn starts_in_photo_by_default() {
        let fsm = TryOnFsm::new(&descriptor());
        assert_eq!(fsm.step(), Step::Photo);
        assert!(!fsm.is_fetching_model());
    }

    #[test]
    fn starts_in_preview_with_skip_and_user_image() {
        let mut d = descriptor();
        d.options.skip_photo_step = true;
        d.user = Some(UserInfo {
            id: None,
            image: Some("https://x/me.jpg".to_owned()),
        });
        assert_eq!(TryOnFsm::new(&d).step(), Step::Preview);
    }

    #[test]
    fn skip_without_user_image_still_starts_in_photo() {
        let mut d = descriptor();
        d.options.skip_photo_step = true;
        assert_eq!(TryOnFsm::new(&d).step(), Step::Photo);
    }

    #[test]
    fn model_image_marks_pending_fetch() {
        let mut d = descriptor();
        d.model_image = Some("https://x/model.jpg".to_owned());
        let mut fsm = TryOnFsm::new(&d);
        assert_eq!(fsm.step(), Step::Photo);
        assert!(fsm.is_fetching_model());

        // Successful fetch converges on the normal photo-supplied path.
        fsm.apply(&supplied(PhotoSource::ModelUrl)).unwrap();
        assert_eq!(fsm.step(), Step::Preview);
        assert!(!fsm.is_fetching_model());
    }

    #[test]
    fn model_fetch_failure_stays_in_photo_with_inline_error() {
        let mut d = descriptor();
        d.model_image = Some("https://x/not-an-image".to_owned());
        let mut fsm = TryOnFsm::new(&d);
        fsm.model_fetch_failed(WidgetError::new(
            ErrorCode::InvalidFile,
            "The model photo could not be loaded",
        ));
        assert_eq!(fsm.step(), Step::Photo);
        assert!(!fsm.is_fetching_model());
        assert!(fsm.inline_error().is_some());

        // The shopper can still supply a photo manually.
        fsm.apply(&supplied(PhotoSource::Upload)).unwrap();
        assert_eq!(fsm.step(), Step::Preview);
        assert!(fsm.inline_error().is_none());
    }

    #[test]
    fn happy_path_walks_all_steps() {
        let mut fsm = TryOnFsm::new(&descriptor());
        let t = fsm.apply(&supplied(PhotoSource::Camera)).unwrap();
        assert_eq!((t.from, t.to), (Step::Photo, Step::Preview));
        fsm.apply(&SessionEvent::Confirmed).unwrap();
        assert_eq!(fsm.step(), Step::Processing);
        fsm.apply(&SessionEvent::ProcessingSucceeded).unwrap();
        assert_eq!(fsm.step(), Step::Result);
        fsm.apply(&SessionEvent::Retry).unwrap();
        assert_eq!(fsm.step(), Step::Photo);
    }

    #[test]
    fn failure_path_reaches_error_then_retries() {
        let mut fsm = TryOnFsm::new(&descriptor());
        fsm.apply(&supplied(PhotoSource::Upload)).unwrap();
        fsm.apply(&SessionEvent::Confirmed).unwrap();
        fsm.apply(&SessionEvent::ProcessingFailed).unwrap();
        assert_eq!(fsm.step(), Step::Error);
        fsm.apply(&SessionEvent::Retry).unwrap();
        assert_eq!(fsm.step(), Step::Photo);
    }

    #[test]
    fn preview_can_go_back_for_another_photo() {
        let mut fsm = TryOnFsm::new(&descriptor());
        fsm.apply(&supplied(PhotoSource::Upload)).unwrap();
        fsm.apply(&SessionEvent::PhotoCleared).unwrap();
        assert_eq!(fsm.step(), Step::Photo);
    }

    #[test]
    fn illegal_events_leave_the_machine_untouched() {
        let mut fsm = TryOnFsm::new(&descriptor());
        let err = fsm.apply(&SessionEvent::Confirmed).unwrap_err();
        assert_eq!(
            err,
            FsmError::InvalidTransition {
                step: Step::Photo,
                event: "confirmed",
            },
        );
        assert_eq!(fsm.step(), Step::Photo);
    }

    #[test]
    fn close_is_terminal() {
        let mut fsm = TryOnFsm::new(&descriptor());
        fsm.apply(&SessionEvent::Close).unwrap();
        assert!(fsm.is_closed());
        assert_eq!(
            fsm.apply(&supplied(PhotoSource::Camera)),
            Err(FsmError::Closed),
        );
    }

    #[test]
    fn inline_error_does_not_change_step() {
        let mut fsm = TryOnFsm::new(&descriptor());
        fsm.set_inline_error(WidgetError::new(
            ErrorCode::FileTooLarge,
            "That photo is too large",
        ));
        assert_eq!(fsm.step(), Step::Photo);
        assert_eq!(
            fsm.inline_error().map(|e| e.code.clone()),
            Some(ErrorCode::FileTooLarge),
        );
    }

    /// Fuzz the machine with random event sequences and assert the
    /// processing invariant: from `Processing` the only reachable next
    /// steps are `Result` and `Error`.
    #[test]
    fn processing_only_reaches_result_or_error() {
        let mut rng = StdRng::seed_from_u64(0x4d69_7272);
        let events = [
            supplied(PhotoSource::Camera),
            supplied(PhotoSource::Upload),
            supplied(PhotoSource::ModelUrl),
            SessionEvent::PhotoCleared,
            SessionEvent::Confirmed,
            SessionEvent::ProcessingSucceeded,
            SessionEvent::ProcessingFailed,
            SessionEvent::Retry,
        ];

        for _ in 0..200 {
            let mut fsm = TryOnFsm::new(&descriptor());
            for _ in 0..64 {
                let event = &events[rng.gen_range(0..events.len())];
                let before = fsm.step();
                if let Ok(transition) = fsm.apply(event) {
                    if before == Step::Processing {
                        assert!(
                            matches!(transition.to, Step::Result | Step::Error),
                            "processing reached {} via {}",
                            transition.to,
                            event.name(),
                        );
                    }
                } else {
                    // Rejected events must not move the machine.
                    assert_eq!(fsm.step(), before);
                }
            }
        }
    }
}
