//! Progressive multi-garment orchestration.
//!
//! Applies an ordered list of garments onto one evolving model photo:
//! each step's generated image becomes the next step's base image, so
//! execution is strictly sequential: step *i+1* never starts before
//! step *i*'s response is observed. Garments run in exactly the order
//! the caller selected them; "jacket over shirt" must run after
//! "shirt", so there is no reordering.
//!
//! A failed step aborts the remaining steps but keeps everything the
//! run already produced: the step trail is append-only and survives as
//! partial progress. After the last successful step a single
//! aggregation call persists the whole chain; if that call itself
//! fails, [`ProgressiveOutcome::final_image`] falls back to the last
//! step's raw image so the caller is never left without a final image.

use std::cell::Cell;
use std::rc::Rc;

use crate::types::{Garment, TryOnResult, WidgetError};

/// One generated image in a progressive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressiveStep {
    /// 1-based step number.
    pub step_number: u32,
    /// URL of the image generated by this step.
    pub image_url: String,
}

/// Progress counter surfaced to the UI.
///
/// Monotonically non-decreasing within one run; a new run starts again
/// from `{0, total}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Steps completed so far.
    pub completed: usize,
    /// Steps in the whole run.
    pub total: usize,
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum RunFailure {
    /// The cancel token was tripped before the given 1-based step.
    Cancelled {
        /// The step that would have run next.
        before_step: u32,
    },
    /// A generation step failed.
    Step {
        /// The 1-based step that failed.
        step_number: u32,
        /// The backend or transport error, passed through verbatim.
        error: WidgetError,
    },
}

/// Everything a progressive run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressiveOutcome {
    /// Images produced so far, in step order. Append-only during the
    /// run; a failure truncates the run but never this trail.
    pub trail: Vec<ProgressiveStep>,
    /// The aggregated chain record, when aggregation succeeded.
    pub aggregated: Option<TryOnResult>,
    /// The aggregation error, when the aggregation call itself failed.
    pub aggregation_error: Option<WidgetError>,
    /// Why the run stopped early, if it did.
    pub failure: Option<RunFailure>,
}

impl ProgressiveOutcome {
    /// Steps completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.trail.len()
    }

    /// The image to present as the final output: the aggregated record
    /// when available, otherwise the last step's raw image.
    #[must_use]
    pub fn final_image(&self) -> Option<&str> {
        self.aggregated
            .as_ref()
            .map(|r| r.image_url.as_str())
            .or_else(|| self.trail.last().map(|s| s.image_url.as_str()))
    }
}

/// Cooperative cancellation handle.
///
/// Cloned freely; tripping any clone cancels the run before its next
/// step. Single-threaded; the orchestrator runs on the
/// browser main thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    /// Create an untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// Whether the token has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// The per-step and aggregation operations a run needs.
///
/// Implemented over the real HTTP surface in the browser crates and by
/// mocks in tests.
#[allow(async_fn_in_trait)] // single-threaded WASM target; no Send bound needed
pub trait GarmentApplier {
    /// Apply one garment to `base_image`, returning the generated
    /// image's URL.
    async fn apply_garment(
        &self,
        base_image: &str,
        garment: &Garment,
        step_number: u32,
        style_prompt: Option<&str>,
    ) -> Result<String, WidgetError>;

    /// Persist the whole chain as one aggregated record.
    async fn aggregate(
        &self,
        base_image: &str,
        trail: &[ProgressiveStep],
        garments: &[Garment],
    ) -> Result<TryOnResult, WidgetError>;
}

/// Run a progressive multi-garment chain.
///
/// `on_progress` is invoked once per completed step, after the step's
/// response is observed, never speculatively before. The cancel token
/// is checked before each step; an in-flight step runs to completion.
#[allow(clippy::future_not_send)] // single-threaded WASM target
pub async fn run_progressive<A: GarmentApplier>(
    applier: &A,
    base_photo: &str,
    garments: &[Garment],
    style_prompt: Option<&str>,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(Progress),
) -> ProgressiveOutcome {
    let total = garments.len();
    let mut trail: Vec<ProgressiveStep> = Vec::with_capacity(total);
    let mut current_base = base_photo.to_owned();
    let mut failure = None;

    for (index, garment) in garments.iter().enumerate() {
        let step_number = u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
        if cancel.is_cancelled() {
            failure = Some(RunFailure::Cancelled {
                before_step: step_number,
            });
            break;
        }
        match applier
            .apply_garment(&current_base, garment, step_number, style_prompt)
            .await
        {
            Ok(image_url) => {
                current_base.clone_from(&image_url);
                trail.push(ProgressiveStep {
                    step_number,
                    image_url,
                });
                on_progress(Progress {
                    completed: trail.len(),
                    total,
                });
            }
            Err(error) => {
                failure = Some(RunFailure::Step { step_number, error });
                break;
            }
        }
    }

    let mut aggregated = None;
    let mut aggregation_error = None;
    if failure.is_none() && !trail.is_empty() {
        match applier.aggregate(base_photo, &trail, garments).await {
            Ok(result) => aggregated = Some(result),
            Err(error) => aggregation_error = Some(error),
        }
    }

    ProgressiveOutcome {
        trail,
        aggregated,
        aggregation_error,
        failure,
    }
}

/// Concatenate an optional garment field across the chain, in step
/// order (used for the aggregated record's name and category).
#[must_use]
pub fn concat_garment_field<F>(garments: &[Garment], field: F) -> Option<String>
where
    F: Fn(&Garment) -> Option<&str>,
{
    let values: Vec<&str> = garments.iter().filter_map(|g| field(g)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(" + "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::types::ErrorCode;

    /// Records every call and answers from a script.
    struct MockApplier {
        /// `(base_image, garment_image, step_number, prompt)` per call.
        calls: RefCell<Vec<(String, String, u32, Option<String>)>>,
        /// Steps (1-based) that should fail.
        failing_steps: Vec<u32>,
        /// Whether the aggregation call should fail.
        fail_aggregate: bool,
        aggregate_calls: RefCell<usize>,
    }

    impl MockApplier {
        fn ok() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                failing_steps: Vec::new(),
                fail_aggregate: false,
                aggregate_calls: RefCell::new(0),
            }
        }

        fn failing_at(step: u32) -> Self {
            Self {
                failing_steps: vec![step],
                ..Self::ok()
            }
        }
    }

    impl GarmentApplier for MockApplier {
        async fn apply_garment(
            &self,
            base_image: &str,
            garment: &Garment,
            step_number: u32,
            style_prompt: Option<&str>,
        ) -> Result<String, WidgetError> {
            self.calls.borrow_mut().push((
                base_image.to_owned(),
                garment.image.clone(),
                step_number,
                style_prompt.map(str::to_owned),
            ));
            if self.failing_steps.contains(&step_number) {
                return Err(WidgetError::new(
                    ErrorCode::Backend("GENERATION_FAILED".to_owned()),
                    "The model could not apply this garment",
                ));
            }
            Ok(format!("https://cdn.example/step-{step_number}.png"))
        }

        async fn aggregate(
            &self,
            _base_image: &str,
            trail: &[ProgressiveStep],
            _garments: &[Garment],
        ) -> Result<TryOnResult, WidgetError> {
            *self.aggregate_calls.borrow_mut() += 1;
            if self.fail_aggregate {
                return Err(WidgetError::processing("aggregation unavailable"));
            }
            let last = trail.last().unwrap();
            Ok(TryOnResult {
                session_id: "sess_agg".to_owned(),
                image_url: last.image_url.clone(),
                thumbnail_url: None,
                download_url: format!("{}?download=1", last.image_url),
                expires_at: "2026-03-01T00:00:00Z".to_owned(),
                processing_time_ms: 10,
            })
        }
    }

    fn garments(n: usize) -> Vec<Garment> {
        (0..n)
            .map(|i| Garment {
                image: format!("https://x/garment-{i}.jpg"),
                name: Some(format!("Garment {i}")),
                ..Garment::default()
            })
            .collect()
    }

    #[test]
    fn each_step_feeds_on_the_previous_output() {
        let applier = MockApplier::ok();
        let outcome = pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(3),
            None,
            &CancelToken::new(),
            |_| {},
        ));

        let calls = applier.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, "https://x/base.jpg");
        assert_eq!(calls[1].0, "https://cdn.example/step-1.png");
        assert_eq!(calls[2].0, "https://cdn.example/step-2.png");
        assert_eq!(outcome.completed(), 3);
        assert!(outcome.failure.is_none());
        assert!(outcome.aggregated.is_some());
    }

    #[test]
    fn garments_run_in_caller_order() {
        let applier = MockApplier::ok();
        pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(3),
            None,
            &CancelToken::new(),
            |_| {},
        ));
        let applied: Vec<String> = applier.calls.borrow().iter().map(|c| c.1.clone()).collect();
        assert_eq!(
            applied,
            vec![
                "https://x/garment-0.jpg",
                "https://x/garment-1.jpg",
                "https://x/garment-2.jpg",
            ],
        );
    }

    #[test]
    fn mid_chain_failure_truncates_but_keeps_the_trail() {
        let applier = MockApplier::failing_at(2);
        let outcome = pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(3),
            None,
            &CancelToken::new(),
            |_| {},
        ));

        assert_eq!(outcome.completed(), 1);
        assert_eq!(outcome.trail.len(), 1);
        // Step 3 was never attempted.
        assert_eq!(applier.calls.borrow().len(), 2);
        assert!(matches!(
            outcome.failure,
            Some(RunFailure::Step { step_number: 2, .. }),
        ));
        // No aggregation after a failed run, but the partial trail
        // still yields a visible image.
        assert_eq!(*applier.aggregate_calls.borrow(), 0);
        assert_eq!(outcome.final_image(), Some("https://cdn.example/step-1.png"));
    }

    #[test]
    fn backend_step_error_passes_through_verbatim() {
        let applier = MockApplier::failing_at(1);
        let outcome = pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(1),
            None,
            &CancelToken::new(),
            |_| {},
        ));
        let Some(RunFailure::Step { error, .. }) = outcome.failure else {
            unreachable!("expected a step failure");
        };
        assert_eq!(error.code, ErrorCode::Backend("GENERATION_FAILED".to_owned()));
    }

    #[test]
    fn progress_reports_after_each_step_and_stays_monotone() {
        let applier = MockApplier::ok();
        let seen = RefCell::new(Vec::new());
        pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(4),
            None,
            &CancelToken::new(),
            |p| seen.borrow_mut().push(p),
        ));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 4);
        for (i, progress) in seen.iter().enumerate() {
            assert_eq!(progress.completed, i + 1);
            assert_eq!(progress.total, 4);
            assert!(progress.completed <= progress.total);
        }
    }

    #[test]
    fn failed_step_reports_no_speculative_progress() {
        let applier = MockApplier::failing_at(2);
        let seen = RefCell::new(Vec::new());
        pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(3),
            None,
            &CancelToken::new(),
            |p| seen.borrow_mut().push(p),
        ));
        assert_eq!(
            *seen.borrow(),
            vec![Progress {
                completed: 1,
                total: 3,
            }],
        );
    }

    #[test]
    fn aggregation_failure_falls_back_to_last_step_image() {
        let applier = MockApplier {
            fail_aggregate: true,
            ..MockApplier::ok()
        };
        let outcome = pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(2),
            None,
            &CancelToken::new(),
            |_| {},
        ));
        assert!(outcome.aggregated.is_none());
        assert!(outcome.aggregation_error.is_some());
        assert_eq!(outcome.final_image(), Some("https://cdn.example/step-2.png"));
    }

    #[test]
    fn cancellation_stops_before_the_next_step() {
        let applier = MockApplier::ok();
        let cancel = CancelToken::new();
        let trip_after_first = cancel.clone();
        let outcome = pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(3),
            None,
            &cancel,
            move |p| {
                if p.completed == 1 {
                    trip_after_first.cancel();
                }
            },
        ));

        assert_eq!(applier.calls.borrow().len(), 1);
        assert_eq!(
            outcome.failure,
            Some(RunFailure::Cancelled { before_step: 2 }),
        );
        assert_eq!(outcome.trail.len(), 1);
    }

    #[test]
    fn style_prompt_reaches_every_step() {
        let applier = MockApplier::ok();
        pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &garments(2),
            Some("golden hour, rooftop"),
            &CancelToken::new(),
            |_| {},
        ));
        for call in applier.calls.borrow().iter() {
            assert_eq!(call.3.as_deref(), Some("golden hour, rooftop"));
        }
    }

    #[test]
    fn empty_garment_list_is_a_no_op() {
        let applier = MockApplier::ok();
        let outcome = pollster::block_on(run_progressive(
            &applier,
            "https://x/base.jpg",
            &[],
            None,
            &CancelToken::new(),
            |_| {},
        ));
        assert!(outcome.trail.is_empty());
        assert!(outcome.aggregated.is_none());
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.final_image(), None);
    }

    #[test]
    fn concat_garment_field_joins_in_order() {
        let garments = garments(3);
        assert_eq!(
            concat_garment_field(&garments, |g| g.name.as_deref()),
            Some("Garment 0 + Garment 1 + Garment 2".to_owned()),
        );
        assert_eq!(
            concat_garment_field(&garments, |g| g.category.as_deref()),
            None,
        );
    }
}
