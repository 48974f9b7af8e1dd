//! Integration test: one full try-on session, from the host building
//! the iframe URL through the embedded state machine to the messages
//! relayed back, plus a progressive studio run over the same types.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;

use mirrorme_core::fsm::{SessionEvent, Step, TryOnFsm};
use mirrorme_core::message::{PhotoSource, WidgetMessage};
use mirrorme_core::orchestrator::{
    CancelToken, GarmentApplier, ProgressiveStep, run_progressive,
};
use mirrorme_core::params;
use mirrorme_core::types::{
    Garment, ProductInfo, SessionDescriptor, Theme, TryOnResult, WidgetError, WidgetOptions,
};

fn sample_result(session_id: &str) -> TryOnResult {
    TryOnResult {
        session_id: session_id.to_owned(),
        image_url: "https://cdn.mirrorme.app/r/42.png".to_owned(),
        thumbnail_url: None,
        download_url: "https://cdn.mirrorme.app/r/42.png?download=1".to_owned(),
        expires_at: "2026-09-01T00:00:00Z".to_owned(),
        processing_time_ms: 5300,
    }
}

#[test]
fn widget_session_round_trip() {
    // The merchant page opens the widget for a product.
    let descriptor = SessionDescriptor {
        merchant_key: "mk_test_abc".to_owned(),
        product: ProductInfo {
            image: "https://shop.example/coat.jpg".to_owned(),
            name: Some("Wool coat".to_owned()),
            category: Some("coat".to_owned()),
            ..ProductInfo::default()
        },
        user: None,
        options: WidgetOptions {
            allow_camera: false,
            ..WidgetOptions::default()
        },
        theme: Theme::Dark,
        locale: Some("en-GB".to_owned()),
        model_image: None,
    };

    // Host side: descriptor → iframe query string.
    // Widget side: query string → serialization-equal descriptor.
    let query = params::to_query_string(&descriptor);
    let reconstructed = params::from_query_pairs(params::parse_query_string(&query)).unwrap();
    assert_eq!(reconstructed.descriptor, descriptor);
    assert!(reconstructed.warnings.is_empty());

    // The embedded controller walks the happy path.
    let mut fsm = TryOnFsm::new(&reconstructed.descriptor);
    assert_eq!(fsm.step(), Step::Photo);
    fsm.apply(&SessionEvent::PhotoSupplied {
        source: PhotoSource::Upload,
    })
    .unwrap();
    fsm.apply(&SessionEvent::Confirmed).unwrap();
    assert_eq!(fsm.step(), Step::Processing);
    fsm.apply(&SessionEvent::ProcessingSucceeded).unwrap();
    assert_eq!(fsm.step(), Step::Result);

    // Every message the controller would relay survives the envelope
    // round trip the host listener performs.
    let messages = [
        WidgetMessage::Ready,
        WidgetMessage::PhotoSelected {
            source: PhotoSource::Upload,
        },
        WidgetMessage::ProcessingStart,
        WidgetMessage::progress(35),
        WidgetMessage::Result(sample_result("sess_1")),
        WidgetMessage::Close {
            reason: "user".to_owned(),
        },
    ];
    for message in messages {
        let json = message.to_json().unwrap();
        assert_eq!(WidgetMessage::parse(&json).unwrap(), Some(message));
    }
}

struct ScriptedApplier {
    bases_seen: RefCell<Vec<String>>,
}

impl GarmentApplier for ScriptedApplier {
    async fn apply_garment(
        &self,
        base_image: &str,
        _garment: &Garment,
        step_number: u32,
        _style_prompt: Option<&str>,
    ) -> Result<String, WidgetError> {
        self.bases_seen.borrow_mut().push(base_image.to_owned());
        Ok(format!("https://cdn.mirrorme.app/steps/{step_number}.png"))
    }

    async fn aggregate(
        &self,
        _base_image: &str,
        trail: &[ProgressiveStep],
        _garments: &[Garment],
    ) -> Result<TryOnResult, WidgetError> {
        let mut result = sample_result("sess_chain");
        result.image_url = trail.last().unwrap().image_url.clone();
        Ok(result)
    }
}

#[test]
fn studio_chain_feeds_forward_and_aggregates() {
    let garments = vec![
        Garment {
            image: "https://shop.example/shirt.jpg".to_owned(),
            name: Some("Shirt".to_owned()),
            ..Garment::default()
        },
        Garment {
            image: "https://shop.example/jacket.jpg".to_owned(),
            name: Some("Jacket".to_owned()),
            ..Garment::default()
        },
    ];
    let applier = ScriptedApplier {
        bases_seen: RefCell::new(Vec::new()),
    };

    let progress = RefCell::new(Vec::new());
    let outcome = pollster::block_on(run_progressive(
        &applier,
        "https://shop.example/model.jpg",
        &garments,
        Some("rooftop at dusk"),
        &CancelToken::new(),
        |p| progress.borrow_mut().push((p.completed, p.total)),
    ));

    // "Jacket over shirt" means the jacket step consumed the shirt
    // step's output, not the original photo.
    assert_eq!(
        *applier.bases_seen.borrow(),
        vec![
            "https://shop.example/model.jpg",
            "https://cdn.mirrorme.app/steps/1.png",
        ],
    );
    assert_eq!(*progress.borrow(), vec![(1, 2), (2, 2)]);
    assert!(outcome.failure.is_none());
    assert_eq!(
        outcome.final_image(),
        Some("https://cdn.mirrorme.app/steps/2.png"),
    );
}
