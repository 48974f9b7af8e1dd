//! Typed cross-document message envelopes.
//!
//! Every message crossing the iframe boundary is a `{type, payload}`
//! envelope drawn from the closed [`WidgetMessage`] union. Unknown
//! types are ignored rather than treated as errors, so the protocol can
//! grow without breaking older host loaders; malformed payloads for a
//! known type are reported so the channel can log and drop them.

use serde::{Deserialize, Serialize};

use crate::types::{TryOnResult, WidgetError};

/// How the shopper's photo entered the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoSource {
    /// Captured with the device camera.
    Camera,
    /// Chosen through the file picker.
    Upload,
    /// Prefetched from a merchant-supplied model photo URL.
    ModelUrl,
}

/// A message sent between the embedded widget and the host loader.
///
/// Serialized as `{"type": ..., "payload": ...}`; unit variants omit
/// the payload. The tag set is closed; see [`WidgetMessage::parse`]
/// for how unknown tags are handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum WidgetMessage {
    /// The widget finished booting inside the iframe.
    Ready,
    /// The widget asked to be closed.
    Close {
        /// Why the widget is closing (e.g. `"user"`, `"error"`).
        reason: String,
    },
    /// A try-on run completed successfully.
    Result(TryOnResult),
    /// A try-on run failed.
    Error(WidgetError),
    /// The shopper supplied a photo.
    PhotoSelected {
        /// Which acquisition path produced the photo.
        source: PhotoSource,
    },
    /// The try-on submission started.
    ProcessingStart,
    /// Synthetic progress tick while processing.
    ProcessingProgress {
        /// Percentage in `0..=100`.
        progress: u8,
    },
    /// The widget content wants a different iframe size.
    Resize {
        /// Requested width in CSS pixels.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        /// Requested height in CSS pixels.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
}

/// All wire tags the protocol understands, in declaration order.
pub const KNOWN_TAGS: [&str; 8] = [
    "ready",
    "close",
    "result",
    "error",
    "photoSelected",
    "processingStart",
    "processingProgress",
    "resize",
];

/// A known-tag envelope whose payload did not match the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The data was not a JSON object with a string `type` field.
    #[error("not a message envelope: {0}")]
    NotAnEnvelope(String),
    /// The payload was missing or malformed for the given tag.
    #[error("malformed {tag:?} payload: {detail}")]
    MalformedPayload {
        /// The envelope's tag.
        tag: String,
        /// Serde's description of the mismatch.
        detail: String,
    },
}

impl WidgetMessage {
    /// The wire tag of this message.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Close { .. } => "close",
            Self::Result(_) => "result",
            Self::Error(_) => "error",
            Self::PhotoSelected { .. } => "photoSelected",
            Self::ProcessingStart => "processingStart",
            Self::ProcessingProgress { .. } => "processingProgress",
            Self::Resize { .. } => "resize",
        }
    }

    /// A progress tick, clamped into `0..=100`.
    #[must_use]
    pub fn progress(percent: u8) -> Self {
        Self::ProcessingProgress {
            progress: percent.min(100),
        }
    }

    /// Serialize to the wire envelope.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails; with these
    /// payload types that only happens on allocation failure.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an incoming envelope.
    ///
    /// Returns `Ok(None)` for a well-formed envelope whose tag is not
    /// in [`KNOWN_TAGS`]; those are ignored by design, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the data is not an envelope at
    /// all, or when a known tag carries a payload that does not match
    /// its declared shape. Callers log these and drop the message; a
    /// bad message must never crash the channel.
    pub fn parse(json: &str) -> Result<Option<Self>, EnvelopeError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| EnvelopeError::NotAnEnvelope(e.to_string()))?;
        let Some(tag) = value.get("type").and_then(serde_json::Value::as_str) else {
            return Err(EnvelopeError::NotAnEnvelope(
                "missing string `type` field".to_owned(),
            ));
        };
        if !KNOWN_TAGS.contains(&tag) {
            return Ok(None);
        }
        let tag = tag.to_owned();
        let message: Self =
            serde_json::from_value(value).map_err(|e| EnvelopeError::MalformedPayload {
                tag,
                detail: e.to_string(),
            })?;
        Ok(Some(message.normalized()))
    }

    /// Clamp payload values into their documented ranges.
    fn normalized(self) -> Self {
        match self {
            Self::ProcessingProgress { progress } => Self::progress(progress),
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ErrorCode;

    #[test]
    fn unit_variants_serialize_without_payload() {
        let json = WidgetMessage::Ready.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "ready");
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn close_round_trips() {
        let msg = WidgetMessage::Close {
            reason: "user".to_owned(),
        };
        let json = msg.to_json().unwrap();
        assert_eq!(WidgetMessage::parse(&json).unwrap(), Some(msg));
    }

    #[test]
    fn result_payload_round_trips() {
        let msg = WidgetMessage::Result(TryOnResult {
            session_id: "sess_9".to_owned(),
            image_url: "https://cdn.example/r.png".to_owned(),
            thumbnail_url: Some("https://cdn.example/r_thumb.png".to_owned()),
            download_url: "https://cdn.example/r.png?download=1".to_owned(),
            expires_at: "2026-02-01T00:00:00Z".to_owned(),
            processing_time_ms: 1234,
        });
        let json = msg.to_json().unwrap();
        assert_eq!(WidgetMessage::parse(&json).unwrap(), Some(msg));
    }

    #[test]
    fn error_payload_exposes_code_and_message() {
        let msg = WidgetMessage::Error(WidgetError::new(
            ErrorCode::Backend("QUOTA_EXCEEDED".to_owned()),
            "Monthly quota exhausted",
        ));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], "QUOTA_EXCEEDED");
        assert_eq!(value["payload"]["message"], "Monthly quota exhausted");
    }

    #[test]
    fn unknown_tag_is_ignored_not_an_error() {
        let parsed = WidgetMessage::parse(r#"{"type":"telemetry","payload":{"x":1}}"#);
        assert_eq!(parsed, Ok(None));
    }

    #[test]
    fn known_tag_with_malformed_payload_is_an_error() {
        let parsed = WidgetMessage::parse(r#"{"type":"close","payload":{"why":"user"}}"#);
        assert!(matches!(
            parsed,
            Err(EnvelopeError::MalformedPayload { ref tag, .. }) if tag == "close",
        ));
    }

    #[test]
    fn non_envelope_input_is_an_error() {
        assert!(matches!(
            WidgetMessage::parse("[1,2,3]"),
            Err(EnvelopeError::NotAnEnvelope(_)),
        ));
        assert!(matches!(
            WidgetMessage::parse("not json"),
            Err(EnvelopeError::NotAnEnvelope(_)),
        ));
    }

    #[test]
    fn progress_is_clamped_on_construction_and_parse() {
        assert_eq!(
            WidgetMessage::progress(250),
            WidgetMessage::ProcessingProgress { progress: 100 },
        );
        let parsed =
            WidgetMessage::parse(r#"{"type":"processingProgress","payload":{"progress":180}}"#)
                .unwrap();
        assert_eq!(
            parsed,
            Some(WidgetMessage::ProcessingProgress { progress: 100 }),
        );
    }

    #[test]
    fn tags_match_known_tag_table() {
        let messages = [
            WidgetMessage::Ready,
            WidgetMessage::Close {
                reason: String::new(),
            },
            WidgetMessage::Result(TryOnResult {
                session_id: String::new(),
                image_url: String::new(),
                thumbnail_url: None,
                download_url: String::new(),
                expires_at: String::new(),
                processing_time_ms: 0,
            }),
            WidgetMessage::Error(WidgetError::processing("x")),
            WidgetMessage::PhotoSelected {
                source: PhotoSource::Camera,
            },
            WidgetMessage::ProcessingStart,
            WidgetMessage::progress(10),
            WidgetMessage::Resize {
                width: None,
                height: Some(640.0),
            },
        ];
        for (message, tag) in messages.iter().zip(KNOWN_TAGS) {
            assert_eq!(message.tag(), tag);
        }
    }

    #[test]
    fn photo_source_uses_camel_case_wire_values() {
        let json = serde_json::to_string(&PhotoSource::ModelUrl).unwrap();
        assert_eq!(json, r#""modelUrl""#);
    }
}
