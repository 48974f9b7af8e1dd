//! Shared domain types for the MirrorMe try-on widget.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Descriptive product data attached to a try-on session.
///
/// Read-only after construction; only `image` is required. The optional
/// fields are forwarded to the backend for result labelling and to the
/// widget UI for display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    /// URL of the product photo to apply (required).
    pub image: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Merchant-side product identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Product category (e.g. `"jacket"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Display price, kept as the merchant supplied it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// ISO currency code for `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Link back to the product page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-text garment specification (fabric, fit, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,
    /// Free-text product description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductInfo {
    /// Create a product descriptor from just its image URL.
    #[must_use]
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }
}

/// Optional shopper identity supplied by the host page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    /// Merchant-side user identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// A ready-made user photo URL, used with
    /// [`WidgetOptions::skip_photo_step`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Behavioral switches for one widget session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetOptions {
    /// Start directly in the preview step when a user photo is already
    /// available.
    pub skip_photo_step: bool,
    /// Offer the device camera as an acquisition path.
    pub allow_camera: bool,
    /// Offer the file picker as an acquisition path.
    pub allow_upload: bool,
    /// Merchant webhook notified of results by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            skip_photo_step: false,
            allow_camera: true,
            allow_upload: true,
            callback_url: None,
        }
    }
}

/// Widget color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light palette.
    Light,
    /// Dark palette.
    Dark,
    /// Follow the shopper's `prefers-color-scheme`.
    #[default]
    Auto,
}

impl Theme {
    /// Wire value (`"light"`, `"dark"`, `"auto"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown theme value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme: {0:?}")]
pub struct ParseThemeError(pub String);

impl FromStr for Theme {
    type Err = ParseThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "auto" => Ok(Self::Auto),
            other => Err(ParseThemeError(other.to_owned())),
        }
    }
}

/// Everything the embedded widget needs to run one try-on session.
///
/// Built once per `open()` call by the host loader, serialized into the
/// iframe URL, and reconstructed on the other side; the two copies are
/// never the same object, only serialization-equal. Immutable for the
/// session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// Credential identifying the merchant account.
    pub merchant_key: String,
    /// The product being tried on.
    pub product: ProductInfo,
    /// Optional shopper identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    /// Behavioral switches.
    #[serde(default)]
    pub options: WidgetOptions,
    /// Color theme.
    #[serde(default)]
    pub theme: Theme,
    /// BCP-47 locale tag for widget copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// A model photo URL to prefetch through the image proxy instead of
    /// asking the shopper for a photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_image: Option<String>,
}

impl SessionDescriptor {
    /// Create a minimal descriptor from the two required fields.
    #[must_use]
    pub fn new(merchant_key: impl Into<String>, product: ProductInfo) -> Self {
        Self {
            merchant_key: merchant_key.into(),
            product,
            user: None,
            options: WidgetOptions::default(),
            theme: Theme::default(),
            locale: None,
            model_image: None,
        }
    }

    /// The ready-made user photo, when one was supplied.
    #[must_use]
    pub fn user_image(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.image.as_deref())
    }
}

/// The outcome of one successful try-on run.
///
/// Created once per processing run; immutable; relayed to the host page
/// as the `result` message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResult {
    /// Server-tracked session this result belongs to.
    pub session_id: String,
    /// URL of the generated image.
    pub image_url: String,
    /// Optional smaller rendition for galleries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// URL serving the image with a download disposition.
    pub download_url: String,
    /// RFC 3339 timestamp after which the result URLs expire.
    pub expires_at: String,
    /// Wall-clock processing duration in milliseconds. Measured
    /// client-side, so absent from backend payloads.
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// One garment selected for a progressive multi-garment run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Garment {
    /// URL of the garment photo (required).
    pub image: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Merchant-side product identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Garment category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Garment {
    /// Create a garment descriptor from just its image URL.
    #[must_use]
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }
}

/// Short machine-readable error codes.
///
/// The first seven are client-originated. Codes produced by the backend
/// are relayed verbatim through [`ErrorCode::Backend`]; the client
/// never rewrites a backend code, it only invents codes for purely
/// client-side failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `open()` preflight: no merchant key supplied.
    NoMerchantKey,
    /// `open()` preflight: no product image supplied.
    NoProductImage,
    /// Selected file is not an image.
    InvalidFile,
    /// Selected file exceeds the upload size cap.
    FileTooLarge,
    /// Camera access failed or was denied.
    CameraError,
    /// The iframe URL parameters did not form a valid session.
    InvalidSession,
    /// A backend call failed without a structured error payload.
    ProcessingError,
    /// A structured backend code, passed through unmodified.
    Backend(String),
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoMerchantKey => "NO_MERCHANT_KEY",
            Self::NoProductImage => "NO_PRODUCT_IMAGE",
            Self::InvalidFile => "INVALID_FILE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::CameraError => "CAMERA_ERROR",
            Self::InvalidSession => "INVALID_SESSION",
            Self::ProcessingError => "PROCESSING_ERROR",
            Self::Backend(code) => code,
        }
    }

    /// Parse a wire code; unknown codes become [`ErrorCode::Backend`].
    #[must_use]
    pub fn from_wire(code: &str) -> Self {
        match code {
            "NO_MERCHANT_KEY" => Self::NoMerchantKey,
            "NO_PRODUCT_IMAGE" => Self::NoProductImage,
            "INVALID_FILE" => Self::InvalidFile,
            "FILE_TOO_LARGE" => Self::FileTooLarge,
            "CAMERA_ERROR" => Self::CameraError,
            "INVALID_SESSION" => Self::InvalidSession,
            "PROCESSING_ERROR" => Self::ProcessingError,
            other => Self::Backend(other.to_owned()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&code))
    }
}

/// An error carrying a machine code and a human-readable message.
///
/// UI layers render `message` and never `code`; the code exists for the
/// host page's own error tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct WidgetError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message, safe to show to the shopper.
    pub message: String,
}

impl WidgetError {
    /// Create an error from a code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Preflight failure: no merchant key.
    #[must_use]
    pub fn no_merchant_key() -> Self {
        Self::new(ErrorCode::NoMerchantKey, "A merchant key is required")
    }

    /// Preflight failure: no product image.
    #[must_use]
    pub fn no_product_image() -> Self {
        Self::new(ErrorCode::NoProductImage, "A product image is required")
    }

    /// Wrap an unstructured backend or transport failure.
    #[must_use]
    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessingError, message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn theme_round_trips_through_from_str() {
        for theme in [Theme::Light, Theme::Dark, Theme::Auto] {
            assert_eq!(theme.as_str().parse::<Theme>(), Ok(theme));
        }
    }

    #[test]
    fn theme_rejects_unknown_values() {
        assert_eq!(
            "sepia".parse::<Theme>(),
            Err(ParseThemeError("sepia".to_owned())),
        );
    }

    #[test]
    fn options_default_to_full_acquisition() {
        let options = WidgetOptions::default();
        assert!(!options.skip_photo_step);
        assert!(options.allow_camera);
        assert!(options.allow_upload);
        assert!(options.callback_url.is_none());
    }

    #[test]
    fn error_code_wire_round_trip() {
        for code in [
            ErrorCode::NoMerchantKey,
            ErrorCode::NoProductImage,
            ErrorCode::InvalidFile,
            ErrorCode::FileTooLarge,
            ErrorCode::CameraError,
            ErrorCode::InvalidSession,
            ErrorCode::ProcessingError,
        ] {
            assert_eq!(ErrorCode::from_wire(code.as_str()), code);
        }
    }

    #[test]
    fn unknown_error_code_is_preserved_verbatim() {
        let code = ErrorCode::from_wire("QUOTA_EXCEEDED");
        assert_eq!(code, ErrorCode::Backend("QUOTA_EXCEEDED".to_owned()));
        assert_eq!(code.as_str(), "QUOTA_EXCEEDED");
    }

    #[test]
    fn widget_error_displays_message_not_code() {
        let err = WidgetError::new(ErrorCode::FileTooLarge, "That photo is too large");
        assert_eq!(err.to_string(), "That photo is too large");
    }

    #[test]
    fn widget_error_serializes_code_as_wire_string() {
        let err = WidgetError::no_product_image();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NO_PRODUCT_IMAGE");
    }

    #[test]
    fn try_on_result_serde_uses_camel_case_keys() {
        let result = TryOnResult {
            session_id: "sess_1".to_owned(),
            image_url: "https://cdn.example/out.png".to_owned(),
            thumbnail_url: None,
            download_url: "https://cdn.example/out.png?download=1".to_owned(),
            expires_at: "2026-01-01T00:00:00Z".to_owned(),
            processing_time_ms: 4200,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["sessionId"], "sess_1");
        assert_eq!(json["downloadUrl"], "https://cdn.example/out.png?download=1");
        assert_eq!(json["processingTimeMs"], 4200);
        assert!(json.get("thumbnailUrl").is_none());
    }

    #[test]
    fn descriptor_user_image_accessor() {
        let mut descriptor =
            SessionDescriptor::new("mk_test_abc", ProductInfo::from_image("https://x/y.jpg"));
        assert_eq!(descriptor.user_image(), None);

        descriptor.user = Some(UserInfo {
            id: None,
            image: Some("https://x/me.jpg".to_owned()),
        });
        assert_eq!(descriptor.user_image(), Some("https://x/me.jpg"));
    }

    #[test]
    fn descriptor_serde_round_trip() {
        let descriptor = SessionDescriptor {
            merchant_key: "mk_live_1".to_owned(),
            product: ProductInfo {
                image: "https://x/p.jpg".to_owned(),
                name: Some("Denim jacket".to_owned()),
                category: Some("jacket".to_owned()),
                ..ProductInfo::default()
            },
            user: Some(UserInfo {
                id: Some("u1".to_owned()),
                image: None,
            }),
            options: WidgetOptions {
                allow_camera: false,
                ..WidgetOptions::default()
            },
            theme: Theme::Dark,
            locale: Some("de-DE".to_owned()),
            model_image: None,
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: SessionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
    }
}
