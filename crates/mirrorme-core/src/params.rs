//! Session descriptor ↔ iframe URL parameter codec.
//!
//! The host loader serializes a [`SessionDescriptor`] into iframe query
//! parameters; the embedded widget reconstructs it on the other side.
//! The two copies are only ever serialization-equal, never shared.
//!
//! The same schema table also drives the declarative `data-*` button
//! attributes consumed by auto-init, so a field is parsed exactly one
//! way no matter which surface it arrived through.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Deserialize;

use crate::types::{
    ErrorCode, ProductInfo, SessionDescriptor, Theme, UserInfo, WidgetError, WidgetOptions,
};

/// Query-parameter key and the `data-*` attribute feeding the same
/// field. One table, both directions.
pub const FIELD_TABLE: &[(&str, &str)] = &[
    ("merchantKey", "data-merchant-key"),
    ("productImage", "data-product-image"),
    ("productName", "data-product-name"),
    ("productId", "data-product-id"),
    ("productCategory", "data-product-category"),
    ("productPrice", "data-product-price"),
    ("productCurrency", "data-product-currency"),
    ("productUrl", "data-product-url"),
    ("productSpecification", "data-product-specification"),
    ("productDescription", "data-product-description"),
    ("userImage", "data-user-image"),
    ("userId", "data-user-id"),
    ("modelImage", "data-model-image"),
    ("theme", "data-theme"),
    ("locale", "data-locale"),
    ("skipPhotoStep", "data-skip-photo-step"),
    ("allowCamera", "data-allow-camera"),
    ("allowUpload", "data-allow-upload"),
];

/// A descriptor reconstructed from untrusted key/value input, plus any
/// soft parse problems encountered along the way.
///
/// Warnings cover values that fell back to a default (bad theme string,
/// non-boolean flag). Callers log them; they never fail the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescriptor {
    /// The reconstructed descriptor.
    pub descriptor: SessionDescriptor,
    /// Human-readable notes about ignored or defaulted values.
    pub warnings: Vec<String>,
}

/// Serialize a descriptor into iframe query parameters.
///
/// Required fields and the three behavior flags are always present;
/// optional fields are included only when set.
#[must_use]
pub fn to_query_pairs(descriptor: &SessionDescriptor) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("merchantKey", descriptor.merchant_key.clone()),
        ("productImage", descriptor.product.image.clone()),
    ];

    let mut push_opt = |key: &'static str, value: &Option<String>| {
        if let Some(v) = value {
            pairs.push((key, v.clone()));
        }
    };
    push_opt("productName", &descriptor.product.name);
    push_opt("productId", &descriptor.product.id);
    push_opt("productCategory", &descriptor.product.category);
    push_opt("productPrice", &descriptor.product.price);
    push_opt("productCurrency", &descriptor.product.currency);
    push_opt("productUrl", &descriptor.product.url);
    push_opt("productSpecification", &descriptor.product.specification);
    push_opt("productDescription", &descriptor.product.description);
    if let Some(user) = &descriptor.user {
        push_opt("userImage", &user.image);
        push_opt("userId", &user.id);
    }
    push_opt("modelImage", &descriptor.model_image);
    push_opt("locale", &descriptor.locale);

    pairs.push(("theme", descriptor.theme.as_str().to_owned()));
    pairs.push((
        "skipPhotoStep",
        descriptor.options.skip_photo_step.to_string(),
    ));
    pairs.push(("allowCamera", descriptor.options.allow_camera.to_string()));
    pairs.push(("allowUpload", descriptor.options.allow_upload.to_string()));
    pairs
}

/// Reconstruct a descriptor from iframe query parameters.
///
/// Unknown keys are ignored. Empty values count as absent, so an
/// accidentally blank `merchantKey=` still fails preflight.
///
/// # Errors
///
/// Returns [`WidgetError`] with code `NO_MERCHANT_KEY` or
/// `NO_PRODUCT_IMAGE` when a required field is missing, the same
/// preflight the host loader runs before creating any UI.
pub fn from_query_pairs<I>(pairs: I) -> Result<ParsedDescriptor, WidgetError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut raw: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in pairs {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            raw.insert(key, trimmed.to_owned());
        }
    }
    build_descriptor(&mut raw)
}

/// Reconstruct a descriptor from `data-*` attributes.
///
/// `get` is an attribute lookup (typically `Element::get_attribute`).
/// The attribute names are translated through [`FIELD_TABLE`] and fed
/// into the same builder as the query-parameter path.
///
/// # Errors
///
/// Same preflight errors as [`from_query_pairs`].
pub fn from_attributes<F>(get: F) -> Result<ParsedDescriptor, WidgetError>
where
    F: Fn(&str) -> Option<String>,
{
    let pairs = FIELD_TABLE
        .iter()
        .filter_map(|(query, attr)| get(attr).map(|v| ((*query).to_owned(), v)));
    from_query_pairs(pairs)
}

fn build_descriptor(
    raw: &mut BTreeMap<String, String>,
) -> Result<ParsedDescriptor, WidgetError> {
    let merchant_key = raw
        .remove("merchantKey")
        .ok_or_else(WidgetError::no_merchant_key)?;
    let product_image = raw
        .remove("productImage")
        .ok_or_else(WidgetError::no_product_image)?;

    let mut warnings = Vec::new();

    let product = ProductInfo {
        image: product_image,
        name: raw.remove("productName"),
        id: raw.remove("productId"),
        category: raw.remove("productCategory"),
        price: raw.remove("productPrice"),
        currency: raw.remove("productCurrency"),
        url: raw.remove("productUrl"),
        specification: raw.remove("productSpecification"),
        description: raw.remove("productDescription"),
    };

    let user_id = raw.remove("userId");
    let user_image = raw.remove("userImage");
    let user = if user_id.is_some() || user_image.is_some() {
        Some(UserInfo {
            id: user_id,
            image: user_image,
        })
    } else {
        None
    };

    let theme = raw.remove("theme").map_or(Theme::default(), |value| {
        value.parse().unwrap_or_else(|_| {
            warnings.push(format!("ignoring unknown theme {value:?}"));
            Theme::default()
        })
    });

    let defaults = WidgetOptions::default();
    let options = WidgetOptions {
        skip_photo_step: parse_flag(
            raw.remove("skipPhotoStep"),
            "skipPhotoStep",
            defaults.skip_photo_step,
            &mut warnings,
        ),
        allow_camera: parse_flag(
            raw.remove("allowCamera"),
            "allowCamera",
            defaults.allow_camera,
            &mut warnings,
        ),
        allow_upload: parse_flag(
            raw.remove("allowUpload"),
            "allowUpload",
            defaults.allow_upload,
            &mut warnings,
        ),
        callback_url: raw.remove("callbackUrl"),
    };

    let descriptor = SessionDescriptor {
        merchant_key,
        product,
        user,
        options,
        theme,
        locale: raw.remove("locale"),
        model_image: raw.remove("modelImage"),
    };
    Ok(ParsedDescriptor {
        descriptor,
        warnings,
    })
}

/// Serialize a descriptor into an iframe query string (no leading `?`).
#[must_use]
pub fn to_query_string(descriptor: &SessionDescriptor) -> String {
    to_query_pairs(descriptor)
        .into_iter()
        .map(|(key, value)| format!("{key}={}", encode_component(&value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Split a query string (with or without the leading `?`) into decoded
/// key/value pairs. Pairs without a `=` are ignored.
#[must_use]
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            part.split_once('=')
                .map(|(key, value)| (decode_component(key), decode_component(value)))
        })
        .collect()
}

/// Percent-encode a single query component (RFC 3986 unreserved
/// characters pass through).
#[must_use]
pub fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            other => {
                let _ = write!(out, "%{other:02X}");
            }
        }
    }
    out
}

/// Decode a percent-encoded query component. Invalid escapes are kept
/// literally rather than rejected; a half-broken URL should still
/// produce a readable preflight error, not a parser crash.
#[must_use]
pub fn decode_component(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hi = char::from(bytes[i + 1]).to_digit(16);
                let lo = char::from(bytes[i + 2]).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push(u8::try_from(hi * 16 + lo).unwrap_or(b'%'));
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Shape of the JSON object accepted by the host loader's `open()`.
/// Everything is optional here; requiredness is enforced by the
/// preflight in [`from_json`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawOpenOptions {
    merchant_key: Option<String>,
    product: Option<RawProduct>,
    user: Option<UserInfo>,
    options: Option<WidgetOptions>,
    theme: Option<String>,
    locale: Option<String>,
    model_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawProduct {
    image: Option<String>,
    name: Option<String>,
    id: Option<String>,
    category: Option<String>,
    price: Option<String>,
    currency: Option<String>,
    url: Option<String>,
    specification: Option<String>,
    description: Option<String>,
}

/// Build a descriptor from the JSON object a host page passes to
/// `open()`. `fallback_merchant_key` comes from the instance config so
/// pages can set their key once at `init()` time.
///
/// # Errors
///
/// Returns `NO_MERCHANT_KEY` / `NO_PRODUCT_IMAGE` preflight errors for
/// missing required fields, and `INVALID_SESSION` when the value is
/// not an options object at all.
pub fn from_json(
    json: &str,
    fallback_merchant_key: Option<&str>,
) -> Result<ParsedDescriptor, WidgetError> {
    let raw: RawOpenOptions = serde_json::from_str(json).map_err(|e| {
        WidgetError::new(
            ErrorCode::InvalidSession,
            format!("invalid open() options: {e}"),
        )
    })?;

    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let merchant_key = non_empty(raw.merchant_key)
        .or_else(|| fallback_merchant_key.map(str::to_owned))
        .ok_or_else(WidgetError::no_merchant_key)?;

    let product_raw = raw.product.unwrap_or_default();
    let image = non_empty(product_raw.image).ok_or_else(WidgetError::no_product_image)?;

    let mut warnings = Vec::new();
    let theme = raw.theme.map_or(Theme::default(), |value| {
        value.parse().unwrap_or_else(|_| {
            warnings.push(format!("ignoring unknown theme {value:?}"));
            Theme::default()
        })
    });

    let descriptor = SessionDescriptor {
        merchant_key,
        product: ProductInfo {
            image,
            name: product_raw.name,
            id: product_raw.id,
            category: product_raw.category,
            price: product_raw.price,
            currency: product_raw.currency,
            url: product_raw.url,
            specification: product_raw.specification,
            description: product_raw.description,
        },
        user: raw.user,
        options: raw.options.unwrap_or_default(),
        theme,
        locale: raw.locale,
        model_image: raw.model_image,
    };
    Ok(ParsedDescriptor {
        descriptor,
        warnings,
    })
}

/// Strict boolean parse: only `"true"` and `"false"` are accepted;
/// anything else keeps the default and records a warning, since the
/// markup is typically written by non-developers.
fn parse_flag(
    value: Option<String>,
    key: &str,
    default: bool,
    warnings: &mut Vec<String>,
) -> bool {
    match value.as_deref() {
        None => default,
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            warnings.push(format!(
                "ignoring non-boolean {key}={other:?} (expected true or false)"
            ));
            default
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ErrorCode;

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn round_trip_preserves_descriptor() {
        let descriptor = SessionDescriptor {
            merchant_key: "mk_test_abc".to_owned(),
            product: ProductInfo {
                image: "https://x/y.jpg".to_owned(),
                name: Some("Wool coat".to_owned()),
                category: Some("coat".to_owned()),
                price: Some("129.00".to_owned()),
                currency: Some("EUR".to_owned()),
                ..ProductInfo::default()
            },
            user: Some(UserInfo {
                id: Some("u42".to_owned()),
                image: None,
            }),
            options: WidgetOptions {
                skip_photo_step: true,
                allow_camera: false,
                allow_upload: true,
                callback_url: None,
            },
            theme: Theme::Dark,
            locale: Some("fr-FR".to_owned()),
            model_image: Some("https://x/model.jpg".to_owned()),
        };

        let pairs = to_query_pairs(&descriptor)
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v));
        let parsed = from_query_pairs(pairs).unwrap();
        assert_eq!(parsed.descriptor, descriptor);
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    }

    #[test]
    fn missing_merchant_key_fails_preflight() {
        let err = from_query_pairs(owned(&[("productImage", "https://x/y.jpg")]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoMerchantKey);
    }

    #[test]
    fn blank_merchant_key_counts_as_missing() {
        let err = from_query_pairs(owned(&[
            ("merchantKey", "   "),
            ("productImage", "https://x/y.jpg"),
        ]))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoMerchantKey);
    }

    #[test]
    fn missing_product_image_fails_preflight() {
        let err =
            from_query_pairs(owned(&[("merchantKey", "mk_test_abc")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoProductImage);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let parsed = from_query_pairs(owned(&[
            ("merchantKey", "mk_test_abc"),
            ("productImage", "https://x/y.jpg"),
            ("utm_source", "newsletter"),
        ]))
        .unwrap();
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn bad_flag_warns_and_keeps_default() {
        let parsed = from_query_pairs(owned(&[
            ("merchantKey", "mk_test_abc"),
            ("productImage", "https://x/y.jpg"),
            ("allowCamera", "yes"),
        ]))
        .unwrap();
        // Default for allowCamera is true.
        assert!(parsed.descriptor.options.allow_camera);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("allowCamera"));
    }

    #[test]
    fn bad_theme_warns_and_falls_back_to_auto() {
        let parsed = from_query_pairs(owned(&[
            ("merchantKey", "mk_test_abc"),
            ("productImage", "https://x/y.jpg"),
            ("theme", "sepia"),
        ]))
        .unwrap();
        assert_eq!(parsed.descriptor.theme, Theme::Auto);
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn attributes_feed_the_same_builder() {
        let attrs = [
            ("data-merchant-key", "mk_test_abc"),
            ("data-product-image", "https://x/y.jpg"),
            ("data-product-name", "Linen shirt"),
            ("data-allow-camera", "false"),
            ("data-theme", "light"),
        ];
        let parsed = from_attributes(|name| {
            attrs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_owned())
        })
        .unwrap();

        assert_eq!(parsed.descriptor.merchant_key, "mk_test_abc");
        assert_eq!(parsed.descriptor.product.name.as_deref(), Some("Linen shirt"));
        assert!(!parsed.descriptor.options.allow_camera);
        assert_eq!(parsed.descriptor.theme, Theme::Light);
    }

    #[test]
    fn attribute_without_product_image_fails_like_query_path() {
        let err = from_attributes(|name| {
            (name == "data-merchant-key").then(|| "mk_test_abc".to_owned())
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoProductImage);
    }

    #[test]
    fn query_string_round_trip() {
        let descriptor = SessionDescriptor {
            merchant_key: "mk_test_abc".to_owned(),
            product: ProductInfo {
                image: "https://x/y.jpg?v=2&size=large".to_owned(),
                name: Some("Trench coat – belted".to_owned()),
                ..ProductInfo::default()
            },
            user: None,
            options: WidgetOptions::default(),
            theme: Theme::Auto,
            locale: None,
            model_image: None,
        };
        let query = to_query_string(&descriptor);
        // Raw separators must not survive encoding.
        assert!(!query.contains("y.jpg?v"));
        let parsed = from_query_pairs(parse_query_string(&query)).unwrap();
        assert_eq!(parsed.descriptor, descriptor);
    }

    #[test]
    fn parse_query_string_accepts_leading_question_mark() {
        let pairs = parse_query_string("?a=1&b=two%20words&broken&c=");
        assert_eq!(
            pairs,
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "two words".to_owned()),
                ("c".to_owned(), String::new()),
            ],
        );
    }

    #[test]
    fn decode_component_keeps_invalid_escapes_literal() {
        assert_eq!(decode_component("100%zz"), "100%zz");
        assert_eq!(decode_component("a+b%20c"), "a b c");
    }

    #[test]
    fn from_json_builds_a_descriptor() {
        let parsed = from_json(
            r#"{
                "merchantKey": "mk_test_abc",
                "product": {"image": "https://x/y.jpg", "name": "Parka"},
                "options": {"skipPhotoStep": false, "allowCamera": false, "allowUpload": true},
                "theme": "dark"
            }"#,
            None,
        )
        .unwrap();
        assert_eq!(parsed.descriptor.merchant_key, "mk_test_abc");
        assert_eq!(parsed.descriptor.product.name.as_deref(), Some("Parka"));
        assert!(!parsed.descriptor.options.allow_camera);
        assert_eq!(parsed.descriptor.theme, Theme::Dark);
    }

    #[test]
    fn from_json_uses_the_fallback_merchant_key() {
        let parsed = from_json(
            r#"{"product": {"image": "https://x/y.jpg"}}"#,
            Some("mk_from_init"),
        )
        .unwrap();
        assert_eq!(parsed.descriptor.merchant_key, "mk_from_init");
    }

    #[test]
    fn from_json_without_any_merchant_key_fails_preflight() {
        let err = from_json(r#"{"product": {"image": "https://x/y.jpg"}}"#, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoMerchantKey);
    }

    #[test]
    fn from_json_without_product_image_fails_preflight() {
        let err = from_json(r#"{"merchantKey": "mk_test_abc"}"#, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoProductImage);
    }

    #[test]
    fn from_json_rejects_non_object_input() {
        let err = from_json("42", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSession);
    }

    #[test]
    fn field_table_keys_are_unique() {
        let mut query_keys: Vec<_> = FIELD_TABLE.iter().map(|(q, _)| q).collect();
        query_keys.sort_unstable();
        query_keys.dedup();
        assert_eq!(query_keys.len(), FIELD_TABLE.len());
    }
}
