//! Serverless share links.
//!
//! A share link carries the whole guide in its fragment, so it opens on a
//! device that has never seen the guide and without any backend:
//!
//! ```text
//! https://guide-airbnb.vercel.app/#/guide/<id>?s=<payload>
//! ```
//!
//! The payload is the JSON of the sanitized guide, UTF-8 encoded, then
//! base64 with the URL-safe alphabet and no padding. Decoding accepts
//! padded input and the standard alphabet too, since links get mangled by
//! mail clients and chat apps.
//!
//! Both directions go through [`sanitize`], so
//! `decode(encode(g)) == g.sanitized()` for every guide, and a decoded
//! payload is indistinguishable from a guide loaded from the store.

use crate::guide::{Guide, sanitize};
use crate::store::{GuideStore, KeyValueStore, StoreError};
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Default query parameter carrying the payload.
pub const SHARE_PARAM: &str = "s";

/// Route prefix of a guide in the web app's fragment.
const GUIDE_ROUTE: &str = "/guide/";

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a guide object")]
    NotAnObject,
    #[error("not a guide link: {0}")]
    InvalidLink(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Encode a guide into a URL-safe payload.
pub fn encode_guide(guide: &Guide) -> Result<String, ShareError> {
    let json = serde_json::to_string(&guide.sanitized())?;
    Ok(URL_SAFE_LENIENT.encode(json.as_bytes()))
}

/// Decode a payload back into a sanitized guide.
pub fn decode_guide(payload: &str) -> Result<Guide, ShareError> {
    let payload = payload.trim();
    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))?;
    let json = String::from_utf8(bytes)?;
    let value: Value = serde_json::from_str(&json)?;
    if !value.is_object() {
        return Err(ShareError::NotAnObject);
    }
    Ok(sanitize(&value))
}

/// [`decode_guide`] for callers that treat any failure as "no payload".
pub fn try_decode_guide(payload: &str) -> Option<Guide> {
    match decode_guide(payload) {
        Ok(guide) => Some(guide),
        Err(e) => {
            tracing::warn!(error = %e, "could not decode shared guide");
            None
        }
    }
}

/// Public page URL of a guide, without payload.
pub fn public_url(base_url: &str, guide_id: &str) -> String {
    format!(
        "{}/#{GUIDE_ROUTE}{}",
        base_url.trim_end_matches('/'),
        guide_id
    )
}

/// Share link for a guide, with its payload in `param`.
pub fn share_link(base_url: &str, guide_id: &str, payload: &str, param: &str) -> String {
    format!("{}?{param}={payload}", public_url(base_url, guide_id))
}

/// Guide id and optional payload extracted from a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub guide_id: String,
    pub payload: Option<String>,
}

/// Parse `…/#/guide/<id>?s=<payload>`. The payload may also sit in the
/// regular query string, before the fragment.
pub fn parse_share_link(link: &str, param: &str) -> Result<ParsedLink, ShareError> {
    let url = Url::parse(link.trim())?;
    let fragment = url.fragment().unwrap_or_default();
    let (route, fragment_query) = fragment.split_once('?').unwrap_or((fragment, ""));
    let guide_id = route
        .strip_prefix(GUIDE_ROUTE)
        .map(|id| id.trim_end_matches('/'))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(|| ShareError::InvalidLink(link.to_string()))?;

    let find = |query: &str| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == param)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };
    let payload = find(fragment_query).or_else(|| find(url.query().unwrap_or_default()));

    Ok(ParsedLink {
        guide_id: guide_id.to_string(),
        payload,
    })
}

/// Open a share link the way the public page does: a decodable payload wins
/// and is stored locally under the guide id; otherwise the guide is loaded
/// from the store. `Ok(None)` means no guide was found.
pub fn open_shared<S: KeyValueStore>(
    link: &str,
    param: &str,
    store: &mut GuideStore<S>,
) -> Result<Option<Guide>, ShareError> {
    let parsed = parse_share_link(link, param)?;
    if let Some(mut guide) = parsed.payload.as_deref().and_then(try_decode_guide) {
        if guide.guide_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
            guide.guide_id = Some(parsed.guide_id.clone());
        }
        let id = guide.guide_id.clone().unwrap_or(parsed.guide_id);
        if let Err(e) = store.store_published(&id, &guide) {
            tracing::warn!(guide_id = %id, error = %e, "could not keep shared guide locally");
        }
        return Ok(Some(guide));
    }
    Ok(store.load_published(&parsed.guide_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::PlaceCategory;
    use crate::store::MemoryStore;
    use crate::test_helpers::sample_guide;
    use proptest::prelude::*;

    #[test]
    fn round_trip_sample_guide() {
        let guide = sample_guide();
        let payload = encode_guide(&guide).unwrap();
        assert!(
            payload
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(decode_guide(&payload).unwrap(), guide.sanitized());
    }

    #[test]
    fn non_ascii_text_survives() {
        let mut guide = sample_guide();
        guide.title = "Chalet « Les Écrins » 🏔️".into();
        let decoded = decode_guide(&encode_guide(&guide).unwrap()).unwrap();
        assert_eq!(decoded.title, "Chalet « Les Écrins » 🏔️");
    }

    #[test]
    fn padded_and_standard_alphabet_accepted() {
        let json = r#"{"title":"Gîte ~ vue??"}"#;
        let standard = base64::engine::general_purpose::STANDARD.encode(json);
        assert!(standard.contains('=') || standard.contains('+') || standard.contains('/'));
        assert_eq!(decode_guide(&standard).unwrap().title, "Gîte ~ vue??");
    }

    #[test]
    fn decode_failures_are_errors_not_panics() {
        assert!(matches!(decode_guide("%%%"), Err(ShareError::Base64(_))));
        let not_utf8 = URL_SAFE_LENIENT.encode([0xff, 0xfe]);
        assert!(matches!(decode_guide(&not_utf8), Err(ShareError::Utf8(_))));
        let not_json = URL_SAFE_LENIENT.encode("hello");
        assert!(matches!(decode_guide(&not_json), Err(ShareError::Json(_))));
        let not_object = URL_SAFE_LENIENT.encode("[1,2]");
        assert!(matches!(decode_guide(&not_object), Err(ShareError::NotAnObject)));
        assert!(try_decode_guide("%%%").is_none());
    }

    #[test]
    fn malformed_fields_are_coerced() {
        let payload = URL_SAFE_LENIENT.encode(r#"{"title":42,"rules":"nope","places":[{"name":"X"}]}"#);
        let guide = decode_guide(&payload).unwrap();
        assert_eq!(guide.title, "");
        assert!(guide.rules.is_empty());
        assert_eq!(guide.places.len(), 1);
        assert_eq!(guide.places[0].category, PlaceCategory::Other);
    }

    // =========================================================================
    // Links
    // =========================================================================

    #[test]
    fn share_link_format() {
        assert_eq!(
            share_link("https://guides.example.org/", "g1", "abc", "s"),
            "https://guides.example.org/#/guide/g1?s=abc"
        );
    }

    #[test]
    fn parse_link_with_fragment_payload() {
        let parsed = parse_share_link("https://guides.example.org/#/guide/g1?s=abc", "s").unwrap();
        assert_eq!(
            parsed,
            ParsedLink {
                guide_id: "g1".into(),
                payload: Some("abc".into())
            }
        );
    }

    #[test]
    fn parse_link_without_payload_or_with_outer_query() {
        let parsed = parse_share_link("https://x.org/#/guide/g2", "s").unwrap();
        assert_eq!(parsed.payload, None);
        let parsed = parse_share_link("https://x.org/?s=zz#/guide/g2", "s").unwrap();
        assert_eq!(parsed.payload.as_deref(), Some("zz"));
    }

    #[test]
    fn parse_rejects_other_routes() {
        assert!(matches!(
            parse_share_link("https://x.org/#/my-guides", "s"),
            Err(ShareError::InvalidLink(_))
        ));
        assert!(parse_share_link("not a url", "s").is_err());
    }

    #[test]
    fn open_shared_decodes_and_stores_payload() {
        let mut guide = sample_guide();
        guide.guide_id = None;
        let link = share_link("https://x.org", "route-id", &encode_guide(&guide).unwrap(), "s");

        let mut store = GuideStore::new(MemoryStore::new());
        let opened = open_shared(&link, "s", &mut store).unwrap().unwrap();
        assert_eq!(opened.guide_id.as_deref(), Some("route-id"));
        assert_eq!(store.load_published("route-id").unwrap().unwrap(), opened);
    }

    #[test]
    fn open_shared_falls_back_to_store_on_bad_payload() {
        let mut store = GuideStore::new(MemoryStore::new());
        let mut guide = sample_guide();
        guide.guide_id = Some("known".into());
        store.publish(&guide).unwrap();

        let opened = open_shared("https://x.org/#/guide/known?s=%25%25", "s", &mut store)
            .unwrap()
            .unwrap();
        assert_eq!(opened.title, guide.title);
        assert!(
            open_shared("https://x.org/#/guide/unknown", "s", &mut store)
                .unwrap()
                .is_none()
        );
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn arb_guide() -> impl Strategy<Value = Guide> {
        (
            ".{0,40}",
            prop::option::of(".{0,60}"),
            prop::collection::vec(".{0,30}", 0..4),
            prop::collection::vec((".{0,20}", prop::option::of(".{0,40}")), 0..4),
            prop::option::of("[a-z0-9-]{1,12}"),
        )
            .prop_map(|(title, address, rules, places, id)| {
                let mut guide = Guide::empty();
                guide.title = title;
                guide.address = address;
                guide.guide_id = id;
                for rule in rules {
                    guide.add_rule(rule);
                }
                for (name, address) in places {
                    guide.add_place(name, PlaceCategory::Venue).address = address;
                }
                guide
            })
    }

    proptest! {
        #[test]
        fn decode_encode_is_sanitize(guide in arb_guide()) {
            let payload = encode_guide(&guide).unwrap();
            prop_assert_eq!(decode_guide(&payload).unwrap(), guide.sanitized());
        }
    }
}
