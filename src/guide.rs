//! The guide record and its sanitization.
//!
//! A [`Guide`] is everything a host types into the wizard for one listing:
//! address, arrival and departure instructions, Wi-Fi, house rules,
//! recommendations, map points, links, and branding. It is serialized as
//! camelCase JSON, which is the format of both the key-value store and the
//! share payload.
//!
//! ## Sanitization
//!
//! Stored and shared records are untrusted: an older build, a hand-edited
//! store, or a truncated link can all yield JSON that only partially matches
//! the schema. [`sanitize`] accepts any [`serde_json::Value`] and always
//! produces a well-typed `Guide`:
//!
//! - fields of the wrong type become empty (strings, lists) or absent
//! - unknown place categories become [`PlaceCategory::Other`]
//! - a missing theme becomes [`Theme::default`]; missing theme fields take
//!   the default theme's value
//! - list entries with a missing or duplicate id get a fresh `<kind>-<n>` id
//!
//! `sanitize` is idempotent, which is what makes the share round-trip law
//! hold: `decode(encode(g)) == sanitize(g)`.
//!
//! ## Identity of list entries
//!
//! Every rule, place, map point and link has an `id` generated once and never
//! reused. Removal always goes through [`remove_by_id`], never by position.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_PRIMARY: &str = "#2c3e50";
pub const DEFAULT_ACCENT: &str = "#3498db";
pub const DEFAULT_FONT: &str = "Inter";
pub const DEFAULT_WELCOME: &str = "Bienvenue chez vous";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    /// Assigned on first publish, stable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub stay: Stay,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub wifi: Wifi,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_notes: Option<String>,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub map: MapSection,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub theme: Theme,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<CheckIn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<CheckOut>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CheckIn {
    pub fn is_empty(&self) -> bool {
        is_blank(&self.time) && is_blank(&self.instructions) && is_blank(&self.code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<String>,
}

impl CheckOut {
    pub fn is_empty(&self) -> bool {
        is_blank(&self.time) && is_blank(&self.checklist)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wifi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub text: String,
}

/// Recommendation category, serialized with the French labels hosts see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceCategory {
    #[serde(rename = "Restaurant")]
    Restaurant,
    #[serde(rename = "Activité")]
    Activity,
    #[serde(rename = "Commerce essentiel")]
    EssentialShop,
    #[serde(rename = "Lieu")]
    Venue,
    #[default]
    #[serde(rename = "Autre")]
    Other,
}

impl PlaceCategory {
    pub const ALL: [PlaceCategory; 5] = [
        PlaceCategory::Restaurant,
        PlaceCategory::Activity,
        PlaceCategory::EssentialShop,
        PlaceCategory::Venue,
        PlaceCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PlaceCategory::Restaurant => "Restaurant",
            PlaceCategory::Activity => "Activité",
            PlaceCategory::EssentialShop => "Commerce essentiel",
            PlaceCategory::Venue => "Lieu",
            PlaceCategory::Other => "Autre",
        }
    }

    /// Parse a stored label; anything unrecognized is `Other`.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or(PlaceCategory::Other)
    }
}

impl fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: PlaceCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_address: Option<String>,
    #[serde(default)]
    pub points: Vec<MapPoint>,
}

/// An explicit pin placed by the host on the map step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub primary: String,
    pub accent: String,
    pub font_heading: String,
    pub font_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY.to_string(),
            accent: DEFAULT_ACCENT.to_string(),
            font_heading: DEFAULT_FONT.to_string(),
            font_body: DEFAULT_FONT.to_string(),
            logo_data_url: None,
            welcome_message: Some(DEFAULT_WELCOME.to_string()),
        }
    }
}

/// List entries addressable by their stable id.
pub trait Identified {
    fn id(&self) -> &str;
}

macro_rules! impl_identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_identified!(Rule, Place, MapPoint, Link);

/// Remove the entry whose id matches. Returns whether anything was removed.
pub fn remove_by_id<T: Identified>(list: &mut Vec<T>, id: &str) -> bool {
    let before = list.len();
    list.retain(|entry| entry.id() != id);
    list.len() != before
}

/// Fresh random identifier for list entries and published guides.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Guide {
    /// A blank guide as the wizard creates it.
    pub fn empty() -> Self {
        let now = now_millis();
        Self {
            guide_id: None,
            title: String::new(),
            address: None,
            stay: Stay::default(),
            contact: Contact::default(),
            wifi: Wifi::default(),
            rules: Vec::new(),
            equipment_notes: None,
            places: Vec::new(),
            map: MapSection {
                home_address: Some(String::new()),
                points: Vec::new(),
            },
            links: Vec::new(),
            theme: Theme::default(),
            created_at: now,
            updated_at: now,
            owner_id: None,
            owner_email: None,
        }
    }

    /// Address used as the map's home marker and as geocoding context.
    ///
    /// The map step's home address wins; the listing address is the fallback.
    pub fn home_address(&self) -> Option<&str> {
        [self.map.home_address.as_deref(), self.address.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    pub fn add_rule(&mut self, text: impl Into<String>) -> String {
        let id = new_id();
        self.rules.push(Rule {
            id: id.clone(),
            text: text.into(),
        });
        id
    }

    pub fn add_link(&mut self, label: impl Into<String>, url: impl Into<String>) -> String {
        let id = new_id();
        self.links.push(Link {
            id: id.clone(),
            label: label.into(),
            url: url.into(),
        });
        id
    }

    pub fn add_map_point(
        &mut self,
        label: impl Into<String>,
        address: Option<String>,
        maps_url: Option<String>,
    ) -> String {
        let id = new_id();
        self.map.points.push(MapPoint {
            id: id.clone(),
            label: label.into(),
            address,
            maps_url,
        });
        id
    }

    pub fn add_place(&mut self, name: impl Into<String>, category: PlaceCategory) -> &mut Place {
        self.places.push(Place {
            id: new_id(),
            name: name.into(),
            category,
            subtype: None,
            description: None,
            address: None,
            maps_url: None,
            site_url: None,
        });
        let last = self.places.len() - 1;
        &mut self.places[last]
    }

    /// Round-trip through JSON and [`sanitize`].
    pub fn sanitized(&self) -> Guide {
        match serde_json::to_value(self) {
            Ok(value) => sanitize(&value),
            Err(_) => self.clone(),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

// ============================================================================
// Sanitization
// ============================================================================

/// Parse a stored or decoded JSON document into a guide.
///
/// Unparseable JSON and non-object roots yield `None` ("no guide found").
pub fn parse_guide(json: &str) -> Option<Guide> {
    let value: Value = serde_json::from_str(json).ok()?;
    value.is_object().then(|| sanitize(&value))
}

/// Coerce an arbitrary JSON value into a well-typed guide.
pub fn sanitize(value: &Value) -> Guide {
    let empty = Map::new();
    let root = value.as_object().unwrap_or(&empty);

    let stay = object(root, "stay").map(sanitize_stay).unwrap_or_default();
    let contact = object(root, "contact")
        .map(|c| Contact {
            name: opt_string(c, "name"),
            phone: opt_string(c, "phone"),
            email: opt_string(c, "email"),
        })
        .unwrap_or_default();
    let wifi = object(root, "wifi")
        .map(|w| Wifi {
            ssid: opt_string(w, "ssid"),
            password: opt_string(w, "password"),
        })
        .unwrap_or_default();

    let mut rule_ids = IdAllocator::new("rule");
    let rules = objects(root, "rules")
        .map(|r| Rule {
            id: rule_ids.claim(opt_string(r, "id")),
            text: string(r, "text"),
        })
        .collect();

    let mut place_ids = IdAllocator::new("place");
    let places = objects(root, "places")
        .map(|p| Place {
            id: place_ids.claim(opt_string(p, "id")),
            name: string(p, "name"),
            category: p
                .get("category")
                .and_then(Value::as_str)
                .map(PlaceCategory::from_label)
                .unwrap_or_default(),
            subtype: opt_string(p, "subtype"),
            description: opt_string(p, "description"),
            address: opt_string(p, "address"),
            maps_url: opt_string(p, "mapsUrl"),
            site_url: opt_string(p, "siteUrl"),
        })
        .collect();

    let map = match object(root, "map") {
        Some(m) => {
            let mut point_ids = IdAllocator::new("point");
            MapSection {
                home_address: opt_string(m, "homeAddress"),
                points: objects(m, "points")
                    .map(|p| MapPoint {
                        id: point_ids.claim(opt_string(p, "id")),
                        label: string(p, "label"),
                        address: opt_string(p, "address"),
                        maps_url: opt_string(p, "mapsUrl"),
                    })
                    .collect(),
            }
        }
        None => MapSection::default(),
    };

    let mut link_ids = IdAllocator::new("link");
    let links = objects(root, "links")
        .map(|l| Link {
            id: link_ids.claim(opt_string(l, "id")),
            label: string(l, "label"),
            url: string(l, "url"),
        })
        .collect();

    let theme = object(root, "theme").map(sanitize_theme).unwrap_or_default();

    Guide {
        guide_id: opt_string(root, "guideId").filter(|id| !id.trim().is_empty()),
        title: string(root, "title"),
        address: opt_string(root, "address"),
        stay,
        contact,
        wifi,
        rules,
        equipment_notes: opt_string(root, "equipmentNotes"),
        places,
        map,
        links,
        theme,
        created_at: timestamp(root, "createdAt"),
        updated_at: timestamp(root, "updatedAt"),
        owner_id: opt_string(root, "ownerId"),
        owner_email: opt_string(root, "ownerEmail"),
    }
}

fn sanitize_stay(stay: &Map<String, Value>) -> Stay {
    Stay {
        check_in: object(stay, "checkIn").map(|c| CheckIn {
            time: opt_string(c, "time"),
            instructions: opt_string(c, "instructions"),
            code: opt_string(c, "code"),
        }),
        check_out: object(stay, "checkOut").map(|c| CheckOut {
            time: opt_string(c, "time"),
            checklist: opt_string(c, "checklist"),
        }),
    }
}

fn sanitize_theme(theme: &Map<String, Value>) -> Theme {
    let defaults = Theme::default();
    Theme {
        primary: opt_string(theme, "primary").unwrap_or(defaults.primary),
        accent: opt_string(theme, "accent").unwrap_or(defaults.accent),
        font_heading: opt_string(theme, "fontHeading").unwrap_or(defaults.font_heading),
        font_body: opt_string(theme, "fontBody").unwrap_or(defaults.font_body),
        logo_data_url: opt_string(theme, "logoDataUrl"),
        welcome_message: opt_string(theme, "welcomeMessage"),
    }
}

fn object<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    obj.get(key).and_then(Value::as_object)
}

/// Object entries of an array field; non-arrays and non-object entries are skipped.
fn objects<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn opt_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn string(obj: &Map<String, Value>, key: &str) -> String {
    opt_string(obj, key).unwrap_or_default()
}

fn timestamp(obj: &Map<String, Value>, key: &str) -> i64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Hands out unique ids within one list, keeping existing ones where possible.
struct IdAllocator {
    kind: &'static str,
    seen: HashSet<String>,
    next: usize,
}

impl IdAllocator {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            seen: HashSet::new(),
            next: 1,
        }
    }

    fn claim(&mut self, candidate: Option<String>) -> String {
        if let Some(id) = candidate.filter(|id| !id.is_empty())
            && self.seen.insert(id.clone())
        {
            return id;
        }
        loop {
            let id = format!("{}-{}", self.kind, self.next);
            self.next += 1;
            if self.seen.insert(id.clone()) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_guide;
    use serde_json::json;

    // =========================================================================
    // sanitize()
    // =========================================================================

    #[test]
    fn sanitize_non_object_yields_empty_guide() {
        let g = sanitize(&json!("nope"));
        assert_eq!(g.title, "");
        assert!(g.rules.is_empty());
        assert_eq!(g.theme, Theme::default());
    }

    #[test]
    fn sanitize_coerces_wrong_types_to_defaults() {
        let g = sanitize(&json!({
            "title": 42,
            "rules": "not a list",
            "places": [1, "two", null],
            "wifi": ["ssid"],
            "createdAt": "yesterday",
            "updatedAt": 1700000000000i64,
        }));
        assert_eq!(g.title, "");
        assert!(g.rules.is_empty());
        assert!(g.places.is_empty());
        assert_eq!(g.wifi, Wifi::default());
        assert_eq!(g.created_at, 0);
        assert_eq!(g.updated_at, 1_700_000_000_000);
    }

    #[test]
    fn sanitize_unknown_category_becomes_other() {
        let g = sanitize(&json!({
            "places": [
                {"id": "p1", "name": "Chez Paul", "category": "Bistro"},
                {"id": "p2", "name": "Marché", "category": "Commerce essentiel"},
            ]
        }));
        assert_eq!(g.places[0].category, PlaceCategory::Other);
        assert_eq!(g.places[1].category, PlaceCategory::EssentialShop);
    }

    #[test]
    fn sanitize_fills_missing_theme_fields() {
        let g = sanitize(&json!({"theme": {"primary": "#ff0000", "fontBody": 3}}));
        assert_eq!(g.theme.primary, "#ff0000");
        assert_eq!(g.theme.accent, DEFAULT_ACCENT);
        assert_eq!(g.theme.font_body, DEFAULT_FONT);
        assert_eq!(g.theme.welcome_message, None);
    }

    #[test]
    fn sanitize_missing_theme_uses_default_theme() {
        let g = sanitize(&json!({}));
        assert_eq!(g.theme.welcome_message.as_deref(), Some(DEFAULT_WELCOME));
    }

    #[test]
    fn sanitize_assigns_ids_to_missing_and_duplicate_entries() {
        let g = sanitize(&json!({
            "rules": [
                {"text": "Pas de fêtes"},
                {"id": "r1", "text": "Non fumeur"},
                {"id": "r1", "text": "Silence après 22h"},
                {"id": "rule-1", "text": "Chaussures à l'entrée"},
            ]
        }));
        let ids: Vec<_> = g.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rule-1", "r1", "rule-2", "rule-3"]);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sample_guide().sanitized();
        let twice = once.sanitized();
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_blank_guide_id_is_absent() {
        let g = sanitize(&json!({"guideId": "  "}));
        assert_eq!(g.guide_id, None);
    }

    #[test]
    fn parse_guide_rejects_invalid_json() {
        assert_eq!(parse_guide("{not json"), None);
        assert_eq!(parse_guide("[1, 2]"), None);
        assert!(parse_guide(r#"{"title": "Maison"}"#).is_some());
    }

    // =========================================================================
    // Identity helpers
    // =========================================================================

    #[test]
    fn remove_by_id_removes_only_matching_entry() {
        let mut g = Guide::empty();
        let first = g.add_rule("A");
        let second = g.add_rule("A");
        assert_ne!(first, second);

        assert!(remove_by_id(&mut g.rules, &first));
        assert_eq!(g.rules.len(), 1);
        assert_eq!(g.rules[0].id, second);
        assert!(!remove_by_id(&mut g.rules, &first));
    }

    #[test]
    fn home_address_prefers_map_section() {
        let mut g = Guide::empty();
        g.address = Some("1 Rue A, 75001 Paris".into());
        assert_eq!(g.home_address(), Some("1 Rue A, 75001 Paris"));

        g.map.home_address = Some("2 Rue B, 69001 Lyon".into());
        assert_eq!(g.home_address(), Some("2 Rue B, 69001 Lyon"));
    }

    #[test]
    fn category_serializes_with_french_label() {
        let json = serde_json::to_string(&PlaceCategory::Activity).unwrap();
        assert_eq!(json, "\"Activité\"");
    }
}
