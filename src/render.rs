//! Self-contained HTML export of a guide.
//!
//! [`render_guide`] turns a sanitized [`Guide`] into one HTML document that
//! can be saved, re-hosted or opened from disk:
//!
//! - **Inline CSS**: `static/guide.css` plus the theme's custom properties.
//! - **Interactive map**: when geocoded points exist, Leaflet is referenced
//!   from its CDN and `static/map.js` is inlined with the points as JSON.
//! - **Static map**: an optional pre-fetched image (data URL) sits behind the
//!   interactive map and is hidden once the map is ready.
//! - **Degraded map**: with neither, the points are listed as text and a
//!   directions link is offered.
//!
//! Host text goes through maud's escaping. Values that reach CSS or `href`
//! attributes are validated first ([`sanitize_color`], [`sanitize_font`],
//! [`safe_href`]).
//!
//! Output depends only on the input, so identical input renders identical
//! bytes. The "last updated" stamp comes from the guide's timestamps.

use crate::config::MapConfig;
use crate::format::{format_phone_fr, format_time_display};
use crate::geocode::GeocodedPoint;
use crate::guide::{DEFAULT_ACCENT, DEFAULT_FONT, DEFAULT_PRIMARY, Guide, Place, now_millis};
use crate::points::PointOfInterest;
use chrono::{DateTime, Locale, Utc};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

const CSS: &str = include_str!("../static/guide.css");
const MAP_JS: &str = include_str!("../static/map.js");

/// Title used when the guide has none.
pub const DEFAULT_TITLE: &str = "Guide du logement";

const EMERGENCY_NUMBERS: [(&str, &str); 4] = [
    ("112", "Urgences européennes"),
    ("15", "SAMU"),
    ("18", "Pompiers"),
    ("17", "Police"),
];

const SAFE_SCHEMES: [&str; 5] = ["http", "https", "mailto", "tel", "geo"];

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{3,8}$").unwrap());

/// Everything the renderer needs besides configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub guide: &'a Guide,
    /// Merged points of interest, listed in the map section.
    pub points: &'a [PointOfInterest],
    /// Points with coordinates, drawn on the interactive map.
    pub geocoded: &'a [GeocodedPoint],
    /// Pre-rendered map image as a data URL.
    pub static_map: Option<&'a str>,
    pub share_link: Option<&'a str>,
    /// Inline SVG of the share link's QR code.
    pub qr_svg: Option<&'a str>,
}

impl<'a> RenderInput<'a> {
    /// Input with no map data and no share block.
    pub fn bare(guide: &'a Guide, points: &'a [PointOfInterest]) -> Self {
        Self {
            guide,
            points,
            geocoded: &[],
            static_map: None,
            share_link: None,
            qr_svg: None,
        }
    }
}

/// Data handed to the inline map script.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapData<'a> {
    points: Vec<GeocodedPoint>,
    tile_url: &'a str,
    attribution: &'a str,
    fit_padding: f64,
    single_point_zoom: u8,
    poll_interval_ms: u32,
    poll_timeout_ms: u32,
    jitter: f64,
}

/// `value` if it is a hex color, `fallback` otherwise.
pub fn sanitize_color<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if HEX_COLOR.is_match(value) {
        value
    } else {
        fallback
    }
}

/// Font family name safe to place in a CSS declaration.
pub fn sanitize_font(value: &str, fallback: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '<' | '>' | ';' | '{' | '}' | '\\'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `url` if it parses with an allowed scheme.
pub fn safe_href(url: &str) -> Option<&str> {
    let url = url.trim();
    let parsed = Url::parse(url).ok()?;
    SAFE_SCHEMES
        .contains(&parsed.scheme())
        .then_some(url)
}

/// JSON that can sit inside a `<script>` element.
fn script_json(value: &impl Serialize) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(
            json.replace('<', "\\u003c")
                .replace('>', "\\u003e")
                .replace('&', "\\u0026"),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "could not serialize map data");
            None
        }
    }
}

/// "12 mars 2025", from the guide's last update.
fn updated_label(guide: &Guide) -> String {
    let millis = [guide.updated_at, guide.created_at]
        .into_iter()
        .find(|ms| *ms > 0)
        .unwrap_or_else(now_millis);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format_localized("%-d %B %Y", Locale::fr_FR)
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Google Maps directions from home through every point address and back.
fn directions_url(base: &str, home: &str, points: &[PointOfInterest]) -> Option<String> {
    let waypoints: Vec<&str> = points.iter().filter_map(|p| p.address()).collect();
    if waypoints.is_empty() {
        return None;
    }
    let mut url = Url::parse(base).ok()?;
    url.query_pairs_mut()
        .append_pair("api", "1")
        .append_pair("origin", home)
        .append_pair("destination", home)
        .append_pair("waypoints", &waypoints.join("|"));
    Some(url.into())
}

/// Geocoded points as the map script sees them: popup links only when
/// their scheme is safe.
fn map_points(geocoded: &[GeocodedPoint]) -> Vec<GeocodedPoint> {
    geocoded
        .iter()
        .map(|point| GeocodedPoint {
            url: point.url.as_deref().and_then(safe_href).map(String::from),
            ..point.clone()
        })
        .collect()
}

/// Render the full document.
pub fn render_guide(input: &RenderInput, map: &MapConfig) -> String {
    let guide = input.guide;
    let title = non_empty(Some(guide.title.as_str())).unwrap_or(DEFAULT_TITLE);
    let has_live_map = !input.geocoded.is_empty();

    let theme = &guide.theme;
    let root = format!(
        ":root {{ --primary: {}; --accent: {}; --font-heading: {}; --font-body: {}; }}\n",
        sanitize_color(&theme.primary, DEFAULT_PRIMARY),
        sanitize_color(&theme.accent, DEFAULT_ACCENT),
        sanitize_font(&theme.font_heading, DEFAULT_FONT),
        sanitize_font(&theme.font_body, DEFAULT_FONT),
    );

    let map_json = has_live_map
        .then(|| {
            script_json(&MapData {
                points: map_points(input.geocoded),
                tile_url: &map.tile_url,
                attribution: &map.attribution,
                fit_padding: map.fit_padding,
                single_point_zoom: map.single_point_zoom,
                poll_interval_ms: map.poll_interval_ms,
                poll_timeout_ms: map.poll_timeout_ms,
                jitter: map.jitter,
            })
        })
        .flatten();

    let markup = html! {
        (DOCTYPE)
        html lang="fr" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(root)) (PreEscaped(CSS)) }
                @if has_live_map {
                    link rel="stylesheet" href=(map.leaflet_css) crossorigin="";
                    script id="leaflet-js" src=(map.leaflet_js) crossorigin="" defer {}
                }
            }
            body {
                main {
                    (render_logo(guide))
                    (render_header(guide, title))
                    p.meta { "Dernière mise à jour : " (updated_label(guide)) }
                    (render_address_contact(guide, title))
                    (render_stay(guide))
                    (render_wifi_rules(guide))
                    (render_equipment(guide))
                    (render_places(&guide.places))
                    (render_map_section(input, map))
                    (render_emergency())
                    (render_share(input))
                    footer { "Guide exporté depuis l'application Guide Airbnb." }
                }
                @if let Some(json) = &map_json {
                    script id="guide-map-data" type="application/json" { (PreEscaped(json)) }
                    script { (PreEscaped(MAP_JS)) }
                }
            }
        }
    };
    markup.into_string()
}

// ============================================================================
// Sections
// ============================================================================

fn render_logo(guide: &Guide) -> Markup {
    let logo = non_empty(guide.theme.logo_data_url.as_deref()).filter(|s| s.starts_with("data:image/"));
    html! {
        @if let Some(src) = logo {
            img.brand src=(src) alt="Logo";
        }
    }
}

fn render_header(guide: &Guide, title: &str) -> Markup {
    let welcome = non_empty(guide.theme.welcome_message.as_deref());
    let address = non_empty(guide.address.as_deref());
    html! {
        header {
            h1 { (welcome.unwrap_or(title)) }
            @if welcome.is_some() {
                p { (title) }
            } @else if let Some(address) = address {
                p { (address) }
            }
        }
    }
}

fn labelled(label: &str, value: &str) -> Markup {
    html! {
        div { span.label { (label) } span { (value) } }
    }
}

fn render_address_contact(guide: &Guide, title: &str) -> Markup {
    let contact = &guide.contact;
    let name = non_empty(contact.name.as_deref());
    let phone = non_empty(contact.phone.as_deref()).map(format_phone_fr);
    let tel = phone
        .as_ref()
        .filter(|p| p.chars().any(|c| c.is_ascii_digit()))
        .map(|p| format!("tel:{}", p.replace(' ', "")));
    let email = non_empty(contact.email.as_deref());
    let has_contact = name.is_some() || phone.is_some() || email.is_some();
    html! {
        section.block {
            div.grid-2 {
                div.card {
                    div.section-title { "🏠 Adresse" }
                    p.lead { (title) }
                    @if let Some(address) = non_empty(guide.address.as_deref()) {
                        p.muted { (address) }
                    }
                }
                @if has_contact {
                    div.card {
                        div.section-title { "👤 Contact" }
                        div.stack {
                            @if let Some(name) = name { (labelled("Nom", name)) }
                            @if let Some(phone) = &phone {
                                @if let Some(href) = tel.as_deref().and_then(safe_href) {
                                    div { span.label { "Téléphone" } a href=(href) { (phone) } }
                                } @else {
                                    (labelled("Téléphone", phone))
                                }
                            }
                            @if let Some(email) = email { (labelled("Email", email)) }
                        }
                    }
                }
            }
        }
    }
}

fn render_stay(guide: &Guide) -> Markup {
    let check_in = guide.stay.check_in.as_ref().filter(|c| !c.is_empty());
    let check_out = guide.stay.check_out.as_ref().filter(|c| !c.is_empty());
    html! {
        @if check_in.is_some() || check_out.is_some() {
            section.block {
                div.grid-2 {
                    @if let Some(c) = check_in {
                        div.card {
                            div.section-title { "🕒 Arrivée" }
                            div.stack {
                                @if let Some(time) = non_empty(c.time.as_deref()) {
                                    (labelled("Heure", &format_time_display(time)))
                                }
                                @if let Some(text) = non_empty(c.instructions.as_deref()) {
                                    (labelled("Instructions", text))
                                }
                                @if let Some(code) = non_empty(c.code.as_deref()) {
                                    (labelled("Code d'accès", code))
                                }
                            }
                        }
                    }
                    @if let Some(c) = check_out {
                        div.card {
                            div.section-title { "🏁 Départ" }
                            div.stack {
                                @if let Some(time) = non_empty(c.time.as_deref()) {
                                    (labelled("Heure", &format_time_display(time)))
                                }
                                @if let Some(list) = non_empty(c.checklist.as_deref()) {
                                    (labelled("Checklist", list))
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_wifi_rules(guide: &Guide) -> Markup {
    let ssid = non_empty(guide.wifi.ssid.as_deref());
    let password = non_empty(guide.wifi.password.as_deref());
    let rules: Vec<&str> = guide
        .rules
        .iter()
        .filter_map(|r| non_empty(Some(r.text.as_str())))
        .collect();
    let has_wifi = ssid.is_some() || password.is_some();
    html! {
        @if has_wifi || !rules.is_empty() {
            section.block {
                div.grid-2 {
                    @if has_wifi {
                        div.card {
                            div.section-title { "📶 Wi‑Fi" }
                            div.stack {
                                @if let Some(ssid) = ssid { (labelled("Nom du réseau", ssid)) }
                                @if let Some(password) = password { (labelled("Mot de passe", password)) }
                            }
                        }
                    }
                    @if !rules.is_empty() {
                        div.card {
                            div.section-title { "📋 Règles" }
                            ul.list {
                                @for rule in &rules { li { (rule) } }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Text with each newline turned into `<br>`.
fn multiline(text: &str) -> Markup {
    html! {
        @for (i, line) in text.split('\n').enumerate() {
            @if i > 0 { br; }
            (line)
        }
    }
}

fn render_equipment(guide: &Guide) -> Markup {
    html! {
        @if let Some(notes) = non_empty(guide.equipment_notes.as_deref()) {
            section.block {
                div.card {
                    div.section-title { "🧰 Équipements & notes" }
                    p.rich { (multiline(notes)) }
                }
            }
        }
    }
}

fn render_place(place: &Place) -> Markup {
    let name = non_empty(Some(place.name.as_str())).unwrap_or("(Sans nom)");
    let maps = non_empty(place.maps_url.as_deref()).and_then(safe_href);
    let site = non_empty(place.site_url.as_deref()).and_then(safe_href);
    html! {
        article.place {
            div.place-category {
                (place.category.label())
                @if let Some(subtype) = non_empty(place.subtype.as_deref()) { " · " (subtype) }
            }
            h3.place-name { (name) }
            @if let Some(text) = non_empty(place.description.as_deref()) {
                p.rich { (multiline(text)) }
            }
            @if let Some(address) = non_empty(place.address.as_deref()) {
                p.muted { (address) }
            }
            @if maps.is_some() || site.is_some() {
                div.links {
                    @if let Some(href) = maps {
                        a href=(href) target="_blank" rel="noreferrer" { "Google Maps" }
                    }
                    @if let Some(href) = site {
                        a href=(href) target="_blank" rel="noreferrer" { "Site web" }
                    }
                }
            }
        }
    }
}

fn render_places(places: &[Place]) -> Markup {
    html! {
        @if !places.is_empty() {
            section.block {
                div.card {
                    div.section-title { "🍽️ Recommandations" }
                    div.place-stack {
                        @for place in places { (render_place(place)) }
                    }
                }
            }
        }
    }
}

fn render_map_section(input: &RenderInput, map: &MapConfig) -> Markup {
    let guide = input.guide;
    let home = guide.home_address();
    let has_live_map = !input.geocoded.is_empty();
    let degraded = !has_live_map && input.static_map.is_none();
    let directions = home
        .filter(|_| degraded)
        .and_then(|home| directions_url(&map.directions_base, home, input.points));
    let links: Vec<_> = guide
        .links
        .iter()
        .filter(|l| !l.url.trim().is_empty())
        .collect();
    let shown = has_live_map
        || input.static_map.is_some()
        || home.is_some()
        || !input.points.is_empty()
        || !links.is_empty();

    html! {
        @if shown {
            section.block {
                div.card {
                    div.section-title { "🗺️ Accès & environs" }
                    @if let Some(home) = home {
                        p.muted { "Adresse du logement : " (home) }
                    }
                    @if !degraded {
                        div id="guide-map" class="map-frame" {
                            @if let Some(src) = input.static_map {
                                img.map-static src=(src) alt="Carte des environs";
                            }
                            @if has_live_map {
                                div id="guide-map-canvas" class="map-canvas" {}
                            }
                        }
                    }
                    @if !input.points.is_empty() {
                        ul.list {
                            @for point in input.points {
                                li {
                                    span.bold { (point.label) }
                                    @if let Some(address) = point.address() { " – " (address) }
                                    @if let Some(href) = point.maps_url().and_then(safe_href) {
                                        " "
                                        a href=(href) target="_blank" rel="noreferrer" { "(Itinéraire)" }
                                    }
                                }
                            }
                        }
                    }
                    @if let Some(href) = &directions {
                        a.directions href=(href) target="_blank" rel="noreferrer" {
                            "Ouvrir la carte avec tous les points"
                        }
                    }
                    @if !links.is_empty() {
                        div.badge-row {
                            @for link in &links {
                                @let text = non_empty(Some(link.label.as_str())).unwrap_or(link.url.as_str());
                                @if let Some(href) = safe_href(&link.url) {
                                    a.badge href=(href) target="_blank" rel="noreferrer" { (text) }
                                } @else {
                                    span.badge { (text) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_emergency() -> Markup {
    html! {
        section.block {
            div.card {
                div.section-title { "☎️ Numéros d'urgence" }
                div.emergency-grid {
                    @for (code, label) in EMERGENCY_NUMBERS {
                        div.emergency-card {
                            div.emergency-code { (code) }
                            div.emergency-label { (label) }
                        }
                    }
                }
            }
        }
    }
}

fn render_share(input: &RenderInput) -> Markup {
    html! {
        @if let Some(link) = input.share_link {
            section.block {
                div.card {
                    div.section-title { "🔗 Partager ce guide" }
                    div.share {
                        @if let Some(svg) = input.qr_svg {
                            div.qr { (PreEscaped(svg)) }
                        }
                        @if let Some(href) = safe_href(link) {
                            a.share-link href=(href) { (link) }
                        } @else {
                            span.share-link { (link) }
                        }
                    }
                }
            }
        }
    }
}
