//! Exporter configuration.
//!
//! Handles loading, validating, and merging `house-guide.toml`. The file is
//! sparse: stock defaults are serialized to a TOML value, the user file is
//! merged on top key by key, and the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [geocoder]
//! enabled = true
//! endpoint = "https://nominatim.openstreetmap.org/search"
//! language = "fr"              # accept-language sent to the geocoder
//! country = "France"           # appended to queries, used for structured search
//! user_agent = "house-guide/0.4"
//! timeout_secs = 10
//!
//! [cache]
//! # max_age_days = 90          # omit to keep entries forever
//!
//! [static_map]
//! enabled = true
//! endpoint = "https://staticmap.openstreetmap.de/staticmap.php"
//! width = 800
//! height = 400
//! max_markers = 15
//! single_point_zoom = 15
//! fallback_zoom = 6
//!
//! [[static_map.zoom_steps]]    # first step whose max_span >= span wins
//! max_span = 0.005
//! zoom = 16
//!
//! [map]
//! tile_url = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"
//! fit_padding = 0.2
//! single_point_zoom = 15
//! jitter = 0.00025             # degrees, spreads markers sharing a spot
//!
//! [share]
//! base_url = "https://guide-airbnb.vercel.app"
//! query_param = "s"
//!
//! [export]
//! max_filename_length = 80
//! include_qr = true
//! qr_size = 160
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "house-guide.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Exporter configuration loaded from `house-guide.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuideConfig {
    /// Network geocoding (Nominatim-compatible service).
    pub geocoder: GeocoderConfig,
    /// Geocoding cache retention.
    pub cache: CacheConfig,
    /// Pre-rendered map image embedded as a fallback.
    pub static_map: StaticMapConfig,
    /// Interactive map in the exported page.
    pub map: MapConfig,
    /// Share-link construction.
    pub share: ShareConfig,
    /// Exported file naming and extras.
    pub export: ExportConfig,
}

impl GuideConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.into()));

        if self.geocoder.endpoint.trim().is_empty() {
            return fail("geocoder.endpoint must not be empty");
        }
        if self.geocoder.timeout_secs == Some(0) {
            return fail("geocoder.timeout_secs must be positive");
        }
        if self.static_map.width == 0 || self.static_map.height == 0 {
            return fail("static_map.width and static_map.height must be non-zero");
        }
        if self.static_map.max_markers == 0 {
            return fail("static_map.max_markers must be non-zero");
        }
        let zooms = std::iter::once(self.static_map.single_point_zoom)
            .chain(std::iter::once(self.static_map.fallback_zoom))
            .chain(self.static_map.zoom_steps.iter().map(|s| s.zoom))
            .chain(std::iter::once(self.map.single_point_zoom));
        if zooms.into_iter().any(|z| z > MAX_ZOOM) {
            return fail("zoom levels must be 0-19");
        }
        if self
            .static_map
            .zoom_steps
            .iter()
            .any(|s| !(s.max_span.is_finite() && s.max_span > 0.0))
        {
            return fail("static_map.zoom_steps max_span values must be positive");
        }
        if !(self.map.fit_padding.is_finite() && self.map.fit_padding >= 0.0) {
            return fail("map.fit_padding must be >= 0");
        }
        if !(self.map.jitter.is_finite() && self.map.jitter >= 0.0) {
            return fail("map.jitter must be >= 0");
        }
        if self.map.poll_interval_ms == 0 || self.map.poll_timeout_ms < self.map.poll_interval_ms {
            return fail("map.poll_timeout_ms must be >= map.poll_interval_ms > 0");
        }
        match url::Url::parse(&self.share.base_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => return fail("share.base_url must be an http(s) URL"),
        }
        if self.share.query_param.trim().is_empty() {
            return fail("share.query_param must not be empty");
        }
        if self.export.max_filename_length < MIN_FILENAME_LENGTH {
            return fail("export.max_filename_length must be at least 16");
        }
        if self.export.qr_size == 0 {
            return fail("export.qr_size must be non-zero");
        }
        Ok(())
    }
}

const MAX_ZOOM: u8 = 19;
const MIN_FILENAME_LENGTH: usize = 16;

/// Geocoding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeocoderConfig {
    /// When false, only coordinates embedded in maps URLs and cached
    /// results are used.
    pub enabled: bool,
    pub endpoint: String,
    pub language: String,
    pub country: String,
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub user_agent: String,
    pub timeout_secs: Option<u64>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/search".into(),
            language: "fr".into(),
            country: "France".into(),
            user_agent: concat!("house-guide/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: Some(10),
        }
    }
}

/// Geocoding cache retention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Entries older than this are ignored and re-resolved.
    /// When absent, entries never expire.
    pub max_age_days: Option<u32>,
}

/// One row of the span → zoom table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoomStep {
    /// Largest latitude/longitude span (degrees) this zoom still fits.
    pub max_span: f64,
    pub zoom: u8,
}

/// Static map image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticMapConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub width: u32,
    pub height: u32,
    /// Markers beyond this count are left off the image.
    pub max_markers: usize,
    pub single_point_zoom: u8,
    /// Zoom used when the span exceeds every step.
    pub fallback_zoom: u8,
    pub zoom_steps: Vec<ZoomStep>,
}

impl Default for StaticMapConfig {
    fn default() -> Self {
        let steps = [
            (0.005, 16),
            (0.01, 15),
            (0.02, 14),
            (0.05, 13),
            (0.1, 12),
            (0.2, 11),
            (0.5, 10),
            (1.0, 9),
            (2.0, 8),
        ];
        Self {
            enabled: true,
            endpoint: "https://staticmap.openstreetmap.de/staticmap.php".into(),
            width: 800,
            height: 400,
            max_markers: 15,
            single_point_zoom: 15,
            fallback_zoom: 6,
            zoom_steps: steps
                .iter()
                .map(|&(max_span, zoom)| ZoomStep { max_span, zoom })
                .collect(),
        }
    }
}

/// Interactive map settings, passed through to `map.js`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    pub tile_url: String,
    pub attribution: String,
    pub leaflet_css: String,
    pub leaflet_js: String,
    /// Fraction of the bounds added on each side when fitting markers.
    pub fit_padding: f64,
    pub single_point_zoom: u8,
    pub poll_interval_ms: u32,
    pub poll_timeout_ms: u32,
    /// Radius in degrees of the circle markers sharing a position are
    /// spread on.
    pub jitter: f64,
    /// Base of the multi-stop directions link shown in degraded mode.
    pub directions_base: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "&copy; OpenStreetMap contributors".into(),
            leaflet_css: "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css".into(),
            leaflet_js: "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".into(),
            fit_padding: 0.2,
            single_point_zoom: 15,
            poll_interval_ms: 100,
            poll_timeout_ms: 10_000,
            jitter: 0.00025,
            directions_base: "https://www.google.com/maps/dir/".into(),
        }
    }
}

/// Share-link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShareConfig {
    /// Public origin of the web app serving `#/guide/<id>`.
    pub base_url: String,
    /// Query parameter carrying the encoded guide.
    pub query_param: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://guide-airbnb.vercel.app".into(),
            query_param: "s".into(),
        }
    }
}

/// Export output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Longest file name (extension excluded) before truncation.
    pub max_filename_length: usize,
    /// Embed a QR code of the share link in the exported page.
    pub include_qr: bool,
    /// QR code edge length in pixels.
    pub qr_size: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_filename_length: 80,
            include_qr: true,
            qr_size: 160,
        }
    }
}

/// Stock defaults as a TOML value, the base every user file merges onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(GuideConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GuideConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GuideConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, falling back to stock defaults when it is
/// missing. Unknown keys and out-of-range values are errors.
pub fn load_config(path: &Path) -> Result<GuideConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# House Guide Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Geocoding
# ---------------------------------------------------------------------------
[geocoder]
# Set to false to use only coordinates from maps links and the cache.
enabled = true
# Nominatim-compatible search endpoint.
endpoint = "https://nominatim.openstreetmap.org/search"
# Language for results (accept-language).
language = "fr"
# Appended to free-text queries and sent with structured queries.
country = "France"
# Identify yourself: public Nominatim rejects anonymous clients.
user_agent = "house-guide/0.4"
# Per-request timeout.
timeout_secs = 10

# ---------------------------------------------------------------------------
# Geocoding cache
# ---------------------------------------------------------------------------
[cache]
# Re-resolve cached coordinates older than this many days.
# Omit to keep them forever.
# max_age_days = 90

# ---------------------------------------------------------------------------
# Static map image (shown until the interactive map loads, and offline)
# ---------------------------------------------------------------------------
[static_map]
enabled = true
endpoint = "https://staticmap.openstreetmap.de/staticmap.php"
width = 800
height = 400
# Markers drawn on the image; the rest still appear in the list.
max_markers = 15
# Zoom when all points share one position.
single_point_zoom = 15
# Zoom when the points spread wider than every step below.
fallback_zoom = 6

# Span (degrees, larger of latitude and longitude) to zoom level.
# The first step whose max_span is >= the span wins.
[[static_map.zoom_steps]]
max_span = 0.005
zoom = 16

[[static_map.zoom_steps]]
max_span = 0.01
zoom = 15

[[static_map.zoom_steps]]
max_span = 0.02
zoom = 14

[[static_map.zoom_steps]]
max_span = 0.05
zoom = 13

[[static_map.zoom_steps]]
max_span = 0.1
zoom = 12

[[static_map.zoom_steps]]
max_span = 0.2
zoom = 11

[[static_map.zoom_steps]]
max_span = 0.5
zoom = 10

[[static_map.zoom_steps]]
max_span = 1.0
zoom = 9

[[static_map.zoom_steps]]
max_span = 2.0
zoom = 8

# ---------------------------------------------------------------------------
# Interactive map
# ---------------------------------------------------------------------------
[map]
tile_url = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"
attribution = "&copy; OpenStreetMap contributors"
leaflet_css = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
leaflet_js = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"
# Extra room around the markers when fitting the view (fraction of bounds).
fit_padding = 0.2
single_point_zoom = 15
# Fallback polling for the map library when its load event is missed.
poll_interval_ms = 100
poll_timeout_ms = 10000
# Markers on the same spot are spread on a circle of this radius (degrees).
jitter = 0.00025
# Multi-stop directions link, shown when no map can be drawn.
directions_base = "https://www.google.com/maps/dir/"

# ---------------------------------------------------------------------------
# Share links
# ---------------------------------------------------------------------------
[share]
base_url = "https://guide-airbnb.vercel.app"
query_param = "s"

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Longest file name before the extension.
max_filename_length = 80
# Embed a QR code of the share link.
include_qr = true
qr_size = 160
"##
}
