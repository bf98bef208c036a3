//! # House Guide
//!
//! Export and share guest guides for short-term rentals. A host fills in a
//! [`guide::Guide`] (arrival, Wi-Fi, rules, recommendations, map points) and
//! this crate turns it into:
//!
//! - a single **self-contained HTML file** that works offline, re-hosted, or
//!   opened from a USB stick, with an interactive map when online and a
//!   pre-rendered map image when not
//! - a **share link** carrying the whole guide in its URL fragment, so it
//!   opens on any device without a server
//!
//! # Architecture: Export Pipeline
//!
//! ```text
//! 1. Collect   Guide          →  points of interest   (merge map pins and recommendations)
//! 2. Geocode   points         →  coordinates          (maps links, cache, then network)
//! 3. Render    guide + coords →  HTML document        (inline CSS, map script, static map)
//! 4. Name      title + id     →  <slug>-<id8>.html
//! ```
//!
//! Each stage is a plain function or a small struct over an injected
//! collaborator, so tests run the whole pipeline against in-memory stores and
//! mock backends without touching the network.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`guide`] | Data model, defaults and the sanitizer every loaded guide goes through |
//! | [`address`] | French address clean-up and locality extraction for geocoding |
//! | [`points`] | Merge and dedupe explicit map points with recommendation places |
//! | [`geocode`] | Strategy chain from maps links to network search, with a persistent cache |
//! | [`staticmap`] | Zoom estimation and fetching a map image as a data URL |
//! | [`render`] | The exported HTML document, built with Maud |
//! | [`share`] | Share-link payload codec and link parsing |
//! | [`naming`] | ASCII slugs and export file names |
//! | [`qr`] | QR codes for share links |
//! | [`format`] | French display formats for times and phone numbers |
//! | [`store`] | Key-value persistence for drafts, published guides and caches |
//! | [`accounts`] | Local host accounts and the current session |
//! | [`export`] | The pipeline tying the stages together |
//! | [`config`] | `house-guide.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Degrade, Never Fail
//!
//! A guide must export even when every network call fails. Geocoding misses
//! drop the point from the map (it stays in the list); an unreachable
//! static-map service drops the image; a link too long for a QR code falls
//! back to the payload-free page URL. Only local I/O errors surface.
//!
//! ## Sanitize at Every Boundary
//!
//! Guides come from JSON files, the key-value store and share links. All of
//! them go through [`guide::sanitize`], which coerces wrong types to safe
//! defaults instead of erroring, so a decoded share link and a stored guide
//! are indistinguishable.
//!
//! ## Sequential Geocoding
//!
//! Points are geocoded one after another with a blocking client. Public
//! Nominatim instances ask for at most one request per second, and a guide
//! rarely has more than a dozen points.

pub mod accounts;
pub mod address;
pub mod config;
pub mod export;
pub mod format;
pub mod geocode;
pub mod guide;
pub mod naming;
pub mod output;
pub mod points;
pub mod qr;
pub mod render;
pub mod share;
pub mod staticmap;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
