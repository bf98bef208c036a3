//! Coordinates embedded in map-service URLs.
//!
//! Hosts often paste a Google Maps link instead of (or next to) an address.
//! Those links usually carry coordinates, which are more precise than
//! anything a geocoder would return for the same place.

use super::backend::Coordinates;
use regex::Regex;
use std::sync::LazyLock;

/// Patterns tried in order; the first match with in-range values wins.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // .../@48.8566,2.3522,17z
        r"@(-?\d+\.\d+),(-?\d+\.\d+)",
        // ...!3d48.8566!4d2.3522
        r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)",
        // .../48.8566,2.3522/ and .../dir/48.8566,2.3522
        r"/(?:dir/)?(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)(?:/|$)",
        r"[?&]q=(-?\d+(?:\.\d+)?)(?:,|%2C)(-?\d+(?:\.\d+)?)",
        r"[?&]ll=(-?\d+(?:\.\d+)?)(?:,|%2C)(-?\d+(?:\.\d+)?)",
        r"[?&]sll=(-?\d+(?:\.\d+)?)(?:,|%2C)(-?\d+(?:\.\d+)?)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extract `(lat, lng)` from a maps URL, if any known pattern matches.
pub fn coords_from_maps_url(url: &str) -> Option<Coordinates> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    PATTERNS.iter().find_map(|re| {
        let caps = re.captures(url)?;
        let lat: f64 = caps.get(1)?.as_str().parse().ok()?;
        let lng: f64 = caps.get(2)?.as_str().parse().ok()?;
        Coordinates::new(lat, lng)
    })
}
