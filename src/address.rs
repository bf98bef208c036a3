//! French address clean-up for geocoding.
//!
//! Hosts type addresses the way they would on an envelope or copy them from
//! a listing: with business names in front, PO boxes, industrial-zone
//! prefixes and abbreviated street types. Public geocoders handle the long
//! form much better, so every address goes through [`AddressNormalizer`]
//! before it reaches the network.
//!
//! ```text
//! "Le Zinc - 12 Bd. St. Michel, 75005 Paris"
//!     → cleaned:  "12 Boulevard Saint Michel, 75005 Paris"
//!     → query:    "12 Boulevard Saint Michel, 75005 Paris, France"
//!     → street:   "12 Boulevard Saint Michel"
//!     → locality: 75005 / Paris
//! ```
//!
//! Everything here is pure: same input, same output, no I/O.

use regex::Regex;
use std::sync::LazyLock;

static PO_BOX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bBP\s*\d+\b").unwrap());
static INDUSTRIAL_ZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bZI\s+[^,\-]+").unwrap());
static SPACE_BEFORE_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+,").unwrap());
static REPEATED_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*,").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static POSTAL_CITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})\b\s+([A-Za-zÀ-ÖØ-öø-ÿ'\- ]+)").unwrap());

/// Street-type abbreviations and their expansions.
///
/// Longer abbreviations sharing a prefix come first (`Ste` before `St`,
/// `Avn` before `Av`). Each matches case-insensitively at a word boundary,
/// with an optional trailing dot that is consumed.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Avn", "Avenue"),
    ("Av", "Avenue"),
    ("Boulev", "Boulevard"),
    ("Bd", "Boulevard"),
    ("Grd", "Grande"),
    ("Gd", "Grande"),
    ("Ste", "Sainte"),
    ("St", "Saint"),
    ("Pl", "Place"),
    ("Rte", "Route"),
    ("Chem", "Chemin"),
    ("All", "Allée"),
];

static ABBREVIATION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(abbr, full)| {
            let re = Regex::new(&format!(r"(?i)\b{abbr}(?:\.|\b)")).unwrap();
            (re, *full)
        })
        .collect()
});

/// Postal code and city extracted from a `NNNNN City` fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locality {
    pub postal: Option<String>,
    pub city: Option<String>,
}

impl Locality {
    pub fn is_empty(&self) -> bool {
        self.postal.is_none() && self.city.is_none()
    }
}

/// Result of normalizing one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    /// Cleaned address without the country suffix.
    pub cleaned: String,
    /// Cleaned address with the country appended when missing.
    pub query: String,
    /// Everything before the postal code, or the whole cleaned address.
    pub street: String,
    /// Postal code and city found in the address itself.
    pub locality: Locality,
}

/// Normalizes free-text addresses, biased towards one country.
#[derive(Debug, Clone)]
pub struct AddressNormalizer {
    country: String,
    country_token: Regex,
}

impl Default for AddressNormalizer {
    fn default() -> Self {
        Self::new("France")
    }
}

impl AddressNormalizer {
    pub fn new(country: &str) -> Self {
        let country_token = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(country)))
            .unwrap_or_else(|_| Regex::new(r"(?i)\bfrance\b").unwrap());
        Self {
            country: country.to_string(),
            country_token,
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// Full normalization: clean, expand, decompose, append country.
    pub fn normalize(&self, raw: &str) -> NormalizedAddress {
        let cleaned = clean_address(raw);
        let (street, locality) = match POSTAL_CITY.captures(&cleaned) {
            Some(caps) => {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                let street = cleaned[..start]
                    .trim_end_matches([' ', ','])
                    .to_string();
                (street, locality_from_captures(&caps))
            }
            None => (cleaned.clone(), Locality::default()),
        };
        NormalizedAddress {
            query: self.ensure_country(&cleaned),
            cleaned,
            street,
            locality,
        }
    }

    /// Append `", <country>"` unless the country already appears as a word.
    pub fn ensure_country(&self, address: &str) -> String {
        if self.country_token.is_match(address) {
            address.to_string()
        } else {
            format!("{}, {}", address, self.country)
        }
    }
}

/// Convenience wrapper: the geocoder-ready form of an address for France.
pub fn normalize_address(raw: &str) -> String {
    AddressNormalizer::default().normalize(raw).query
}

/// Strip noise, keep the right-most labelled segment, expand abbreviations.
pub fn clean_address(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    s = PO_BOX.replace_all(&s, "").into_owned();
    s = INDUSTRIAL_ZONE.replace_all(&s, "").into_owned();

    // "Restaurant - 12 Rue X": the street address is the last segment.
    // Only spaced hyphens split, so "Saint-Michel" survives.
    if s.contains(" - ")
        && let Some(last) = s
            .split(" - ")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .last()
    {
        s = last.to_string();
    }

    for (re, full) in ABBREVIATION_PATTERNS.iter() {
        s = re.replace_all(&s, *full).into_owned();
    }

    s = SPACE_BEFORE_COMMA.replace_all(&s, ",").into_owned();
    s = REPEATED_COMMA.replace_all(&s, ", ").into_owned();
    s = MULTI_SPACE.replace_all(&s, " ").into_owned();
    s.trim().trim_matches(',').trim().to_string()
}

/// Postal code and city from anywhere in an address, e.g. the home address
/// used as context for points that only give a street.
pub fn extract_locality(address: &str) -> Locality {
    POSTAL_CITY
        .captures(address)
        .map(|caps| locality_from_captures(&caps))
        .unwrap_or_default()
}

fn locality_from_captures(caps: &regex::Captures<'_>) -> Locality {
    let postal = caps.get(1).map(|m| m.as_str().to_string());
    let city = caps
        .get(2)
        .map(|m| m.as_str().trim_matches([',', ' ', '\t']).to_string())
        .filter(|c| !c.is_empty());
    Locality { postal, city }
}
