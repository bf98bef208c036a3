//! Resolve points of interest to coordinates.
//!
//! Each point goes through an ordered list of strategies, stopping at the
//! first one that yields coordinates:
//!
//! | # | Strategy                | Source                                          |
//! |---|-------------------------|-------------------------------------------------|
//! | 1 | [`Strategy::MapsUrl`]   | coordinates embedded in the point's maps link   |
//! | 2 | [`Strategy::Cache`]     | a previous successful lookup                    |
//! | 3 | [`Strategy::Structured`]| street / postal code / city / country fields    |
//! | 4 | [`Strategy::FreeText`]  | normalized address with the country appended    |
//! | 5 | [`Strategy::WithContext`]| normalized address plus the home city         |
//! | 6 | [`Strategy::Original`]  | the address exactly as typed                    |
//! | 7 | [`Strategy::Label`]     | the point's label, for points with no address   |
//!
//! Steps 3 to 7 are network queries, planned up front by [`plan_queries`]
//! (pure, so the plan is testable without a backend) and executed one after
//! another by [`GeocodingClient`]. A failing query is logged and the next
//! one is tried; a point that exhausts the plan is left off the map.
//! Points are resolved sequentially to stay within public rate limits.

pub mod backend;
pub mod cache;
pub mod nominatim;
pub mod url_coords;

pub use backend::{
    Coordinates, GeocodeBackend, GeocodeError, GeocodeQuery, OfflineBackend, StructuredQuery,
};
pub use cache::{CACHE_KEY, GeocodeCache};
pub use nominatim::NominatimBackend;
pub use url_coords::coords_from_maps_url;

use crate::address::{AddressNormalizer, Locality, extract_locality};
use crate::points::{HOME_POINT_ID, PointOfInterest};
use crate::store::KeyValueStore;
use serde::Serialize;
use std::fmt;

/// A point with resolved coordinates, ready for the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedPoint {
    pub id: String,
    pub label: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_home: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    MapsUrl,
    Cache,
    Structured,
    FreeText,
    WithContext,
    Original,
    Label,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::MapsUrl => "maps-url",
            Strategy::Cache => "cache",
            Strategy::Structured => "structured",
            Strategy::FreeText => "free-text",
            Strategy::WithContext => "with-context",
            Strategy::Original => "original",
            Strategy::Label => "label",
        };
        f.write_str(name)
    }
}

/// One network query of a point's plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub strategy: Strategy,
    pub query: GeocodeQuery,
}

/// Cache key of a point: its normalized address (or label when it has
/// none) and its maps URL.
pub fn point_cache_key(point: &PointOfInterest, normalizer: &AddressNormalizer) -> String {
    let subject = match point.address() {
        Some(address) => {
            let normalized = normalizer.normalize(address).query;
            if normalized.is_empty() {
                address.to_string()
            } else {
                normalized
            }
        }
        None => point.label.trim().to_string(),
    };
    cache::cache_key(&subject, point.maps_url())
}

/// The network queries for a point, in the order they are tried.
///
/// `context` is the locality of the home address; it fills in postal code
/// and city for addresses that omit them.
pub fn plan_queries(
    point: &PointOfInterest,
    normalizer: &AddressNormalizer,
    context: &Locality,
) -> Vec<PlannedQuery> {
    let mut plan: Vec<PlannedQuery> = Vec::new();
    let mut push = |strategy: Strategy, query: GeocodeQuery| {
        if !plan.iter().any(|p| p.query == query) {
            plan.push(PlannedQuery { strategy, query });
        }
    };

    let Some(address) = point.address() else {
        let label = point.label.trim();
        if !label.is_empty() {
            push(
                Strategy::Label,
                GeocodeQuery::FreeText(normalizer.ensure_country(label)),
            );
        }
        return plan;
    };

    let normalized = normalizer.normalize(address);
    if !normalized.cleaned.is_empty() {
        let locality = if normalized.locality.is_empty() {
            context
        } else {
            &normalized.locality
        };
        push(
            Strategy::Structured,
            GeocodeQuery::Structured(StructuredQuery {
                street: Some(normalized.street.clone()).filter(|s| !s.is_empty()),
                city: locality.city.clone(),
                postal: locality.postal.clone(),
                country: Some(normalizer.country().to_string()),
            }),
        );
        push(Strategy::FreeText, GeocodeQuery::FreeText(normalized.query.clone()));

        if let Some(city) = &context.city {
            let place = match &context.postal {
                Some(postal) => format!("{postal} {city}"),
                None => city.clone(),
            };
            push(
                Strategy::WithContext,
                GeocodeQuery::FreeText(
                    normalizer.ensure_country(&format!("{}, {place}", normalized.cleaned)),
                ),
            );
        }
    }
    if address != normalized.cleaned {
        push(
            Strategy::Original,
            GeocodeQuery::FreeText(normalizer.ensure_country(address)),
        );
    }
    plan
}

/// Counts of how points were resolved during one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeocodeStats {
    pub from_url: u32,
    pub cached: u32,
    pub resolved: u32,
    pub missed: u32,
}

impl GeocodeStats {
    fn record(&mut self, strategy: Option<Strategy>) {
        match strategy {
            Some(Strategy::MapsUrl) => self.from_url += 1,
            Some(Strategy::Cache) => self.cached += 1,
            Some(_) => self.resolved += 1,
            None => self.missed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.from_url + self.cached + self.resolved + self.missed
    }
}

impl fmt::Display for GeocodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from links, {} cached, {} resolved",
            self.from_url, self.cached, self.resolved
        )?;
        if self.missed > 0 {
            write!(f, ", {} not found", self.missed)?;
        }
        Ok(())
    }
}

/// Result of geocoding a list of points.
#[derive(Debug, Default)]
pub struct GeocodeReport {
    pub points: Vec<GeocodedPoint>,
    pub stats: GeocodeStats,
}

/// Runs the strategy chain against a backend and a cache.
pub struct GeocodingClient<B: GeocodeBackend, S: KeyValueStore> {
    backend: B,
    cache: GeocodeCache<S>,
    normalizer: AddressNormalizer,
}

impl<B: GeocodeBackend, S: KeyValueStore> GeocodingClient<B, S> {
    pub fn new(backend: B, cache: GeocodeCache<S>, normalizer: AddressNormalizer) -> Self {
        Self {
            backend,
            cache,
            normalizer,
        }
    }

    pub fn cache_mut(&mut self) -> &mut GeocodeCache<S> {
        &mut self.cache
    }

    /// Resolve one point, returning the coordinates and the strategy that
    /// found them.
    pub fn resolve(
        &mut self,
        point: &PointOfInterest,
        context: &Locality,
    ) -> Option<(Coordinates, Strategy)> {
        if let Some(coords) = point.maps_url().and_then(coords_from_maps_url) {
            return Some((coords, Strategy::MapsUrl));
        }

        let key = point_cache_key(point, &self.normalizer);
        if let Some(coords) = self.cache.get(&key) {
            return Some((coords, Strategy::Cache));
        }

        let plan = plan_queries(point, &self.normalizer, context);
        let backend = &self.backend;
        let found = plan
            .iter()
            .find_map(|planned| match backend.search(&planned.query) {
                Ok(Some(coords)) => Some((coords, planned.strategy)),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(
                        point = %point.label,
                        strategy = %planned.strategy,
                        error = %e,
                        "geocoding query failed"
                    );
                    None
                }
            })?;
        self.cache.insert(&key, found.0);
        Some(found)
    }

    /// Resolve every point. Points that cannot be resolved are omitted;
    /// input order is preserved.
    pub fn geocode_points(
        &mut self,
        points: &[PointOfInterest],
        context_address: Option<&str>,
    ) -> GeocodeReport {
        let context = context_address.map(extract_locality).unwrap_or_default();
        let mut report = GeocodeReport::default();
        for point in points {
            let resolved = self.resolve(point, &context);
            report.stats.record(resolved.map(|(_, s)| s));
            match resolved {
                Some((coords, strategy)) => {
                    tracing::debug!(point = %point.label, %strategy, "geocoded");
                    report.points.push(GeocodedPoint {
                        id: point.id.clone(),
                        label: point.label.clone(),
                        lat: coords.lat,
                        lng: coords.lng,
                        url: point.maps_url().map(String::from),
                        is_home: point.id == HOME_POINT_ID,
                    });
                }
                None => tracing::info!(point = %point.label, "no coordinates found, skipping"),
            }
        }
        report
    }
}
