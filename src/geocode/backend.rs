//! Geocoding backend trait and shared types.
//!
//! The [`GeocodeBackend`] trait is the single network seam of the geocoding
//! pipeline: it answers one query with at most one coordinate pair. The
//! production implementation is
//! [`NominatimBackend`](super::nominatim::NominatimBackend); tests use the
//! recording mock in this module, and `--offline` runs use
//! [`OfflineBackend`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder returned HTTP {0}")]
    Status(u16),
    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
    #[error("invalid geocoder endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// `None` unless both values are finite and in range.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }
}

/// Address split into fields for structured search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredQuery {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeQuery {
    Structured(StructuredQuery),
    FreeText(String),
}

impl fmt::Display for GeocodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocodeQuery::FreeText(q) => write!(f, "{q}"),
            GeocodeQuery::Structured(s) => {
                let parts: Vec<&str> = [&s.street, &s.postal, &s.city, &s.country]
                    .into_iter()
                    .filter_map(|p| p.as_deref())
                    .collect();
                write!(f, "[{}]", parts.join(" | "))
            }
        }
    }
}

/// Resolves one query to at most one coordinate pair.
///
/// `Ok(None)` means the service answered but found nothing; errors are
/// transport or protocol failures. Callers treat both as "try the next
/// strategy".
pub trait GeocodeBackend {
    fn search(&self, query: &GeocodeQuery) -> Result<Option<Coordinates>, GeocodeError>;
}

impl<B: GeocodeBackend + ?Sized> GeocodeBackend for Box<B> {
    fn search(&self, query: &GeocodeQuery) -> Result<Option<Coordinates>, GeocodeError> {
        (**self).search(query)
    }
}

/// Never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl GeocodeBackend for OfflineBackend {
    fn search(&self, _query: &GeocodeQuery) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(None)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend answering from a table keyed on the query's display
    /// form, recording every query it receives.
    #[derive(Default)]
    pub struct MockGeocoder {
        pub answers: Mutex<HashMap<String, Coordinates>>,
        pub failing: Mutex<Vec<String>>,
        pub queries: Mutex<Vec<GeocodeQuery>>,
    }

    impl MockGeocoder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn answering(answers: &[(&str, (f64, f64))]) -> Self {
            let mock = Self::new();
            for (query, (lat, lng)) in answers {
                mock.answers
                    .lock()
                    .unwrap()
                    .insert(query.to_string(), Coordinates { lat: *lat, lng: *lng });
            }
            mock
        }

        pub fn fail_on(self, query: &str) -> Self {
            self.failing.lock().unwrap().push(query.to_string());
            self
        }

        pub fn get_queries(&self) -> Vec<GeocodeQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl GeocodeBackend for MockGeocoder {
        fn search(&self, query: &GeocodeQuery) -> Result<Option<Coordinates>, GeocodeError> {
            self.queries.lock().unwrap().push(query.clone());
            let key = query.to_string();
            if self.failing.lock().unwrap().contains(&key) {
                return Err(GeocodeError::Status(503));
            }
            Ok(self.answers.lock().unwrap().get(&key).copied())
        }
    }

    #[test]
    fn coordinates_validate_range() {
        assert!(Coordinates::new(48.85, 2.35).is_some());
        assert!(Coordinates::new(-90.0, 180.0).is_some());
        assert!(Coordinates::new(90.5, 0.0).is_none());
        assert!(Coordinates::new(0.0, -180.1).is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn structured_query_display_skips_missing_fields() {
        let q = GeocodeQuery::Structured(StructuredQuery {
            street: Some("1 Rue A".into()),
            city: Some("Paris".into()),
            postal: None,
            country: Some("France".into()),
        });
        assert_eq!(q.to_string(), "[1 Rue A | Paris | France]");
    }

    #[test]
    fn mock_records_queries_and_fails_on_demand() {
        let mock = MockGeocoder::answering(&[("Gare, France", (1.0, 2.0))]).fail_on("Boom");
        let hit = mock
            .search(&GeocodeQuery::FreeText("Gare, France".into()))
            .unwrap();
        assert_eq!(hit, Some(Coordinates { lat: 1.0, lng: 2.0 }));
        assert!(mock.search(&GeocodeQuery::FreeText("Boom".into())).is_err());
        assert_eq!(mock.get_queries().len(), 2);
    }

    #[test]
    fn offline_backend_finds_nothing() {
        let q = GeocodeQuery::FreeText("anything".into());
        assert_eq!(OfflineBackend.search(&q).unwrap(), None);
    }
}
