//! Nominatim search backend.

use super::backend::{Coordinates, GeocodeBackend, GeocodeError, GeocodeQuery};
use crate::config::GeocoderConfig;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Blocking client for a Nominatim-compatible `/search` endpoint.
pub struct NominatimBackend {
    client: Client,
    endpoint: Url,
    language: String,
}

impl NominatimBackend {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: Url::parse(&config.endpoint)?,
            language: config.language.clone(),
        })
    }

    /// The request URL for a query: `format=json&limit=1` plus either `q` or
    /// the structured fields that are present.
    pub fn request_url(&self, query: &GeocodeQuery) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("format", "json")
                .append_pair("limit", "1")
                .append_pair("accept-language", &self.language);
            match query {
                GeocodeQuery::FreeText(q) => {
                    pairs.append_pair("q", q);
                }
                GeocodeQuery::Structured(s) => {
                    let fields = [
                        ("street", &s.street),
                        ("city", &s.city),
                        ("postalcode", &s.postal),
                        ("country", &s.country),
                    ];
                    for (name, value) in fields {
                        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                            pairs.append_pair(name, v);
                        }
                    }
                }
            }
        }
        url
    }
}

/// Nominatim returns coordinates as strings; some compatible services use
/// numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Degree {
    Number(f64),
    Text(String),
}

impl Degree {
    fn value(&self) -> Option<f64> {
        match self {
            Degree::Number(n) => Some(*n),
            Degree::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct Hit {
    lat: Degree,
    lon: Degree,
}

/// First hit of a search response body, if any.
fn parse_response(body: &str) -> Result<Option<Coordinates>, GeocodeError> {
    let hits: Vec<Hit> =
        serde_json::from_str(body).map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
    let Some(hit) = hits.first() else {
        return Ok(None);
    };
    match (hit.lat.value(), hit.lon.value()) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng)
            .map(Some)
            .ok_or_else(|| GeocodeError::InvalidResponse(format!("out of range: {lat},{lng}"))),
        _ => Err(GeocodeError::InvalidResponse("non-numeric coordinates".into())),
    }
}

impl GeocodeBackend for NominatimBackend {
    fn search(&self, query: &GeocodeQuery) -> Result<Option<Coordinates>, GeocodeError> {
        let url = self.request_url(query);
        tracing::debug!(%query, "nominatim search");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        parse_response(&response.text()?)
    }
}
