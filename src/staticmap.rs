//! Pre-rendered map image embedded in the exported page.
//!
//! The interactive map needs the network; the static image is fetched at
//! export time and inlined as a data URL, so the page still shows where
//! things are when opened offline or before the map library loads.

use crate::config::StaticMapConfig;
use crate::geocode::GeocodedPoint;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageReader;
use reqwest::blocking::Client;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum StaticMapError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("static map service returned HTTP {0}")]
    Status(u16),
    #[error("invalid static map endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("not an image: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches the bytes of a rendered map.
pub trait StaticMapSource {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, StaticMapError>;
}

pub struct HttpStaticMapSource {
    client: Client,
}

impl HttpStaticMapSource {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, StaticMapError> {
        let mut builder = Client::builder().user_agent(user_agent.to_string());
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl StaticMapSource for HttpStaticMapSource {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, StaticMapError> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StaticMapError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Zoom level that fits every point.
///
/// The span is the larger of the latitude and longitude extents. A single
/// position gets `single_point_zoom`; otherwise the first zoom step (in
/// increasing `max_span` order) that covers the span wins, and spans wider
/// than every step get `fallback_zoom`.
pub fn estimate_zoom(points: &[GeocodedPoint], config: &StaticMapConfig) -> u8 {
    let Some((min_lat, max_lat, min_lng, max_lng)) = bounds(points) else {
        return config.single_point_zoom;
    };
    let span = (max_lat - min_lat).max(max_lng - min_lng);
    if span <= 0.0 {
        return config.single_point_zoom;
    }
    let mut steps = config.zoom_steps.clone();
    steps.sort_by(|a, b| a.max_span.total_cmp(&b.max_span));
    steps
        .iter()
        .find(|s| span <= s.max_span)
        .map(|s| s.zoom)
        .unwrap_or(config.fallback_zoom)
}

/// Center of the bounding box.
pub fn center(points: &[GeocodedPoint]) -> Option<(f64, f64)> {
    let (min_lat, max_lat, min_lng, max_lng) = bounds(points)?;
    Some(((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0))
}

fn bounds(points: &[GeocodedPoint]) -> Option<(f64, f64, f64, f64)> {
    let first = points.first()?;
    Some(points.iter().fold(
        (first.lat, first.lat, first.lng, first.lng),
        |(min_lat, max_lat, min_lng, max_lng), p| {
            (
                min_lat.min(p.lat),
                max_lat.max(p.lat),
                min_lng.min(p.lng),
                max_lng.max(p.lng),
            )
        },
    ))
}

/// Image URL for the points, or `None` when there are none.
///
/// Markers are capped at `max_markers`; center and zoom still account for
/// every point.
pub fn static_map_url(
    points: &[GeocodedPoint],
    config: &StaticMapConfig,
) -> Result<Option<Url>, StaticMapError> {
    let Some((lat, lng)) = center(points) else {
        return Ok(None);
    };
    let markers: Vec<String> = points
        .iter()
        .take(config.max_markers)
        .map(|p| {
            let style = if p.is_home { "lightblue1" } else { "red-pushpin" };
            format!("{:.6},{:.6},{style}", p.lat, p.lng)
        })
        .collect();

    let mut url = Url::parse(&config.endpoint)?;
    url.query_pairs_mut()
        .append_pair("center", &format!("{lat:.6},{lng:.6}"))
        .append_pair("zoom", &estimate_zoom(points, config).to_string())
        .append_pair("size", &format!("{}x{}", config.width, config.height))
        .append_pair("maptype", "mapnik")
        .append_pair("markers", &markers.join("|"));
    Ok(Some(url))
}

/// Validate image bytes and wrap them in a `data:` URL.
pub fn image_data_url(bytes: &[u8]) -> Result<String, StaticMapError> {
    let format = image::guess_format(bytes)?;
    // Decoding the header rejects error pages served with a 200.
    ImageReader::with_format(Cursor::new(bytes), format).into_dimensions()?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

/// Fetch the static map as a data URL. Any failure yields `None`, logged.
pub fn fetch_static_map(
    source: &dyn StaticMapSource,
    points: &[GeocodedPoint],
    config: &StaticMapConfig,
) -> Option<String> {
    if !config.enabled || points.is_empty() {
        return None;
    }
    let result = static_map_url(points, config).and_then(|url| match url {
        Some(url) => {
            tracing::debug!(%url, "fetching static map");
            source.fetch(&url).and_then(|bytes| image_data_url(&bytes)).map(Some)
        }
        None => Ok(None),
    });
    match result {
        Ok(data_url) => data_url,
        Err(e) => {
            tracing::warn!(error = %e, "static map unavailable");
            None
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::config::ZoomStep;
    use image::ImageFormat;
    use std::sync::Mutex;

    /// Source returning fixed bytes (or an error) and recording requested URLs.
    #[derive(Default)]
    pub struct MockMapSource {
        pub bytes: Option<Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockMapSource {
        pub fn with_png() -> Self {
            Self {
                bytes: Some(tiny_png()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl StaticMapSource for MockMapSource {
        fn fetch(&self, url: &Url) -> Result<Vec<u8>, StaticMapError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bytes.clone().ok_or(StaticMapError::Status(500))
        }
    }

    pub fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 220, 240]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn point(lat: f64, lng: f64) -> GeocodedPoint {
        GeocodedPoint {
            id: format!("{lat},{lng}"),
            label: "p".into(),
            lat,
            lng,
            url: None,
            is_home: false,
        }
    }

    #[test]
    fn single_point_uses_single_point_zoom() {
        let config = StaticMapConfig::default();
        assert_eq!(estimate_zoom(&[point(48.0, 2.0)], &config), 15);
        assert_eq!(
            estimate_zoom(&[point(48.0, 2.0), point(48.0, 2.0)], &config),
            15
        );
    }

    #[test]
    fn zoom_follows_span_table() {
        let config = StaticMapConfig::default();
        let z = |span: f64| estimate_zoom(&[point(48.0, 2.0), point(48.0 + span, 2.0)], &config);
        assert_eq!(z(0.004), 16);
        assert_eq!(z(0.015), 14);
        assert_eq!(z(0.3), 10);
        assert_eq!(z(1.5), 8);
        assert_eq!(z(5.0), 6);
    }

    #[test]
    fn zoom_steps_need_not_be_sorted() {
        let config = StaticMapConfig {
            zoom_steps: vec![
                ZoomStep { max_span: 1.0, zoom: 9 },
                ZoomStep { max_span: 0.01, zoom: 15 },
            ],
            ..StaticMapConfig::default()
        };
        assert_eq!(
            estimate_zoom(&[point(0.0, 0.0), point(0.005, 0.0)], &config),
            15
        );
    }

    #[test]
    fn more_points_never_zoom_in() {
        let config = StaticMapConfig::default();
        let mut points = vec![point(48.85, 2.35), point(48.86, 2.36)];
        let before = estimate_zoom(&points, &config);
        points.push(point(49.5, 2.35));
        assert!(estimate_zoom(&points, &config) <= before);
    }

    #[test]
    fn url_caps_markers_and_centers_on_bounds() {
        let config = StaticMapConfig {
            max_markers: 2,
            ..StaticMapConfig::default()
        };
        let points = vec![point(48.0, 2.0), point(48.2, 2.2), point(48.4, 2.4)];
        let url = static_map_url(&points, &config).unwrap().unwrap();
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["center"], "48.200000,2.200000");
        assert_eq!(pairs["size"], "800x400");
        assert_eq!(pairs["markers"].split('|').count(), 2);
    }

    #[test]
    fn no_points_no_url() {
        assert!(static_map_url(&[], &StaticMapConfig::default()).unwrap().is_none());
    }

    #[test]
    fn data_url_from_png() {
        let data_url = image_data_url(&tiny_png()).unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn html_error_page_is_rejected() {
        assert!(image_data_url(b"<html>rate limited</html>").is_err());
    }

    #[test]
    fn fetch_failure_yields_none() {
        let source = MockMapSource::default();
        let config = StaticMapConfig::default();
        assert_eq!(fetch_static_map(&source, &[point(1.0, 1.0)], &config), None);
        assert_eq!(source.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn disabled_or_empty_skips_fetch() {
        let source = MockMapSource::with_png();
        let config = StaticMapConfig {
            enabled: false,
            ..StaticMapConfig::default()
        };
        assert_eq!(fetch_static_map(&source, &[point(1.0, 1.0)], &config), None);
        assert_eq!(
            fetch_static_map(&source, &[], &StaticMapConfig::default()),
            None
        );
        assert!(source.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn fetch_success_yields_data_url() {
        let source = MockMapSource::with_png();
        let url = fetch_static_map(&source, &[point(1.0, 1.0)], &StaticMapConfig::default());
        assert!(url.unwrap().starts_with("data:image/png;base64,"));
    }
}
