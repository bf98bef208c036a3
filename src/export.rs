//! Export pipeline: one guide in, one self-contained HTML file out.
//!
//! ```text
//! Guide ─ sanitize ─ collect points ─ geocode (home + points) ─ static map
//!                                                                  │
//!            file name ◄─ render ◄─ share link + QR ◄──────────────┘
//! ```
//!
//! Nothing past sanitization can fail the export. Geocoding misses, network
//! errors, an unavailable static map or a link too long for a QR code all
//! degrade the document and are logged. Only writing the file returns an
//! error.

use crate::config::GuideConfig;
use crate::geocode::{GeocodeBackend, GeocodeStats, GeocodedPoint, GeocodingClient};
use crate::guide::Guide;
use crate::naming::{file_share_url, guide_file_name};
use crate::points::{PointOfInterest, collect_points, home_point};
use crate::qr::qr_svg;
use crate::render::{RenderInput, render_guide};
use crate::share::{encode_guide, public_url, share_link};
use crate::staticmap::{StaticMapSource, fetch_static_map};
use crate::store::KeyValueStore;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered guide and what went into it.
#[derive(Debug)]
pub struct ExportedGuide {
    pub file_name: String,
    pub html: String,
    /// Merged points of interest, home excluded.
    pub points: Vec<PointOfInterest>,
    /// Points drawn on the map, home included when it resolved.
    pub geocoded: Vec<GeocodedPoint>,
    pub stats: GeocodeStats,
    pub has_static_map: bool,
    /// Live link carrying the guide payload. Absent for unpublished guides.
    pub share_link: Option<String>,
    /// Where the file is served once uploaded next to the web app.
    pub file_share_url: String,
}

/// Runs the pipeline with a geocoder and an optional static map source.
pub struct Exporter<'a, B: GeocodeBackend, S: KeyValueStore> {
    config: &'a GuideConfig,
    geocoder: GeocodingClient<B, S>,
    maps: Option<&'a dyn StaticMapSource>,
}

impl<'a, B: GeocodeBackend, S: KeyValueStore> Exporter<'a, B, S> {
    pub fn new(config: &'a GuideConfig, geocoder: GeocodingClient<B, S>) -> Self {
        Self {
            config,
            geocoder,
            maps: None,
        }
    }

    pub fn with_static_maps(mut self, source: &'a dyn StaticMapSource) -> Self {
        self.maps = Some(source);
        self
    }

    pub fn into_geocoder(self) -> GeocodingClient<B, S> {
        self.geocoder
    }

    /// Render a guide.
    pub fn export(&mut self, guide: &Guide) -> ExportedGuide {
        let guide = guide.sanitized();
        let points = collect_points(&guide);

        let mut targets: Vec<PointOfInterest> = home_point(&guide).into_iter().collect();
        targets.extend(points.iter().cloned());
        let report = self.geocoder.geocode_points(&targets, guide.home_address());
        tracing::info!(stats = %report.stats, "geocoding finished");

        let static_map = self
            .maps
            .and_then(|source| fetch_static_map(source, &report.points, &self.config.static_map));

        let link = self.share_link(&guide);
        let qr = link
            .as_deref()
            .filter(|_| self.config.export.include_qr)
            .and_then(|link| self.share_qr(link, guide.guide_id.as_deref()));

        let input = RenderInput {
            guide: &guide,
            points: &points,
            geocoded: &report.points,
            static_map: static_map.as_deref(),
            share_link: link.as_deref(),
            qr_svg: qr.as_deref(),
        };
        let html = render_guide(&input, &self.config.map);

        let file_name = guide_file_name(
            &guide.title,
            guide.guide_id.as_deref(),
            self.config.export.max_filename_length,
        );
        ExportedGuide {
            file_share_url: file_share_url(&self.config.share.base_url, &file_name),
            file_name,
            html,
            points,
            geocoded: report.points,
            stats: report.stats,
            has_static_map: static_map.is_some(),
            share_link: link,
        }
    }

    /// Render a guide and write it into `out_dir`, creating the directory.
    pub fn export_to(
        &mut self,
        guide: &Guide,
        out_dir: &Path,
    ) -> Result<(ExportedGuide, PathBuf), ExportError> {
        let exported = self.export(guide);
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(&exported.file_name);
        fs::write(&path, &exported.html)?;
        tracing::info!(path = %path.display(), "guide written");
        Ok((exported, path))
    }

    fn share_link(&self, guide: &Guide) -> Option<String> {
        let id = guide.guide_id.as_deref()?;
        match encode_guide(guide) {
            Ok(payload) => Some(share_link(
                &self.config.share.base_url,
                id,
                &payload,
                &self.config.share.query_param,
            )),
            Err(e) => {
                tracing::warn!(error = %e, "could not encode share payload");
                None
            }
        }
    }

    /// QR of the full link, or of the payload-free page when the link is too
    /// long for a QR code.
    fn share_qr(&self, link: &str, guide_id: Option<&str>) -> Option<String> {
        let size = self.config.export.qr_size;
        match qr_svg(link, size) {
            Ok(svg) => Some(svg),
            Err(e) => {
                tracing::debug!(error = %e, "share link too long for a QR code");
                let fallback = public_url(&self.config.share.base_url, guide_id?);
                qr_svg(&fallback, size)
                    .inspect_err(|e| tracing::warn!(error = %e, "no QR code for this guide"))
                    .ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressNormalizer;
    use crate::geocode::GeocodeCache;
    use crate::geocode::OfflineBackend;
    use crate::geocode::backend::tests::MockGeocoder;
    use crate::points::HOME_POINT_ID;
    use crate::staticmap::tests::MockMapSource;
    use crate::store::MemoryStore;
    use crate::test_helpers::sample_guide;

    fn client<B: GeocodeBackend>(backend: B) -> GeocodingClient<B, MemoryStore> {
        GeocodingClient::new(
            backend,
            GeocodeCache::new(MemoryStore::new()),
            AddressNormalizer::default(),
        )
    }

    #[test]
    fn offline_export_still_maps_url_points() {
        let config = GuideConfig::default();
        let mut exporter = Exporter::new(&config, client(OfflineBackend));
        let exported = exporter.export(&sample_guide());

        assert_eq!(exported.file_name, "le-petit-bistrot-abcdef12.html");
        assert_eq!(exported.geocoded.len(), 1);
        assert_eq!(exported.geocoded[0].label, "Plage des Catalans");
        assert_eq!(exported.stats.from_url, 1);
        assert!(exported.stats.missed > 0);
        assert!(exported.html.contains("guide-map-data"));
        assert!(!exported.has_static_map);
    }

    #[test]
    fn home_is_geocoded_first_and_marked() {
        let config = GuideConfig::default();
        let mock = MockGeocoder::answering(&[(
            "12 Boulevard Saint Michel, 13006 Marseille, France",
            (43.29, 5.38),
        )]);
        let mut exporter = Exporter::new(&config, client(mock));
        let exported = exporter.export(&sample_guide());

        let home = &exported.geocoded[0];
        assert_eq!(home.id, HOME_POINT_ID);
        assert!(home.is_home);
        assert!(exported.html.contains("\"isHome\":true"));
    }

    #[test]
    fn static_map_is_inlined() {
        let config = GuideConfig::default();
        let maps = MockMapSource::with_png();
        let mut exporter = Exporter::new(&config, client(OfflineBackend)).with_static_maps(&maps);
        let exported = exporter.export(&sample_guide());

        assert!(exported.has_static_map);
        assert!(exported.html.contains("src=\"data:image/png;base64,"));
        assert_eq!(maps.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn failing_static_map_degrades() {
        let config = GuideConfig::default();
        let maps = MockMapSource::default();
        let mut exporter = Exporter::new(&config, client(OfflineBackend)).with_static_maps(&maps);
        let exported = exporter.export(&sample_guide());
        assert!(!exported.has_static_map);
        assert!(exported.html.contains("guide-map-canvas"));
    }

    #[test]
    fn share_link_and_qr_for_published_guides() {
        let config = GuideConfig::default();
        let mut exporter = Exporter::new(&config, client(OfflineBackend));
        let exported = exporter.export(&sample_guide());

        let link = exported.share_link.as_deref().unwrap();
        assert!(link.starts_with("https://guide-airbnb.vercel.app/#/guide/abcdef1234567890?s="));
        assert!(exported.html.contains("<svg"));
        assert_eq!(
            exported.file_share_url,
            "https://guide-airbnb.vercel.app/le-petit-bistrot-abcdef12.html"
        );
    }

    #[test]
    fn unpublished_guide_has_no_share_block() {
        let config = GuideConfig::default();
        let mut guide = sample_guide();
        guide.guide_id = None;
        let mut exporter = Exporter::new(&config, client(OfflineBackend));
        let exported = exporter.export(&guide);
        assert!(exported.share_link.is_none());
        assert!(!exported.html.contains("Partager ce guide"));
        assert_eq!(exported.file_name, "le-petit-bistrot.html");
    }

    #[test]
    fn oversized_link_falls_back_to_public_url_qr() {
        let config = GuideConfig::default();
        let mut guide = sample_guide();
        guide.equipment_notes = Some("Notes très détaillées. ".repeat(200));
        let mut exporter = Exporter::new(&config, client(OfflineBackend));
        let exported = exporter.export(&guide);
        assert!(exported.share_link.unwrap().len() > 3000);
        assert!(exported.html.contains("<div class=\"qr\"><svg"));
    }

    #[test]
    fn export_to_writes_the_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = GuideConfig::default();
        let mut exporter = Exporter::new(&config, client(OfflineBackend));
        let (exported, path) = exporter
            .export_to(&sample_guide(), &tmp.path().join("out"))
            .unwrap();
        assert_eq!(path.file_name().unwrap(), exported.file_name.as_str());
        assert_eq!(fs::read_to_string(&path).unwrap(), exported.html);
    }
}
