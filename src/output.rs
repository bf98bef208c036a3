//! CLI output formatting.
//!
//! Output is **information-first**: every point is shown by position and
//! label, with its address or maps link as indented context lines, so a run
//! reads as an inventory of what went into the guide.
//!
//! # Output Format
//!
//! ## Export
//!
//! ```text
//! Points
//! 001 Chez Fonfon
//!     Address: 140 Rue du Vallon des Auffes, 13007 Marseille
//! 002 Plage des Catalans
//!     Maps: https://www.google.com/maps/place/Plage+des+Catalans/@43.2906,5.3536,16z
//!
//! Map
//!     3 on the map: 1 from links, 1 cached, 1 resolved, 1 not found
//!     Static image: embedded
//!
//! Share
//!     Link: https://guide-airbnb.vercel.app/#/guide/abcdef1234567890?s=eyJndWlk… (2841 chars)
//!     File: https://guide-airbnb.vercel.app/le-petit-bistrot-abcdef12.html
//!
//! Wrote dist/le-petit-bistrot-abcdef12.html
//! ```
//!
//! ## Publish
//!
//! ```text
//! Published Le Petit Bistrot
//!     Id: abcdef1234567890
//!     File: le-petit-bistrot-abcdef12.html
//!     Link: https://guide-airbnb.vercel.app/#/guide/abcdef1234567890?s=…
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::export::ExportedGuide;
use crate::geocode::{Coordinates, Strategy};
use crate::guide::Guide;
use crate::points::PointOfInterest;
use std::path::Path;

// ============================================================================
// Helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Keep the first `max` characters of a long link, noting its full length.
fn abbreviate_link(link: &str, max: usize) -> String {
    let len = link.chars().count();
    if len <= max {
        link.to_string()
    } else {
        let head: String = link.chars().take(max).collect();
        format!("{head}… ({len} chars)")
    }
}

fn point_lines(index: usize, point: &PointOfInterest) -> Vec<String> {
    let label = match point.label.trim() {
        "" => "(no label)",
        label => label,
    };
    let mut lines = vec![format!("{} {}", format_index(index), label)];
    if let Some(address) = point.address() {
        lines.push(format!("{}Address: {}", indent(1), address));
    }
    if let Some(url) = point.maps_url() {
        lines.push(format!("{}Maps: {}", indent(1), url));
    }
    lines
}

// ============================================================================
// Points
// ============================================================================

pub fn format_points(points: &[PointOfInterest]) -> Vec<String> {
    if points.is_empty() {
        return vec!["No points of interest".to_string()];
    }
    points
        .iter()
        .enumerate()
        .flat_map(|(i, p)| point_lines(i + 1, p))
        .collect()
}

pub fn print_points(points: &[PointOfInterest]) {
    for line in format_points(points) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn format_export_output(exported: &ExportedGuide, path: &Path) -> Vec<String> {
    let mut lines = vec!["Points".to_string()];
    lines.extend(format_points(&exported.points));

    lines.push(String::new());
    lines.push("Map".to_string());
    lines.push(format!(
        "{}{} on the map: {}",
        indent(1),
        exported.geocoded.len(),
        exported.stats
    ));
    let image = if exported.has_static_map { "embedded" } else { "none" };
    lines.push(format!("{}Static image: {}", indent(1), image));

    lines.push(String::new());
    lines.push("Share".to_string());
    match &exported.share_link {
        Some(link) => lines.push(format!("{}Link: {}", indent(1), abbreviate_link(link, 72))),
        None => lines.push(format!("{}Link: none (guide not published)", indent(1))),
    }
    lines.push(format!("{}File: {}", indent(1), exported.file_share_url));

    lines.push(String::new());
    lines.push(format!("Wrote {}", path.display()));
    lines
}

pub fn print_export_output(exported: &ExportedGuide, path: &Path) {
    for line in format_export_output(exported, path) {
        println!("{}", line);
    }
}

// ============================================================================
// Publish
// ============================================================================

pub fn format_publish_output(guide: &Guide, file_name: &str, link: &str) -> Vec<String> {
    let title = match guide.title.trim() {
        "" => "(untitled)",
        title => title,
    };
    let mut lines = vec![format!("Published {}", title)];
    lines.push(format!(
        "{}Id: {}",
        indent(1),
        guide.guide_id.as_deref().unwrap_or_default()
    ));
    if let Some(owner) = guide.owner_email.as_deref() {
        lines.push(format!("{}Owner: {}", indent(1), owner));
    }
    lines.push(format!("{}File: {}", indent(1), file_name));
    lines.push(format!("{}Link: {}", indent(1), link));
    lines
}

pub fn print_publish_output(guide: &Guide, file_name: &str, link: &str) {
    for line in format_publish_output(guide, file_name, link) {
        println!("{}", line);
    }
}

// ============================================================================
// Geocode
// ============================================================================

pub fn format_geocode_result(
    address: &str,
    resolved: Option<(Coordinates, Strategy)>,
) -> Vec<String> {
    match resolved {
        Some((coords, strategy)) => vec![
            address.to_string(),
            format!("{}{:.6}, {:.6}", indent(1), coords.lat, coords.lng),
            format!("{}Found by: {}", indent(1), strategy),
        ],
        None => vec![address.to_string(), format!("{}Not found", indent(1))],
    }
}

pub fn print_geocode_result(address: &str, resolved: Option<(Coordinates, Strategy)>) {
    for line in format_geocode_result(address, resolved) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
