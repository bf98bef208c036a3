//! Points of interest shown on a guide's map.
//!
//! A guide can describe the same physical location twice: once as an
//! explicit map pin ("Boulangerie, 3 Rue Haute") and once as a
//! recommendation with a description and links. [`collect_points`] merges
//! both sources into the one list that the live preview, the public page
//! and the HTML exporter all render, so they never disagree about what is on
//! the map.
//!
//! ## Merge rules
//!
//! 1. Addresses are compared after trimming, lowercasing and collapsing
//!    whitespace. The comparison form is never sent to a geocoder.
//! 2. Points sharing an address form a group. If the group holds at least
//!    one entry of the preferred origin (recommendations, by default), only
//!    those entries are kept; otherwise the whole group is kept.
//! 3. Points without an address are de-duplicated on
//!    `(label, maps URL)`, first occurrence wins.
//! 4. Points whose label and address are both blank are dropped.
//!
//! Address groups come first, in order of first appearance, then the
//! address-less points. Order inside each bucket follows the input.

use crate::guide::Guide;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Id given to the home marker when it is added to the geocoding input.
pub const HOME_POINT_ID: &str = "home";

/// Prefix applied to recommendation ids so they cannot clash with pin ids.
pub const PLACE_ID_PREFIX: &str = "place-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterest {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
}

impl PointOfInterest {
    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn maps_url(&self) -> Option<&str> {
        self.maps_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// Where a point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A pin from the map step.
    Explicit,
    /// A recommendation ("place").
    Place,
}

/// Trim, lowercase and collapse internal whitespace. Comparison only.
pub fn comparison_key(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The canonical map points of a guide.
pub fn collect_points(guide: &Guide) -> Vec<PointOfInterest> {
    let explicit: Vec<PointOfInterest> = guide
        .map
        .points
        .iter()
        .map(|p| PointOfInterest {
            id: p.id.clone(),
            label: p.label.clone(),
            address: p.address.clone(),
            maps_url: p.maps_url.clone(),
        })
        .collect();
    let places: Vec<PointOfInterest> = guide
        .places
        .iter()
        .map(|p| PointOfInterest {
            id: format!("{PLACE_ID_PREFIX}{}", p.id),
            label: p.name.clone(),
            address: p.address.clone(),
            maps_url: p.maps_url.clone(),
        })
        .collect();
    merge_points(&explicit, &places, Origin::Place)
}

/// Merge explicit pins and recommendations, keeping `prefer`-origin entries
/// when both describe the same address.
pub fn merge_points(
    explicit: &[PointOfInterest],
    places: &[PointOfInterest],
    prefer: Origin,
) -> Vec<PointOfInterest> {
    let sourced = explicit
        .iter()
        .map(|p| (p, Origin::Explicit))
        .chain(places.iter().map(|p| (p, Origin::Place)));

    let mut groups: Vec<Vec<(&PointOfInterest, Origin)>> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut without_address: Vec<&PointOfInterest> = Vec::new();

    for (point, origin) in sourced {
        let key = comparison_key(point.address.as_deref());
        if key.is_empty() {
            without_address.push(point);
            continue;
        }
        let idx = *group_index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push((point, origin));
    }

    let mut result: Vec<PointOfInterest> = Vec::new();
    for group in &groups {
        let has_preferred = group.iter().any(|(_, origin)| *origin == prefer);
        result.extend(
            group
                .iter()
                .filter(|(_, origin)| !has_preferred || *origin == prefer)
                .map(|(p, _)| (*p).clone()),
        );
    }

    let mut seen: HashSet<(String, String)> = HashSet::new();
    for point in without_address {
        let key = (
            comparison_key(Some(&point.label)),
            comparison_key(point.maps_url.as_deref()),
        );
        if seen.insert(key) {
            result.push(point.clone());
        }
    }

    result.retain(|p| !p.label.trim().is_empty() || p.address().is_some());
    result
}

/// The home marker, if the guide has a usable home address.
pub fn home_point(guide: &Guide) -> Option<PointOfInterest> {
    guide.home_address().map(|address| PointOfInterest {
        id: HOME_POINT_ID.to_string(),
        label: address.to_string(),
        address: Some(address.to_string()),
        maps_url: None,
    })
}
