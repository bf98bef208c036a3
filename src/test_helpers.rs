//! Shared fixtures for the unit tests.
//!
//! [`sample_guide`] is a fully filled-in guide with fixed ids and timestamps,
//! so renders and payloads built from it are stable across runs. Its map
//! data exercises the point merge:
//!
//! - an explicit point sharing its address with a recommendation
//! - an explicit point with only a maps link
//! - an explicit point with its own address

use crate::guide::{
    CheckIn, CheckOut, Contact, Guide, Link, MapPoint, MapSection, Place, PlaceCategory, Rule, Stay,
    Theme, Wifi,
};

/// 2025-03-12T12:00:00Z
pub const SAMPLE_UPDATED_AT: i64 = 1_741_780_800_000;

pub const SAMPLE_HOME: &str = "12 Bd. St. Michel, 13006 Marseille";

pub fn sample_guide() -> Guide {
    Guide {
        guide_id: Some("abcdef1234567890".into()),
        title: "Le Petit Bistrot".into(),
        address: Some(SAMPLE_HOME.into()),
        stay: Stay {
            check_in: Some(CheckIn {
                time: Some("16h".into()),
                instructions: Some("Boîte à clés à gauche de la porte".into()),
                code: Some("4821".into()),
            }),
            check_out: Some(CheckOut {
                time: Some("11h".into()),
                checklist: Some("Fermer les volets\nSortir les poubelles".into()),
            }),
        },
        contact: Contact {
            name: Some("Camille".into()),
            phone: Some("+33612345678".into()),
            email: Some("camille@example.fr".into()),
        },
        wifi: Wifi {
            ssid: Some("Bistrot-5G".into()),
            password: Some("soleil2025".into()),
        },
        rules: vec![
            Rule {
                id: "rule-1".into(),
                text: "Pas de fête".into(),
            },
            Rule {
                id: "rule-2".into(),
                text: "Non fumeur".into(),
            },
        ],
        equipment_notes: Some("Machine à café Nespresso\nLave-linge dans la salle de bain".into()),
        places: vec![
            Place {
                id: "place-a".into(),
                name: "Chez Fonfon".into(),
                category: PlaceCategory::Restaurant,
                subtype: Some("Bouillabaisse".into()),
                description: Some("Réserver deux jours avant.".into()),
                address: Some("140 Rue du Vallon des Auffes, 13007 Marseille".into()),
                maps_url: Some("https://maps.google.com/?q=Chez+Fonfon+Marseille".into()),
                site_url: Some("https://www.chez-fonfon.com".into()),
            },
            Place {
                id: "place-b".into(),
                name: "Boulangerie Saint-Jean".into(),
                category: PlaceCategory::EssentialShop,
                subtype: None,
                description: None,
                address: Some("5 rue de la République, 13002 Marseille".into()),
                maps_url: None,
                site_url: None,
            },
        ],
        map: MapSection {
            home_address: Some(SAMPLE_HOME.into()),
            points: vec![
                MapPoint {
                    id: "point-1".into(),
                    label: "Boulangerie".into(),
                    address: Some("5 Rue de la  République, 13002 Marseille".into()),
                    maps_url: None,
                },
                MapPoint {
                    id: "point-2".into(),
                    label: "Plage des Catalans".into(),
                    address: None,
                    maps_url: Some(
                        "https://www.google.com/maps/place/Plage+des+Catalans/@43.2906,5.3536,16z"
                            .into(),
                    ),
                },
                MapPoint {
                    id: "point-3".into(),
                    label: "Vieux-Port".into(),
                    address: Some("Quai du Port, 13002 Marseille".into()),
                    maps_url: None,
                },
            ],
        },
        links: vec![Link {
            id: "link-1".into(),
            label: "Office de tourisme".into(),
            url: "https://www.marseille-tourisme.com".into(),
        }],
        theme: Theme {
            primary: "#1d3557".into(),
            accent: "#e76f51".into(),
            ..Theme::default()
        },
        created_at: SAMPLE_UPDATED_AT,
        updated_at: SAMPLE_UPDATED_AT,
        owner_id: None,
        owner_email: None,
    }
}
