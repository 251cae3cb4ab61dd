//! Coordinate estimation.
//!
//! Gives every aggregated location a position on the flat [-512, 512] plane
//! without ever touching a human-curated position. Placement priority:
//!
//! 1. seed table — hand-authored positions for well-known places,
//! 2. containment propagation — near the closest positioned ancestor,
//! 3. type default — a per-type fallback region.
//!
//! All synthesized positions are jittered by a pure function of
//! `(location key, axis)`, so re-running estimation on the same input
//! produces bit-identical output.

use std::collections::HashMap;
use std::path::Path;

use innmap_model::digest::fnv1a64;
use innmap_model::{AggregatedData, Confidence, Coordinate, LocationType};
use serde::Deserialize;

use crate::normalize::normalize;
use crate::CoreError;

const DEFAULT_SEEDS: &str = include_str!("../data/seed_coordinates.json");

/// Ancestor hops to try during containment propagation. Extraction noise can
/// put cycles in the containment edges; the bound keeps the walk finite.
const MAX_ANCESTOR_HOPS: usize = 10;

/// Hand-authored placement data: seed positions for well-known keys and a
/// default base position per location type.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedTable {
    #[serde(default)]
    seeds: HashMap<String, [f64; 2]>,
    #[serde(default)]
    type_defaults: HashMap<LocationType, [f64; 2]>,
}

impl SeedTable {
    /// The built-in seed positions for The Wandering Inn's world.
    pub fn builtin() -> Self {
        serde_json::from_str(DEFAULT_SEEDS).expect("embedded seed_coordinates.json is valid")
    }

    /// Load a seed table from an external JSON file with the same shape as
    /// the embedded defaults.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for SeedTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Assigns coordinates to locations that lack one.
pub struct CoordinateEstimator<'a> {
    seeds: &'a SeedTable,
}

impl<'a> CoordinateEstimator<'a> {
    pub fn new(seeds: &'a SeedTable) -> Self {
        Self { seeds }
    }

    /// Produce the full coordinate set for `data`.
    ///
    /// Entries in `existing` flagged `manual = true` are copied through
    /// verbatim and never reconsidered; everything else is regenerated.
    /// The returned set is sorted by location id so identical input yields
    /// an identical file. Persistence is the caller's responsibility, per
    /// entry.
    pub fn assign(&self, data: &AggregatedData, existing: &[Coordinate]) -> Vec<Coordinate> {
        let mut coords: HashMap<String, Coordinate> = HashMap::new();
        for coord in existing {
            if coord.manual {
                coords.insert(coord.location_id.clone(), coord.clone());
            }
        }

        let mut parent_of: HashMap<String, String> = HashMap::new();
        for edge in &data.containment {
            parent_of
                .entry(normalize(&edge.child))
                .or_insert_with(|| normalize(&edge.parent));
        }

        for (key, pos) in &self.seeds.seeds {
            coords
                .entry(key.clone())
                .or_insert_with(|| estimated(key, pos[0], pos[1]));
        }

        // Containment propagation: place near the first ancestor that
        // already has a position.
        for loc in &data.locations {
            let id = normalize(&loc.name);
            if coords.contains_key(&id) {
                continue;
            }

            let spread = spread_for_type(loc.location_type);
            let mut parent = parent_of.get(&id);
            for _ in 0..MAX_ANCESTOR_HOPS {
                let Some(p) = parent else {
                    break;
                };
                if let Some(anchor) = coords.get(p) {
                    let coord = estimated(
                        &id,
                        anchor.x + jitter(&id, "x", spread),
                        anchor.y + jitter(&id, "y", spread),
                    );
                    coords.insert(id.clone(), coord);
                    break;
                }
                parent = parent_of.get(p);
            }
        }

        // Type-default fallback for everything still unplaced.
        for loc in &data.locations {
            let id = normalize(&loc.name);
            if coords.contains_key(&id) {
                continue;
            }

            let base = self
                .seeds
                .type_defaults
                .get(&loc.location_type)
                .copied()
                .unwrap_or([0.0, 0.0]);
            let spread = spread_for_type(loc.location_type);
            let coord = estimated(
                &id,
                base[0] + jitter(&id, "x", spread),
                base[1] + jitter(&id, "y", spread),
            );
            coords.insert(id, coord);
        }

        let mut out: Vec<Coordinate> = coords.into_values().collect();
        out.sort_by(|a, b| a.location_id.cmp(&b.location_id));
        out
    }
}

fn estimated(id: &str, x: f64, y: f64) -> Coordinate {
    Coordinate {
        location_id: id.to_string(),
        x,
        y,
        confidence: Confidence::Estimated,
        manual: false,
    }
}

/// Jitter magnitude by location type: real-world scale differences, so
/// continents and nations spread widest and buildings barely at all.
fn spread_for_type(location_type: LocationType) -> f64 {
    match location_type {
        LocationType::Continent => 50.0,
        LocationType::Nation => 40.0,
        LocationType::City => 25.0,
        LocationType::Town | LocationType::Village => 20.0,
        LocationType::Building => 5.0,
        LocationType::Landmark => 8.0,
        _ => 20.0,
    }
}

/// Deterministic per-axis offset in [-spread, +spread], a pure function of
/// the location key and axis name.
fn jitter(key: &str, axis: &str, spread: f64) -> f64 {
    let hash = fnv1a64(format!("{key}:{axis}").as_bytes());
    ((hash % 1000) as f64 / 500.0 - 1.0) * spread
}
