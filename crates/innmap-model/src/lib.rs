//! innmap data model
//!
//! Shared types for every stage of the pipeline:
//!
//! - table-of-contents chapters ([`Chapter`], [`Toc`]),
//! - per-chapter extraction records as produced by the LLM stage
//!   ([`ChapterExtraction`] and friends),
//! - the merged cross-chapter dataset ([`AggregatedData`]),
//! - map coordinates ([`Coordinate`], [`CoordinateSet`]).
//!
//! Extraction-level records are ephemeral: they exist as aggregation input
//! and are rebuilt from storage on every run. Aggregated records are replaced
//! wholesale by each aggregation pass. Coordinates are the one place where
//! human edits live (`manual = true`) and those are never regenerated.

pub mod digest;

use serde::{Deserialize, Serialize};

// ============================================================================
// Chapters
// ============================================================================

/// A single chapter from the table of contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub web_title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub book_number: i64,
    #[serde(default)]
    pub audiobook_chapter: String,
    #[serde(default)]
    pub ebook_chapter: String,
    #[serde(default)]
    pub slug: String,
    pub index: usize,
}

/// The full table of contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Toc {
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub scraped_at: String,
}

// ============================================================================
// Location / relationship taxonomies
// ============================================================================

/// Classifies extracted locations.
///
/// Unknown type strings from the extraction stage fall back to `Other` rather
/// than failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Continent,
    Nation,
    City,
    Town,
    Village,
    Building,
    Landmark,
    Dungeon,
    BodyOfWater,
    Forest,
    Road,
    #[serde(other)]
    Other,
}

impl Default for LocationType {
    fn default() -> Self {
        LocationType::Other
    }
}

/// Classifies spatial relationships between locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Distance,
    TravelTime,
    Direction,
    Containment,
    Adjacency,
    Route,
    Relative,
    #[serde(other)]
    Other,
}

impl Default for RelationshipType {
    fn default() -> Self {
        RelationshipType::Other
    }
}

// ============================================================================
// Per-chapter extraction records
// ============================================================================

/// A location found in a single chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLocation {
    pub name: String,
    #[serde(rename = "type", default)]
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub visual_description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_quotes: Vec<String>,
}

/// A spatial relationship found in a single chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub rel_type: RelationshipType,
    #[serde(default)]
    pub detail: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub quote: String,
}

/// A parent-child containment fact, as raw extracted strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Containment {
    pub child: String,
    pub parent: String,
}

/// The full extraction result for one chapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterExtraction {
    pub chapter_index: usize,
    #[serde(default)]
    pub chapter_title: String,
    #[serde(default)]
    pub locations: Vec<ExtractedLocation>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
    #[serde(default)]
    pub containment: Vec<Containment>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub extracted_at: String,
}

// ============================================================================
// Aggregated dataset
// ============================================================================

/// A deduplicated location with cross-chapter data.
///
/// `id` is the canonical key (normalized, variant-resolved) and is unique in
/// the aggregate. `mention_count` counts distinct contributing chapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedLocation {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub visual_description: String,
    pub first_chapter_index: usize,
    pub mention_count: u32,
    #[serde(default)]
    pub chapter_indices: Vec<usize>,
}

/// A deduplicated relationship. Identity is (from key, to key, type);
/// the earliest observation's detail and chapter win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    #[serde(default)]
    pub detail: String,
    pub first_chapter_index: usize,
}

/// The full aggregated dataset, rebuilt from scratch each aggregation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedData {
    pub locations: Vec<AggregatedLocation>,
    pub relationships: Vec<AggregatedRelationship>,
    pub containment: Vec<Containment>,
    #[serde(default)]
    pub aggregated_at: String,
}

// ============================================================================
// Coordinates
// ============================================================================

/// How much trust to put in a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Estimated,
}

/// Map coordinates for a location, on a flat plane of roughly [-512, 512]
/// per axis. `manual = true` marks a human-curated position that the
/// estimator must copy through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub location_id: String,
    pub x: f64,
    pub y: f64,
    pub confidence: Confidence,
    #[serde(default)]
    pub manual: bool,
}

/// The full persisted coordinate file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinateSet {
    pub coordinates: Vec<Coordinate>,
    #[serde(default)]
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_type_round_trips_snake_case() {
        let json = serde_json::to_string(&LocationType::BodyOfWater).unwrap();
        assert_eq!(json, "\"body_of_water\"");
        let back: LocationType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LocationType::BodyOfWater);
    }

    #[test]
    fn unknown_location_type_falls_back_to_other() {
        let t: LocationType = serde_json::from_str("\"mountain range\"").unwrap();
        assert_eq!(t, LocationType::Other);
    }

    #[test]
    fn extraction_tolerates_missing_optional_fields() {
        let ext: ChapterExtraction = serde_json::from_str(
            r#"{"chapter_index": 3, "locations": [{"name": "Liscor", "type": "city"}]}"#,
        )
        .unwrap();
        assert_eq!(ext.chapter_index, 3);
        assert_eq!(ext.locations.len(), 1);
        assert!(ext.locations[0].aliases.is_empty());
        assert!(ext.relationships.is_empty());
    }

    #[test]
    fn coordinate_serializes_wire_shape() {
        let c = Coordinate {
            location_id: "liscor".to_string(),
            x: 190.0,
            y: -40.0,
            confidence: Confidence::Estimated,
            manual: false,
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["location_id"], "liscor");
        assert_eq!(v["confidence"], "estimated");
        assert_eq!(v["manual"], false);
    }
}
