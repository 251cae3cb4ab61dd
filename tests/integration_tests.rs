//! Integration tests for the complete innmap pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Store → Aggregator → persisted aggregate
//! - Aggregate → CoordinateEstimator → persisted coordinates
//!
//! Run with: cargo test --test integration_tests

use tempfile::tempdir;

use innmap_core::{AggregateConfig, Aggregator, CoordinateEstimator, SeedTable, Vocabulary};
use innmap_model::{
    Chapter, ChapterExtraction, Confidence, Containment, Coordinate, ExtractedLocation,
    ExtractedRelationship, LocationType, RelationshipType, Toc,
};
use innmap_store::Store;

fn chapter(index: usize) -> Chapter {
    Chapter {
        index,
        web_title: format!("1.{index:02}"),
        volume: "vol-1".to_string(),
        slug: format!("1-{index:02}"),
        ..Chapter::default()
    }
}

fn location(name: &str, location_type: LocationType, description: &str) -> ExtractedLocation {
    ExtractedLocation {
        name: name.to_string(),
        location_type,
        aliases: Vec::new(),
        description: description.to_string(),
        visual_description: String::new(),
        context_quotes: Vec::new(),
    }
}

/// Three chapters, each mentioning Liscor and The Wandering Inn; chapter 0
/// also records the inn/Liscor adjacency and the Liscor-in-Izril containment.
fn seed_store(store: &Store) {
    store
        .write_toc(&Toc {
            chapters: vec![chapter(0), chapter(1), chapter(2)],
            scraped_at: "2024-01-01T00:00:00Z".to_string(),
        })
        .unwrap();

    let first = ChapterExtraction {
        chapter_index: 0,
        chapter_title: "1.00".to_string(),
        model: "test".to_string(),
        extracted_at: "2024-01-01T00:00:00Z".to_string(),
        locations: vec![
            location("Liscor", LocationType::City, "A walled city"),
            location("The Wandering Inn", LocationType::Building, "An old inn"),
        ],
        relationships: vec![ExtractedRelationship {
            from: "The Wandering Inn".to_string(),
            to: "Liscor".to_string(),
            rel_type: RelationshipType::Adjacency,
            detail: "near Liscor".to_string(),
            quote: String::new(),
        }],
        containment: vec![Containment {
            child: "Liscor".to_string(),
            parent: "Izril".to_string(),
        }],
    };
    store.write_extraction(&first).unwrap();

    for index in 1..=2 {
        let ext = ChapterExtraction {
            chapter_index: index,
            chapter_title: format!("1.{index:02}"),
            model: "test".to_string(),
            extracted_at: "2024-01-01T00:00:00Z".to_string(),
            locations: vec![
                location("Liscor", LocationType::City, "A walled city"),
                location("The Wandering Inn", LocationType::Building, "The inn again"),
            ],
            ..ChapterExtraction::default()
        };
        store.write_extraction(&ext).unwrap();
    }
}

#[test]
fn aggregate_pipeline_end_to_end() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    seed_store(&store);

    let vocab = Vocabulary::builtin();
    let aggregator = Aggregator::new(&vocab, AggregateConfig::default());
    let data = aggregator.aggregate(&store).unwrap();

    assert_eq!(data.locations.len(), 2);
    for loc in &data.locations {
        assert_eq!(loc.mention_count, 3);
        assert_eq!(loc.first_chapter_index, 0);
        assert_eq!(loc.chapter_indices, vec![0, 1, 2]);
    }
    let liscor = data.locations.iter().find(|l| l.id == "liscor").unwrap();
    assert_eq!(liscor.name, "Liscor");

    assert_eq!(data.relationships.len(), 1);
    assert_eq!(data.relationships[0].from, "The Wandering Inn");
    assert_eq!(data.relationships[0].to, "Liscor");

    assert_eq!(data.containment.len(), 1);
    assert_eq!(data.containment[0].child, "Liscor");
    assert_eq!(data.containment[0].parent, "Izril");

    // Persist and read back.
    store.write_aggregated(&data).unwrap();
    let back = store.read_aggregated().unwrap();
    assert_eq!(back.locations.len(), 2);
    assert_eq!(back.relationships.len(), 1);
}

#[test]
fn coordinate_pipeline_preserves_manual_and_is_deterministic() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    seed_store(&store);

    let vocab = Vocabulary::builtin();
    let aggregator = Aggregator::new(&vocab, AggregateConfig::default());
    let data = aggregator.aggregate(&store).unwrap();
    store.write_aggregated(&data).unwrap();

    // A human pinned the inn somewhere specific.
    let manual = Coordinate {
        location_id: "the wandering inn".to_string(),
        x: 191.5,
        y: -37.5,
        confidence: Confidence::High,
        manual: true,
    };
    store.write_coordinate(&manual).unwrap();

    let seeds = SeedTable::builtin();
    let estimator = CoordinateEstimator::new(&seeds);

    let existing = store.read_coordinates().unwrap();
    let first_pass = estimator.assign(&data, &existing);
    for coordinate in &first_pass {
        store.write_coordinate(coordinate).unwrap();
    }

    let persisted = store.read_coordinates().unwrap();
    let inn = persisted
        .iter()
        .find(|c| c.location_id == "the wandering inn")
        .unwrap();
    assert_eq!(inn, &manual);

    // Every aggregated location got a position.
    for loc in &data.locations {
        assert!(
            persisted.iter().any(|c| c.location_id == loc.id),
            "no coordinate for {}",
            loc.id
        );
    }

    // Re-running over the persisted state changes nothing.
    let second_pass = estimator.assign(&data, &store.read_coordinates().unwrap());
    for coordinate in &second_pass {
        store.write_coordinate(coordinate).unwrap();
    }
    let after = store.read_coordinates().unwrap();
    assert_eq!(after.len(), persisted.len());
    for coordinate in &persisted {
        let again = after
            .iter()
            .find(|c| c.location_id == coordinate.location_id)
            .unwrap();
        assert_eq!(again.x.to_bits(), coordinate.x.to_bits());
        assert_eq!(again.y.to_bits(), coordinate.y.to_bits());
    }
}
