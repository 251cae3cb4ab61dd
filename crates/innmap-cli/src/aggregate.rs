//! `aggregate` command.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use innmap_core::{
    AggregateConfig, Aggregator, CoordinateEstimator, SeedTable, Vocabulary,
};
use innmap_store::Store;

pub fn cmd_aggregate(
    data_dir: &Path,
    coords: bool,
    vocab_path: Option<&Path>,
    seeds_path: Option<&Path>,
    min_mentions: u32,
    max_containment_depth: usize,
) -> Result<()> {
    let store = Store::open(data_dir)?;

    let vocab = match vocab_path {
        Some(path) => Vocabulary::from_path(path).context("loading vocabulary tables")?,
        None => Vocabulary::builtin(),
    };

    println!("{}", "Aggregating extractions...".green().bold());

    let aggregator = Aggregator::new(
        &vocab,
        AggregateConfig {
            min_mentions,
            max_containment_depth,
        },
    );
    let data = aggregator.aggregate(&store).context("aggregation failed")?;

    store
        .write_aggregated(&data)
        .context("saving aggregated data")?;

    println!(
        "Aggregated: {} locations, {} relationships, {} containment rules",
        data.locations.len(),
        data.relationships.len(),
        data.containment.len()
    );

    if coords {
        let seeds = match seeds_path {
            Some(path) => SeedTable::from_path(path).context("loading seed coordinates")?,
            None => SeedTable::builtin(),
        };

        println!("{}", "Assigning coordinates...".green().bold());

        // A missing or unreadable coordinate file is a fresh start; manual
        // entries only exist once someone has curated them.
        let existing = store.read_coordinates().unwrap_or_default();
        let manual = existing.iter().filter(|c| c.manual).count();

        let estimator = CoordinateEstimator::new(&seeds);
        let assigned = estimator.assign(&data, &existing);

        let mut written = 0usize;
        for coordinate in &assigned {
            store
                .write_coordinate(coordinate)
                .with_context(|| format!("writing coordinate for {}", coordinate.location_id))?;
            written += 1;
        }

        println!("Coordinates written: {written} ({manual} manual preserved)");
    }

    Ok(())
}
