//! `status` command.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use innmap_store::Store;

pub fn cmd_status(data_dir: &Path) -> Result<()> {
    let store = Store::open(data_dir)?;

    let chapters = store.chapter_count();
    let scraped = store.chapter_text_count();
    let extracted = store.extraction_count();
    let locations = store.location_count();

    println!("{}", "Pipeline Status".green().bold());
    println!("===============");
    println!("TOC chapters:    {chapters}");
    println!("Chapters scraped: {scraped} / {chapters}");
    println!("Chapters extracted: {extracted} / {chapters}");
    println!("Aggregated locations: {locations}");

    let by_volume = store.chapter_count_by_volume();
    if !by_volume.is_empty() {
        let scraped_by_volume = store.scraped_count_by_volume();
        let extracted_by_volume = store.extracted_count_by_volume();

        println!();
        println!("{}", "Per-Volume Breakdown".green().bold());
        println!("--------------------");
        for (volume, total) in &by_volume {
            let scraped = scraped_by_volume.get(volume).copied().unwrap_or(0);
            let extracted = extracted_by_volume.get(volume).copied().unwrap_or(0);
            println!(
                "  {volume:<8}  chapters: {total:>3}  scraped: {scraped:>3}  extracted: {extracted:>3}"
            );
        }
    }

    Ok(())
}
