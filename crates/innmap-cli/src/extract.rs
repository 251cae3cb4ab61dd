//! `extract` command.

use std::path::Path;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use colored::Colorize;

use innmap_extract::{parse_extraction, Client};
use innmap_model::ChapterExtraction;
use innmap_store::Store;

use crate::scrape::interrupt_flag;

pub fn cmd_extract(data_dir: &Path, volume: Option<&str>, model: &str) -> Result<()> {
    let store = Store::open(data_dir)?;
    let toc = store.read_toc()?;
    let client = Client::from_env(model)?;

    let interrupted = interrupt_flag()?;

    let to_extract: Vec<_> = toc
        .chapters
        .iter()
        .filter(|ch| volume.map_or(true, |v| ch.volume == v))
        .filter(|ch| store.chapter_text_exists(ch.index))
        .filter(|ch| !store.extraction_exists(ch.index))
        .collect();

    if to_extract.is_empty() {
        println!("All matching chapters already extracted.");
        return Ok(());
    }

    println!(
        "{} {} chapters using {model}...",
        "Extracting locations from".green().bold(),
        to_extract.len()
    );

    let mut total_input: u64 = 0;
    let mut total_output: u64 = 0;

    for (i, chapter) in to_extract.iter().enumerate() {
        if interrupted.load(Ordering::Relaxed) {
            println!("\nInterrupted after {}/{} chapters", i, to_extract.len());
            return Ok(());
        }

        let text = match store.read_chapter_text(chapter.index) {
            Ok(text) => text,
            Err(err) => {
                eprintln!(
                    "  {} failed to read chapter {}: {err}",
                    "WARNING:".yellow(),
                    chapter.index
                );
                continue;
            }
        };

        print!(
            "  [{}/{}] {} ({} chars)...",
            i + 1,
            to_extract.len(),
            chapter.web_title,
            text.len()
        );

        let (raw, usage) = match client.extract(&chapter.web_title, &text) {
            Ok(out) => out,
            Err(err) => {
                eprintln!(" {} {err}", "ERROR:".red());
                continue;
            }
        };

        total_input += usage.input_tokens;
        total_output += usage.output_tokens;

        let parsed = match parse_extraction(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                eprintln!(" {} {err}", "PARSE ERROR:".red());
                continue;
            }
        };

        let extraction = ChapterExtraction {
            chapter_index: chapter.index,
            chapter_title: chapter.web_title.clone(),
            locations: parsed.locations,
            relationships: parsed.relationships,
            containment: parsed.containment,
            model: model.to_string(),
            extracted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        store
            .write_extraction(&extraction)
            .context("saving extraction")?;

        println!(
            " {} locations, {} relationships ({}+{} tokens)",
            extraction.locations.len(),
            extraction.relationships.len(),
            usage.input_tokens,
            usage.output_tokens
        );
    }

    println!("\nDone. Total tokens: {total_input} input, {total_output} output");
    Ok(())
}
