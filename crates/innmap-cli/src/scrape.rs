//! `scrape-toc` and `scrape-chapters` commands.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::Args;
use colored::Colorize;

use innmap_scrape::{FetchConfig, Fetcher};
use innmap_store::Store;

/// Fetch knobs shared by both scrape commands.
#[derive(Args)]
pub struct FetchArgs {
    /// HTTP User-Agent
    #[arg(long, default_value = "innmap/0.1 (+https://github.com/innmap/innmap)")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds (politeness)
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Respect robots.txt (recommended)
    #[arg(long, default_value_t = true)]
    pub respect_robots: bool,
}

impl FetchArgs {
    fn config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout_secs,
            delay_ms: self.delay_ms,
            respect_robots: self.respect_robots,
            ..FetchConfig::default()
        }
    }
}

pub fn cmd_scrape_toc(data_dir: &Path, fetch: &FetchArgs) -> Result<()> {
    let store = Store::open(data_dir)?;
    let mut fetcher = Fetcher::new(fetch.config())?;

    println!("{}", "Fetching table of contents...".green().bold());
    let mut toc = fetcher.fetch_toc().context("scraping TOC")?;
    toc.scraped_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    store.write_toc(&toc).context("saving TOC")?;

    println!("Saved {} chapters across volumes", toc.chapters.len());

    let mut volumes: BTreeMap<&str, usize> = BTreeMap::new();
    for chapter in &toc.chapters {
        *volumes.entry(chapter.volume.as_str()).or_insert(0) += 1;
    }
    for (volume, count) in volumes {
        println!("  {volume}: {count} chapters");
    }

    Ok(())
}

pub fn cmd_scrape_chapters(data_dir: &Path, volume: Option<&str>, fetch: &FetchArgs) -> Result<()> {
    let store = Store::open(data_dir)?;
    let toc = store.read_toc()?;
    let mut fetcher = Fetcher::new(fetch.config())?;

    let interrupted = interrupt_flag()?;

    let to_scrape: Vec<_> = toc
        .chapters
        .iter()
        .filter(|ch| volume.map_or(true, |v| ch.volume == v))
        .filter(|ch| !store.chapter_text_exists(ch.index))
        .collect();

    if to_scrape.is_empty() {
        println!("All matching chapters already scraped.");
        return Ok(());
    }

    println!("Scraping {} chapters...", to_scrape.len());

    for (i, chapter) in to_scrape.iter().enumerate() {
        if interrupted.load(Ordering::Relaxed) {
            println!("\nInterrupted after {}/{} chapters", i, to_scrape.len());
            return Ok(());
        }

        match fetcher.fetch_chapter(&chapter.url) {
            Ok(text) => {
                store
                    .write_chapter_text(chapter.index, &text)
                    .context("saving chapter text")?;
                println!(
                    "  [{}/{}] {} ({} chars)",
                    i + 1,
                    to_scrape.len(),
                    chapter.web_title,
                    text.len()
                );
            }
            Err(err) => {
                eprintln!(
                    "  {} failed to scrape {:?}: {err}",
                    "WARNING:".yellow(),
                    chapter.web_title
                );
            }
        }
    }

    println!("Done.");
    Ok(())
}

/// A flag flipped by SIGINT so long loops can stop between chapters.
pub fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))
        .context("installing SIGINT handler")?;
    Ok(flag)
}
