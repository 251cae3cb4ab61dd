//! innmap persistence layer
//!
//! Everything the pipeline produces lives as JSON (and plaintext chapter
//! bodies) under one data directory:
//!
//! ```text
//! data/
//!   toc.json             table of contents
//!   chapters/00042.txt   chapter plaintext
//!   extractions/00042.json  per-chapter extraction
//!   aggregated.json      merged dataset (replaced atomically)
//!   coordinates.json     coordinate set (updated per entry)
//! ```
//!
//! The aggregate is replaced as a whole via a temp file + rename, so a failed
//! write never leaves a partial aggregate behind. Coordinates are upserted
//! one entry at a time; a fault mid-run can leave a partially updated set,
//! which callers treat as needing a clean retry.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use innmap_core::ExtractionSource;
use innmap_model::{
    AggregatedData, Chapter, ChapterExtraction, Coordinate, CoordinateSet, Toc,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no table of contents at {path} (run scrape-toc first)")]
    MissingToc { path: PathBuf },
}

/// Manages all data persistence under one directory.
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    /// Open (or create) a data directory.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        for dir in [
            data_dir.clone(),
            data_dir.join("chapters"),
            data_dir.join("extractions"),
        ] {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir, source })?;
        }
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn toc_path(&self) -> PathBuf {
        self.data_dir.join("toc.json")
    }

    fn chapter_text_path(&self, chapter_index: usize) -> PathBuf {
        self.data_dir.join("chapters").join(format!("{chapter_index:05}.txt"))
    }

    fn extraction_path(&self, chapter_index: usize) -> PathBuf {
        self.data_dir
            .join("extractions")
            .join(format!("{chapter_index:05}.json"))
    }

    fn aggregated_path(&self) -> PathBuf {
        self.data_dir.join("aggregated.json")
    }

    fn coordinates_path(&self) -> PathBuf {
        self.data_dir.join("coordinates.json")
    }

    // ------------------------------------------------------------------
    // TOC
    // ------------------------------------------------------------------

    /// Replace the stored table of contents.
    pub fn write_toc(&self, toc: &Toc) -> Result<(), StoreError> {
        write_json_atomic(&self.toc_path(), toc)
    }

    /// Load the table of contents. Missing file is a dedicated error so the
    /// CLI can tell the user which step to run first.
    pub fn read_toc(&self) -> Result<Toc, StoreError> {
        let path = self.toc_path();
        if !path.exists() {
            return Err(StoreError::MissingToc { path });
        }
        read_json(&path)
    }

    // ------------------------------------------------------------------
    // Chapter text
    // ------------------------------------------------------------------

    pub fn write_chapter_text(&self, chapter_index: usize, text: &str) -> Result<(), StoreError> {
        let path = self.chapter_text_path(chapter_index);
        fs::write(&path, text).map_err(|source| StoreError::Io { path, source })
    }

    pub fn read_chapter_text(&self, chapter_index: usize) -> Result<String, StoreError> {
        let path = self.chapter_text_path(chapter_index);
        fs::read_to_string(&path).map_err(|source| StoreError::Io { path, source })
    }

    pub fn chapter_text_exists(&self, chapter_index: usize) -> bool {
        self.chapter_text_path(chapter_index).exists()
    }

    // ------------------------------------------------------------------
    // Extractions
    // ------------------------------------------------------------------

    pub fn write_extraction(&self, extraction: &ChapterExtraction) -> Result<(), StoreError> {
        write_json_atomic(&self.extraction_path(extraction.chapter_index), extraction)
    }

    /// Load one chapter's extraction, or `None` if the chapter has not been
    /// extracted. A present-but-corrupt record is an error (the aggregator
    /// skips it with a warning).
    pub fn read_extraction(
        &self,
        chapter_index: usize,
    ) -> Result<Option<ChapterExtraction>, StoreError> {
        let path = self.extraction_path(chapter_index);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn extraction_exists(&self, chapter_index: usize) -> bool {
        self.extraction_path(chapter_index).exists()
    }

    // ------------------------------------------------------------------
    // Aggregate
    // ------------------------------------------------------------------

    /// Replace the aggregate wholesale. Atomic: the previous aggregate stays
    /// intact unless the new one is fully written.
    pub fn write_aggregated(&self, data: &AggregatedData) -> Result<(), StoreError> {
        write_json_atomic(&self.aggregated_path(), data)
    }

    pub fn read_aggregated(&self) -> Result<AggregatedData, StoreError> {
        let path = self.aggregated_path();
        if !path.exists() {
            return Ok(AggregatedData::default());
        }
        read_json(&path)
    }

    // ------------------------------------------------------------------
    // Coordinates
    // ------------------------------------------------------------------

    /// Load all coordinates; an absent file is an empty set.
    pub fn read_coordinates(&self) -> Result<Vec<Coordinate>, StoreError> {
        let path = self.coordinates_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let set: CoordinateSet = read_json(&path)?;
        Ok(set.coordinates)
    }

    /// Insert or replace a single location's coordinates.
    pub fn write_coordinate(&self, coordinate: &Coordinate) -> Result<(), StoreError> {
        let path = self.coordinates_path();
        let mut set: CoordinateSet = if path.exists() {
            read_json(&path)?
        } else {
            CoordinateSet::default()
        };

        match set
            .coordinates
            .iter_mut()
            .find(|c| c.location_id == coordinate.location_id)
        {
            Some(existing) => *existing = coordinate.clone(),
            None => set.coordinates.push(coordinate.clone()),
        }
        set.updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        write_json_atomic(&path, &set)
    }

    // ------------------------------------------------------------------
    // Pipeline progress counts
    // ------------------------------------------------------------------

    pub fn chapter_count(&self) -> usize {
        self.read_toc().map(|toc| toc.chapters.len()).unwrap_or(0)
    }

    pub fn chapter_text_count(&self) -> usize {
        count_entries(&self.data_dir.join("chapters"), "txt")
    }

    pub fn extraction_count(&self) -> usize {
        count_entries(&self.data_dir.join("extractions"), "json")
    }

    pub fn location_count(&self) -> usize {
        self.read_aggregated()
            .map(|data| data.locations.len())
            .unwrap_or(0)
    }

    /// Chapter counts per volume, sorted by volume name.
    pub fn chapter_count_by_volume(&self) -> std::collections::BTreeMap<String, usize> {
        let mut counts = std::collections::BTreeMap::new();
        if let Ok(toc) = self.read_toc() {
            for chapter in &toc.chapters {
                *counts.entry(chapter.volume.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Scraped chapter counts per volume.
    pub fn scraped_count_by_volume(&self) -> std::collections::BTreeMap<String, usize> {
        self.count_by_volume(|s, idx| s.chapter_text_exists(idx))
    }

    /// Extraction counts per volume.
    pub fn extracted_count_by_volume(&self) -> std::collections::BTreeMap<String, usize> {
        self.count_by_volume(|s, idx| s.extraction_exists(idx))
    }

    fn count_by_volume(
        &self,
        has: impl Fn(&Store, usize) -> bool,
    ) -> std::collections::BTreeMap<String, usize> {
        let mut counts = std::collections::BTreeMap::new();
        if let Ok(toc) = self.read_toc() {
            for chapter in &toc.chapters {
                if has(self, chapter.index) {
                    *counts.entry(chapter.volume.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }
}

/// The aggregator reads chapters and extractions straight from the store.
impl ExtractionSource for Store {
    fn chapters(&self) -> anyhow::Result<Vec<Chapter>> {
        Ok(self.read_toc()?.chapters)
    }

    fn extraction(&self, chapter_index: usize) -> anyhow::Result<Option<ChapterExtraction>> {
        Ok(self.read_extraction(chapter_index)?)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write JSON via a sibling temp file and rename, so readers never observe a
/// half-written file.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn count_entries(dir: &Path, extension: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == extension)
                .unwrap_or(false)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use innmap_model::{AggregatedLocation, Confidence, LocationType};
    use tempfile::tempdir;

    fn sample_toc() -> Toc {
        Toc {
            chapters: vec![
                Chapter {
                    index: 0,
                    web_title: "1.00".to_string(),
                    volume: "vol-1".to_string(),
                    slug: "1-00".to_string(),
                    ..Chapter::default()
                },
                Chapter {
                    index: 1,
                    web_title: "1.01".to_string(),
                    volume: "vol-1".to_string(),
                    slug: "1-01".to_string(),
                    ..Chapter::default()
                },
            ],
            scraped_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn toc_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(matches!(
            store.read_toc(),
            Err(StoreError::MissingToc { .. })
        ));

        store.write_toc(&sample_toc()).unwrap();
        let toc = store.read_toc().unwrap();
        assert_eq!(toc.chapters.len(), 2);
        assert_eq!(toc.chapters[1].web_title, "1.01");
        assert_eq!(store.chapter_count(), 2);
    }

    #[test]
    fn chapter_text_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(!store.chapter_text_exists(7));
        store.write_chapter_text(7, "The inn sat on a hill.").unwrap();
        assert!(store.chapter_text_exists(7));
        assert_eq!(store.read_chapter_text(7).unwrap(), "The inn sat on a hill.");
        assert_eq!(store.chapter_text_count(), 1);
    }

    #[test]
    fn extraction_round_trips_and_absence_is_none() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(store.read_extraction(3).unwrap().is_none());

        let extraction = ChapterExtraction {
            chapter_index: 3,
            chapter_title: "1.03".to_string(),
            model: "test".to_string(),
            ..ChapterExtraction::default()
        };
        store.write_extraction(&extraction).unwrap();

        let back = store.read_extraction(3).unwrap().unwrap();
        assert_eq!(back.chapter_title, "1.03");
        assert!(store.extraction_exists(3));
        assert_eq!(store.extraction_count(), 1);
    }

    #[test]
    fn corrupt_extraction_is_an_error_not_none() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("extractions/00004.json"), "{not json").unwrap();
        assert!(matches!(
            store.read_extraction(4),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn aggregate_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        // Absent aggregate reads as empty.
        assert!(store.read_aggregated().unwrap().locations.is_empty());

        let data = AggregatedData {
            locations: vec![AggregatedLocation {
                id: "liscor".to_string(),
                name: "Liscor".to_string(),
                location_type: LocationType::City,
                aliases: Vec::new(),
                description: "A walled city".to_string(),
                visual_description: String::new(),
                first_chapter_index: 0,
                mention_count: 3,
                chapter_indices: vec![0, 1, 2],
            }],
            relationships: Vec::new(),
            containment: Vec::new(),
            aggregated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        store.write_aggregated(&data).unwrap();

        let back = store.read_aggregated().unwrap();
        assert_eq!(back.locations.len(), 1);
        assert_eq!(back.locations[0].id, "liscor");
        assert_eq!(store.location_count(), 1);
        // No temp file left behind.
        assert!(!dir.path().join("aggregated.json.tmp").exists());
    }

    #[test]
    fn coordinate_upsert_replaces_by_location_id() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(store.read_coordinates().unwrap().is_empty());

        let first = Coordinate {
            location_id: "liscor".to_string(),
            x: 190.0,
            y: -40.0,
            confidence: Confidence::Estimated,
            manual: false,
        };
        store.write_coordinate(&first).unwrap();

        let manual = Coordinate {
            location_id: "liscor".to_string(),
            x: 200.0,
            y: -45.0,
            confidence: Confidence::High,
            manual: true,
        };
        store.write_coordinate(&manual).unwrap();

        let other = Coordinate {
            location_id: "pallass".to_string(),
            x: 230.0,
            y: -70.0,
            confidence: Confidence::Estimated,
            manual: false,
        };
        store.write_coordinate(&other).unwrap();

        let coords = store.read_coordinates().unwrap();
        assert_eq!(coords.len(), 2);
        let liscor = coords.iter().find(|c| c.location_id == "liscor").unwrap();
        assert_eq!(liscor, &manual);
    }

    #[test]
    fn per_volume_counts_track_progress() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.write_toc(&sample_toc()).unwrap();
        store.write_chapter_text(0, "text").unwrap();

        let chapters = store.chapter_count_by_volume();
        assert_eq!(chapters.get("vol-1"), Some(&2));
        let scraped = store.scraped_count_by_volume();
        assert_eq!(scraped.get("vol-1"), Some(&1));
        let extracted = store.extracted_count_by_volume();
        assert_eq!(extracted.get("vol-1"), None);
    }
}
