//! Domain vocabulary tables.
//!
//! Canonicalization, exclusion, and anchor matching are all driven by static
//! configuration data rather than code: the tables encode domain knowledge
//! about which surface forms are synonyms, which names refer to the real
//! world, and which places count as well-positioned anchors. Defaults are
//! embedded in the crate (`data/vocabulary.json`) and an external file with
//! the same shape can be loaded in their place.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::CoreError;

const DEFAULT_VOCABULARY: &str = include_str!("../data/vocabulary.json");

/// Variant resolution and anchor tables.
#[derive(Debug, Clone, Deserialize)]
pub struct Vocabulary {
    /// Known variant spellings mapped to one canonical key
    /// (e.g. "the inn", "inn" -> "the wandering inn").
    #[serde(default)]
    canonical: HashMap<String, String>,
    /// Real-world place names. Characters are transported from modern Earth,
    /// so these appear in dialogue without being map locations.
    #[serde(default)]
    excluded: HashSet<String>,
    /// Exact-match anchors: locations with known, well-trusted positions.
    #[serde(default)]
    anchor_names: HashSet<String>,
    /// Substring anchors: any key containing one of these is treated as an
    /// anchor. Loose on purpose — it accepts variant phrasings without
    /// enumerating every one, at the cost of occasional false positives.
    #[serde(default)]
    anchor_keywords: Vec<String>,
}

impl Vocabulary {
    /// The built-in tables for The Wandering Inn.
    pub fn builtin() -> Self {
        // Embedded at compile time; a parse failure here is a build defect.
        serde_json::from_str(DEFAULT_VOCABULARY).expect("embedded vocabulary.json is valid")
    }

    /// Load tables from an external JSON file with the same shape as the
    /// embedded defaults.
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

    /// Resolve a normalized key to its canonical form, or return it unchanged
    /// if no variant mapping exists.
    pub fn canonicalize<'a>(&'a self, key: &'a str) -> &'a str {
        match self.canonical.get(key) {
            Some(canon) => canon.as_str(),
            None => key,
        }
    }

    /// Whether a key names a real-world place that must never reach the map.
    pub fn is_excluded(&self, key: &str) -> bool {
        self.excluded.contains(key)
    }

    /// Whether a key counts as an anchor: exact name match, or containing any
    /// anchor keyword as a substring.
    pub fn matches_anchor(&self, key: &str) -> bool {
        if self.anchor_names.contains(key) {
            return true;
        }
        self.anchor_keywords.iter().any(|kw| key.contains(kw))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}
