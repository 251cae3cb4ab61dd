//! Cross-chapter aggregation.
//!
//! Consumes every per-chapter extraction in ascending chapter order and
//! merges the noisy observations into one deduplicated dataset: locations
//! keyed by canonical name with provenance (first chapter, distinct-chapter
//! mention counts, merged aliases, longest descriptions), plus deduplicated
//! relationship and containment lists. Chapter order matters: ties on
//! description length and on relationship/containment identity keep the
//! earliest-seen value.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{SecondsFormat, Utc};
use innmap_model::{
    AggregatedData, AggregatedLocation, AggregatedRelationship, Chapter, ChapterExtraction,
    Containment, RelationshipType,
};

use crate::normalize::{normalize, to_display_name};
use crate::trace::TraceabilityFilter;
use crate::vocab::Vocabulary;

/// Where the aggregator reads chapters and extractions from. The engine
/// neither knows nor cares how the data is stored.
pub trait ExtractionSource {
    /// All chapter metadata, in ascending index order.
    fn chapters(&self) -> anyhow::Result<Vec<Chapter>>;

    /// The extraction for one chapter, or `None` if that chapter has not
    /// been extracted. Errors mean the record exists but cannot be read.
    fn extraction(&self, chapter_index: usize) -> anyhow::Result<Option<ChapterExtraction>>;
}

/// Tunables for one aggregation run.
#[derive(Debug, Clone, Copy)]
pub struct AggregateConfig {
    /// Minimum distinct-chapter mentions for a location to survive.
    /// Suppresses one-off extraction noise.
    pub min_mentions: u32,
    /// How many levels of parent containment to walk when checking
    /// traceability.
    pub max_containment_depth: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            min_mentions: 3,
            max_containment_depth: 10,
        }
    }
}

/// Merges per-chapter extractions into a unified dataset.
pub struct Aggregator<'a> {
    vocab: &'a Vocabulary,
    config: AggregateConfig,
}

struct LocationEntry {
    location: AggregatedLocation,
    indices: BTreeSet<usize>,
}

impl<'a> Aggregator<'a> {
    pub fn new(vocab: &'a Vocabulary, config: AggregateConfig) -> Self {
        Self { vocab, config }
    }

    /// Run one full aggregation pass over `source`.
    ///
    /// Chapters without an extraction are skipped; a chapter whose extraction
    /// exists but cannot be read is skipped with a warning. Partial datasets
    /// from earlier successful extractions stay usable.
    pub fn aggregate(&self, source: &dyn ExtractionSource) -> anyhow::Result<AggregatedData> {
        let mut chapters = source.chapters()?;
        // First-seen semantics depend on ascending chapter order.
        chapters.sort_by_key(|c| c.index);

        let mut locations: HashMap<String, LocationEntry> = HashMap::new();

        let mut relationships: Vec<AggregatedRelationship> = Vec::new();
        let mut rel_seen: HashSet<(String, String, RelationshipType)> = HashSet::new();

        // Containment edges as (child key, parent key); display names are
        // derived from the keys at the end.
        let mut containment: Vec<(String, String)> = Vec::new();
        let mut containment_seen: HashSet<(String, String)> = HashSet::new();

        for chapter in &chapters {
            let extraction = match source.extraction(chapter.index) {
                Ok(Some(ext)) => ext,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        chapter = chapter.index,
                        error = %err,
                        "skipping unreadable extraction"
                    );
                    continue;
                }
            };

            for loc in &extraction.locations {
                let key = self.resolve_key(&loc.name);
                if self.vocab.is_excluded(&key) {
                    continue;
                }

                match locations.get_mut(&key) {
                    Some(entry) => {
                        // Mention count tracks distinct chapters, not raw
                        // name variants: two variants in one chapter count
                        // once.
                        if entry.indices.insert(chapter.index) {
                            entry.location.mention_count += 1;
                        }
                        if loc.description.len() > entry.location.description.len() {
                            entry.location.description = loc.description.clone();
                        }
                        if loc.visual_description.len()
                            > entry.location.visual_description.len()
                        {
                            entry.location.visual_description = loc.visual_description.clone();
                        }
                        for alias in &loc.aliases {
                            if !contains_normalized(&entry.location.aliases, alias) {
                                entry.location.aliases.push(alias.clone());
                            }
                        }
                    }
                    None => {
                        locations.insert(
                            key.clone(),
                            LocationEntry {
                                location: AggregatedLocation {
                                    id: key.clone(),
                                    name: to_display_name(&key),
                                    location_type: loc.location_type,
                                    aliases: loc.aliases.clone(),
                                    description: loc.description.clone(),
                                    visual_description: loc.visual_description.clone(),
                                    first_chapter_index: chapter.index,
                                    mention_count: 1,
                                    chapter_indices: Vec::new(),
                                },
                                indices: BTreeSet::from([chapter.index]),
                            },
                        );
                    }
                }
            }

            for rel in &extraction.relationships {
                let from_key = self.resolve_key(&rel.from);
                let to_key = self.resolve_key(&rel.to);
                if rel_seen.insert((from_key.clone(), to_key.clone(), rel.rel_type)) {
                    relationships.push(AggregatedRelationship {
                        from: to_display_name(&from_key),
                        to: to_display_name(&to_key),
                        rel_type: rel.rel_type,
                        detail: rel.detail.clone(),
                        first_chapter_index: chapter.index,
                    });
                }
            }

            for edge in &extraction.containment {
                let child_key = self.resolve_key(&edge.child);
                let parent_key = self.resolve_key(&edge.parent);
                if containment_seen.insert((child_key.clone(), parent_key.clone())) {
                    containment.push((child_key, parent_key));
                }
            }
        }

        let filter = TraceabilityFilter::new(
            self.vocab,
            containment.iter().cloned(),
            self.config.max_containment_depth,
        );

        let mut kept: Vec<AggregatedLocation> = locations
            .into_values()
            .filter(|entry| entry.location.mention_count >= self.config.min_mentions)
            .filter(|entry| filter.is_traceable(&entry.location.id))
            .map(|entry| {
                let mut location = entry.location;
                location.chapter_indices = entry.indices.into_iter().collect();
                location
            })
            .collect();

        // Sort by first appearance; id as tiebreak keeps the output order
        // reproducible for downstream coordinate seeding and rendering.
        kept.sort_by(|a, b| {
            a.first_chapter_index
                .cmp(&b.first_chapter_index)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(AggregatedData {
            locations: kept,
            relationships,
            containment: containment
                .into_iter()
                .map(|(child, parent)| Containment {
                    child: to_display_name(&child),
                    parent: to_display_name(&parent),
                })
                .collect(),
            aggregated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    fn resolve_key(&self, raw: &str) -> String {
        self.vocab.canonicalize(&normalize(raw)).to_string()
    }
}

fn contains_normalized(aliases: &[String], candidate: &str) -> bool {
    let normalized = normalize(candidate);
    aliases.iter().any(|a| normalize(a) == normalized)
}
