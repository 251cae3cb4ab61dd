//! Containment traceability.
//!
//! A location only earns a spot on the map if its position can be anchored to
//! known geography: either its own key matches an anchor, or walking its
//! containment parent chain reaches one within a bounded number of hops.
//! Anything else would need an arbitrary position, which degrades the map,
//! so it is filtered out instead. The hop bound also guards against cycles
//! that extraction noise can introduce into the containment edges.

use std::collections::HashMap;

use crate::vocab::Vocabulary;

/// Answers "can this key be placed relative to known geography?"
pub struct TraceabilityFilter<'a> {
    vocab: &'a Vocabulary,
    parent_of: HashMap<String, String>,
    max_depth: usize,
}

impl<'a> TraceabilityFilter<'a> {
    /// Build a filter over deduplicated containment edges given as
    /// (child key, parent key) pairs. Later duplicates of a child are
    /// ignored; the first recorded parent wins, matching the containment
    /// dedup policy upstream.
    pub fn new<I>(vocab: &'a Vocabulary, edges: I, max_depth: usize) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut parent_of = HashMap::new();
        for (child, parent) in edges {
            parent_of.entry(child).or_insert(parent);
        }
        Self {
            vocab,
            parent_of,
            max_depth,
        }
    }

    /// Whether `key` is an anchor or reaches one through at most
    /// `max_depth` containment hops.
    pub fn is_traceable(&self, key: &str) -> bool {
        if self.vocab.matches_anchor(key) {
            return true;
        }

        let mut current = key;
        for _ in 0..self.max_depth {
            let Some(parent) = self.parent_of.get(current) else {
                return false;
            };
            if self.vocab.matches_anchor(parent) {
                return true;
            }
            current = parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(c, p)| (c.to_string(), p.to_string()))
            .collect()
    }

    #[test]
    fn anchor_keys_are_traceable_without_edges() {
        let vocab = Vocabulary::builtin();
        let filter = TraceabilityFilter::new(&vocab, Vec::new(), 10);
        assert!(filter.is_traceable("izril"));
        assert!(filter.is_traceable("the wandering inn"));
    }

    #[test]
    fn chain_to_anchor_within_bound_is_traceable() {
        let vocab = Vocabulary::builtin();
        let filter = TraceabilityFilter::new(
            &vocab,
            edges(&[
                ("the back room", "some tavern"),
                ("some tavern", "some town"),
                ("some town", "izril"),
            ]),
            10,
        );
        assert!(filter.is_traceable("the back room"));
        assert!(filter.is_traceable("some town"));
    }

    #[test]
    fn dangling_chain_is_not_traceable() {
        let vocab = Vocabulary::builtin();
        let filter = TraceabilityFilter::new(
            &vocab,
            edges(&[("some room", "some tavern"), ("some tavern", "nowhere")]),
            10,
        );
        assert!(!filter.is_traceable("some room"));
    }

    #[test]
    fn depth_bound_cuts_off_long_chains() {
        let vocab = Vocabulary::builtin();
        // Chain of 12 hops before the anchor; bound of 10 must reject it,
        // and it must also terminate on a containment cycle.
        let mut pairs = Vec::new();
        for i in 0..12 {
            pairs.push((format!("step {i}"), format!("step {}", i + 1)));
        }
        pairs.push(("step 12".to_string(), "izril".to_string()));
        let filter = TraceabilityFilter::new(&vocab, pairs, 10);
        assert!(!filter.is_traceable("step 0"));
        assert!(filter.is_traceable("step 5"));

        let cycle = edges(&[("a place", "b place"), ("b place", "a place")]);
        let filter = TraceabilityFilter::new(&vocab, cycle, 10);
        assert!(!filter.is_traceable("a place"));
    }

    #[test]
    fn first_recorded_parent_wins() {
        let vocab = Vocabulary::builtin();
        let filter = TraceabilityFilter::new(
            &vocab,
            edges(&[("some town", "nowhere"), ("some town", "izril")]),
            10,
        );
        assert!(!filter.is_traceable("some town"));
    }
}
