//! Duplicate-code collapse.

use crate::Concept;
use std::collections::HashSet;

/// Keeps the first concept seen for every code, preserving the relative
/// order of the survivors. Returns the number of concepts removed.
pub fn dedupe_concepts(concepts: &mut Vec<Concept>) -> usize {
    let before = concepts.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    concepts.retain(|c| seen.insert(c.code.clone()));
    let removed = before - concepts.len();
    if removed > 0 {
        tracing::info!(removed, remaining = concepts.len(), "removed duplicate concepts");
    }
    removed
}
