//! Parent/child referential integrity.
//!
//! Every `parent`/`child` property must name a concept present in the
//! document. Dangling references are never fatal: they are recorded, and
//! removed in place when cleanup is enabled.

use crate::{Concept, ReferenceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A `parent`/`child` property whose target does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidReference {
    pub concept_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidReferences {
    pub parent: Vec<InvalidReference>,
    pub child: Vec<InvalidReference>,
}

impl InvalidReferences {
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty() && self.child.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parent.len() + self.child.len()
    }

    fn push(&mut self, kind: ReferenceKind, concept_code: &str, reference: &str) {
        let entry = InvalidReference {
            concept_code: concept_code.to_string(),
            reference: reference.to_string(),
        };
        match kind {
            ReferenceKind::Parent => self.parent.push(entry),
            ReferenceKind::Child => self.child.push(entry),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub total_concepts: usize,
    pub invalid_parent_count: usize,
    pub invalid_child_count: usize,
    pub removed_count: usize,
    /// Concepts per `class` value; concepts without a class are not counted.
    pub concepts_by_kind: BTreeMap<String, usize>,
}

/// Result of one validation pass.
///
/// `valid` describes the concepts as they were handed in: it is `false`
/// whenever a dangling reference was found, even if cleanup removed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    pub invalid_references: InvalidReferences,
    pub stats: ValidationStats,
}

/// Checks every reference against the set of codes present in `concepts`.
///
/// With `cleanup` set, invalid properties are removed in place and counted
/// in `stats.removed_count`; otherwise `concepts` is left untouched.
pub fn validate_references(concepts: &mut [Concept], cleanup: bool) -> ValidationOutcome {
    let codes: HashSet<String> = concepts.iter().map(|c| c.code.clone()).collect();

    let mut invalid = InvalidReferences::default();
    let mut removed = 0usize;
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();

    for concept in concepts.iter_mut() {
        if let Some(kind) = concept.entity_kind() {
            *by_kind.entry(kind.to_string()).or_default() += 1;
        }

        let before = concept.property.len();
        let code = concept.code.clone();
        concept.property.retain(|p| {
            let Some((kind, target)) = p.reference() else {
                return true;
            };
            if codes.contains(target) {
                return true;
            }
            invalid.push(kind, &code, target);
            !cleanup
        });
        removed += before - concept.property.len();
    }

    let stats = ValidationStats {
        total_concepts: concepts.len(),
        invalid_parent_count: invalid.parent.len(),
        invalid_child_count: invalid.child.len(),
        removed_count: removed,
        concepts_by_kind: by_kind,
    };

    if invalid.is_empty() {
        tracing::info!(total = stats.total_concepts, "all parent/child references resolve");
    } else {
        tracing::warn!(
            invalid_parent = stats.invalid_parent_count,
            invalid_child = stats.invalid_child_count,
            removed = stats.removed_count,
            "found dangling parent/child references"
        );
    }

    ValidationOutcome {
        valid: invalid.is_empty(),
        invalid_references: invalid,
        stats,
    }
}

/// Standalone validation artifact; never merged into the CodeSystem itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub version: String,
    pub date: String,
    pub validation: ValidationOutcome,
}

impl ValidationReport {
    pub fn new(version: &str, validation: ValidationOutcome) -> Self {
        Self {
            version: version.to_string(),
            date: crate::finalize::release_date(version),
            validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityKind;
    use proptest::prelude::*;

    fn concept_with_parent(code: &str, parent: &str) -> Concept {
        let mut c = Concept::new(code, "", EntityKind::Gp);
        c.add_reference(ReferenceKind::Parent, parent);
        c
    }

    #[test]
    fn dangling_parent_is_removed_with_cleanup() {
        let mut concepts = vec![concept_with_parent("GP001", "NOPE999")];
        let outcome = validate_references(&mut concepts, true);

        assert!(!outcome.valid);
        assert_eq!(
            outcome.invalid_references.parent,
            vec![InvalidReference {
                concept_code: "GP001".to_string(),
                reference: "NOPE999".to_string(),
            }]
        );
        assert!(outcome.invalid_references.child.is_empty());
        assert_eq!(outcome.stats.invalid_parent_count, 1);
        assert_eq!(outcome.stats.removed_count, 1);
        assert!(concepts[0].parents().is_empty());
        // class/status/abstract survive
        assert_eq!(concepts[0].property.len(), 3);
    }

    #[test]
    fn dangling_reference_is_kept_without_cleanup() {
        let mut concepts = vec![concept_with_parent("GP001", "NOPE999")];
        let snapshot = concepts.clone();
        let outcome = validate_references(&mut concepts, false);

        assert!(!outcome.valid);
        assert_eq!(outcome.stats.removed_count, 0);
        assert_eq!(outcome.stats.invalid_parent_count, 1);
        assert_eq!(concepts, snapshot);
    }

    #[test]
    fn resolved_references_are_valid() {
        let mut vtm = Concept::new("VTM001", "", EntityKind::Vtm);
        vtm.add_reference(ReferenceKind::Child, "GP001");
        let gp = concept_with_parent("GP001", "VTM001");
        let mut concepts = vec![vtm, gp];

        let outcome = validate_references(&mut concepts, true);
        assert!(outcome.valid);
        assert!(outcome.invalid_references.is_empty());
        assert_eq!(outcome.stats.total_concepts, 2);
        assert_eq!(outcome.stats.concepts_by_kind.get("GP"), Some(&1));
        assert_eq!(outcome.stats.concepts_by_kind.get("VTM"), Some(&1));
    }

    #[test]
    fn report_serializes_in_camel_case() {
        let mut concepts = vec![concept_with_parent("GP001", "NOPE999")];
        let outcome = validate_references(&mut concepts, true);
        let report = ValidationReport::new("20250407", outcome);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["date"], "2025-04-07T00:00:00+07:00");
        assert_eq!(json["validation"]["valid"], false);
        assert_eq!(
            json["validation"]["invalidReferences"]["parent"][0]["conceptCode"],
            "GP001"
        );
        assert_eq!(json["validation"]["stats"]["removedCount"], 1);
    }

    fn arb_concepts() -> impl Strategy<Value = Vec<Concept>> {
        let refs = proptest::collection::vec((any::<bool>(), 0usize..12), 0..4);
        proptest::collection::vec(refs, 0..8).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, refs)| {
                    let mut c = Concept::new(format!("C{i}"), "", EntityKind::Tpp);
                    for (is_parent, target) in refs {
                        let kind = if is_parent {
                            ReferenceKind::Parent
                        } else {
                            ReferenceKind::Child
                        };
                        c.add_reference(kind, &format!("C{target}"));
                    }
                    c
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn cleanup_leaves_only_resolvable_references(mut concepts in arb_concepts()) {
            let before: usize = concepts.iter().map(|c| c.property.len()).sum();
            let outcome = validate_references(&mut concepts, true);
            let after: usize = concepts.iter().map(|c| c.property.len()).sum();

            prop_assert_eq!(before - after, outcome.stats.removed_count);
            prop_assert_eq!(outcome.stats.removed_count, outcome.invalid_references.len());

            let again = validate_references(&mut concepts, true);
            prop_assert!(again.valid);
            prop_assert_eq!(again.stats.removed_count, 0);
        }
    }
}
