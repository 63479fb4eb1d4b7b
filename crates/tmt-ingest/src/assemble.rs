//! Whole-release concept assembly.

use crate::archive::DistributionLayout;
use crate::kinds::KindDescriptor;
use crate::processor::{build_kind_concepts, resolve_kind_sources, KindSources, KindSummary};
use crate::tabular::TabularSource;
use crate::{IngestError, Result};
use tmt_codesystem::Concept;

/// Every concept of a release, in processing order, plus per-kind counters.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub concepts: Vec<Concept>,
    pub summaries: Vec<KindSummary>,
}

/// Resolves the source files of every kind.
///
/// Unlike [`assemble_concepts`] this does not stop at the first kind with a
/// missing file: every kind's outcome is returned so an operator can see the
/// whole picture at once.
pub fn resolve_all_sources(layout: &DistributionLayout) -> Vec<Result<KindSources>> {
    KindDescriptor::all()
        .iter()
        .map(|desc| resolve_kind_sources(layout, desc))
        .collect()
}

/// Runs every kind in release order (SUBS, VTM, GP, GPU, GPP, TPU, TP, TPP).
///
/// The first kind with a missing or unreadable source aborts the assembly.
pub fn assemble_concepts(
    layout: &DistributionLayout,
    reader: &dyn TabularSource,
) -> Result<Assembly> {
    let mut assembly = Assembly::default();
    for desc in KindDescriptor::all() {
        let sources = resolve_kind_sources(layout, &desc)?;
        let summary = build_kind_concepts(&desc, &sources, reader, &mut assembly.concepts)?;
        assembly.summaries.push(summary);
    }
    tracing::info!(
        concepts = assembly.concepts.len(),
        kinds = assembly.summaries.len(),
        "assembled concept graph"
    );
    Ok(assembly)
}

/// Collects the missing-file errors out of [`resolve_all_sources`].
pub fn missing_sources(resolved: &[Result<KindSources>]) -> Vec<&IngestError> {
    resolved.iter().filter_map(|r| r.as_ref().err()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::MemoryTabularSource;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;
    use tmt_codesystem::EntityKind;

    const V: &str = "20250407";

    /// Every table a release needs, as empty files on disk plus the matching
    /// in-memory rows.
    fn release(root: &Path) -> (DistributionLayout, MemoryTabularSource) {
        let tmt = root.join("TMTRF20250407");
        let bonus = root.join("TMTRF20250407_BONUS");
        let concept = bonus.join("Concept");
        let rel = bonus.join("Relationship");
        for d in [&tmt, &concept, &rel] {
            fs::create_dir_all(d).unwrap();
        }

        let mut reader = MemoryTabularSource::new();
        let tables: Vec<(&PathBuf, String, Vec<Vec<&str>>)> = vec![
            (&concept, format!("SUBS{V}.xls"), vec![vec!["TMTID(SUBS)", "FSN"], vec!["S1", "paracetamol"]]),
            (&concept, format!("VTM{V}.xls"), vec![vec!["V1", "paracetamol"]]),
            (&concept, format!("GP{V}.xls"), vec![vec!["G1", "paracetamol 500 mg tablet"]]),
            (&concept, format!("GPU{V}.xls"), vec![vec!["GU1", "paracetamol 500 mg tablet, 1 tablet"]]),
            (&concept, format!("GPP{V}.xls"), vec![vec!["GP1", "paracetamol 500 mg, 10 tablets"]]),
            (&concept, format!("TP{V}.xls"), vec![vec!["T1", "SARA"]]),
            (&concept, format!("TPP{V}.xls"), vec![vec!["TP1", "SARA 10 tablets"]]),
            (&tmt, format!("TMTRF{V}_SNAPSHOT.xls"), vec![vec!["TMTID(TPU)", "FSN"], vec!["TU1", "SARA tablet"]]),
            (&rel, format!("SUBStoVTM{V}.xls"), vec![vec!["S1", "V1"]]),
            (&rel, format!("VTMtoGP{V}.xls"), vec![vec!["V1", "G1"]]),
            (&rel, format!("GPtoTP{V}.xls"), vec![vec!["G1", "T1"]]),
            (&rel, format!("GPtoGPU{V}.xls"), vec![vec!["G1", "GU1"]]),
            (&rel, format!("GPUtoTPU{V}.xls"), vec![vec!["GU1", "TU1"]]),
            (&rel, format!("GPUtoGPP{V}.xls"), vec![vec!["GU1", "GP1"]]),
            (&rel, format!("GPPtoGPP{V}.xls"), vec![]),
            (&rel, format!("GPPtoTPP{V}.xls"), vec![vec!["GP1", "TP1"]]),
            (&rel, format!("TPtoTPU{V}.xls"), vec![vec!["T1", "TU1"]]),
            (&rel, format!("TPUtoTPP{V}.xls"), vec![vec!["TU1", "TP1"]]),
            (&rel, format!("TPPtoTPP{V}.xls"), vec![vec!["TP1", "TP1"]]),
        ];
        for (dir, name, rows) in tables {
            fs::write(dir.join(&name), b"").unwrap();
            reader.insert(&name, rows);
        }
        (DistributionLayout::new(tmt, bonus), reader)
    }

    #[test]
    fn kinds_are_emitted_in_release_order() {
        let dir = tempdir().unwrap();
        let (layout, reader) = release(dir.path());
        let assembly = assemble_concepts(&layout, &reader).unwrap();

        let kinds: Vec<EntityKind> = assembly
            .concepts
            .iter()
            .map(|c| c.entity_kind().unwrap())
            .collect();
        assert_eq!(kinds, EntityKind::PROCESSING_ORDER.to_vec());
        assert_eq!(assembly.summaries.len(), 8);

        let tpu = &assembly.concepts[5];
        assert_eq!(tpu.code, "TU1");
        assert_eq!(tpu.parents(), vec!["GU1", "T1"]);
        assert_eq!(tpu.children(), vec!["TP1"]);

        let tpp = &assembly.concepts[7];
        assert_eq!(tpp.parents(), vec!["TU1", "GP1"]);
        assert!(tpp.children().is_empty());
    }

    #[test]
    fn missing_relationship_file_aborts_with_listing() {
        let dir = tempdir().unwrap();
        let (layout, reader) = release(dir.path());
        fs::remove_file(
            layout
                .relationship_dir()
                .unwrap()
                .join(format!("TPUtoTPP{V}.xls")),
        )
        .unwrap();

        let err = assemble_concepts(&layout, &reader).unwrap_err();
        match &err {
            IngestError::MissingFiles { kind, missing } => {
                assert_eq!(*kind, EntityKind::Tpu);
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].rule, "*tputotpp*");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains(&format!("GPtoTP{V}.xls")));

        let resolved = resolve_all_sources(&layout);
        let failures = missing_sources(&resolved);
        // TPU and TPP both read the TPU→TPP table
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn missing_entity_and_relationship_are_reported_together() {
        let dir = tempdir().unwrap();
        let (layout, _) = release(dir.path());
        fs::remove_file(layout.concept_dir().unwrap().join(format!("GP{V}.xls"))).unwrap();
        fs::remove_file(
            layout
                .relationship_dir()
                .unwrap()
                .join(format!("GPtoGPU{V}.xls")),
        )
        .unwrap();

        let desc = KindDescriptor::for_kind(EntityKind::Gp);
        match resolve_kind_sources(&layout, &desc).unwrap_err() {
            IngestError::MissingFiles { missing, .. } => {
                let roles: Vec<&str> = missing.iter().map(|m| m.role.as_str()).collect();
                assert_eq!(roles, vec!["entity table", "relationship gptogpu"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
