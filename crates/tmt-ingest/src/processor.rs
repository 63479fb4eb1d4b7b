//! Generic per-kind concept builder.
//!
//! For one [`KindDescriptor`]:
//! 1) locate the entity table and every relationship table (all-or-nothing),
//! 2) index each relationship table by the column holding the current kind,
//! 3) emit one concept per entity row, attaching parents then children.

use crate::archive::DistributionLayout;
use crate::kinds::{EntitySource, KindDescriptor, Link, RelationshipFile};
use crate::locate::require_file;
use crate::tabular::{Row, TabularSource};
use crate::{IngestError, MissingFile, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tmt_codesystem::{Concept, EntityKind, ReferenceKind};

/// Code → related codes, in source row order.
#[derive(Debug, Clone, Default)]
pub struct RelationshipIndex {
    related: HashMap<String, Vec<String>>,
}

impl RelationshipIndex {
    /// Rows shorter than either column, or with a blank key/related cell,
    /// are ignored.
    pub fn build(rows: &[Row], match_column: usize, related_column: usize) -> Self {
        let mut related: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (Some(key), Some(value)) = (row.get(match_column), row.get(related_column)) else {
                continue;
            };
            if key.is_empty() || value.is_empty() {
                continue;
            }
            related.entry(key.clone()).or_default().push(value.clone());
        }
        Self { related }
    }

    pub fn for_link(rows: &[Row], link: &Link) -> Self {
        Self::build(rows, link.match_column(), link.related_column())
    }

    pub fn lookup(&self, code: &str) -> &[String] {
        self.related.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn key_count(&self) -> usize {
        self.related.len()
    }
}

/// Files resolved for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSources {
    pub kind: EntityKind,
    pub entity: PathBuf,
    pub relationships: Vec<(RelationshipFile, PathBuf)>,
}

impl KindSources {
    pub fn relationship_path(&self, file: RelationshipFile) -> Option<&PathBuf> {
        self.relationships
            .iter()
            .find(|(f, _)| *f == file)
            .map(|(_, p)| p)
    }
}

/// Locates every file `desc` needs. Fails with every missing file listed,
/// not just the first.
pub fn resolve_kind_sources(
    layout: &DistributionLayout,
    desc: &KindDescriptor,
) -> Result<KindSources> {
    let mut missing: Vec<MissingFile> = Vec::new();

    let entity_dir = match desc.entity {
        EntitySource::ConceptTable => layout.concept_dir()?,
        EntitySource::Snapshot => layout.tmt_root.clone(),
    };
    let entity = match require_file(&entity_dir, &desc.entity_rule(), "entity table")? {
        Ok(path) => Some(path),
        Err(m) => {
            missing.push(m);
            None
        }
    };

    let relationship_dir = layout.relationship_dir()?;
    let mut relationships = Vec::new();
    for file in desc.relationship_files() {
        match require_file(&relationship_dir, &file.rule(), &file.role())? {
            Ok(path) => relationships.push((file, path)),
            Err(m) => missing.push(m),
        }
    }

    match entity {
        Some(entity) if missing.is_empty() => Ok(KindSources {
            kind: desc.kind,
            entity,
            relationships,
        }),
        _ => Err(IngestError::MissingFiles {
            kind: desc.kind,
            missing,
        }),
    }
}

/// Counters for one processed kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSummary {
    pub kind: EntityKind,
    pub entity_file: PathBuf,
    pub rows_read: usize,
    pub header_skipped: bool,
    pub empty_rows_skipped: usize,
    pub concepts_emitted: usize,
    pub parents_added: usize,
    pub children_added: usize,
    pub self_references_dropped: usize,
}

fn is_header_row(row: &Row, desc: &KindDescriptor) -> bool {
    row.first()
        .map(|cell| cell.trim().eq_ignore_ascii_case(&desc.header_marker()))
        .unwrap_or(false)
}

/// Builds every concept of `desc.kind` from already-resolved `sources`,
/// appending to `out`.
pub fn build_kind_concepts(
    desc: &KindDescriptor,
    sources: &KindSources,
    reader: &dyn TabularSource,
    out: &mut Vec<Concept>,
) -> Result<KindSummary> {
    let mut tables: HashMap<RelationshipFile, Vec<Row>> = HashMap::new();
    for (file, path) in &sources.relationships {
        let rows = reader.read_rows(path)?;
        tracing::debug!(
            kind = %desc.kind,
            relationship = file.name_fragment(),
            rows = rows.len(),
            "loaded relationship table"
        );
        tables.insert(*file, rows);
    }

    let mut indexes: Vec<(Link, RelationshipIndex)> = Vec::with_capacity(desc.links.len());
    for link in desc.links {
        let rows = tables.get(&link.file).map(Vec::as_slice).unwrap_or(&[]);
        indexes.push((*link, RelationshipIndex::for_link(rows, link)));
    }

    let rows = reader.read_rows(&sources.entity)?;
    let mut summary = KindSummary {
        kind: desc.kind,
        entity_file: sources.entity.clone(),
        rows_read: rows.len(),
        header_skipped: false,
        empty_rows_skipped: 0,
        concepts_emitted: 0,
        parents_added: 0,
        children_added: 0,
        self_references_dropped: 0,
    };

    let mut data_rows = rows.iter();
    if rows.first().is_some_and(|row| is_header_row(row, desc)) {
        data_rows.next();
        summary.header_skipped = true;
    }

    for row in data_rows {
        let code = row.first().map(String::as_str).unwrap_or("");
        if code.is_empty() {
            summary.empty_rows_skipped += 1;
            continue;
        }
        let display = row.get(1).map(String::as_str).unwrap_or("");
        let mut concept = Concept::new(code, display, desc.kind);

        for (link, index) in &indexes {
            for related in index.lookup(code) {
                if concept.add_reference(link.direction, related) {
                    match link.direction {
                        ReferenceKind::Parent => summary.parents_added += 1,
                        ReferenceKind::Child => summary.children_added += 1,
                    }
                } else {
                    summary.self_references_dropped += 1;
                    tracing::warn!(
                        kind = %desc.kind,
                        code,
                        relationship = link.file.name_fragment(),
                        direction = %link.direction,
                        "dropping self reference"
                    );
                }
            }
        }

        out.push(concept);
        summary.concepts_emitted += 1;
    }

    tracing::info!(
        kind = %desc.kind,
        file = %sources.entity.display(),
        concepts = summary.concepts_emitted,
        parents = summary.parents_added,
        children = summary.children_added,
        skipped_rows = summary.empty_rows_skipped,
        self_refs = summary.self_references_dropped,
        "processed entity kind"
    );
    Ok(summary)
}

/// Locates, reads and builds one kind.
pub fn process_entity_kind(
    layout: &DistributionLayout,
    kind: EntityKind,
    reader: &dyn TabularSource,
    out: &mut Vec<Concept>,
) -> Result<KindSummary> {
    let desc = KindDescriptor::for_kind(kind);
    let sources = resolve_kind_sources(layout, &desc)?;
    build_kind_concepts(&desc, &sources, reader, out)
}
