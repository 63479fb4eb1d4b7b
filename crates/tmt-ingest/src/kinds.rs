//! Per-kind source table.
//!
//! Each entity kind is fully described by where its entity rows live and
//! which relationship files feed its `parent`/`child` properties. The
//! processor is generic over this table.

use crate::archive::SNAPSHOT_PATTERN;
use crate::locate::FileRule;
use tmt_codesystem::{EntityKind, ReferenceKind};

/// The pairwise relationship tables shipped in `<BONUS>/Relationship`.
///
/// File names are `...<FROM>to<TO>...`; column 0 holds the FROM id and
/// column 1 the TO id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipFile {
    SubsToVtm,
    VtmToGp,
    GpToTp,
    GpToGpu,
    GpuToTpu,
    GpuToGpp,
    GppToGpp,
    GppToTpp,
    TpToTpu,
    TpuToTpp,
    TppToTpp,
}

impl RelationshipFile {
    pub const ALL: [RelationshipFile; 11] = [
        RelationshipFile::SubsToVtm,
        RelationshipFile::VtmToGp,
        RelationshipFile::GpToTp,
        RelationshipFile::GpToGpu,
        RelationshipFile::GpuToTpu,
        RelationshipFile::GpuToGpp,
        RelationshipFile::GppToGpp,
        RelationshipFile::GppToTpp,
        RelationshipFile::TpToTpu,
        RelationshipFile::TpuToTpp,
        RelationshipFile::TppToTpp,
    ];

    /// Lower-case name fragment identifying the file.
    pub fn name_fragment(self) -> &'static str {
        match self {
            RelationshipFile::SubsToVtm => "substovtm",
            RelationshipFile::VtmToGp => "vtmtogp",
            RelationshipFile::GpToTp => "gptotp",
            RelationshipFile::GpToGpu => "gptogpu",
            RelationshipFile::GpuToTpu => "gputotpu",
            RelationshipFile::GpuToGpp => "gputogpp",
            RelationshipFile::GppToGpp => "gpptogpp",
            RelationshipFile::GppToTpp => "gpptotpp",
            RelationshipFile::TpToTpu => "tptotpu",
            RelationshipFile::TpuToTpp => "tputotpp",
            RelationshipFile::TppToTpp => "tpptotpp",
        }
    }

    pub fn endpoints(self) -> (EntityKind, EntityKind) {
        use EntityKind::*;
        match self {
            RelationshipFile::SubsToVtm => (Subs, Vtm),
            RelationshipFile::VtmToGp => (Vtm, Gp),
            RelationshipFile::GpToTp => (Gp, Tp),
            RelationshipFile::GpToGpu => (Gp, Gpu),
            RelationshipFile::GpuToTpu => (Gpu, Tpu),
            RelationshipFile::GpuToGpp => (Gpu, Gpp),
            RelationshipFile::GppToGpp => (Gpp, Gpp),
            RelationshipFile::GppToTpp => (Gpp, Tpp),
            RelationshipFile::TpToTpu => (Tp, Tpu),
            RelationshipFile::TpuToTpp => (Tpu, Tpp),
            RelationshipFile::TppToTpp => (Tpp, Tpp),
        }
    }

    pub fn rule(self) -> FileRule {
        FileRule::Contains(self.name_fragment().to_string())
    }

    pub fn role(self) -> String {
        format!("relationship {}", self.name_fragment())
    }
}

/// Where a kind's entity rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySource {
    /// `<BONUS>/Concept/<KIND><yyyymmdd>.xls`
    ConceptTable,
    /// `*_SNAPSHOT.xls` directly in the TMT root folder (TPU only).
    Snapshot,
}

/// One relationship file feeding one side of a kind's hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub file: RelationshipFile,
    pub direction: ReferenceKind,
}

impl Link {
    const fn parent(file: RelationshipFile) -> Self {
        Self {
            file,
            direction: ReferenceKind::Parent,
        }
    }

    const fn child(file: RelationshipFile) -> Self {
        Self {
            file,
            direction: ReferenceKind::Child,
        }
    }

    /// Column holding the code of the concept being built.
    ///
    /// A parent link reads a `X→K` file from the TO side; a child link reads a
    /// `K→X` file from the FROM side.
    pub fn match_column(&self) -> usize {
        match self.direction {
            ReferenceKind::Parent => 1,
            ReferenceKind::Child => 0,
        }
    }

    /// Column holding the related code.
    pub fn related_column(&self) -> usize {
        1 - self.match_column()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    pub kind: EntityKind,
    pub entity: EntitySource,
    /// Parent links first, then child links; property order follows this.
    pub links: &'static [Link],
}

const SUBS_LINKS: &[Link] = &[Link::child(RelationshipFile::SubsToVtm)];

const VTM_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::SubsToVtm),
    Link::child(RelationshipFile::VtmToGp),
];

const GP_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::VtmToGp),
    Link::child(RelationshipFile::GpToTp),
    Link::child(RelationshipFile::GpToGpu),
];

const GPU_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::GpToGpu),
    Link::child(RelationshipFile::GpuToTpu),
    Link::child(RelationshipFile::GpuToGpp),
];

const GPP_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::GpuToGpp),
    Link::parent(RelationshipFile::GppToGpp),
    Link::child(RelationshipFile::GppToTpp),
    Link::child(RelationshipFile::GppToGpp),
];

const TP_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::GpToTp),
    Link::child(RelationshipFile::TpToTpu),
];

const TPU_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::GpuToTpu),
    Link::parent(RelationshipFile::TpToTpu),
    Link::child(RelationshipFile::TpuToTpp),
];

const TPP_LINKS: &[Link] = &[
    Link::parent(RelationshipFile::TpuToTpp),
    Link::parent(RelationshipFile::GppToTpp),
    Link::parent(RelationshipFile::TppToTpp),
    Link::child(RelationshipFile::TppToTpp),
];

impl KindDescriptor {
    pub fn for_kind(kind: EntityKind) -> Self {
        let (entity, links) = match kind {
            EntityKind::Subs => (EntitySource::ConceptTable, SUBS_LINKS),
            EntityKind::Vtm => (EntitySource::ConceptTable, VTM_LINKS),
            EntityKind::Gp => (EntitySource::ConceptTable, GP_LINKS),
            EntityKind::Gpu => (EntitySource::ConceptTable, GPU_LINKS),
            EntityKind::Gpp => (EntitySource::ConceptTable, GPP_LINKS),
            EntityKind::Tp => (EntitySource::ConceptTable, TP_LINKS),
            EntityKind::Tpu => (EntitySource::Snapshot, TPU_LINKS),
            EntityKind::Tpp => (EntitySource::ConceptTable, TPP_LINKS),
        };
        Self {
            kind,
            entity,
            links,
        }
    }

    /// Every descriptor, in release processing order.
    pub fn all() -> Vec<Self> {
        EntityKind::PROCESSING_ORDER
            .into_iter()
            .map(Self::for_kind)
            .collect()
    }

    pub fn entity_rule(&self) -> FileRule {
        match self.entity {
            EntitySource::ConceptTable => FileRule::Pattern(format!(r"^{}\d{{8}}\.xls$", self.kind)),
            EntitySource::Snapshot => FileRule::Pattern(SNAPSHOT_PATTERN.to_string()),
        }
    }

    /// Relationship files this kind reads, each once, in first-use order.
    pub fn relationship_files(&self) -> Vec<RelationshipFile> {
        let mut files: Vec<RelationshipFile> = Vec::new();
        for link in self.links {
            if !files.contains(&link.file) {
                files.push(link.file);
            }
        }
        files
    }

    /// Literal first cell of an optional header row, e.g. `TMTID(GP)`.
    pub fn header_marker(&self) -> String {
        format!("TMTID({})", self.kind)
    }
}
