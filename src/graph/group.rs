use indexmap::IndexSet;

use super::{AccessionId, PeptideId};

/// Identifies a [`Group`] within an [`EvidenceGraph`](super::EvidenceGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupId(pub usize);

/// A connected cluster of accessions sharing peptide evidence.
///
/// The group owns the ids of its member accessions, each of which points back to
/// the group by [`GroupId`]. Only the graph builder assigns either side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    pub id: GroupId,
    pub(crate) accessions: IndexSet<AccessionId>,
    pub(crate) peptides: IndexSet<PeptideId>,
}

impl Group {
    pub(crate) fn new(id: GroupId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Member accessions in ascending id order
    pub fn accessions(&self) -> &IndexSet<AccessionId> {
        &self.accessions
    }

    /// All peptides any member accession was reported for, in ascending id order
    pub fn peptides(&self) -> &IndexSet<PeptideId> {
        &self.peptides
    }

    pub fn contains(&self, accession: AccessionId) -> bool {
        self.accessions.contains(&accession)
    }

    pub fn len(&self) -> usize {
        self.accessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessions.is_empty()
    }
}
