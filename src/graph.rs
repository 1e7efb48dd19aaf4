//! The evidence graph: accessions, peptides, PSMs and the groups connecting them.
//!
//! Graphs are assembled with a [`GraphBuilder`] and frozen into an [`EvidenceGraph`],
//! which is read-only and can be shared between threads.
use std::collections::HashMap;

mod accession;
mod builder;
mod cluster;
mod group;
mod peptide;
mod psm;
pub mod record;

pub use accession::{Accession, AccessionId};
pub use builder::{FileIngestion, GraphBuilder, StructuralError};
pub use group::{Group, GroupId};
pub use peptide::{modification_signature, peptide_key, Modification, Peptide, PeptideId};
pub use psm::{FileId, InputFile, Psm, PsmId};
pub use record::{AccessionRecord, ParseFailure, PsmRecord};

use crate::score::ScoreRegistry;

/// A frozen evidence graph. Identities never change after
/// [`GraphBuilder::build_intermediate_structure`], which makes every accessor here
/// safe to call from many threads at once.
#[derive(Debug, Clone)]
pub struct EvidenceGraph {
    pub(crate) name: Option<String>,
    pub(crate) files: Vec<InputFile>,
    pub(crate) accessions: Vec<Accession>,
    pub(crate) accession_index: HashMap<String, AccessionId>,
    pub(crate) peptides: Vec<Peptide>,
    pub(crate) psms: Vec<Psm>,
    pub(crate) groups: Vec<Group>,
    pub(crate) scores: ScoreRegistry,
}

impl EvidenceGraph {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&InputFile> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn accessions(&self) -> &[Accession] {
        &self.accessions
    }

    pub fn accession(&self, id: AccessionId) -> Option<&Accession> {
        self.accessions.get(id.0)
    }

    pub fn accession_by_name(&self, accession: &str) -> Option<&Accession> {
        self.accession_index
            .get(accession)
            .and_then(|id| self.accession(*id))
    }

    pub fn peptides(&self) -> &[Peptide] {
        &self.peptides
    }

    pub fn peptide(&self, id: PeptideId) -> Option<&Peptide> {
        self.peptides.get(id.0)
    }

    pub fn psms(&self) -> &[Psm] {
        &self.psms
    }

    pub fn psm(&self, id: PsmId) -> Option<&Psm> {
        self.psms.get(id.0)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    /// The group owning `accession`
    pub fn group_of(&self, accession: AccessionId) -> Option<&Group> {
        self.accession(accession)
            .and_then(|a| a.group())
            .and_then(|g| self.group(g))
    }

    /// The scores observed while building the graph
    pub fn scores(&self) -> &ScoreRegistry {
        &self.scores
    }

    /// Iterate over the PSMs of a peptide
    pub fn psms_of_peptide(&self, peptide: PeptideId) -> impl Iterator<Item = &Psm> + '_ {
        self.peptide(peptide)
            .into_iter()
            .flat_map(|p| p.psms.iter())
            .filter_map(move |id| self.psm(*id))
    }

    /// Iterate over the PSMs supporting an accession
    pub fn psms_of_accession(&self, accession: AccessionId) -> impl Iterator<Item = &Psm> + '_ {
        self.accession(accession)
            .into_iter()
            .flat_map(|a| a.peptides.iter())
            .flat_map(move |p| self.psms_of_peptide(*p))
            .filter(move |psm| psm.has_accession(accession))
    }

    /// The accessions a peptide was reported for, across all of its PSMs
    pub fn accessions_of_peptide(&self, peptide: PeptideId) -> Vec<AccessionId> {
        let mut accessions: Vec<AccessionId> = self
            .psms_of_peptide(peptide)
            .flat_map(|psm| psm.accessions.iter().copied())
            .collect();
        accessions.sort();
        accessions.dedup();
        accessions
    }

    /// The accession strings of a PSM
    pub fn accession_names(&self, accessions: &[AccessionId]) -> Vec<&str> {
        accessions
            .iter()
            .filter_map(|a| self.accession(*a))
            .map(|a| a.accession.as_str())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn graph() -> EvidenceGraph {
        let mut builder = GraphBuilder::new();
        builder.add_file(
            "engine",
            "a",
            vec![
                PsmRecord::new("s1", "AAAK")
                    .with_accession(AccessionRecord::new("P1"))
                    .with_accession(AccessionRecord::new("P2")),
                PsmRecord::new("s2", "CCCK").with_accession(AccessionRecord::new("P2")),
            ],
        );
        builder.add_file(
            "other",
            "b",
            vec![PsmRecord::new("s2", "CCCK").with_accession(AccessionRecord::new("P3"))],
        );
        builder.build_intermediate_structure().unwrap()
    }

    #[test_log::test]
    fn test_navigation() {
        let graph = graph();
        let p2 = graph.accession_by_name("P2").unwrap();
        assert_eq!(graph.psms_of_accession(p2.id).count(), 2);
        let p3 = graph.accession_by_name("P3").unwrap();
        assert_eq!(graph.psms_of_accession(p3.id).count(), 1);
        assert_eq!(graph.groups().len(), 1);
        assert_eq!(graph.group_of(p3.id).map(|g| g.len()), Some(3));
        let ccck = graph.psm(PsmId(1)).unwrap().peptide;
        assert_eq!(
            graph.accessions_of_peptide(ccck),
            vec![AccessionId(1), AccessionId(2)]
        );
        assert_eq!(graph.file(FileId(2)).map(|f| f.engine.as_str()), Some("other"));
    }
}
