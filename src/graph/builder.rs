use std::collections::HashMap;

use indexmap::IndexSet;
use thiserror::Error;

use super::cluster::DisjointSet;
use super::record::{ParseFailure, PsmRecord};
use super::{
    peptide_key, Accession, AccessionId, EvidenceGraph, FileId, Group, GroupId, InputFile,
    Peptide, PeptideId, Psm, PsmId,
};
use crate::score::ScoreRegistry;

/// Violations of the evidence graph's structure found when freezing it. These
/// are fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("No input file was added to the graph")]
    NoFiles,
    #[error("Accession {0} does not belong to any group after clustering")]
    UngroupedAccession(String),
    #[error("Accession {accession} points to group {group:?} which does not list it")]
    GroupMembershipMismatch { accession: String, group: GroupId },
    #[error("Group {0:?} has no member accessions")]
    EmptyGroup(GroupId),
    #[error("Peptide {0} is not reachable from exactly one group")]
    OrphanPeptide(String),
}

/// The outcome of ingesting one file: how many records made it into the graph
/// and which were skipped and why
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileIngestion {
    pub file: FileId,
    pub accepted: usize,
    pub skipped: Vec<(usize, ParseFailure)>,
}

impl FileIngestion {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn total(&self) -> usize {
        self.accepted + self.skipped.len()
    }
}

/// Merges normalized PSM records from any number of files into one evidence graph.
///
/// Ingestion is sequential: every merge has to see the merges before it. Once all
/// files are in, [`GraphBuilder::build_clusters`] groups accessions into connected
/// components and [`GraphBuilder::build_intermediate_structure`] validates and
/// freezes the result into an [`EvidenceGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    name: Option<String>,
    files: Vec<InputFile>,
    accessions: Vec<Accession>,
    accession_index: HashMap<String, AccessionId>,
    peptides: Vec<Peptide>,
    peptide_index: HashMap<String, PeptideId>,
    psms: Vec<Psm>,
    psm_index: HashMap<(FileId, String, PeptideId), PsmId>,
    groups: Vec<Group>,
    scores: ScoreRegistry,
    clustered: bool,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    pub fn accessions(&self) -> &[Accession] {
        &self.accessions
    }

    pub fn peptides(&self) -> &[Peptide] {
        &self.peptides
    }

    pub fn psms(&self) -> &[Psm] {
        &self.psms
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn scores(&self) -> &ScoreRegistry {
        &self.scores
    }

    /// Ingest the records of one search engine result file.
    ///
    /// Malformed records are skipped and reported in the returned [`FileIngestion`],
    /// the remaining records of the file are still merged.
    pub fn add_file<I>(&mut self, engine: &str, name: &str, records: I) -> FileIngestion
    where
        I: IntoIterator<Item = PsmRecord>,
    {
        let file = FileId(self.files.len() as u32 + 1);
        self.files.push(InputFile {
            id: file,
            name: name.to_string(),
            engine: engine.to_string(),
        });
        self.clustered = false;

        let mut summary = FileIngestion {
            file,
            ..Default::default()
        };
        for (i, record) in records.into_iter().enumerate() {
            match record.validate() {
                Ok(()) => {
                    self.ingest_record(file, record);
                    summary.accepted += 1;
                }
                Err(failure) => {
                    log::trace!("Skipping record {i} of {name}: {failure}");
                    summary.skipped.push((i, failure));
                }
            }
        }
        if !summary.skipped.is_empty() {
            log::warn!(
                "Skipped {} of {} records from {name} ({engine})",
                summary.skipped.len(),
                summary.total()
            );
        }
        log::debug!(
            "Ingested {} records from {name}, graph has {} accessions, {} peptides and {} PSMs",
            summary.accepted,
            self.accessions.len(),
            self.peptides.len(),
            self.psms.len()
        );
        summary
    }

    fn ingest_record(&mut self, file: FileId, record: PsmRecord) {
        let sequence = record.sequence.trim().to_ascii_uppercase();
        let key = peptide_key(&sequence, &record.modifications);
        let peptide_id = match self.peptide_index.get(&key).copied() {
            Some(id) => id,
            None => {
                let id = PeptideId(self.peptides.len());
                self.peptides
                    .push(Peptide::new(id, sequence, record.modifications));
                self.peptide_index.insert(key, id);
                id
            }
        };

        let mut accession_ids = Vec::with_capacity(record.accessions.len());
        for acc_record in record.accessions {
            let accession_str = acc_record.accession.trim();
            let id = match self.accession_index.get(accession_str).copied() {
                Some(id) => id,
                None => {
                    let id = AccessionId(self.accessions.len());
                    self.accessions
                        .push(Accession::new(id, accession_str.to_string()));
                    self.accession_index.insert(accession_str.to_string(), id);
                    id
                }
            };
            let accession = &mut self.accessions[id.0];
            accession.files.insert(file);
            if let Some(description) = acc_record.description.as_deref() {
                accession.add_description(file, description);
            }
            if let Some(sequence) = acc_record.db_sequence.as_deref() {
                if !accession.repair_sequence(sequence) {
                    log::warn!(
                        "Conflicting database sequences for {}, keeping the first one",
                        accession.accession
                    );
                }
            }
            if let Some(db_ref) = acc_record.database_ref.as_deref() {
                accession.add_database_ref(db_ref);
            }
            accession.peptides.insert(peptide_id);
            if !accession_ids.contains(&id) {
                accession_ids.push(id);
            }
        }

        for (name, _) in record.scores.iter() {
            self.scores.observe(name);
        }

        let spectrum_id = record.spectrum_id.trim().to_string();
        let psm_key = (file, spectrum_id, peptide_id);
        match self.psm_index.get(&psm_key).copied() {
            Some(psm_id) => {
                let psm = &mut self.psms[psm_id.0];
                for id in accession_ids {
                    if !psm.accessions.contains(&id) {
                        psm.accessions.push(id);
                    }
                }
                for (name, value) in record.scores {
                    psm.scores.entry(name).or_insert(value);
                }
                psm.engine_decoy = match (psm.engine_decoy, record.decoy) {
                    (Some(a), Some(b)) => Some(a && b),
                    (a, b) => a.or(b),
                };
                psm.rank = match (psm.rank, record.rank) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                psm.charge = psm.charge.or(record.charge);
            }
            None => {
                let id = PsmId(self.psms.len());
                self.psms.push(Psm {
                    id,
                    file,
                    spectrum_id: psm_key.1.clone(),
                    peptide: peptide_id,
                    charge: record.charge,
                    rank: record.rank,
                    scores: record.scores.into_iter().collect(),
                    engine_decoy: record.decoy,
                    accessions: accession_ids,
                });
                self.peptides[peptide_id.0].psms.push(id);
                self.psm_index.insert(psm_key, id);
            }
        }
    }

    /// Cluster accessions into groups of connected peptide evidence.
    ///
    /// Two accessions end up in the same group exactly when a chain of shared
    /// peptides connects them. Groups are numbered by their smallest accession id,
    /// so re-running this on an unchanged graph reproduces the same groups.
    /// Returns the number of groups.
    pub fn build_clusters(&mut self) -> usize {
        let mut components = DisjointSet::new(self.accessions.len());
        let mut first_accession_of_peptide: Vec<Option<usize>> = vec![None; self.peptides.len()];
        for accession in self.accessions.iter() {
            for peptide in accession.peptides.iter() {
                match first_accession_of_peptide[peptide.0] {
                    Some(first) => {
                        components.union(first, accession.id.0);
                    }
                    None => first_accession_of_peptide[peptide.0] = Some(accession.id.0),
                }
            }
        }

        self.groups.clear();
        for accession in self.accessions.iter_mut() {
            accession.group = None;
        }

        for (i, members) in components.components().into_iter().enumerate() {
            let group_id = GroupId(i);
            let mut group = Group::new(group_id);
            let mut peptides: Vec<PeptideId> = Vec::new();
            for member in members {
                let accession = &mut self.accessions[member];
                accession.group = Some(group_id);
                group.accessions.insert(accession.id);
                peptides.extend(accession.peptides.iter().copied());
            }
            peptides.sort();
            peptides.dedup();
            group.peptides = peptides.into_iter().collect::<IndexSet<_>>();
            self.groups.push(group);
        }
        self.clustered = true;
        log::debug!(
            "Clustered {} accessions into {} groups",
            self.accessions.len(),
            self.groups.len()
        );
        self.groups.len()
    }

    fn check_structure(&self) -> Result<(), StructuralError> {
        if self.files.is_empty() {
            return Err(StructuralError::NoFiles);
        }
        for accession in self.accessions.iter() {
            let group_id = accession
                .group
                .ok_or_else(|| StructuralError::UngroupedAccession(accession.accession.clone()))?;
            let listed = self
                .groups
                .get(group_id.0)
                .map(|g| g.contains(accession.id))
                .unwrap_or(false);
            if !listed {
                return Err(StructuralError::GroupMembershipMismatch {
                    accession: accession.accession.clone(),
                    group: group_id,
                });
            }
        }

        let mut peptide_seen = vec![0usize; self.peptides.len()];
        for group in self.groups.iter() {
            if group.is_empty() {
                return Err(StructuralError::EmptyGroup(group.id));
            }
            for accession in group.accessions.iter() {
                if self.accessions[accession.0].group != Some(group.id) {
                    return Err(StructuralError::GroupMembershipMismatch {
                        accession: self.accessions[accession.0].accession.clone(),
                        group: group.id,
                    });
                }
            }
            for peptide in group.peptides.iter() {
                peptide_seen[peptide.0] += 1;
            }
        }
        if let Some((i, _)) = peptide_seen.iter().enumerate().find(|(_, n)| **n != 1) {
            return Err(StructuralError::OrphanPeptide(self.peptides[i].key()));
        }
        Ok(())
    }

    /// Validate the graph's structure and freeze it.
    ///
    /// Clusters are (re)built first if files were added since the last
    /// [`GraphBuilder::build_clusters`].
    pub fn build_intermediate_structure(mut self) -> Result<EvidenceGraph, StructuralError> {
        if !self.clustered {
            self.build_clusters();
        }
        self.check_structure()?;
        Ok(EvidenceGraph {
            name: self.name,
            files: self.files,
            accessions: self.accessions,
            accession_index: self.accession_index,
            peptides: self.peptides,
            psms: self.psms,
            groups: self.groups,
            scores: self.scores,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::record::AccessionRecord;

    fn record(spectrum: &str, sequence: &str, accessions: &[&str]) -> PsmRecord {
        let mut rec = PsmRecord::new(spectrum, sequence).with_score("mascot_score", 30.0);
        for acc in accessions {
            rec = rec.with_accession(AccessionRecord::new(*acc));
        }
        rec
    }

    #[test_log::test]
    fn test_merge_across_files() {
        let mut builder = GraphBuilder::new();
        let first = builder.add_file(
            "mascot",
            "a.mzid",
            vec![
                PsmRecord::new("s1", "PEPTIDEK")
                    .with_accession(
                        AccessionRecord::new("P1")
                            .with_description("Protein one")
                            .with_database_ref("SDB_1"),
                    )
                    .with_score("mascot_score", 42.0),
                PsmRecord::new("s2", "").with_accession(AccessionRecord::new("P1")),
            ],
        );
        assert_eq!(first.accepted, 1);
        assert_eq!(first.skipped, vec![(1, ParseFailure::MissingSequence)]);

        let second = builder.add_file(
            "tandem",
            "b.mzid",
            vec![PsmRecord::new("s1", "peptidek")
                .with_accession(
                    AccessionRecord::new("P1")
                        .with_sequence("MPEPTIDEK")
                        .with_database_ref("SDB_2"),
                )
                .with_score("xtandem_expect", 0.01)],
        );
        assert_eq!(second.file, FileId(2));

        assert_eq!(builder.accessions().len(), 1);
        assert_eq!(builder.peptides().len(), 1);
        assert_eq!(builder.psms().len(), 2);
        let acc = &builder.accessions()[0];
        assert!(acc.found_in_file(FileId(1)) && acc.found_in_file(FileId(2)));
        assert_eq!(acc.db_sequence.as_deref(), Some("MPEPTIDEK"));
        assert_eq!(acc.database_refs.len(), 2);
        assert_eq!(acc.description(FileId(1)), Some("Protein one"));
        assert_eq!(builder.scores().len(), 2);
    }

    #[test_log::test]
    fn test_duplicate_psm_merges() {
        let mut builder = GraphBuilder::new();
        builder.add_file(
            "mascot",
            "a",
            vec![
                record("s1", "PEPTIDEK", &["P1"]),
                record("s1", "PEPTIDEK", &["P2"]).with_score("mascot_expect", 0.1),
            ],
        );
        assert_eq!(builder.psms().len(), 1);
        let psm = &builder.psms()[0];
        assert_eq!(psm.accessions, vec![AccessionId(0), AccessionId(1)]);
        assert_eq!(psm.score("mascot_score"), Some(30.0));
        assert_eq!(psm.score("mascot_expect"), Some(0.1));
    }

    #[test_log::test]
    fn test_clustering_connectivity() {
        let mut builder = GraphBuilder::new();
        builder.add_file(
            "engine",
            "a",
            vec![
                record("s1", "AAAK", &["C"]),
                record("s2", "CCCK", &["A", "B"]),
                record("s3", "DDDK", &["B", "D"]),
                record("s4", "EEEK", &["E"]),
                record("s5", "FFFK", &["C"]),
            ],
        );
        let n = builder.build_clusters();
        assert_eq!(n, 3);
        let groups: Vec<Vec<String>> = builder
            .groups()
            .iter()
            .map(|g| {
                g.accessions()
                    .iter()
                    .map(|a| builder.accessions()[a.0].accession.clone())
                    .collect()
            })
            .collect();
        assert_eq!(
            groups,
            vec![
                vec!["C".to_string()],
                vec!["A".to_string(), "B".to_string(), "D".to_string()],
                vec!["E".to_string()],
            ]
        );
        assert_eq!(builder.groups()[0].peptides().len(), 2);
    }

    #[test_log::test]
    fn test_clustering_is_idempotent() {
        let mut builder = GraphBuilder::new();
        builder.add_file(
            "engine",
            "a",
            vec![
                record("s1", "AAAK", &["X", "Y"]),
                record("s2", "CCCK", &["Z"]),
                record("s3", "DDDK", &["Y", "W"]),
            ],
        );
        builder.build_clusters();
        let first: Vec<Group> = builder.groups().to_vec();
        let first_assignment: Vec<Option<GroupId>> =
            builder.accessions().iter().map(|a| a.group()).collect();
        builder.build_clusters();
        assert_eq!(first, builder.groups());
        let second_assignment: Vec<Option<GroupId>> =
            builder.accessions().iter().map(|a| a.group()).collect();
        assert_eq!(first_assignment, second_assignment);
    }

    #[test_log::test]
    fn test_freeze() {
        let builder = GraphBuilder::new();
        assert_eq!(
            builder.build_intermediate_structure().err(),
            Some(StructuralError::NoFiles)
        );

        let mut builder = GraphBuilder::new().with_name("test");
        builder.add_file("engine", "a", vec![record("s1", "AAAK", &["X"])]);
        let graph = builder.build_intermediate_structure().unwrap();
        assert_eq!(graph.groups().len(), 1);
        assert_eq!(graph.name(), Some("test"));
        assert_eq!(graph.accession_by_name("X").unwrap().group(), Some(GroupId(0)));
    }
}
