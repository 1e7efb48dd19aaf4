use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;

use super::{FileId, GroupId, PeptideId};

/// Identifies an [`Accession`] within an [`EvidenceGraph`](super::EvidenceGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessionId(pub usize);

/// A protein database identifier together with everything the input files said about it.
///
/// Repeated sightings of the same accession string are merged into one `Accession`:
/// files, descriptions and database references are unioned, and a missing sequence
/// is filled in by whichever file provides one.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Accession {
    pub id: AccessionId,
    pub accession: String,
    pub files: BTreeSet<FileId>,
    pub descriptions: BTreeMap<FileId, String>,
    pub db_sequence: Option<String>,
    pub database_refs: BTreeSet<String>,
    pub(crate) group: Option<GroupId>,
    pub(crate) peptides: IndexSet<PeptideId>,
}

impl Accession {
    pub fn new(id: AccessionId, accession: String) -> Self {
        Self {
            id,
            accession,
            files: BTreeSet::new(),
            descriptions: BTreeMap::new(),
            db_sequence: None,
            database_refs: BTreeSet::new(),
            group: None,
            peptides: IndexSet::new(),
        }
    }

    /// The group this accession was clustered into, if clustering has happened
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// The peptides this accession was reported for
    pub fn peptides(&self) -> &IndexSet<PeptideId> {
        &self.peptides
    }

    pub fn found_in_file(&self, file: FileId) -> bool {
        self.files.contains(&file)
    }

    /// Store a description for `file`. Blank descriptions are ignored.
    pub fn add_description(&mut self, file: FileId, description: &str) {
        let description = description.trim();
        if !description.is_empty() {
            self.descriptions.insert(file, description.to_string());
        }
    }

    pub fn description(&self, file: FileId) -> Option<&str> {
        self.descriptions.get(&file).map(|s| s.as_str())
    }

    /// All distinct descriptions joined by `;`, or `None` if no file gave one
    pub fn combined_description(&self) -> Option<String> {
        let distinct: BTreeSet<&str> = self.descriptions.values().map(|s| s.as_str()).collect();
        if distinct.is_empty() {
            None
        } else {
            Some(distinct.into_iter().collect::<Vec<_>>().join(";"))
        }
    }

    /// Fill in the database sequence if it is not known yet.
    ///
    /// Returns `false` when a different sequence was already recorded, in which
    /// case the first one is kept.
    pub fn repair_sequence(&mut self, sequence: &str) -> bool {
        let sequence = sequence.trim();
        if sequence.is_empty() {
            return true;
        }
        match &self.db_sequence {
            None => {
                self.db_sequence = Some(sequence.to_string());
                true
            }
            Some(existing) => existing == sequence,
        }
    }

    pub fn add_database_ref(&mut self, database_ref: &str) {
        if !database_ref.is_empty() {
            self.database_refs.insert(database_ref.to_string());
        }
    }
}

/// Structural equality over id, accession, descriptions, sequence, database
/// references and owning group. File membership and peptide links do not take part.
impl PartialEq for Accession {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.accession == other.accession
            && self.descriptions == other.descriptions
            && self.db_sequence == other.db_sequence
            && self.database_refs == other.database_refs
            && self.group == other.group
    }
}

impl Eq for Accession {}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_descriptions() {
        let mut acc = Accession::new(AccessionId(0), "P12345".into());
        acc.add_description(FileId(1), "  Some protein ");
        acc.add_description(FileId(2), "");
        acc.add_description(FileId(3), "Another name");
        acc.add_description(FileId(4), "Some protein");
        assert_eq!(acc.description(FileId(1)), Some("Some protein"));
        assert_eq!(acc.description(FileId(2)), None);
        assert_eq!(
            acc.combined_description().as_deref(),
            Some("Another name;Some protein")
        );
    }

    #[test_log::test]
    fn test_sequence_repair() {
        let mut acc = Accession::new(AccessionId(0), "P12345".into());
        assert!(acc.repair_sequence(""));
        assert!(acc.db_sequence.is_none());
        assert!(acc.repair_sequence("MKLV"));
        assert!(acc.repair_sequence("MKLV"));
        assert!(!acc.repair_sequence("MKLA"));
        assert_eq!(acc.db_sequence.as_deref(), Some("MKLV"));
    }

    #[test_log::test]
    fn test_structural_equality() {
        let mut a = Accession::new(AccessionId(3), "P1".into());
        let mut b = a.clone();
        b.files.insert(FileId(2));
        assert_eq!(a, b);
        b.add_database_ref("uniprot");
        assert_ne!(a, b);
        a.add_database_ref("uniprot");
        a.group = Some(GroupId(1));
        assert_ne!(a, b);
    }
}
