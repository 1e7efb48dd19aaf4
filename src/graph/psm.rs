use indexmap::IndexMap;

use super::{AccessionId, PeptideId};

/// Identifies a [`Psm`] within an [`EvidenceGraph`](super::EvidenceGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsmId(pub usize);

/// Identifies an input file. Real files are numbered from 1, [`FileId::OVERALL`]
/// stands for the combination of all files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileId(pub u32);

impl FileId {
    pub const OVERALL: FileId = FileId(0);
}

/// A search engine result file that contributed PSMs
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputFile {
    pub id: FileId,
    pub name: String,
    pub engine: String,
}

/// One spectrum's identification as a peptide by one search engine run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Psm {
    pub id: PsmId,
    pub file: FileId,
    pub spectrum_id: String,
    pub peptide: PeptideId,
    pub charge: Option<i32>,
    pub rank: Option<u32>,
    /// Raw engine scores by short score name
    pub scores: IndexMap<String, f64>,
    /// The decoy flag as reported by the search engine, if it reported one
    pub engine_decoy: Option<bool>,
    pub accessions: Vec<AccessionId>,
}

impl Psm {
    pub fn score(&self, name: &str) -> Option<f64> {
        self.scores.get(name).copied()
    }

    pub fn has_accession(&self, accession: AccessionId) -> bool {
        self.accessions.contains(&accession)
    }
}
