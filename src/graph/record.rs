//! Normalized input records, as handed over by the per-format readers.
use thiserror::Error;

use super::Modification;

/// Something a search engine said about a protein a PSM maps to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessionRecord {
    pub accession: String,
    pub description: Option<String>,
    pub db_sequence: Option<String>,
    pub database_ref: Option<String>,
}

impl AccessionRecord {
    pub fn new<S: Into<String>>(accession: S) -> Self {
        Self {
            accession: accession.into(),
            ..Default::default()
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_sequence<S: Into<String>>(mut self, sequence: S) -> Self {
        self.db_sequence = Some(sequence.into());
        self
    }

    pub fn with_database_ref<S: Into<String>>(mut self, database_ref: S) -> Self {
        self.database_ref = Some(database_ref.into());
        self
    }
}

/// One normalized peptide-spectrum match from a search engine result file
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsmRecord {
    pub spectrum_id: String,
    pub sequence: String,
    pub modifications: Vec<Modification>,
    pub accessions: Vec<AccessionRecord>,
    pub scores: Vec<(String, f64)>,
    pub decoy: Option<bool>,
    pub rank: Option<u32>,
    pub charge: Option<i32>,
}

/// Why a single input record was rejected. Rejected records are skipped and
/// counted, they never abort ingestion of the rest of the file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    #[error("The record has no spectrum identifier")]
    MissingSpectrumId,
    #[error("The record has no peptide sequence")]
    MissingSequence,
    #[error("The peptide sequence {0:?} contains non-residue characters")]
    InvalidSequence(String),
    #[error("The record does not map to any accession")]
    MissingAccession,
    #[error("The record maps to an empty accession string")]
    EmptyAccession,
    #[error("The score {0} is not a finite number")]
    InvalidScore(String),
}

impl PsmRecord {
    pub fn new<S: Into<String>, P: Into<String>>(spectrum_id: S, sequence: P) -> Self {
        Self {
            spectrum_id: spectrum_id.into(),
            sequence: sequence.into(),
            ..Default::default()
        }
    }

    pub fn with_accession(mut self, accession: AccessionRecord) -> Self {
        self.accessions.push(accession);
        self
    }

    pub fn with_score<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.scores.push((name.into(), value));
        self
    }

    pub fn with_modification(mut self, modification: Modification) -> Self {
        self.modifications.push(modification);
        self
    }

    pub fn with_decoy(mut self, decoy: bool) -> Self {
        self.decoy = Some(decoy);
        self
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = Some(charge);
        self
    }

    /// Check the record can be merged into the evidence graph
    pub fn validate(&self) -> Result<(), ParseFailure> {
        if self.spectrum_id.trim().is_empty() {
            return Err(ParseFailure::MissingSpectrumId);
        }
        let sequence = self.sequence.trim();
        if sequence.is_empty() {
            return Err(ParseFailure::MissingSequence);
        }
        if !sequence.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ParseFailure::InvalidSequence(sequence.to_string()));
        }
        if self.accessions.is_empty() {
            return Err(ParseFailure::MissingAccession);
        }
        if self.accessions.iter().any(|a| a.accession.trim().is_empty()) {
            return Err(ParseFailure::EmptyAccession);
        }
        if let Some((name, _)) = self.scores.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ParseFailure::InvalidScore(name.clone()));
        }
        Ok(())
    }
}
