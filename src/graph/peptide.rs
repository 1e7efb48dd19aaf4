use std::fmt::{self, Display};

use super::PsmId;

/// Identifies a [`Peptide`] within an [`EvidenceGraph`](super::EvidenceGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeptideId(pub usize);

/// A modification placed on a peptide. Position 0 is the N-terminus, positions
/// `1..=len` are residues.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Modification {
    pub position: usize,
    pub name: String,
    pub mass_delta: Option<f64>,
}

impl Modification {
    pub fn new<S: Into<String>>(position: usize, name: S, mass_delta: Option<f64>) -> Self {
        Self {
            position,
            name: name.into(),
            mass_delta,
        }
    }
}

impl Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.position, self.name)
    }
}

/// The modification signature used to tell otherwise identical sequences apart.
///
/// Modifications are ordered by position and name so that input order does not matter.
pub fn modification_signature(modifications: &[Modification]) -> String {
    let mut parts: Vec<String> = modifications.iter().map(|m| m.to_string()).collect();
    parts.sort();
    parts.join(";")
}

/// The key a peptide is merged under: sequence plus modification signature
pub fn peptide_key(sequence: &str, modifications: &[Modification]) -> String {
    if modifications.is_empty() {
        sequence.to_string()
    } else {
        format!("{sequence}[{}]", modification_signature(modifications))
    }
}

/// A peptide sequence with modifications, observed by one or more PSMs
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peptide {
    pub id: PeptideId,
    pub sequence: String,
    pub modifications: Vec<Modification>,
    pub(crate) psms: Vec<PsmId>,
}

impl Peptide {
    pub fn new(id: PeptideId, sequence: String, mut modifications: Vec<Modification>) -> Self {
        modifications.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        Self {
            id,
            sequence,
            modifications,
            psms: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        peptide_key(&self.sequence, &self.modifications)
    }

    pub fn psms(&self) -> &[PsmId] {
        &self.psms
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}
