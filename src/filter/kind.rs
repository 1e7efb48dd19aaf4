use std::fmt::{self, Display};

use bitflags::bitflags;

use super::FilterComparator;

bitflags! {
    /// The kinds of entity a filter can be evaluated on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FilterLevel: u8 {
        const PSM = 0b001;
        const PEPTIDE = 0b010;
        const PROTEIN = 0b100;
    }
}

/// The shape of the attribute a filter reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterValueType {
    Numeric,
    Boolean,
    Text,
    TextList,
}

/// Every filter that can be constructed, identified by a stable short name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    PsmScore,
    PsmRank,
    PsmCharge,
    PsmDecoy,
    PsmQValue,
    PsmAccessions,
    PsmSequence,

    PeptideNrPsms,
    PeptideNrSpectra,
    PeptideSequence,
    PeptideAccessions,

    ProteinScore,
    ProteinFdr,
    ProteinQValue,
    ProteinDecoy,
    NrPeptidesPerProtein,
    NrPsmsPerProtein,
    NrSpectraPerProtein,
    NrGroupUniquePeptidesPerProtein,
    ProteinAccessions,
}

const ALL_FILTERS: &[FilterKind] = &[
    FilterKind::PsmScore,
    FilterKind::PsmRank,
    FilterKind::PsmCharge,
    FilterKind::PsmDecoy,
    FilterKind::PsmQValue,
    FilterKind::PsmAccessions,
    FilterKind::PsmSequence,
    FilterKind::PeptideNrPsms,
    FilterKind::PeptideNrSpectra,
    FilterKind::PeptideSequence,
    FilterKind::PeptideAccessions,
    FilterKind::ProteinScore,
    FilterKind::ProteinFdr,
    FilterKind::ProteinQValue,
    FilterKind::ProteinDecoy,
    FilterKind::NrPeptidesPerProtein,
    FilterKind::NrPsmsPerProtein,
    FilterKind::NrSpectraPerProtein,
    FilterKind::NrGroupUniquePeptidesPerProtein,
    FilterKind::ProteinAccessions,
];

impl FilterKind {
    pub fn all() -> &'static [FilterKind] {
        ALL_FILTERS
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::PsmScore => "psm_score_filter",
            Self::PsmRank => "psm_rank_filter",
            Self::PsmCharge => "charge_filter",
            Self::PsmDecoy => "psm_decoy_filter",
            Self::PsmQValue => "psm_q_value_filter",
            Self::PsmAccessions => "psm_accessions_filter",
            Self::PsmSequence => "psm_sequence_filter",
            Self::PeptideNrPsms => "peptide_nr_psms_filter",
            Self::PeptideNrSpectra => "peptide_nr_spectra_filter",
            Self::PeptideSequence => "peptide_sequence_filter",
            Self::PeptideAccessions => "peptide_accessions_filter",
            Self::ProteinScore => "protein_score_filter",
            Self::ProteinFdr => "protein_fdr_filter",
            Self::ProteinQValue => "protein_q_value_filter",
            Self::ProteinDecoy => "protein_decoy_filter",
            Self::NrPeptidesPerProtein => "nr_peptides_per_protein_filter",
            Self::NrPsmsPerProtein => "nr_psms_per_protein_filter",
            Self::NrSpectraPerProtein => "nr_spectra_per_protein_filter",
            Self::NrGroupUniquePeptidesPerProtein => "nr_group_unique_peptides_per_protein_filter",
            Self::ProteinAccessions => "protein_accessions_filter",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PsmScore => "PSM score",
            Self::PsmRank => "PSM rank",
            Self::PsmCharge => "Charge",
            Self::PsmDecoy => "PSM is decoy",
            Self::PsmQValue => "PSM q-value",
            Self::PsmAccessions => "PSM accessions",
            Self::PsmSequence => "PSM sequence",
            Self::PeptideNrPsms => "#PSMs per peptide",
            Self::PeptideNrSpectra => "#spectra per peptide",
            Self::PeptideSequence => "Peptide sequence",
            Self::PeptideAccessions => "Peptide accessions",
            Self::ProteinScore => "Protein score",
            Self::ProteinFdr => "Protein FDR",
            Self::ProteinQValue => "Protein q-value",
            Self::ProteinDecoy => "Protein is decoy",
            Self::NrPeptidesPerProtein => "#peptides per protein",
            Self::NrPsmsPerProtein => "#PSMs per protein",
            Self::NrSpectraPerProtein => "#spectra per protein",
            Self::NrGroupUniquePeptidesPerProtein => "#group unique peptides per protein",
            Self::ProteinAccessions => "Protein accessions",
        }
    }

    pub fn level(&self) -> FilterLevel {
        match self {
            Self::PsmScore
            | Self::PsmRank
            | Self::PsmCharge
            | Self::PsmDecoy
            | Self::PsmQValue
            | Self::PsmAccessions
            | Self::PsmSequence => FilterLevel::PSM,
            Self::PeptideNrPsms
            | Self::PeptideNrSpectra
            | Self::PeptideSequence
            | Self::PeptideAccessions => FilterLevel::PEPTIDE,
            _ => FilterLevel::PROTEIN,
        }
    }

    pub fn value_type(&self) -> FilterValueType {
        match self {
            Self::PsmDecoy | Self::ProteinDecoy => FilterValueType::Boolean,
            Self::PsmSequence | Self::PeptideSequence => FilterValueType::Text,
            Self::PsmAccessions | Self::PeptideAccessions | Self::ProteinAccessions => {
                FilterValueType::TextList
            }
            _ => FilterValueType::Numeric,
        }
    }

    /// The comparators that can be used with this filter
    pub fn permitted_comparators(&self) -> Vec<FilterComparator> {
        let value_type = self.value_type();
        FilterComparator::all()
            .iter()
            .copied()
            .filter(|c| c.supports(value_type))
            .collect()
    }

    /// Whether the filter reads a named score and must be given a score name
    pub fn needs_score_name(&self) -> bool {
        matches!(self, Self::PsmScore)
    }

    pub fn from_short_name(short_name: &str) -> Option<FilterKind> {
        ALL_FILTERS
            .iter()
            .find(|k| k.short_name() == short_name)
            .copied()
    }
}

impl Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
