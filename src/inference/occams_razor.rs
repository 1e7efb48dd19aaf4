use std::collections::BTreeSet;

use crate::graph::PeptideId;

use super::{greedy_cover, Candidate, InferenceStrategy, Selection};

/// Parsimony over peptides: the same greedy cover as the spectrum extractor,
/// counting distinct peptides instead of spectra
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccamsRazor;

impl OccamsRazor {
    pub const SHORT_NAME: &'static str = "occams_razor";
    pub const NAME: &'static str = "Occam's Razor";
}

impl InferenceStrategy for OccamsRazor {
    fn short_name(&self) -> &'static str {
        Self::SHORT_NAME
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn select(&self, candidates: &[Candidate]) -> Vec<Selection> {
        let units: Vec<BTreeSet<PeptideId>> = candidates.iter().map(|c| c.peptide_ids()).collect();
        greedy_cover(candidates, &units)
    }

    fn boxed_clone(&self) -> Box<dyn InferenceStrategy> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{AccessionId, FileId, PsmId};
    use crate::report::{ReportPeptide, ReportPsm, ReportPsmSet};

    fn peptide(id: usize, spectrum: &str) -> ReportPeptide {
        let set = ReportPsmSet::single(ReportPsm {
            psm: PsmId(id),
            file: FileId(1),
            spectrum_id: spectrum.to_string(),
            peptide: PeptideId(id),
            sequence: format!("PEP{id}K"),
            accession_ids: Vec::new(),
            accessions: Vec::new(),
            charge: None,
            rank: None,
            scores: Default::default(),
            engine_decoy: None,
            decoy: false,
            fdr: None,
            q_value: None,
            fdr_rank: None,
        });
        ReportPeptide::new(PeptideId(id), format!("PEP{id}K"), vec![Arc::new(set)])
    }

    #[test_log::test]
    fn test_counts_peptides() {
        let candidates = vec![
            Candidate {
                accessions: vec![(AccessionId(0), "A".into())],
                peptides: vec![peptide(0, "s1"), peptide(1, "s1")],
            },
            Candidate {
                accessions: vec![(AccessionId(1), "B".into())],
                peptides: vec![peptide(1, "s1")],
            },
        ];
        let selections = OccamsRazor.select(&candidates);
        assert_eq!(
            selections,
            vec![Selection {
                candidate: 0,
                sub_sets: vec![1]
            }]
        );
    }
}
