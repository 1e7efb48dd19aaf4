use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::fdr::{self, DecoyCandidate, DecoyCounts, DecoyStrategy, FdrEntity, FdrSummary};
use crate::filter::{apply_all, Filter, FilterInput, FilterKind, Filterable};
use crate::graph::{AccessionId, GroupId, PeptideId};
use crate::score::ScoreModel;

use super::ReportPsmSet;

/// A peptide as it enters inference: the PSM sets that survived filtering
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportPeptide {
    pub peptide: PeptideId,
    pub sequence: String,
    pub accessions: Vec<String>,
    pub psm_sets: Vec<Arc<ReportPsmSet>>,
}

impl ReportPeptide {
    pub fn new(peptide: PeptideId, sequence: String, psm_sets: Vec<Arc<ReportPsmSet>>) -> Self {
        let mut accessions: Vec<String> = psm_sets
            .iter()
            .flat_map(|s| s.accessions.iter().cloned())
            .collect();
        accessions.sort();
        accessions.dedup();
        Self {
            peptide,
            sequence,
            accessions,
            psm_sets,
        }
    }

    pub fn nr_psms(&self) -> usize {
        self.psm_sets.len()
    }

    /// Distinct spectrum identifiers of this peptide's PSM sets
    pub fn spectra(&self) -> impl Iterator<Item = &str> + '_ {
        let mut seen = HashSet::new();
        self.psm_sets
            .iter()
            .map(|s| s.spectrum_id.as_str())
            .filter(move |s| seen.insert(*s))
    }

    pub fn nr_spectra(&self) -> usize {
        self.spectra().count()
    }
}

impl Filterable for ReportPeptide {
    fn filter_input(&self, kind: FilterKind, _score_name: Option<&str>) -> Option<FilterInput<'_>> {
        match kind {
            FilterKind::PeptideNrPsms => Some(FilterInput::Number(self.nr_psms() as f64)),
            FilterKind::PeptideNrSpectra => Some(FilterInput::Number(self.nr_spectra() as f64)),
            FilterKind::PeptideSequence => Some(FilterInput::Text(Cow::Borrowed(&self.sequence))),
            FilterKind::PeptideAccessions => Some(FilterInput::TextList(
                self.accessions.iter().map(|s| s.as_str()).collect(),
            )),
            _ => None,
        }
    }
}

/// Identifies a [`ReportProtein`] within one inference result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProteinId(pub usize);

/// An inferred protein: one or more accessions with identical explained evidence,
/// the peptides that evidence consists of, and the proteins whose evidence is
/// contained in it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportProtein {
    pub id: ProteinId,
    pub group: GroupId,
    pub accession_ids: Vec<AccessionId>,
    /// Accession strings in ascending order, the first one represents the protein
    pub accessions: Vec<String>,
    pub peptides: Vec<ReportPeptide>,
    /// `None` when the protein could not be scored, which is not the same as a zero score
    pub score: Option<f64>,
    pub decoy: bool,
    pub fdr: Option<f64>,
    pub q_value: Option<f64>,
    pub rank: Option<usize>,
    /// Peptides no other reported protein of the same group explains
    pub nr_group_unique_peptides: usize,
    /// Unreported proteins whose evidence this one contains. A subset protein
    /// contained in several reported proteins is shared between them.
    pub sub_sets: Vec<Arc<ReportProtein>>,
}

impl ReportProtein {
    pub fn new(
        id: ProteinId,
        group: GroupId,
        mut accessions: Vec<(AccessionId, String)>,
        peptides: Vec<ReportPeptide>,
    ) -> Self {
        accessions.sort_by(|a, b| a.1.cmp(&b.1));
        let (accession_ids, accessions) = accessions.into_iter().unzip();
        Self {
            id,
            group,
            accession_ids,
            accessions,
            peptides,
            score: None,
            decoy: false,
            fdr: None,
            q_value: None,
            rank: None,
            nr_group_unique_peptides: 0,
            sub_sets: Vec::new(),
        }
    }

    /// The representative accession string
    pub fn accession(&self) -> &str {
        self.accessions.first().map(|s| s.as_str()).unwrap_or_default()
    }

    pub fn psm_sets(&self) -> impl Iterator<Item = &Arc<ReportPsmSet>> + '_ {
        self.peptides.iter().flat_map(|p| p.psm_sets.iter())
    }

    pub fn spectra(&self) -> HashSet<&str> {
        self.psm_sets().map(|s| s.spectrum_id.as_str()).collect()
    }

    pub fn nr_peptides(&self) -> usize {
        self.peptides.len()
    }

    pub fn nr_psms(&self) -> usize {
        self.psm_sets().count()
    }

    pub fn nr_spectra(&self) -> usize {
        self.spectra().len()
    }

    pub fn peptide_ids(&self) -> HashSet<PeptideId> {
        self.peptides.iter().map(|p| p.peptide).collect()
    }
}

/// The distinct subset proteins of `proteins`, in order of first reference
pub(crate) fn distinct_sub_proteins(proteins: &[ReportProtein]) -> Vec<&ReportProtein> {
    let mut seen: HashSet<ProteinId> = HashSet::new();
    proteins
        .iter()
        .flat_map(|p| p.sub_sets.iter())
        .filter(|sub| seen.insert(sub.id))
        .map(|sub| &**sub)
        .collect()
}

/// Apply `update` once per distinct subset protein of `proteins`. Every
/// protein referencing the same subset ends up sharing the one updated copy.
pub(crate) fn update_sub_proteins<F: FnMut(&mut ReportProtein)>(proteins: &mut [ReportProtein], mut update: F) {
    let mut updated: HashMap<ProteinId, Arc<ReportProtein>> = HashMap::new();
    for protein in proteins.iter_mut() {
        for sub in protein.sub_sets.iter_mut() {
            let shared = updated.entry(sub.id).or_insert_with(|| {
                let mut copy = ReportProtein::clone(&**sub);
                update(&mut copy);
                Arc::new(copy)
            });
            *sub = Arc::clone(shared);
        }
    }
}

impl DecoyCandidate for ReportProtein {
    fn decoy_accessions(&self) -> Vec<&str> {
        self.accessions.iter().map(|s| s.as_str()).collect()
    }

    /// Decoy when every supporting PSM set is a decoy
    fn engine_decoy(&self) -> Option<bool> {
        let mut sets = self.psm_sets().peekable();
        sets.peek()?;
        Some(sets.all(|s| s.decoy))
    }

    fn set_decoy(&mut self, decoy: bool) {
        self.decoy = decoy;
    }
}

impl FdrEntity for ReportProtein {
    fn ranking_score(&self, _model: &ScoreModel) -> Option<f64> {
        self.score
    }

    fn is_decoy(&self) -> bool {
        self.decoy
    }

    fn set_fdr(&mut self, rank: Option<usize>, fdr: Option<f64>, q_value: Option<f64>) {
        self.rank = rank;
        self.fdr = fdr;
        self.q_value = q_value;
    }
}

impl Filterable for ReportProtein {
    fn filter_input(&self, kind: FilterKind, _score_name: Option<&str>) -> Option<FilterInput<'_>> {
        match kind {
            FilterKind::ProteinScore => self.score.map(FilterInput::Number),
            FilterKind::ProteinFdr => self.fdr.map(FilterInput::Number),
            FilterKind::ProteinQValue => self.q_value.map(FilterInput::Number),
            FilterKind::ProteinDecoy => Some(FilterInput::Flag(self.decoy)),
            FilterKind::NrPeptidesPerProtein => Some(FilterInput::Number(self.nr_peptides() as f64)),
            FilterKind::NrPsmsPerProtein => Some(FilterInput::Number(self.nr_psms() as f64)),
            FilterKind::NrSpectraPerProtein => Some(FilterInput::Number(self.nr_spectra() as f64)),
            FilterKind::NrGroupUniquePeptidesPerProtein => {
                Some(FilterInput::Number(self.nr_group_unique_peptides as f64))
            }
            FilterKind::ProteinAccessions => Some(FilterInput::TextList(self.decoy_accessions())),
            _ => None,
        }
    }
}

/// The proteins of one inference run, with protein-level decoy and FDR state
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProteinReport {
    proteins: Vec<ReportProtein>,
    score_model: ScoreModel,
}

impl ProteinReport {
    /// `score_model` describes the protein scores, normally the scoring
    /// strategy's protein score model
    pub fn new(proteins: Vec<ReportProtein>, score_model: ScoreModel) -> Self {
        Self {
            proteins,
            score_model,
        }
    }

    pub fn proteins(&self) -> &[ReportProtein] {
        &self.proteins
    }

    pub fn into_proteins(self) -> Vec<ReportProtein> {
        self.proteins
    }

    pub fn score_model(&self) -> &ScoreModel {
        &self.score_model
    }

    pub fn get(&self, id: ProteinId) -> Option<&ReportProtein> {
        self.proteins.iter().find(|p| p.id == id)
    }

    pub fn find_by_accession(&self, accession: &str) -> Option<&ReportProtein> {
        self.proteins
            .iter()
            .find(|p| p.accessions.iter().any(|a| a == accession))
    }

    /// Mark reported proteins and their subset proteins as decoy or target.
    /// Only the reported proteins are counted.
    pub fn update_decoy_states(&mut self, strategy: &DecoyStrategy) -> DecoyCounts {
        update_sub_proteins(&mut self.proteins, |sub| {
            let decoy = strategy.is_decoy(&*sub);
            sub.set_decoy(decoy);
        });
        fdr::update_decoy_states(&mut self.proteins, strategy)
    }

    /// Rank the reported proteins by score and annotate FDR, q-value and rank
    pub fn calculate_fdr(&mut self) -> FdrSummary {
        fdr::calculate_fdr(&mut self.proteins, &self.score_model)
    }

    /// The reported proteins passing every filter
    pub fn filtered<'a>(&'a self, filters: &'a [Filter]) -> impl Iterator<Item = &'a ReportProtein> + 'a {
        self.proteins.iter().filter(move |p| apply_all(filters, *p))
    }

    /// Every protein referenced as a subset, once per id
    pub fn sub_proteins(&self) -> Vec<&ReportProtein> {
        distinct_sub_proteins(&self.proteins)
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::filter::FilterComparator;

    fn protein(id: usize, accession: &str, score: Option<f64>) -> ReportProtein {
        let mut p = ReportProtein::new(
            ProteinId(id),
            GroupId(id),
            vec![(AccessionId(id), accession.to_string())],
            Vec::new(),
        );
        p.score = score;
        p
    }

    #[test_log::test]
    fn test_protein_fdr_and_filter() {
        let sub = Arc::new(protein(10, "decoy_S", Some(1.0)));
        let mut top = protein(0, "P1", Some(30.0));
        top.nr_group_unique_peptides = 2;
        top.sub_sets.push(Arc::clone(&sub));
        let mut mid = protein(1, "decoy_P2", Some(20.0));
        mid.sub_sets.push(sub);
        let low = protein(2, "P3", Some(10.0));
        let unscored = protein(3, "P4", None);

        let mut report = ProteinReport::new(
            vec![top, mid, low, unscored],
            ScoreModel::new("protein_score", "protein score", true),
        );
        let counts = report.update_decoy_states(&DecoyStrategy::accession_pattern("^decoy_").unwrap());
        assert_eq!(counts, DecoyCounts { targets: 3, decoys: 1 });
        assert!(report.proteins()[0].sub_sets[0].decoy);
        assert!(Arc::ptr_eq(
            &report.proteins()[0].sub_sets[0],
            &report.proteins()[1].sub_sets[0]
        ));

        let summary = report.calculate_fdr();
        assert_eq!(summary.unscored, 1);
        assert_eq!(report.proteins()[1].fdr, Some(1.0));
        assert_eq!(report.proteins()[2].fdr, Some(0.5));
        assert_eq!(report.proteins()[1].q_value, Some(0.5));
        assert_eq!(report.proteins()[3].q_value, None);

        assert_eq!(report.sub_proteins().len(), 1);

        let filters = vec![Filter::new(
            "nr_group_unique_peptides_per_protein_filter",
            FilterComparator::GreaterEqual,
            2usize,
            false,
        )
        .unwrap()];
        let passing: Vec<&str> = report.filtered(&filters).map(|p| p.accession()).collect();
        assert_eq!(passing, vec!["P1"]);
    }
}
