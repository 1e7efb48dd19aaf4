//! Protein inference over the groups of an evidence graph.
//!
//! The [`InferenceEngine`] filters PSM sets and peptides, turns the accessions of
//! each group into [`Candidate`]s (accessions with identical retained peptides
//! merged into one), lets an [`InferenceStrategy`] pick the proteins to report,
//! and scores the result. Groups share no evidence, so they are inferred
//! independently, in parallel with the `parallelism` feature.
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use crate::filter::{apply_all, Filter, FilterError, FilterKind, FilterLevel};
use crate::graph::{AccessionId, EvidenceGraph, FileId, Group, PeptideId};
use crate::params::SettingError;
use crate::registry::{StrategyRegistry, UnknownStrategy};
use crate::report::{
    update_sub_proteins, ProteinId, ProteinReport, PsmReport, ReportPeptide, ReportProtein, ReportPsmSet,
};
use crate::score::ScoreRegistry;
use crate::scoring::{scoring_registry, ProteinScoring, ScoringError};

mod occams_razor;
mod report_all;
mod spectrum_extractor;

pub use occams_razor::OccamsRazor;
pub use report_all::ReportAll;
pub use spectrum_extractor::SpectrumExtractor;

#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),
    #[error("Filter {0} cannot be applied during inference, only PSM and peptide filters can")]
    UnsupportedFilterLevel(FilterKind),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("No input file with id {0}")]
    UnknownFile(u32),
}

/// Accessions of one group that explain exactly the same retained peptides
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Sorted by accession string
    pub accessions: Vec<(AccessionId, String)>,
    /// Sorted by peptide id
    pub peptides: Vec<ReportPeptide>,
}

impl Candidate {
    /// The representative, lexicographically smallest, accession
    pub fn accession(&self) -> &str {
        self.accessions
            .first()
            .map(|(_, a)| a.as_str())
            .unwrap_or_default()
    }

    pub fn peptide_ids(&self) -> BTreeSet<PeptideId> {
        self.peptides.iter().map(|p| p.peptide).collect()
    }

    pub fn spectra(&self) -> BTreeSet<&str> {
        self.peptides.iter().flat_map(|p| p.spectra()).collect()
    }
}

/// A candidate chosen for the report, with the unreported candidates whose
/// evidence it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub candidate: usize,
    pub sub_sets: Vec<usize>,
}

/// Picks the proteins of one group to report
pub trait InferenceStrategy: Send + Sync + Debug {
    fn short_name(&self) -> &'static str;
    fn name(&self) -> &'static str;

    /// `candidates` are sorted by representative accession and no two of them
    /// have the same peptides. Returns indices into `candidates`.
    fn select(&self, candidates: &[Candidate]) -> Vec<Selection>;

    fn boxed_clone(&self) -> Box<dyn InferenceStrategy>;
}

impl Clone for Box<dyn InferenceStrategy> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Greedy set cover over evidence units.
///
/// Repeatedly selects the candidate adding the most units not yet explained.
/// Ties go to the candidate with more units in total, then more peptides, then
/// the smaller accession, so that a candidate is never picked before one whose
/// evidence contains it. Stops when no candidate adds anything. Every candidate
/// left over is attached to each selected candidate whose units contain its
/// own, or dropped if there is none.
pub(crate) fn greedy_cover<U: Ord>(candidates: &[Candidate], units: &[BTreeSet<U>]) -> Vec<Selection> {
    let mut explained: BTreeSet<&U> = BTreeSet::new();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::new();

    loop {
        let new_units: Vec<usize> = remaining
            .iter()
            .map(|&i| units[i].iter().filter(|u| !explained.contains(u)).count())
            .collect();
        let mut best: Option<usize> = None;
        for (pos, &i) in remaining.iter().enumerate() {
            if new_units[pos] == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let j = remaining[b];
                    (new_units[pos], units[i].len(), candidates[i].peptides.len())
                        > (new_units[b], units[j].len(), candidates[j].peptides.len())
                }
            };
            if better {
                best = Some(pos);
            }
        }
        let Some(pos) = best else {
            break;
        };
        let i = remaining[pos];
        // `remaining` stays in accession order, so the first equal one is the accession tie winner
        if let Some(k) = remaining
            .iter()
            .zip(new_units.iter())
            .find(|(_, n)| **n == new_units[pos])
            .map(|(k, _)| *k)
        {
            if k != i {
                log::debug!(
                    "Selected {} before {} at equal new coverage, it explains more in total",
                    candidates[i].accession(),
                    candidates[k].accession()
                );
            }
        }
        log::trace!(
            "Selected {} explaining {} new units",
            candidates[i].accession(),
            new_units[pos]
        );
        explained.extend(units[i].iter());
        selected.push(i);
        remaining.remove(pos);
    }

    let mut selections: Vec<Selection> = selected
        .iter()
        .map(|&i| Selection {
            candidate: i,
            sub_sets: Vec::new(),
        })
        .collect();
    for j in remaining {
        let mut attached = false;
        for selection in selections.iter_mut() {
            if units[j].is_subset(&units[selection.candidate]) {
                selection.sub_sets.push(j);
                attached = true;
            }
        }
        if !attached {
            log::trace!(
                "Dropped {}, its evidence is explained by several proteins together",
                candidates[j].accession()
            );
        }
    }
    selections
}

pub type InferenceConstructor = fn() -> Box<dyn InferenceStrategy>;

fn new_spectrum_extractor() -> Box<dyn InferenceStrategy> {
    Box::new(SpectrumExtractor)
}

fn new_occams_razor() -> Box<dyn InferenceStrategy> {
    Box::new(OccamsRazor)
}

fn new_report_all() -> Box<dyn InferenceStrategy> {
    Box::new(ReportAll)
}

/// The built-in inference strategies
pub fn inference_registry() -> StrategyRegistry<InferenceConstructor> {
    let mut registry: StrategyRegistry<InferenceConstructor> = StrategyRegistry::new("inference");
    registry.register(
        SpectrumExtractor::SHORT_NAME,
        SpectrumExtractor::NAME,
        new_spectrum_extractor,
    );
    registry.register(OccamsRazor::SHORT_NAME, OccamsRazor::NAME, new_occams_razor);
    registry.register(ReportAll::SHORT_NAME, ReportAll::NAME, new_report_all);
    registry
}

/// Runs one inference strategy with a set of PSM and peptide filters and a
/// protein scoring strategy
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    strategy: Box<dyn InferenceStrategy>,
    scoring: Box<dyn ProteinScoring>,
    filters: Vec<Filter>,
    file: FileId,
}

impl InferenceEngine {
    pub fn new(strategy: Box<dyn InferenceStrategy>, scoring: Box<dyn ProteinScoring>) -> Self {
        Self {
            strategy,
            scoring,
            filters: Vec::new(),
            file: FileId::OVERALL,
        }
    }

    /// Build an engine from the short names of a built-in inference and scoring strategy
    pub fn from_names(
        strategy: &str,
        scoring: &str,
        scores: &ScoreRegistry,
    ) -> Result<Self, InferenceError> {
        let strategy = inference_registry().get(strategy)?();
        let scoring = scoring_registry().get(scoring)?(scores);
        Ok(Self::new(strategy, scoring))
    }

    /// Infer from the PSMs of one file only instead of the PSM sets of all files
    pub fn with_file(mut self, file: FileId) -> Self {
        self.file = file;
        self
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn strategy(&self) -> &dyn InferenceStrategy {
        self.strategy.as_ref()
    }

    pub fn scoring(&self) -> &dyn ProteinScoring {
        self.scoring.as_ref()
    }

    pub fn scoring_mut(&mut self) -> &mut dyn ProteinScoring {
        self.scoring.as_mut()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Add a filter applied to PSM sets or peptides before inference
    pub fn add_filter(&mut self, filter: Filter) -> Result<(), InferenceError> {
        if !(FilterLevel::PSM | FilterLevel::PEPTIDE).contains(filter.level()) {
            return Err(InferenceError::UnsupportedFilterLevel(filter.kind()));
        }
        self.filters.push(filter);
        Ok(())
    }

    pub fn set_scoring_setting(&mut self, id: &str, value: &str) -> Result<String, InferenceError> {
        Ok(self.scoring.set_setting(id, value)?)
    }

    fn retained_peptides(&self, psms: &PsmReport) -> HashMap<PeptideId, ReportPeptide> {
        let mut by_peptide: IndexMap<PeptideId, Vec<Arc<ReportPsmSet>>> = IndexMap::new();
        let mut rejected = 0usize;
        for set in psms.psm_sets(self.file) {
            if self
                .filters
                .iter()
                .filter(|f| f.level() == FilterLevel::PSM)
                .all(|f| f.apply(&*set))
            {
                by_peptide.entry(set.peptide).or_default().push(set);
            } else {
                rejected += 1;
            }
        }
        let peptide_filters: Vec<Filter> = self
            .filters
            .iter()
            .filter(|f| f.level() == FilterLevel::PEPTIDE)
            .cloned()
            .collect();
        let peptides: HashMap<PeptideId, ReportPeptide> = by_peptide
            .into_iter()
            .filter_map(|(id, sets)| {
                let sequence = sets.first().map(|s| s.sequence.clone()).unwrap_or_default();
                let peptide = ReportPeptide::new(id, sequence, sets);
                apply_all(&peptide_filters, &peptide).then_some((id, peptide))
            })
            .collect();
        log::debug!(
            "{} PSM sets failed the PSM filters, {} peptides retained for inference",
            rejected,
            peptides.len()
        );
        peptides
    }

    fn candidates(
        graph: &EvidenceGraph,
        group: &Group,
        peptides: &HashMap<PeptideId, ReportPeptide>,
    ) -> Vec<Candidate> {
        let mut merged: BTreeMap<Vec<PeptideId>, Vec<(AccessionId, String)>> = BTreeMap::new();
        for accession_id in group.accessions() {
            let Some(accession) = graph.accession(*accession_id) else {
                continue;
            };
            let mut retained: Vec<PeptideId> = accession
                .peptides()
                .iter()
                .copied()
                .filter(|p| peptides.contains_key(p))
                .collect();
            if retained.is_empty() {
                continue;
            }
            retained.sort();
            merged
                .entry(retained)
                .or_default()
                .push((accession.id, accession.accession.clone()));
        }
        let mut candidates: Vec<Candidate> = merged
            .into_iter()
            .map(|(peptide_ids, mut accessions)| {
                accessions.sort_by(|a, b| a.1.cmp(&b.1));
                Candidate {
                    accessions,
                    peptides: peptide_ids
                        .iter()
                        .filter_map(|p| peptides.get(p).cloned())
                        .collect(),
                }
            })
            .collect();
        candidates.sort_by(|a, b| a.accession().cmp(b.accession()));
        candidates
    }

    /// Infer the proteins of one group. Protein ids are candidate indices, made
    /// unique across groups by the caller.
    fn infer_group(
        &self,
        graph: &EvidenceGraph,
        group: &Group,
        peptides: &HashMap<PeptideId, ReportPeptide>,
    ) -> (Vec<ReportProtein>, usize) {
        let candidates = Self::candidates(graph, group, peptides);
        if candidates.is_empty() {
            return (Vec::new(), 0);
        }
        let selections = self.strategy.select(&candidates);
        let build = |i: usize| {
            let candidate = &candidates[i];
            ReportProtein::new(
                ProteinId(i),
                group.id,
                candidate.accessions.clone(),
                candidate.peptides.clone(),
            )
        };
        let mut sub_proteins: HashMap<usize, Arc<ReportProtein>> = HashMap::new();
        let mut proteins: Vec<ReportProtein> = selections
            .iter()
            .map(|selection| {
                let mut protein = build(selection.candidate);
                protein.sub_sets = selection
                    .sub_sets
                    .iter()
                    .map(|j| Arc::clone(sub_proteins.entry(*j).or_insert_with(|| Arc::new(build(*j)))))
                    .collect();
                protein
            })
            .collect();

        let mut peptide_owners: HashMap<PeptideId, usize> = HashMap::new();
        for protein in proteins.iter() {
            for peptide in protein.peptides.iter() {
                *peptide_owners.entry(peptide.peptide).or_default() += 1;
            }
        }
        for protein in proteins.iter_mut() {
            protein.nr_group_unique_peptides = protein
                .peptides
                .iter()
                .filter(|p| peptide_owners.get(&p.peptide) == Some(&1))
                .count();
        }
        (proteins, candidates.len())
    }

    #[cfg(feature = "parallelism")]
    fn infer_groups(
        &self,
        graph: &EvidenceGraph,
        peptides: &HashMap<PeptideId, ReportPeptide>,
    ) -> Vec<(Vec<ReportProtein>, usize)> {
        graph
            .groups()
            .par_iter()
            .map(|group| self.infer_group(graph, group, peptides))
            .collect()
    }

    #[cfg(not(feature = "parallelism"))]
    fn infer_groups(
        &self,
        graph: &EvidenceGraph,
        peptides: &HashMap<PeptideId, ReportPeptide>,
    ) -> Vec<(Vec<ReportProtein>, usize)> {
        graph
            .groups()
            .iter()
            .map(|group| self.infer_group(graph, group, peptides))
            .collect()
    }

    /// Infer and score the proteins of `graph` from the PSM-level state in `psms`.
    ///
    /// Proteins come out in group order, and within a group in selection order.
    pub fn infer(
        &self,
        graph: &EvidenceGraph,
        psms: &PsmReport,
    ) -> Result<Vec<ReportProtein>, InferenceError> {
        if self.file != FileId::OVERALL && graph.file(self.file).is_none() {
            return Err(InferenceError::UnknownFile(self.file.0));
        }
        let peptides = self.retained_peptides(psms);
        let per_group = self.infer_groups(graph, &peptides);

        let mut proteins = Vec::new();
        let mut offset = 0;
        for (mut group_proteins, n_candidates) in per_group {
            update_sub_proteins(&mut group_proteins, |sub| sub.id = ProteinId(sub.id.0 + offset));
            for mut protein in group_proteins {
                protein.id = ProteinId(protein.id.0 + offset);
                proteins.push(protein);
            }
            offset += n_candidates;
        }

        let mut scoring = self.scoring.boxed_clone();
        scoring.update_available_scores(psms.scores());
        scoring.calculate_protein_scores(&mut proteins);

        let sub_proteins: HashSet<ProteinId> = proteins
            .iter()
            .flat_map(|p| p.sub_sets.iter().map(|s| s.id))
            .collect();
        log::debug!(
            "{} inferred {} proteins with {} subset proteins from {} groups",
            self.strategy.name(),
            proteins.len(),
            sub_proteins.len(),
            graph.groups().len()
        );
        Ok(proteins)
    }

    /// [`InferenceEngine::infer`], wrapped into a [`ProteinReport`] ranked by this
    /// engine's protein score
    pub fn infer_report(
        &self,
        graph: &EvidenceGraph,
        psms: &PsmReport,
    ) -> Result<ProteinReport, InferenceError> {
        let proteins = self.infer(graph, psms)?;
        let mut scoring = self.scoring.boxed_clone();
        scoring.update_available_scores(psms.scores());
        Ok(ProteinReport::new(proteins, scoring.protein_score_model()))
    }
}
