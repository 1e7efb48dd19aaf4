use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::fdr::{
    self, CombinationMethod, DecoyCandidate, DecoyCounts, DecoyStrategy, FdrEntity, FdrError,
    FdrSummary,
};
use crate::filter::{FilterInput, FilterKind, Filterable};
use crate::graph::{AccessionId, EvidenceGraph, FileId, InputFile, PeptideId, PsmId};
use crate::score::{
    ScoreModel, ScoreRegistry, PSM_COMBINED_FDR_SCORE, PSM_FDR_SCORE, PSM_Q_VALUE,
};

/// Ranks PSM sets while their combined FDR score is being derived
const AVERAGED_FDR_SCORE: &str = "psm_averaged_fdr_score";

/// A PSM of one input file, carrying the FDR state of that file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportPsm {
    pub psm: PsmId,
    pub file: FileId,
    pub spectrum_id: String,
    pub peptide: PeptideId,
    pub sequence: String,
    pub accession_ids: Vec<AccessionId>,
    pub accessions: Vec<String>,
    pub charge: Option<i32>,
    pub rank: Option<u32>,
    /// Raw engine scores and the scores derived for this PSM
    pub scores: IndexMap<String, f64>,
    pub engine_decoy: Option<bool>,
    pub decoy: bool,
    pub fdr: Option<f64>,
    pub q_value: Option<f64>,
    pub fdr_rank: Option<usize>,
}

impl ReportPsm {
    fn from_graph(graph: &EvidenceGraph, id: PsmId) -> Option<Self> {
        let psm = graph.psm(id)?;
        let peptide = graph.peptide(psm.peptide)?;
        Some(Self {
            psm: id,
            file: psm.file,
            spectrum_id: psm.spectrum_id.clone(),
            peptide: psm.peptide,
            sequence: peptide.sequence.clone(),
            accession_ids: psm.accessions.clone(),
            accessions: graph
                .accession_names(&psm.accessions)
                .into_iter()
                .map(String::from)
                .collect(),
            charge: psm.charge,
            rank: psm.rank,
            scores: psm.scores.clone(),
            engine_decoy: psm.engine_decoy,
            decoy: false,
            fdr: None,
            q_value: None,
            fdr_rank: None,
        })
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.scores.get(name).copied()
    }

    pub fn fdr_score(&self) -> Option<f64> {
        self.score(PSM_FDR_SCORE)
    }
}

impl DecoyCandidate for ReportPsm {
    fn decoy_accessions(&self) -> Vec<&str> {
        self.accessions.iter().map(|s| s.as_str()).collect()
    }

    fn engine_decoy(&self) -> Option<bool> {
        self.engine_decoy
    }

    fn set_decoy(&mut self, decoy: bool) {
        self.decoy = decoy;
    }
}

impl FdrEntity for ReportPsm {
    fn ranking_score(&self, model: &ScoreModel) -> Option<f64> {
        self.score(&model.short_name)
    }

    fn is_decoy(&self) -> bool {
        self.decoy
    }

    fn set_fdr(&mut self, rank: Option<usize>, fdr: Option<f64>, q_value: Option<f64>) {
        self.fdr_rank = rank;
        self.fdr = fdr;
        self.q_value = q_value;
        match q_value {
            Some(q) => self.scores.insert(PSM_Q_VALUE.to_string(), q),
            None => self.scores.shift_remove(PSM_Q_VALUE),
        };
    }

    fn set_fdr_score(&mut self, fdr_score: Option<f64>) {
        match fdr_score {
            Some(s) => self.scores.insert(PSM_FDR_SCORE.to_string(), s),
            None => self.scores.shift_remove(PSM_FDR_SCORE),
        };
    }
}

impl Filterable for ReportPsm {
    fn filter_input(&self, kind: FilterKind, score_name: Option<&str>) -> Option<FilterInput<'_>> {
        match kind {
            FilterKind::PsmScore => score_name.and_then(|n| self.score(n)).map(FilterInput::Number),
            FilterKind::PsmRank => self.rank.map(|r| FilterInput::Number(r as f64)),
            FilterKind::PsmCharge => self.charge.map(|c| FilterInput::Number(c as f64)),
            FilterKind::PsmDecoy => Some(FilterInput::Flag(self.decoy)),
            FilterKind::PsmQValue => self.q_value.map(FilterInput::Number),
            FilterKind::PsmAccessions => Some(FilterInput::TextList(
                self.accessions.iter().map(|s| s.as_str()).collect(),
            )),
            FilterKind::PsmSequence => Some(FilterInput::Text(Cow::Borrowed(&self.sequence))),
            _ => None,
        }
    }
}

/// The PSMs of one spectrum identified as one peptide, possibly by several
/// search engines.
///
/// Scores are looked up on the set's own derived scores first, then on the best
/// value any member carries in the direction of that score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportPsmSet {
    pub spectrum_id: String,
    pub peptide: PeptideId,
    pub sequence: String,
    pub accession_ids: Vec<AccessionId>,
    pub accessions: Vec<String>,
    pub members: Vec<ReportPsm>,
    /// Best member value per score name
    pub scores: IndexMap<String, f64>,
    /// Scores computed for the set as a whole
    pub derived: IndexMap<String, f64>,
    pub decoy: bool,
    pub fdr: Option<f64>,
    pub q_value: Option<f64>,
    pub fdr_rank: Option<usize>,
}

impl ReportPsmSet {
    fn new(members: Vec<ReportPsm>) -> Self {
        let (spectrum_id, peptide, sequence) = members
            .first()
            .map(|m| (m.spectrum_id.clone(), m.peptide, m.sequence.clone()))
            .unwrap_or_default();
        let mut accessions: Vec<(AccessionId, String)> = members
            .iter()
            .flat_map(|m| m.accession_ids.iter().copied().zip(m.accessions.iter().cloned()))
            .collect();
        accessions.sort();
        accessions.dedup();
        let (accession_ids, accessions) = accessions.into_iter().unzip();
        Self {
            spectrum_id,
            peptide,
            sequence,
            accession_ids,
            accessions,
            members,
            scores: IndexMap::new(),
            derived: IndexMap::new(),
            decoy: false,
            fdr: None,
            q_value: None,
            fdr_rank: None,
        }
    }

    /// A set holding only one PSM, standing for that PSM in single-file reports
    pub fn single(psm: ReportPsm) -> Self {
        let mut set = Self::new(vec![psm]);
        if let Some(member) = set.members.first() {
            set.scores = member.scores.clone();
            set.decoy = member.decoy;
            set.fdr = member.fdr;
            set.q_value = member.q_value;
            set.fdr_rank = member.fdr_rank;
        }
        set
    }

    pub(crate) fn refresh_scores(&mut self, registry: &ScoreRegistry) {
        let mut scores: IndexMap<String, f64> = IndexMap::new();
        for member in self.members.iter() {
            for (name, value) in member.scores.iter() {
                let model = registry.model_for(name);
                let best = model.best_of(scores.get(name).copied(), Some(*value));
                if let Some(best) = best {
                    scores.insert(name.clone(), best);
                }
            }
        }
        self.scores = scores;
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.derived
            .get(name)
            .or_else(|| self.scores.get(name))
            .copied()
    }

    pub fn combined_fdr_score(&self) -> Option<f64> {
        self.derived.get(PSM_COMBINED_FDR_SCORE).copied()
    }

    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.members.iter().map(|m| m.file)
    }

    pub fn best_rank(&self) -> Option<u32> {
        self.members.iter().filter_map(|m| m.rank).min()
    }

    pub fn charge(&self) -> Option<i32> {
        self.members.iter().find_map(|m| m.charge)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl DecoyCandidate for ReportPsmSet {
    fn decoy_accessions(&self) -> Vec<&str> {
        self.accessions.iter().map(|s| s.as_str()).collect()
    }

    fn engine_decoy(&self) -> Option<bool> {
        let flags: Vec<bool> = self.members.iter().filter_map(|m| m.engine_decoy).collect();
        if flags.is_empty() {
            None
        } else {
            Some(flags.iter().all(|f| *f))
        }
    }

    fn set_decoy(&mut self, decoy: bool) {
        self.decoy = decoy;
    }
}

impl FdrEntity for ReportPsmSet {
    fn ranking_score(&self, model: &ScoreModel) -> Option<f64> {
        self.score(&model.short_name)
    }

    fn is_decoy(&self) -> bool {
        self.decoy
    }

    fn set_fdr(&mut self, rank: Option<usize>, fdr: Option<f64>, q_value: Option<f64>) {
        self.fdr_rank = rank;
        self.fdr = fdr;
        self.q_value = q_value;
        match q_value {
            Some(q) => self.derived.insert(PSM_Q_VALUE.to_string(), q),
            None => self.derived.shift_remove(PSM_Q_VALUE),
        };
    }

    /// The FDR score over all files is the combined FDR score
    fn set_fdr_score(&mut self, fdr_score: Option<f64>) {
        match fdr_score {
            Some(s) => self.derived.insert(PSM_COMBINED_FDR_SCORE.to_string(), s),
            None => self.derived.shift_remove(PSM_COMBINED_FDR_SCORE),
        };
    }
}

impl Filterable for ReportPsmSet {
    fn filter_input(&self, kind: FilterKind, score_name: Option<&str>) -> Option<FilterInput<'_>> {
        match kind {
            FilterKind::PsmScore => score_name.and_then(|n| self.score(n)).map(FilterInput::Number),
            FilterKind::PsmRank => self.best_rank().map(|r| FilterInput::Number(r as f64)),
            FilterKind::PsmCharge => self.charge().map(|c| FilterInput::Number(c as f64)),
            FilterKind::PsmDecoy => Some(FilterInput::Flag(self.decoy)),
            FilterKind::PsmQValue => self.q_value.map(FilterInput::Number),
            FilterKind::PsmAccessions => Some(FilterInput::TextList(
                self.accessions.iter().map(|s| s.as_str()).collect(),
            )),
            FilterKind::PsmSequence => Some(FilterInput::Text(Cow::Borrowed(&self.sequence))),
            _ => None,
        }
    }
}

/// PSM-level view over an [`EvidenceGraph`]: one [`ReportPsm`] per graph PSM and
/// one [`ReportPsmSet`] per spectrum and peptide across all files.
///
/// Decoy states, FDR statistics and derived scores live here, the graph is
/// only ever read.
#[derive(Debug, Clone)]
pub struct PsmReport {
    files: Vec<InputFile>,
    scores: ScoreRegistry,
    sets: Vec<ReportPsmSet>,
    locations: HashMap<PsmId, (usize, usize)>,
    overall_decoys: bool,
}

impl PsmReport {
    pub fn new(graph: &EvidenceGraph) -> Self {
        let mut set_index: IndexMap<(&str, PeptideId), Vec<ReportPsm>> = IndexMap::new();
        for psm in graph.psms() {
            if let Some(report_psm) = ReportPsm::from_graph(graph, psm.id) {
                set_index
                    .entry((psm.spectrum_id.as_str(), psm.peptide))
                    .or_default()
                    .push(report_psm);
            }
        }

        let mut scores = graph.scores().clone();
        let mut sets = Vec::with_capacity(set_index.len());
        let mut locations = HashMap::new();
        for (i, (_, members)) in set_index.into_iter().enumerate() {
            for (j, member) in members.iter().enumerate() {
                locations.insert(member.psm, (i, j));
            }
            let mut set = ReportPsmSet::new(members);
            set.refresh_scores(&scores);
            sets.push(set);
        }
        scores.observe(PSM_FDR_SCORE);
        scores.observe(PSM_Q_VALUE);
        log::debug!(
            "Created {} PSM sets from {} PSMs",
            sets.len(),
            graph.psms().len()
        );
        Self {
            files: graph.files().to_vec(),
            scores,
            sets,
            locations,
            overall_decoys: false,
        }
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    /// Every score a PSM or PSM set of this report may carry
    pub fn scores(&self) -> &ScoreRegistry {
        &self.scores
    }

    pub fn psm(&self, id: PsmId) -> Option<&ReportPsm> {
        self.locations
            .get(&id)
            .and_then(|(i, j)| self.sets.get(*i).and_then(|s| s.members.get(*j)))
    }

    pub fn psms(&self, file: FileId) -> impl Iterator<Item = &ReportPsm> + '_ {
        self.sets
            .iter()
            .flat_map(|s| s.members.iter())
            .filter(move |m| m.file == file)
    }

    fn check_file(&self, file: FileId) -> Result<(), FdrError> {
        if file == FileId::OVERALL || self.files.iter().any(|f| f.id == file) {
            Ok(())
        } else {
            Err(FdrError::UnknownFile(file.0))
        }
    }

    fn psms_mut(&mut self, file: FileId) -> Vec<&mut ReportPsm> {
        self.sets
            .iter_mut()
            .flat_map(|s| s.members.iter_mut())
            .filter(|m| m.file == file)
            .collect()
    }

    /// Mark the PSMs of `file` as decoy or target. For [`FileId::OVERALL`] the
    /// PSM sets are marked instead.
    pub fn update_decoy_states(
        &mut self,
        file: FileId,
        strategy: &DecoyStrategy,
    ) -> Result<DecoyCounts, FdrError> {
        self.check_file(file)?;
        let counts = if file == FileId::OVERALL {
            self.overall_decoys = true;
            fdr::update_decoy_states(&mut self.sets, strategy)
        } else {
            let mut psms = self.psms_mut(file);
            fdr::update_decoy_states(&mut psms, strategy)
        };
        Ok(counts)
    }

    /// Rank the PSMs of `file` (or the PSM sets, for [`FileId::OVERALL`]) by
    /// `score_name` and annotate them with FDR, q-value and FDR score
    pub fn calculate_fdr(&mut self, file: FileId, score_name: &str) -> Result<FdrSummary, FdrError> {
        self.check_file(file)?;
        let model = self
            .scores
            .get(score_name)
            .cloned()
            .ok_or_else(|| FdrError::UnknownScore(score_name.to_string()))?;
        let summary = if file == FileId::OVERALL {
            self.derive_overall_decoys();
            self.scores.observe(PSM_COMBINED_FDR_SCORE);
            fdr::calculate_fdr(&mut self.sets, &model)
        } else {
            let mut psms = self.psms_mut(file);
            let summary = fdr::calculate_fdr(&mut psms, &model);
            for set in self.sets.iter_mut() {
                set.refresh_scores(&self.scores);
            }
            summary
        };
        log::debug!("FDR for file {} by {}: {:?}", file.0, model.short_name, summary);
        Ok(summary)
    }

    /// The score each file's FDR is ranked by when none is requested: the first
    /// well-known score its PSMs carry, or else the first score at all
    pub fn default_score(&self, file: FileId) -> Option<String> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for psm in self.psms(file) {
            for name in psm.scores.keys() {
                if name != PSM_FDR_SCORE && name != PSM_Q_VALUE {
                    seen.insert(name.as_str());
                }
            }
        }
        seen.iter()
            .find(|n| ScoreModel::known(n).is_some())
            .or_else(|| seen.first())
            .map(|n| n.to_string())
    }

    /// Calculate the FDR of every input file, each ranked by its
    /// [`PsmReport::default_score`]
    pub fn calculate_all_fdr(&mut self) -> Result<IndexMap<FileId, FdrSummary>, FdrError> {
        let mut summaries = IndexMap::new();
        let files: Vec<FileId> = self.files.iter().map(|f| f.id).collect();
        for file in files {
            match self.default_score(file) {
                Some(score) => {
                    summaries.insert(file, self.calculate_fdr(file, &score)?);
                }
                None => log::warn!("File {} has no scores to calculate an FDR with", file.0),
            }
        }
        Ok(summaries)
    }

    fn derive_overall_decoys(&mut self) {
        if self.overall_decoys {
            return;
        }
        for set in self.sets.iter_mut() {
            set.decoy = set.members.iter().all(|m| m.decoy);
        }
    }

    /// Merge the per-file FDR scores of each PSM set with `method` and rank the
    /// sets by the result, which yields the combined FDR score of every set.
    ///
    /// Members of files without a calculated FDR do not contribute. Sets with no
    /// contributing member stay without a combined FDR score.
    pub fn calculate_combined_fdr_score(&mut self, method: CombinationMethod) -> FdrSummary {
        self.derive_overall_decoys();
        for set in self.sets.iter_mut() {
            let fdr_scores: Vec<f64> = set.members.iter().filter_map(|m| m.fdr_score()).collect();
            match method.combine(&fdr_scores) {
                Some(value) => set.derived.insert(AVERAGED_FDR_SCORE.to_string(), value),
                None => set.derived.shift_remove(AVERAGED_FDR_SCORE),
            };
        }
        let model = ScoreModel::new(AVERAGED_FDR_SCORE, "averaged FDR score", false);
        let summary = fdr::calculate_fdr(&mut self.sets, &model);
        for set in self.sets.iter_mut() {
            set.derived.shift_remove(AVERAGED_FDR_SCORE);
        }
        self.scores.observe(PSM_COMBINED_FDR_SCORE);
        log::debug!("Combined FDR score by {method}: {summary:?}");
        summary
    }

    /// The PSM sets inference works on. For [`FileId::OVERALL`] these are the
    /// cross-file sets, for a single file every PSM of that file forms its own set.
    pub fn psm_sets(&self, file: FileId) -> Vec<Arc<ReportPsmSet>> {
        if file == FileId::OVERALL {
            self.sets.iter().cloned().map(Arc::new).collect()
        } else {
            self.psms(file)
                .cloned()
                .map(|psm| Arc::new(ReportPsmSet::single(psm)))
                .collect()
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
