//! Protein scoring strategies.
//!
//! A strategy reads one named score off the PSM sets of each peptide of a
//! protein, picks either the best value per peptide or all of them, and
//! aggregates the picked values into the protein's score. Concrete strategies
//! only differ in the aggregation.
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use crate::params::{set_by_id, Setting, SettingError, SettingLike};
use crate::registry::{StrategyRegistry, UnknownStrategy};
use crate::report::{distinct_sub_proteins, update_sub_proteins, ProteinId, ReportProtein};
use crate::score::{ScoreModel, ScoreRegistry, PSM_COMBINED_FDR_SCORE, PSM_FDR_SCORE, PSM_Q_VALUE};

mod additive;
mod best;
mod multiplicative;

pub use additive::AdditiveScoring;
pub use best::BestScoring;
pub use multiplicative::MultiplicativeScoring;

/// Setting id of the score read off the PSMs
pub const USED_SCORE: &str = "used_score";
/// Setting id of the PSM selection per peptide
pub const USED_SPECTRA: &str = "used_spectra";

/// Which PSMs of a peptide contribute to its protein's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PsmForScoring {
    /// Only the best scoring PSM per peptide
    #[default]
    OnlyBest,
    All,
}

impl PsmForScoring {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::OnlyBest => "best",
            Self::All => "all",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OnlyBest => "use only the best PSM per peptide",
            Self::All => "use all PSMs per peptide",
        }
    }

    fn choices() -> IndexMap<String, String> {
        [Self::OnlyBest, Self::All]
            .into_iter()
            .map(|p| (p.short_name().to_string(), p.name().to_string()))
            .collect()
    }
}

impl Display for PsmForScoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for PsmForScoring {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(Self::OnlyBest),
            "all" => Ok(Self::All),
            _ => Err(SettingError::InvalidValue {
                setting: USED_SPECTRA.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),
    #[error(transparent)]
    Setting(#[from] SettingError),
}

/// The settings every scoring strategy shares, plus the scores it may choose from
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoringSettings {
    pub used_score: Setting<String>,
    pub used_spectra: Setting<PsmForScoring>,
    available: ScoreRegistry,
}

/// The first score searched for by an engine, falling back to the first derived score
fn initial_score(available: &ScoreRegistry) -> Option<String> {
    let derived = [PSM_FDR_SCORE, PSM_COMBINED_FDR_SCORE, PSM_Q_VALUE];
    available
        .iter()
        .find(|m| !derived.contains(&m.short_name.as_str()))
        .or_else(|| available.iter().next())
        .map(|m| m.short_name.clone())
}

impl ScoringSettings {
    /// Starts out scoring by the first score of `available`
    pub fn new(available: &ScoreRegistry) -> Self {
        let used_score = Setting::new(
            USED_SCORE,
            "Score used for protein scoring",
            initial_score(available),
            available.name_map(),
            false,
        );
        let used_spectra = Setting::new(
            USED_SPECTRA,
            "PSMs used for scoring",
            Some(PsmForScoring::default()),
            PsmForScoring::choices(),
            true,
        );
        Self {
            used_score,
            used_spectra,
            available: available.clone(),
        }
    }

    pub fn available_scores(&self) -> &ScoreRegistry {
        &self.available
    }

    pub fn score_name(&self) -> Option<&str> {
        self.used_score.value().map(|s| s.as_str())
    }

    pub fn psm_for_scoring(&self) -> PsmForScoring {
        self.used_spectra.value().copied().unwrap_or_default()
    }

    /// The model of the selected PSM score, if one is selected
    pub fn score_model(&self) -> Option<ScoreModel> {
        self.score_name().map(|n| self.available.model_for(n))
    }

    pub fn update_available_scores(&mut self, scores: &ScoreRegistry) {
        self.available.extend(scores);
        self.used_score.update_params(self.available.name_map());
        if self.used_score.value.is_none() {
            self.used_score.value = initial_score(&self.available);
        }
    }

    fn setting_list(&mut self) -> Vec<&mut dyn SettingLike> {
        vec![&mut self.used_score, &mut self.used_spectra]
    }
}

#[cfg(feature = "parallelism")]
fn score_each<S: ProteinScoring + ?Sized>(scoring: &S, proteins: &mut [ReportProtein]) {
    proteins
        .par_iter_mut()
        .for_each(|p| p.score = scoring.calculate_protein_score(p));
}

#[cfg(not(feature = "parallelism"))]
fn score_each<S: ProteinScoring + ?Sized>(scoring: &S, proteins: &mut [ReportProtein]) {
    proteins
        .iter_mut()
        .for_each(|p| p.score = scoring.calculate_protein_score(p));
}

#[cfg(feature = "parallelism")]
fn score_refs<S: ProteinScoring + ?Sized>(
    scoring: &S,
    proteins: &[&ReportProtein],
) -> HashMap<ProteinId, Option<f64>> {
    proteins
        .par_iter()
        .map(|p| (p.id, scoring.calculate_protein_score(p)))
        .collect()
}

#[cfg(not(feature = "parallelism"))]
fn score_refs<S: ProteinScoring + ?Sized>(
    scoring: &S,
    proteins: &[&ReportProtein],
) -> HashMap<ProteinId, Option<f64>> {
    proteins
        .iter()
        .map(|p| (p.id, scoring.calculate_protein_score(p)))
        .collect()
}

/// A protein scoring strategy
pub trait ProteinScoring: Send + Sync + Debug {
    fn short_name(&self) -> &'static str;
    fn name(&self) -> &'static str;

    fn settings(&self) -> &ScoringSettings;
    fn settings_mut(&mut self) -> &mut ScoringSettings;

    /// Combine the selected PSM values of one protein. `values` is never empty.
    fn aggregate(&self, values: &[f64], psm_model: &ScoreModel) -> f64;

    /// Whether a higher protein score is better, given the model of the PSM score
    fn higher_is_better(&self, psm_model: &ScoreModel) -> bool {
        psm_model.higher_is_better
    }

    fn boxed_clone(&self) -> Box<dyn ProteinScoring>;

    /// Set a setting by id from its string form
    fn set_setting(&mut self, id: &str, value: &str) -> Result<String, SettingError> {
        let settings = self.settings_mut().setting_list();
        let setting = set_by_id(settings, id, value)?;
        Ok(setting.value_str().unwrap_or_default())
    }

    /// The settings in their type-erased form, to list them or their legal values
    fn setting_list(&mut self) -> Vec<&mut dyn SettingLike> {
        self.settings_mut().setting_list()
    }

    fn update_available_scores(&mut self, scores: &ScoreRegistry) {
        self.settings_mut().update_available_scores(scores);
    }

    /// The model of the protein scores this strategy produces
    fn protein_score_model(&self) -> ScoreModel {
        let settings = self.settings();
        let psm_model = settings
            .score_model()
            .unwrap_or_else(|| ScoreModel::new("", "", true));
        ScoreModel::new(
            format!("protein_score_{}", self.short_name()),
            format!("{} protein score of {}", self.name(), psm_model.name),
            self.higher_is_better(&psm_model),
        )
    }

    /// Score one protein from the PSM sets of its peptides, or `None` when the
    /// selected score is unset or carried by none of them
    fn calculate_protein_score(&self, protein: &ReportProtein) -> Option<f64> {
        let settings = self.settings();
        let score_name = settings.score_name()?;
        let model = settings.available_scores().model_for(score_name);
        let mut values = Vec::new();
        for peptide in protein.peptides.iter() {
            let peptide_scores = peptide.psm_sets.iter().filter_map(|s| s.score(score_name));
            match settings.psm_for_scoring() {
                PsmForScoring::OnlyBest => {
                    if let Some(best) = peptide_scores.fold(None, |acc, v| model.best_of(acc, Some(v))) {
                        values.push(best);
                    }
                }
                PsmForScoring::All => values.extend(peptide_scores),
            }
        }
        if values.is_empty() {
            log::trace!("No {score_name} values for protein {}", protein.accession());
            None
        } else {
            Some(self.aggregate(&values, &model))
        }
    }

    /// Score every protein and every protein reachable through their subsets.
    /// A subset protein referenced by several proteins is scored once.
    fn calculate_protein_scores(&self, proteins: &mut [ReportProtein]) {
        score_each(self, proteins);

        let subs = distinct_sub_proteins(proteins);
        let sub_scores = score_refs(self, &subs);
        log::debug!(
            "Scored {} proteins and {} subset proteins by {}",
            proteins.len(),
            sub_scores.len(),
            self.descriptive_settings()
        );
        update_sub_proteins(proteins, |sub| {
            sub.score = sub_scores.get(&sub.id).copied().flatten();
        });
    }

    /// A copy that only knows about the currently selected score
    fn small_copy(&self) -> Box<dyn ProteinScoring> {
        let mut copy = self.boxed_clone();
        let mut available = ScoreRegistry::new();
        if let Some(model) = self.settings().score_model() {
            available.register(model);
        }
        let settings = copy.settings_mut();
        settings.available = available;
        settings.used_score.update_params(settings.available.name_map());
        copy
    }

    /// One line describing the strategy and its settings
    fn descriptive_settings(&self) -> String {
        let settings = self.settings();
        format!(
            "{} ({}={}, {}={})",
            self.name(),
            USED_SCORE,
            settings.score_name().unwrap_or("<unset>"),
            USED_SPECTRA,
            settings.psm_for_scoring()
        )
    }

    fn config(&self) -> ScoringConfig {
        ScoringConfig {
            method: self.short_name().to_string(),
            used_score: self.settings().score_name().map(String::from),
            used_spectra: self.settings().psm_for_scoring(),
        }
    }
}

impl Clone for Box<dyn ProteinScoring> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

pub type ScoringConstructor = fn(&ScoreRegistry) -> Box<dyn ProteinScoring>;

fn new_multiplicative(scores: &ScoreRegistry) -> Box<dyn ProteinScoring> {
    Box::new(MultiplicativeScoring::new(scores))
}

fn new_additive(scores: &ScoreRegistry) -> Box<dyn ProteinScoring> {
    Box::new(AdditiveScoring::new(scores))
}

fn new_best(scores: &ScoreRegistry) -> Box<dyn ProteinScoring> {
    Box::new(BestScoring::new(scores))
}

/// The built-in scoring strategies
pub fn scoring_registry() -> StrategyRegistry<ScoringConstructor> {
    let mut registry: StrategyRegistry<ScoringConstructor> = StrategyRegistry::new("scoring");
    registry.register(
        MultiplicativeScoring::SHORT_NAME,
        MultiplicativeScoring::NAME,
        new_multiplicative,
    );
    registry.register(AdditiveScoring::SHORT_NAME, AdditiveScoring::NAME, new_additive);
    registry.register(BestScoring::SHORT_NAME, BestScoring::NAME, new_best);
    registry
}

/// The compact form of a scoring strategy's configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoringConfig {
    pub method: String,
    pub used_score: Option<String>,
    pub used_spectra: PsmForScoring,
}

impl ScoringConfig {
    /// Build the configured strategy from `registry`, offering it `scores`
    pub fn build(
        &self,
        registry: &StrategyRegistry<ScoringConstructor>,
        scores: &ScoreRegistry,
    ) -> Result<Box<dyn ProteinScoring>, ScoringError> {
        let constructor = registry.get(&self.method)?;
        let mut scoring = constructor(scores);
        if let Some(score) = self.used_score.as_deref() {
            scoring.set_setting(USED_SCORE, score)?;
        }
        scoring.set_setting(USED_SPECTRA, self.used_spectra.short_name())?;
        Ok(scoring)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{AccessionId, FileId, GroupId, PeptideId, PsmId};
    use crate::report::{ReportPeptide, ReportPsm, ReportPsmSet};

    fn psm_set(spectrum: &str, peptide: usize, score: &str, value: f64) -> Arc<ReportPsmSet> {
        let psm = ReportPsm {
            psm: PsmId(0),
            file: FileId(1),
            spectrum_id: spectrum.to_string(),
            peptide: PeptideId(peptide),
            sequence: "PEPTIDEK".to_string(),
            accession_ids: vec![AccessionId(0)],
            accessions: vec!["P1".to_string()],
            charge: Some(2),
            rank: Some(1),
            scores: [(score.to_string(), value)].into_iter().collect(),
            engine_decoy: None,
            decoy: false,
            fdr: None,
            q_value: None,
            fdr_rank: None,
        };
        Arc::new(ReportPsmSet::single(psm))
    }

    fn protein(score: &str, peptides: &[&[f64]]) -> ReportProtein {
        let peptides = peptides
            .iter()
            .enumerate()
            .map(|(i, values)| {
                let sets = values
                    .iter()
                    .enumerate()
                    .map(|(j, v)| psm_set(&format!("s{i}_{j}"), i, score, *v))
                    .collect();
                ReportPeptide::new(PeptideId(i), format!("PEPTIDE{i}K"), sets)
            })
            .collect();
        ReportProtein::new(
            ProteinId(0),
            GroupId(0),
            vec![(AccessionId(0), "P1".to_string())],
            peptides,
        )
    }

    fn registry() -> ScoreRegistry {
        let mut scores = ScoreRegistry::new();
        scores.observe("mascot_score");
        scores.observe("xtandem_expect");
        scores
    }

    #[test_log::test]
    fn test_settings_surface() {
        let mut scoring = MultiplicativeScoring::new(&registry());
        assert_eq!(
            scoring.set_setting("nope", "x"),
            Err(SettingError::UnknownSetting("nope".into()))
        );
        assert!(scoring.set_setting(USED_SPECTRA, "some").is_err());
        assert_eq!(scoring.set_setting(USED_SPECTRA, "all").as_deref(), Ok("all"));
        assert_eq!(scoring.set_setting(USED_SCORE, "mascot_score").as_deref(), Ok("mascot_score"));
        let ids: Vec<String> = scoring.setting_list().iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec![USED_SCORE, USED_SPECTRA]);
        assert!(scoring.setting_list()[0].is_permitted("xtandem_expect"));
        assert_eq!(
            scoring.descriptive_settings(),
            "Multiplicative Scoring (used_score=mascot_score, used_spectra=all)"
        );
    }

    #[test_log::test]
    fn test_unscorable_is_none() {
        let protein = protein("mascot_score", &[&[10.0]]);
        let scoring = AdditiveScoring::new(&ScoreRegistry::new());
        assert_eq!(scoring.settings().score_name(), None);
        assert_eq!(scoring.calculate_protein_score(&protein), None);

        let mut scoring = AdditiveScoring::new(&registry());
        scoring.set_setting(USED_SCORE, "xtandem_expect").unwrap();
        assert_eq!(scoring.calculate_protein_score(&protein), None);
    }

    #[test_log::test]
    fn test_initial_score() {
        let protein = protein("mascot_score", &[&[10.0]]);
        let scoring = AdditiveScoring::new(&registry());
        assert_eq!(scoring.settings().score_name(), Some("mascot_score"));
        assert_eq!(scoring.calculate_protein_score(&protein), Some(10.0));

        let mut scores = ScoreRegistry::new();
        scores.observe(PSM_FDR_SCORE);
        scores.observe("xtandem_expect");
        let scoring = BestScoring::new(&scores);
        assert_eq!(scoring.settings().score_name(), Some("xtandem_expect"));

        let mut scoring = MultiplicativeScoring::new(&ScoreRegistry::new());
        scoring.update_available_scores(&registry());
        assert_eq!(scoring.settings().score_name(), Some("mascot_score"));
        scoring.set_setting(USED_SCORE, "xtandem_expect").unwrap();
        scoring.update_available_scores(&registry());
        assert_eq!(scoring.settings().score_name(), Some("xtandem_expect"));
    }

    #[test_log::test]
    fn test_best_versus_all() {
        let mut scoring = AdditiveScoring::new(&registry());
        scoring.set_setting(USED_SCORE, "mascot_score").unwrap();
        let protein = protein("mascot_score", &[&[10.0, 30.0], &[5.0]]);
        assert_eq!(scoring.calculate_protein_score(&protein), Some(35.0));
        scoring.set_setting(USED_SPECTRA, "all").unwrap();
        assert_eq!(scoring.calculate_protein_score(&protein), Some(45.0));
    }

    #[test_log::test]
    fn test_subsets_scored_once() {
        let mut scoring = BestScoring::new(&registry());
        scoring.set_setting(USED_SCORE, "mascot_score").unwrap();
        let mut sub = protein("mascot_score", &[&[12.0]]);
        sub.id = ProteinId(7);
        let sub = Arc::new(sub);
        let mut first = protein("mascot_score", &[&[12.0], &[40.0]]);
        first.sub_sets.push(Arc::clone(&sub));
        let mut second = protein("mascot_score", &[&[12.0], &[20.0]]);
        second.id = ProteinId(1);
        second.sub_sets.push(sub);

        let mut proteins = vec![first, second];
        scoring.calculate_protein_scores(&mut proteins);
        assert_eq!(proteins[0].score, Some(40.0));
        assert_eq!(proteins[1].score, Some(20.0));
        assert_eq!(proteins[0].sub_sets[0].score, Some(12.0));
        assert_eq!(proteins[1].sub_sets[0].score, Some(12.0));
        assert!(Arc::ptr_eq(&proteins[0].sub_sets[0], &proteins[1].sub_sets[0]));
    }

    #[test_log::test]
    fn test_small_copy_and_config() {
        let mut scoring = MultiplicativeScoring::new(&registry());
        scoring.set_setting(USED_SCORE, "xtandem_expect").unwrap();
        let small = scoring.small_copy();
        assert_eq!(small.settings().available_scores().len(), 1);
        assert_eq!(small.settings().used_score.params.len(), 1);

        let protein = protein("xtandem_expect", &[&[0.01], &[0.001]]);
        assert_eq!(
            small.calculate_protein_score(&protein),
            scoring.calculate_protein_score(&protein)
        );

        let config = scoring.config();
        let rebuilt = config.build(&scoring_registry(), &registry()).unwrap();
        assert_eq!(rebuilt.config(), config);
        assert_eq!(rebuilt.short_name(), MultiplicativeScoring::SHORT_NAME);

        let missing = ScoringConfig {
            method: "median".into(),
            ..config
        };
        assert!(matches!(
            missing.build(&scoring_registry(), &registry()),
            Err(ScoringError::UnknownStrategy(_))
        ));
    }
}
