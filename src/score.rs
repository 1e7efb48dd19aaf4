//! Score models and the per-run registry of score names.
use std::cmp::Ordering;
use std::fmt::Display;

use indexmap::IndexMap;

/// Short name of the derived PSM-level FDR score
pub const PSM_FDR_SCORE: &str = "psm_fdr_score";
/// Short name of the derived combined FDR score of PSM sets
pub const PSM_COMBINED_FDR_SCORE: &str = "psm_combined_fdr_score";
/// Short name of the derived PSM-level q-value
pub const PSM_Q_VALUE: &str = "psm_q_value";

/// Describes a named score: how it is labelled and which direction is better.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreModel {
    pub short_name: String,
    pub name: String,
    pub cv_accession: Option<String>,
    pub higher_is_better: bool,
}

const KNOWN_SCORES: &[(&str, &str, &str, bool)] = &[
    (PSM_FDR_SCORE, "PSM-level FDRScore", "MS:1002355", false),
    (PSM_COMBINED_FDR_SCORE, "PSM-level combined FDRScore", "MS:1002356", false),
    (PSM_Q_VALUE, "PSM-level q-value", "MS:1002354", false),
    ("mascot_score", "Mascot:score", "MS:1001171", true),
    ("mascot_expect", "Mascot:expectation value", "MS:1001172", false),
    ("xtandem_expect", "X!Tandem:expect", "MS:1001330", false),
    ("xtandem_hyperscore", "X!Tandem:hyperscore", "MS:1001331", true),
    ("msgf_specevalue", "MS-GF:SpecEValue", "MS:1002052", false),
    ("msgf_rawscore", "MS-GF:RawScore", "MS:1002049", true),
    ("omssa_evalue", "OMSSA:evalue", "MS:1001328", false),
    ("sequest_xcorr", "SEQUEST:xcorr", "MS:1001155", true),
    ("comet_xcorr", "Comet:xcorr", "MS:1002252", true),
];

impl ScoreModel {
    pub fn new<S: Into<String>, N: Into<String>>(
        short_name: S,
        name: N,
        higher_is_better: bool,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            name: name.into(),
            cv_accession: None,
            higher_is_better,
        }
    }

    /// Look up one of the built-in score models by short name, CV accession or name
    pub fn known(key: &str) -> Option<ScoreModel> {
        KNOWN_SCORES
            .iter()
            .find(|(short, name, acc, _)| *short == key || *acc == key || *name == key)
            .map(|(short, name, acc, higher)| ScoreModel {
                short_name: short.to_string(),
                name: name.to_string(),
                cv_accession: Some(acc.to_string()),
                higher_is_better: *higher,
            })
    }

    /// Resolve a score name, falling back to a higher-is-better model labelled
    /// by the name itself when the score is not one of the built-in ones
    pub fn resolve(key: &str) -> ScoreModel {
        match Self::known(key) {
            Some(model) => model,
            None => {
                log::debug!("Score {key} is not a known score, assuming higher is better");
                ScoreModel::new(key, key, true)
            }
        }
    }

    /// Order two score values so that the better one compares as [`Ordering::Less`].
    ///
    /// NaN values sort after everything else.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        if self.higher_is_better {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }

    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// The better of two optional scores
    pub fn best_of(&self, a: Option<f64>, b: Option<f64>) -> Option<f64> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if self.is_better(b, a) { b } else { a }),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }
}

impl Display for ScoreModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.short_name)
    }
}

/// The set of scores available in the current run, keyed by short name.
///
/// The graph builder registers every score it sees and the FDR engine adds the
/// scores it derives. Strategies take their legal score names from here.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreRegistry {
    models: IndexMap<String, ScoreModel>,
}

impl ScoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a score by name if it has not been seen yet, returning its model
    pub fn observe(&mut self, short_name: &str) -> &ScoreModel {
        self.models
            .entry(short_name.to_string())
            .or_insert_with(|| ScoreModel::resolve(short_name))
    }

    pub fn register(&mut self, model: ScoreModel) {
        self.models.insert(model.short_name.clone(), model);
    }

    pub fn get(&self, short_name: &str) -> Option<&ScoreModel> {
        self.models.get(short_name)
    }

    /// Get the registered model or resolve one without registering it
    pub fn model_for(&self, short_name: &str) -> ScoreModel {
        self.get(short_name)
            .cloned()
            .unwrap_or_else(|| ScoreModel::resolve(short_name))
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.models.contains_key(short_name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreModel> {
        self.models.values()
    }

    /// Short name to label map, the shape a score-selecting [`Setting`](crate::params::Setting) uses
    pub fn name_map(&self) -> IndexMap<String, String> {
        self.models
            .values()
            .map(|m| (m.short_name.clone(), m.name.clone()))
            .collect()
    }

    /// Merge another registry into this one, keeping existing entries
    pub fn extend(&mut self, other: &ScoreRegistry) {
        for model in other.iter() {
            if !self.contains(&model.short_name) {
                self.register(model.clone());
            }
        }
    }
}
