use crate::score::{ScoreModel, ScoreRegistry};

use super::{ProteinScoring, ScoringSettings};

/// Scores a protein by the product of its PSM scores.
///
/// For scores where lower is better (e-values, q-values, FDR scores) the product
/// is reported as its negative decadic logarithm, so the protein score is
/// always higher-is-better.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplicativeScoring {
    settings: ScoringSettings,
}

impl MultiplicativeScoring {
    pub const SHORT_NAME: &'static str = "multiplicative";
    pub const NAME: &'static str = "Multiplicative Scoring";

    pub fn new(available: &ScoreRegistry) -> Self {
        Self {
            settings: ScoringSettings::new(available),
        }
    }
}

impl ProteinScoring for MultiplicativeScoring {
    fn short_name(&self) -> &'static str {
        Self::SHORT_NAME
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut ScoringSettings {
        &mut self.settings
    }

    fn aggregate(&self, values: &[f64], psm_model: &ScoreModel) -> f64 {
        let product: f64 = values.iter().product();
        if psm_model.higher_is_better {
            product
        } else {
            -product.max(f64::MIN_POSITIVE).log10()
        }
    }

    fn higher_is_better(&self, _psm_model: &ScoreModel) -> bool {
        true
    }

    fn boxed_clone(&self) -> Box<dyn ProteinScoring> {
        Box::new(self.clone())
    }
}
