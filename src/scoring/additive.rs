use crate::score::{ScoreModel, ScoreRegistry};

use super::{ProteinScoring, ScoringSettings};

/// Scores a protein by the sum of its PSM scores, keeping the PSM score's direction
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveScoring {
    settings: ScoringSettings,
}

impl AdditiveScoring {
    pub const SHORT_NAME: &'static str = "additive";
    pub const NAME: &'static str = "Additive Scoring";

    pub fn new(available: &ScoreRegistry) -> Self {
        Self {
            settings: ScoringSettings::new(available),
        }
    }
}

impl ProteinScoring for AdditiveScoring {
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

    fn aggregate(&self, values: &[f64], _psm_model: &ScoreModel) -> f64 {
        values.iter().sum()
    }

    fn boxed_clone(&self) -> Box<dyn ProteinScoring> {
        Box::new(self.clone())
    }
}
