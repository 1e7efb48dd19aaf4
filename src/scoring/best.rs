use crate::score::{ScoreModel, ScoreRegistry};

use super::{ProteinScoring, ScoringSettings};

/// Scores a protein by its single best PSM score
#[derive(Debug, Clone, PartialEq)]
pub struct BestScoring {
    settings: ScoringSettings,
}

impl BestScoring {
    pub const SHORT_NAME: &'static str = "best";
    pub const NAME: &'static str = "Best Score";

    pub fn new(available: &ScoreRegistry) -> Self {
        Self {
            settings: ScoringSettings::new(available),
        }
    }
}

impl ProteinScoring for BestScoring {
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
        values
            .iter()
            .copied()
            .reduce(|best, v| if psm_model.is_better(v, best) { v } else { best })
            .unwrap_or(f64::NAN)
    }

    fn boxed_clone(&self) -> Box<dyn ProteinScoring> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_direction() {
        let mut scoring = BestScoring::new(&ScoreRegistry::new());
        let expect = ScoreModel::resolve("xtandem_expect");
        assert_eq!(scoring.aggregate(&[0.1, 0.001, 0.01], &expect), 0.001);
        scoring.set_setting("used_score", "xtandem_expect").unwrap();
        assert!(!scoring.protein_score_model().higher_is_better);
        let mascot = ScoreModel::resolve("mascot_score");
        assert_eq!(scoring.aggregate(&[10.0, 40.0], &mascot), 40.0);
    }
}
