use std::collections::BTreeSet;

use super::{greedy_cover, Candidate, InferenceStrategy, Selection};

/// Greedy cover over distinct spectra: keeps picking the protein explaining the
/// most spectra no picked protein explains yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpectrumExtractor;

impl SpectrumExtractor {
    pub const SHORT_NAME: &'static str = "spectrum_extractor";
    pub const NAME: &'static str = "Spectrum Extractor";
}

impl InferenceStrategy for SpectrumExtractor {
    fn short_name(&self) -> &'static str {
        Self::SHORT_NAME
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn select(&self, candidates: &[Candidate]) -> Vec<Selection> {
        let units: Vec<BTreeSet<&str>> = candidates.iter().map(|c| c.spectra()).collect();
        greedy_cover(candidates, &units)
    }

    fn boxed_clone(&self) -> Box<dyn InferenceStrategy> {
        Box::new(*self)
    }
}
