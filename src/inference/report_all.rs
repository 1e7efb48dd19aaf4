use super::{Candidate, InferenceStrategy, Selection};

/// Reports every candidate, without subsumption
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportAll;

impl ReportAll {
    pub const SHORT_NAME: &'static str = "report_all";
    pub const NAME: &'static str = "Report All";
}

impl InferenceStrategy for ReportAll {
    fn short_name(&self) -> &'static str {
        Self::SHORT_NAME
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn select(&self, candidates: &[Candidate]) -> Vec<Selection> {
        (0..candidates.len())
            .map(|candidate| Selection {
                candidate,
                sub_sets: Vec::new(),
            })
            .collect()
    }

    fn boxed_clone(&self) -> Box<dyn InferenceStrategy> {
        Box::new(*self)
    }
}
