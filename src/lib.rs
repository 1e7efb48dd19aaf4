pub mod params;
pub mod registry;
pub mod score;
pub mod graph;
pub mod report;
pub mod fdr;
pub mod filter;
pub mod scoring;
pub mod inference;
pub mod prelude;

pub use crate::graph::{EvidenceGraph, GraphBuilder, PsmRecord, AccessionRecord, FileId};
pub use crate::score::{ScoreModel, ScoreRegistry};

pub use crate::report::{PsmReport, ProteinReport, ReportProtein, ReportPsmSet};
pub use crate::fdr::{CombinationMethod, DecoyStrategy};
pub use crate::filter::{Filter, FilterComparator};

pub use crate::scoring::{ProteinScoring, ScoringConfig};
pub use crate::inference::{InferenceEngine, InferenceStrategy};
