pub use crate::fdr::{DecoyCandidate, FdrEntity};
pub use crate::filter::Filterable;
pub use crate::inference::InferenceStrategy;
pub use crate::params::SettingLike;
pub use crate::scoring::ProteinScoring;
