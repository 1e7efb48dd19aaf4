//! Report-level views of an evidence graph: PSMs and PSM sets with their FDR
//! state, and the proteins produced by inference.
mod protein;
mod psm;

pub use protein::{ProteinId, ProteinReport, ReportPeptide, ReportProtein};
pub(crate) use protein::{distinct_sub_proteins, update_sub_proteins};
pub use psm::{PsmReport, ReportPsm, ReportPsmSet};
