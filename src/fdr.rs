//! Decoy-based false discovery rate estimation.
//!
//! Entities are ranked by a score, FDR at each rank is the ratio of decoys to
//! targets seen so far, and q-values are the running minimum of FDR taken from
//! the worst rank upwards. Entities with equal scores share a rank and its FDR.
//!
//! All results are written onto the entities themselves, never into the
//! [`EvidenceGraph`](crate::graph::EvidenceGraph).
use std::fmt::{self, Display};
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

use crate::score::ScoreModel;

#[derive(Debug, Clone, Error)]
pub enum FdrError {
    #[error("Invalid decoy accession pattern: {0}")]
    InvalidDecoyPattern(
        #[from]
        #[source]
        regex::Error,
    ),
    #[error("Unknown decoy strategy \"{0}\"")]
    UnknownDecoyStrategy(String),
    #[error("The decoy strategy {0} requires a pattern")]
    MissingPattern(String),
    #[error("Unknown FDR score combination method \"{0}\"")]
    UnknownCombinationMethod(String),
    #[error("The score {0} was not observed in this run")]
    UnknownScore(String),
    #[error("No input file with id {0}")]
    UnknownFile(u32),
}

/// How an entity is recognised as a decoy
#[derive(Debug, Clone)]
pub enum DecoyStrategy {
    /// Decoy if every accession of the entity matches the pattern
    AccessionPattern(Regex),
    /// Decoy as flagged by the search engine
    SearchEngine,
}

impl DecoyStrategy {
    pub const ACCESSION_PATTERN: &'static str = "accessionpattern";
    pub const SEARCH_ENGINE: &'static str = "searchengine";

    pub fn accession_pattern(pattern: &str) -> Result<Self, FdrError> {
        Ok(Self::AccessionPattern(Regex::new(pattern)?))
    }

    /// Build a strategy from its short name, as used in configuration
    pub fn from_name(name: &str, pattern: Option<&str>) -> Result<Self, FdrError> {
        match name.to_ascii_lowercase().as_str() {
            Self::ACCESSION_PATTERN => match pattern {
                Some(p) => Self::accession_pattern(p),
                None => Err(FdrError::MissingPattern(name.to_string())),
            },
            Self::SEARCH_ENGINE => Ok(Self::SearchEngine),
            _ => Err(FdrError::UnknownDecoyStrategy(name.to_string())),
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::AccessionPattern(_) => Self::ACCESSION_PATTERN,
            Self::SearchEngine => Self::SEARCH_ENGINE,
        }
    }

    pub fn is_decoy<E: DecoyCandidate + ?Sized>(&self, entity: &E) -> bool {
        match self {
            Self::AccessionPattern(pattern) => {
                let accessions = entity.decoy_accessions();
                !accessions.is_empty() && accessions.iter().all(|a| pattern.is_match(a))
            }
            Self::SearchEngine => entity.engine_decoy().unwrap_or(false),
        }
    }
}

impl Display for DecoyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessionPattern(p) => write!(f, "{}({})", self.short_name(), p.as_str()),
            Self::SearchEngine => f.write_str(self.short_name()),
        }
    }
}

/// An entity whose decoy state can be decided by a [`DecoyStrategy`]
pub trait DecoyCandidate {
    fn decoy_accessions(&self) -> Vec<&str>;
    fn engine_decoy(&self) -> Option<bool>;
    fn set_decoy(&mut self, decoy: bool);
}

/// An entity that can be ranked and annotated with FDR statistics
pub trait FdrEntity {
    fn ranking_score(&self, model: &ScoreModel) -> Option<f64>;
    fn is_decoy(&self) -> bool;
    fn set_fdr(&mut self, rank: Option<usize>, fdr: Option<f64>, q_value: Option<f64>);

    /// Receives the interpolated FDR score. Entities that do not keep one ignore it.
    fn set_fdr_score(&mut self, _fdr_score: Option<f64>) {}
}

impl<T: DecoyCandidate + ?Sized> DecoyCandidate for &mut T {
    fn decoy_accessions(&self) -> Vec<&str> {
        (**self).decoy_accessions()
    }

    fn engine_decoy(&self) -> Option<bool> {
        (**self).engine_decoy()
    }

    fn set_decoy(&mut self, decoy: bool) {
        (**self).set_decoy(decoy)
    }
}

impl<T: FdrEntity + ?Sized> FdrEntity for &mut T {
    fn ranking_score(&self, model: &ScoreModel) -> Option<f64> {
        (**self).ranking_score(model)
    }

    fn is_decoy(&self) -> bool {
        (**self).is_decoy()
    }

    fn set_fdr(&mut self, rank: Option<usize>, fdr: Option<f64>, q_value: Option<f64>) {
        (**self).set_fdr(rank, fdr, q_value)
    }

    fn set_fdr_score(&mut self, fdr_score: Option<f64>) {
        (**self).set_fdr_score(fdr_score)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoyCounts {
    pub targets: usize,
    pub decoys: usize,
}

/// Mark every entity as target or decoy
pub fn update_decoy_states<E: DecoyCandidate>(
    entities: &mut [E],
    strategy: &DecoyStrategy,
) -> DecoyCounts {
    let mut counts = DecoyCounts::default();
    for entity in entities.iter_mut() {
        let decoy = strategy.is_decoy(&*entity);
        entity.set_decoy(decoy);
        if decoy {
            counts.decoys += 1;
        } else {
            counts.targets += 1;
        }
    }
    log::debug!(
        "Decoy strategy {strategy} marked {} targets and {} decoys",
        counts.targets,
        counts.decoys
    );
    counts
}

/// Counts from one FDR calculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdrSummary {
    pub targets: usize,
    pub decoys: usize,
    /// Entities without the ranking score, left without FDR values
    pub unscored: usize,
}

fn fdr_ratio(decoys: usize, targets: usize) -> f64 {
    if targets == 0 {
        if decoys == 0 {
            0.0
        } else {
            1.0
        }
    } else {
        decoys as f64 / targets as f64
    }
}

struct RankBlock {
    start: usize,
    end: usize,
    score: f64,
    has_decoy: bool,
    fdr: f64,
    q_value: f64,
}

/// Rank `entities` by the score described by `model` and annotate each one with
/// its rank, FDR, q-value and FDR score. The slice order is left untouched.
pub fn calculate_fdr<E: FdrEntity>(entities: &mut [E], model: &ScoreModel) -> FdrSummary {
    let mut summary = FdrSummary::default();
    let mut ranked: Vec<(usize, f64)> = Vec::with_capacity(entities.len());
    for (i, entity) in entities.iter_mut().enumerate() {
        match entity.ranking_score(model) {
            Some(score) if !score.is_nan() => ranked.push((i, score)),
            _ => {
                entity.set_fdr(None, None, None);
                entity.set_fdr_score(None);
                summary.unscored += 1;
            }
        }
    }
    ranked.sort_by(|a, b| model.compare(a.1, b.1));

    let mut blocks: Vec<RankBlock> = Vec::new();
    let mut i = 0;
    while i < ranked.len() {
        let score = ranked[i].1;
        let mut j = i;
        let mut has_decoy = false;
        while j < ranked.len() && ranked[j].1 == score {
            if entities[ranked[j].0].is_decoy() {
                summary.decoys += 1;
                has_decoy = true;
            } else {
                summary.targets += 1;
            }
            j += 1;
        }
        blocks.push(RankBlock {
            start: i,
            end: j,
            score,
            has_decoy,
            fdr: fdr_ratio(summary.decoys, summary.targets),
            q_value: f64::INFINITY,
        });
        i = j;
    }

    let mut q_min = f64::INFINITY;
    for block in blocks.iter_mut().rev() {
        q_min = q_min.min(block.fdr);
        block.q_value = q_min;
    }

    let fdr_scores = interpolate_fdr_scores(&blocks);
    for (block, fdr_score) in blocks.iter().zip(fdr_scores) {
        for (entity_index, _) in ranked[block.start..block.end].iter() {
            let entity = &mut entities[*entity_index];
            entity.set_fdr(Some(block.start + 1), Some(block.fdr), Some(block.q_value));
            entity.set_fdr_score(Some(fdr_score));
        }
    }

    log::debug!(
        "FDR over {} by {}: {} targets, {} decoys, {} unscored",
        ranked.len(),
        model.short_name,
        summary.targets,
        summary.decoys,
        summary.unscored
    );
    summary
}

/// The FDR score: q-values anchored at each rank containing a decoy, linearly
/// interpolated over the score for the ranks in between. The best rank anchors
/// at 0, ranks after the last decoy keep their q-value.
fn interpolate_fdr_scores(blocks: &[RankBlock]) -> Vec<f64> {
    let mut result = vec![0.0; blocks.len()];
    if blocks.is_empty() {
        return result;
    }
    let mut anchors: Vec<(usize, f64, f64)> = vec![(0, blocks[0].score, 0.0)];
    for (i, block) in blocks.iter().enumerate() {
        if block.has_decoy {
            if i == 0 {
                anchors[0] = (0, block.score, block.q_value);
            } else {
                anchors.push((i, block.score, block.q_value));
            }
        }
    }

    for window in anchors.windows(2) {
        let (from, score_a, q_a) = window[0];
        let (to, score_b, q_b) = window[1];
        for (k, block) in blocks.iter().enumerate().take(to + 1).skip(from) {
            result[k] = if score_b == score_a {
                q_b
            } else {
                q_a + (q_b - q_a) * (block.score - score_a) / (score_b - score_a)
            };
        }
    }
    let (last, _, last_q) = anchors[anchors.len() - 1];
    if anchors.len() == 1 {
        result[0] = last_q;
    }
    for (k, block) in blocks.iter().enumerate().skip(last + 1) {
        result[k] = block.q_value;
    }
    result
}

/// How per-engine FDR scores of a PSM set are merged into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombinationMethod {
    /// The product of all FDR scores, so agreement between engines lowers the score
    #[default]
    Product,
    GeometricMean,
    /// The most significant (lowest) single FDR score
    Best,
}

impl CombinationMethod {
    pub fn combine(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let value = match self {
            Self::Product => values.iter().product(),
            Self::GeometricMean => {
                values.iter().product::<f64>().powf(1.0 / values.len() as f64)
            }
            Self::Best => values.iter().copied().fold(f64::INFINITY, f64::min),
        };
        Some(value)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::GeometricMean => "geometric_mean",
            Self::Best => "best",
        }
    }
}

impl Display for CombinationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for CombinationMethod {
    type Err = FdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Self::Product),
            "geometric_mean" => Ok(Self::GeometricMean),
            "best" => Ok(Self::Best),
            _ => Err(FdrError::UnknownCombinationMethod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Hit {
        accession: String,
        score: Option<f64>,
        decoy: bool,
        rank: Option<usize>,
        fdr: Option<f64>,
        q_value: Option<f64>,
        fdr_score: Option<f64>,
    }

    impl DecoyCandidate for Hit {
        fn decoy_accessions(&self) -> Vec<&str> {
            vec![self.accession.as_str()]
        }

        fn engine_decoy(&self) -> Option<bool> {
            None
        }

        fn set_decoy(&mut self, decoy: bool) {
            self.decoy = decoy;
        }
    }

    impl FdrEntity for Hit {
        fn ranking_score(&self, _model: &ScoreModel) -> Option<f64> {
            self.score
        }

        fn is_decoy(&self) -> bool {
            self.decoy
        }

        fn set_fdr(&mut self, rank: Option<usize>, fdr: Option<f64>, q_value: Option<f64>) {
            self.rank = rank;
            self.fdr = fdr;
            self.q_value = q_value;
        }

        fn set_fdr_score(&mut self, fdr_score: Option<f64>) {
            self.fdr_score = fdr_score;
        }
    }

    fn hits(spec: &[(&str, Option<f64>)]) -> Vec<Hit> {
        spec.iter()
            .map(|(acc, score)| Hit {
                accession: acc.to_string(),
                score: *score,
                ..Default::default()
            })
            .collect()
    }

    #[test_log::test]
    fn test_decoy_pattern_and_first_decoy_fdr() {
        let mut entities = hits(&[
            ("P1", Some(90.0)),
            ("P2", Some(80.0)),
            ("decoy_P3", Some(70.0)),
            ("P4", Some(60.0)),
            ("P5", Some(50.0)),
            ("decoy_P6", Some(40.0)),
            ("P7", None),
        ]);
        let strategy = DecoyStrategy::from_name("ACCESSIONPATTERN", Some("^decoy_")).unwrap();
        let counts = update_decoy_states(&mut entities, &strategy);
        assert_eq!(counts, DecoyCounts { targets: 5, decoys: 2 });
        assert!(entities[2].decoy && entities[5].decoy);

        let model = ScoreModel::new("score", "score", true);
        let summary = calculate_fdr(&mut entities, &model);
        assert_eq!(summary.unscored, 1);
        assert_eq!(entities[2].fdr, Some(0.5));
        assert_eq!(entities[0].fdr, Some(0.0));
        assert_eq!(entities[5].fdr, Some(0.5));
        assert_eq!(entities[4].fdr, Some(0.25));
        assert_eq!(entities[2].q_value, Some(0.25));
        assert_eq!(entities[6].fdr, None);
        assert_eq!(entities[3].rank, Some(4));

        let mut q = entities
            .iter()
            .filter_map(|e| e.rank.zip(e.q_value))
            .collect::<Vec<_>>();
        q.sort_by_key(|(rank, _)| *rank);
        assert!(q.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test_log::test]
    fn test_ties_share_rank() {
        let mut entities = hits(&[
            ("P1", Some(0.01)),
            ("decoy_P2", Some(0.01)),
            ("P3", Some(0.001)),
        ]);
        update_decoy_states(&mut entities, &DecoyStrategy::accession_pattern("^decoy_").unwrap());
        let model = ScoreModel::resolve("xtandem_expect");
        calculate_fdr(&mut entities, &model);
        assert_eq!(entities[2].rank, Some(1));
        assert_eq!(entities[0].rank, Some(2));
        assert_eq!(entities[1].rank, Some(2));
        assert_eq!(entities[0].fdr, Some(0.5));
        assert_eq!(entities[1].fdr, Some(0.5));
    }

    #[test_log::test]
    fn test_fdr_score_interpolation() {
        let mut entities = hits(&[
            ("P1", Some(100.0)),
            ("P2", Some(75.0)),
            ("decoy_1", Some(50.0)),
            ("P3", Some(40.0)),
        ]);
        update_decoy_states(&mut entities, &DecoyStrategy::accession_pattern("^decoy_").unwrap());
        calculate_fdr(&mut entities, &ScoreModel::new("s", "s", true));
        assert_eq!(entities[0].fdr_score, Some(0.0));
        assert_eq!(entities[2].q_value, Some(1.0 / 3.0));
        assert_eq!(entities[2].fdr_score, Some(1.0 / 3.0));
        let interpolated = entities[1].fdr_score.unwrap();
        assert!((interpolated - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(entities[3].fdr_score, entities[3].q_value);
    }

    #[test_log::test]
    fn test_combination() {
        let values = [0.01, 0.1];
        assert!((CombinationMethod::Product.combine(&values).unwrap() - 0.001).abs() < 1e-15);
        assert!((CombinationMethod::GeometricMean.combine(&values).unwrap() - 0.001f64.sqrt()).abs() < 1e-12);
        assert_eq!(CombinationMethod::Best.combine(&values), Some(0.01));
        assert_eq!(CombinationMethod::Best.combine(&[]), None);
    }
}
