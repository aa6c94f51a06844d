//! Candidate selection for linking and fusion.
//!
//! The linker and classifier only ask four questions of a policy: may this
//! orphan link, how good is this link candidate, may this orphan fuse, how
//! good is this fusion candidate. Scores are "lower is better"; `None` rejects
//! the candidate outright.
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellIndex};
use crate::error::{PyramidError, Result};

pub trait CandidatePolicy: Send + Sync {
    /// Whether a valid orphan should look for a parent at all.
    fn is_linkable(&self, cell: &Cell) -> bool;

    /// Score of adopting `candidate` (one level up) as `orphan`'s parent.
    fn link_score(&self, orphan: &Cell, candidate: &Cell) -> Option<f64>;

    /// Whether an orphan root may join a neighbouring class instead of
    /// founding its own.
    fn is_fusible(&self, cell: &Cell) -> bool;

    /// Score of joining the class carried by `candidate`.
    fn fusion_score(&self, orphan: &Cell, candidate: &Cell) -> Option<f64>;
}

/// Thresholds for [`AttributeDistancePolicy`]. Every field is opt-in: an
/// unset field disables the behaviour it controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Largest attribute deviation accepted when linking. `None` disables linking.
    pub link_tolerance: Option<f64>,
    /// Largest attribute deviation accepted when fusing. `None` accepts any
    /// adjacent class.
    pub fusion_tolerance: Option<f64>,
    /// Orphan roots with area strictly below this are fusible. `None` disables fusion.
    pub min_fusion_area: Option<u64>,
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("link_tolerance", self.link_tolerance),
            ("fusion_tolerance", self.fusion_tolerance),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(PyramidError::Config(format!(
                        "{name} must be a finite non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Ranks candidates by the largest physical-attribute difference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttributeDistancePolicy {
    pub config: PolicyConfig,
}

impl AttributeDistancePolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }
}

fn distance(a: &Cell, b: &Cell) -> Option<f64> {
    Some(a.attributes?.max_deviation(&b.attributes?))
}

impl CandidatePolicy for AttributeDistancePolicy {
    fn is_linkable(&self, cell: &Cell) -> bool {
        self.config.link_tolerance.is_some() && cell.is_orphan()
    }

    fn link_score(&self, orphan: &Cell, candidate: &Cell) -> Option<f64> {
        let tolerance = self.config.link_tolerance?;
        distance(orphan, candidate).filter(|&d| d <= tolerance)
    }

    fn is_fusible(&self, cell: &Cell) -> bool {
        match (self.config.min_fusion_area, cell.area) {
            (Some(min), Some(area)) => area < min,
            _ => false,
        }
    }

    fn fusion_score(&self, orphan: &Cell, candidate: &Cell) -> Option<f64> {
        let d = distance(orphan, candidate)?;
        match self.config.fusion_tolerance {
            Some(tolerance) if d > tolerance => None,
            _ => Some(d),
        }
    }
}

/// Best-scoring candidate. Ties go to the smallest index so results do not
/// depend on gathering order.
pub fn best_candidate<'a, I, F>(candidates: I, score: F) -> Option<(&'a Cell, f64)>
where
    I: IntoIterator<Item = &'a Cell>,
    F: Fn(&Cell) -> Option<f64>,
{
    candidates
        .into_iter()
        .filter_map(|c| score(c).map(|s| (c, s)))
        .min_by(|(a, sa), (b, sb)| sa.total_cmp(sb).then_with(|| a.index.cmp(&b.index)))
}

/// Push `idx` unless already present. Candidate lists are a handful long.
pub(crate) fn push_unique(list: &mut Vec<CellIndex>, idx: CellIndex) {
    if !list.contains(&idx) {
        list.push(idx);
    }
}
