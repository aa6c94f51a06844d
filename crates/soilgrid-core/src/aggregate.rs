//! Bottom-up aggregation of quadrant children into pyramid nodes.
//!
//! For every node `(n, i, j)` with `n ≥ 1` the children at level `n-1` are
//!
//!   NW (2i, 2j)     NE (2i, 2j+1)
//!   SW (2i+1, 2j)   SE (2i+1, 2j+1)
//!
//! A node becomes homogeneous only when every in-bounds child is homogeneous
//! and the children's attributes match under the configured [`AttributeMatch`].
//! Only then do the children receive a back-reference to it.
use serde::{Deserialize, Serialize};

use crate::attributes::SoilAttributes;
use crate::cell::{CellIndex, Homogeneity};
use crate::grid::Level;
use crate::par;
use crate::pyramid::Pyramid;

/// Equality test applied to a quadrant's children.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AttributeMatch {
    /// Component-wise equality of the physical fields.
    #[default]
    Exact,
    /// Every pair of children differs by at most `tolerance` in every field.
    Within { tolerance: f64 },
}

impl AttributeMatch {
    pub fn matches(&self, group: &[SoilAttributes]) -> bool {
        let Some((first, rest)) = group.split_first() else {
            return false;
        };
        match *self {
            AttributeMatch::Exact => rest.iter().all(|a| a.same_physical(first)),
            AttributeMatch::Within { tolerance } => group
                .iter()
                .enumerate()
                .all(|(i, a)| group[i + 1..].iter().all(|b| a.max_deviation(b) <= tolerance)),
        }
    }

    /// Attributes of the merged node. Exact matching copies the NW child's
    /// tuple unchanged; similarity matching takes the area-weighted mean.
    fn combine(&self, parts: &[(SoilAttributes, u64)]) -> Option<SoilAttributes> {
        match self {
            AttributeMatch::Exact => Some(parts.first()?.0),
            AttributeMatch::Within { .. } => SoilAttributes::weighted_mean(parts),
        }
    }
}

/// Verdict for one parent position.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Quadrant {
    Merged {
        attributes: SoilAttributes,
        area: u64,
    },
    Split,
}

/// Build levels `1..L` bottom-up. Returns the number of homogeneous nodes
/// created at each level, base first (the base entry counts loaded cells).
pub fn aggregate(pyramid: &mut Pyramid, rule: AttributeMatch) -> Vec<usize> {
    let mut counts = vec![pyramid.level(0).homogeneous_count()];
    for n in 1..pyramid.level_count() {
        let levels = pyramid.levels_mut();
        let (lower, upper) = levels.split_at_mut(n);
        let children = &mut lower[n - 1];
        let parents = &mut upper[0];

        let verdicts = evaluate_level(children, parents, rule);

        let mut merged = 0usize;
        for (cell, verdict) in parents.cells.iter_mut().zip(&verdicts) {
            match *verdict {
                Quadrant::Merged { attributes, area } => {
                    cell.attributes = Some(attributes);
                    cell.area = Some(area);
                    cell.homogeneity = Homogeneity::Homogeneous;
                    merged += 1;
                }
                Quadrant::Split => cell.homogeneity = Homogeneity::Heterogeneous,
            }
        }

        let parent_cols = parents.cols;
        par::for_each_mut(&mut children.cells, |_, child| {
            let parent = child.index.quadrant_parent();
            if matches!(verdicts[parent.row * parent_cols + parent.col], Quadrant::Merged { .. }) {
                child.set_parent(parent);
            }
        });

        log::debug!("level {n}: {merged}/{} nodes homogeneous", parents.len());
        counts.push(merged);
    }
    counts
}

fn evaluate_level(children: &Level, parents: &Level, rule: AttributeMatch) -> Vec<Quadrant> {
    let (level, cols) = (parents.level, parents.cols);
    par::map_offsets(parents.len(), |offset| {
        evaluate_quadrant(children, CellIndex::new(level, offset / cols, offset % cols), rule)
    })
}

fn evaluate_quadrant(children: &Level, parent: CellIndex, rule: AttributeMatch) -> Quadrant {
    let mut parts: Vec<(SoilAttributes, u64)> = Vec::with_capacity(4);
    for idx in parent.quadrant_children() {
        let Some(child) = children.try_get(idx.row, idx.col) else {
            continue;
        };
        match (child.is_homogeneous(), child.attributes, child.area) {
            (true, Some(attributes), Some(area)) => parts.push((attributes, area)),
            _ => return Quadrant::Split,
        }
    }

    let group: Vec<SoilAttributes> = parts.iter().map(|&(a, _)| a).collect();
    if !rule.matches(&group) {
        return Quadrant::Split;
    }
    match rule.combine(&parts) {
        Some(attributes) => Quadrant::Merged {
            attributes,
            area: parts.iter().map(|&(_, area)| area).sum(),
        },
        None => Quadrant::Split,
    }
}
