//! Top-down classification of the pruned, linked pyramid into regions.
//!
//! Sweeping apex → base guarantees a parent is labelled before any of its
//! children. An orphan root either fuses into a neighbouring class (when the
//! policy allows) or founds a new one.
use serde::Serialize;

use crate::cell::{Cell, CellIndex, ClassId};
use crate::error::{PyramidError, Result};
use crate::policy::{best_candidate, push_unique, CandidatePolicy};
use crate::pyramid::Pyramid;

/// One final class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub id: ClassId,
    /// The orphan root that founded the class.
    pub seed: CellIndex,
    /// Orphan roots fused into the class after it was founded.
    pub fused: usize,
    /// Base cells labelled with the class.
    pub base_area: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    /// Indexed by `ClassId`.
    pub regions: Vec<Region>,
    pub fused: usize,
}

impl Classification {
    pub fn region(&self, id: ClassId) -> Option<&Region> {
        self.regions.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

pub fn classify(pyramid: &mut Pyramid, policy: &dyn CandidatePolicy) -> Result<Classification> {
    let mut out = Classification::default();

    for n in (0..pyramid.level_count()).rev() {
        let (rows, cols) = (pyramid.level(n).rows, pyramid.level(n).cols);
        for row in 0..rows {
            for col in 0..cols {
                let cell = pyramid.level(n).get(row, col);
                if !cell.is_valid() || cell.class.is_some() {
                    continue;
                }
                let class = match cell.parent {
                    Some(parent) => inherited_class(pyramid, cell, parent)?,
                    None => {
                        let fused = if policy.is_fusible(cell) {
                            best_fusion(pyramid, cell, policy)
                        } else {
                            None
                        };
                        match fused {
                            Some(class) => {
                                out.regions[class.0 as usize].fused += 1;
                                out.fused += 1;
                                class
                            }
                            None => {
                                let id = next_class_id(out.regions.len(), cell.index)?;
                                out.regions.push(Region {
                                    id,
                                    seed: cell.index,
                                    fused: 0,
                                    base_area: 0,
                                });
                                id
                            }
                        }
                    }
                };
                pyramid.levels_mut()[n].get_mut(row, col).class = Some(class);
            }
        }
        log::debug!("level {n} classified, {} classes so far", out.regions.len());
    }

    for class in pyramid.level(0).cells.iter().filter_map(|c| c.class) {
        out.regions[class.0 as usize].base_area += 1;
    }
    log::info!("{} classes, {} orphans fused", out.regions.len(), out.fused);
    Ok(out)
}

/// Identifier for the class founded by `seed` when `count` classes exist.
fn next_class_id(count: usize, seed: CellIndex) -> Result<ClassId> {
    u32::try_from(count)
        .map(ClassId)
        .map_err(|_| PyramidError::Invariant {
            index: seed,
            reason: format!("class identifiers exhausted after {count} classes"),
        })
}

fn inherited_class(pyramid: &Pyramid, cell: &Cell, parent: CellIndex) -> Result<ClassId> {
    pyramid
        .cell(parent)
        .and_then(|p| p.class)
        .ok_or_else(|| PyramidError::Invariant {
            index: cell.index,
            reason: format!("parent {parent} was not classified before its child"),
        })
}

/// Already-classified nodes adjacent to `cell`'s footprint: its same-level
/// neighbours and the nodes covering them on every level above.
pub fn fusion_candidates(pyramid: &Pyramid, cell: &Cell) -> Vec<CellIndex> {
    let idx = cell.index;
    let level = pyramid.level(idx.level);
    let mut out = Vec::new();
    for nb in idx.neighbours(level.rows, level.cols) {
        for m in idx.level..pyramid.level_count() {
            push_unique(&mut out, nb.covering(m));
        }
    }
    out.retain(|&p| pyramid.cell(p).is_some_and(|c| c.is_valid() && c.class.is_some()));
    out
}

fn best_fusion(pyramid: &Pyramid, cell: &Cell, policy: &dyn CandidatePolicy) -> Option<ClassId> {
    let candidates = fusion_candidates(pyramid, cell);
    best_candidate(
        candidates.iter().filter_map(|&p| pyramid.cell(p)),
        |cand| policy.fusion_score(cell, cand),
    )
    .and_then(|(best, _)| best.class)
}
