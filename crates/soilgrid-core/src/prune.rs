//! Pruning: drop non-homogeneous nodes, then repair back-references.
//!
//! The two passes are strictly sequential. A parent's validity can only be
//! judged once every reset of the first pass has landed.
use crate::cell::{Cell, CellIndex};
use crate::error::{PyramidError, Result};
use crate::pyramid::Pyramid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Positions returned to the sentinel state (already-empty cells excluded).
    pub reset: usize,
    /// Parent links cleared because the parent was reset.
    pub repaired: usize,
}

pub fn prune(pyramid: &mut Pyramid) -> PruneSummary {
    let reset = reset_pass(pyramid);
    let repaired = repair_pass(pyramid);
    log::info!("pruned {reset} nodes, repaired {repaired} parent links");
    PruneSummary { reset, repaired }
}

/// Pass 1, apex → base: every cell that is not homogeneous goes back to sentinel.
fn reset_pass(pyramid: &mut Pyramid) -> usize {
    let mut reset = 0;
    for level in pyramid.levels_mut().iter_mut().rev() {
        for cell in level.cells.iter_mut().filter(|c| !c.is_homogeneous()) {
            if *cell != Cell::new(cell.id, cell.index) {
                reset += 1;
            }
            cell.reset();
        }
    }
    reset
}

/// Pass 2, apex → base: a valid cell whose parent is no longer valid loses
/// the link.
fn repair_pass(pyramid: &mut Pyramid) -> usize {
    let mut repaired = 0;
    for n in (0..pyramid.level_count()).rev() {
        let stale: Vec<CellIndex> = pyramid
            .level(n)
            .cells
            .iter()
            .filter(|c| c.is_valid())
            .filter(|c| c.parent.is_some_and(|p| !pyramid.cell(p).is_some_and(Cell::is_valid)))
            .map(|c| c.index)
            .collect();
        for idx in stale {
            if let Some(cell) = pyramid.cell_mut(idx) {
                cell.clear_parent();
                repaired += 1;
            }
        }
    }
    repaired
}

/// Check that every valid cell's parent, if any, is itself valid and sits one
/// level up.
pub fn verify_parent_links(pyramid: &Pyramid) -> Result<()> {
    for level in pyramid.levels() {
        for cell in level.cells.iter().filter(|c| c.is_valid()) {
            let Some(parent) = cell.parent else { continue };
            if parent.level != cell.index.level + 1 {
                return Err(PyramidError::Invariant {
                    index: cell.index,
                    reason: format!("parent {parent} is not one level up"),
                });
            }
            if !pyramid.cell(parent).is_some_and(Cell::is_valid) {
                return Err(PyramidError::Invariant {
                    index: cell.index,
                    reason: format!("parent {parent} is not a valid node"),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AttributeMatch};
    use crate::cell::Homogeneity;
    use crate::pyramid::tests::loaded;

    /// Top-left quadrant uniform, every other cell distinct.
    fn quadrant_scenario() -> Pyramid {
        let mut p = loaded(4, 4, |r, c| if r < 2 && c < 2 { 0.5 } else { (r * 4 + c) as f64 });
        aggregate(&mut p, AttributeMatch::Exact);
        p
    }

    #[test]
    fn heterogeneous_nodes_are_reset() {
        let mut p = quadrant_scenario();
        let summary = prune(&mut p);
        // Three level-1 nodes plus the apex.
        assert_eq!(summary.reset, 4);
        assert_eq!(summary.repaired, 0);

        assert!(p.level(1).get(0, 0).is_valid());
        for (r, c) in [(0, 1), (1, 0), (1, 1)] {
            let cell = p.level(1).get(r, c);
            assert!(!cell.is_valid());
            assert_eq!(cell.homogeneity, Homogeneity::Unset);
        }
        assert!(!p.level(2).get(0, 0).is_valid());
        assert_eq!(p.valid_count(), 16 + 1);
        verify_parent_links(&p).unwrap();
    }

    #[test]
    fn links_to_reset_parents_are_cleared() {
        let mut p = quadrant_scenario();
        // Point a surviving base cell at a node the reset pass will clear.
        p.cell_mut(CellIndex::new(0, 0, 3)).unwrap().set_parent(CellIndex::new(1, 0, 1));
        let summary = prune(&mut p);
        assert_eq!(summary.repaired, 1);
        assert!(p.level(0).get(0, 3).parent.is_none());
        let live = p.level(0).get(0, 0).parent;
        assert_eq!(live, Some(CellIndex::new(1, 0, 0)), "live links survive");
    }

    /// After pruning, every valid cell's parent is valid.
    #[test]
    fn surviving_parents_are_valid() {
        let mut p = loaded(32, 32, |r, c| ((r / 8) * 3 + (c / 4)) as f64 % 5.0);
        aggregate(&mut p, AttributeMatch::Exact);
        prune(&mut p);
        verify_parent_links(&p).unwrap();
    }

    #[test]
    fn verify_reports_dangling_parent() {
        let mut p = quadrant_scenario();
        prune(&mut p);
        p.cell_mut(CellIndex::new(0, 3, 3)).unwrap().set_parent(CellIndex::new(1, 1, 1));
        match verify_parent_links(&p) {
            Err(PyramidError::Invariant { index, .. }) => {
                assert_eq!(index, CellIndex::new(0, 3, 3))
            }
            other => panic!("expected invariant error, got {other:?}"),
        }
    }
}
