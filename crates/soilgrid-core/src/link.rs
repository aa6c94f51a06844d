//! Fixed-point linking of orphan nodes to neighbouring aggregates.
//!
//! An orphan at `(n, i, j)` may adopt a parent among the valid nodes at level
//! `n+1` whose footprint covers the orphan itself or one of its four
//! same-level neighbours. Sweeps run apex → base until one makes no change.
//!
//! A link credits the orphan's area to its new parent and every ancestor
//! above it, so a root's `area` always counts the base cells it represents.
//!
//! Every accepted link turns exactly one orphan into a linked node and links
//! are never undone, so a terminating run needs at most `orphans + 1` sweeps.
//! Exceeding that cap means the policy accepted a link without changing state.
use crate::cell::{Cell, CellIndex};
use crate::error::{PyramidError, Result};
use crate::par;
use crate::policy::{best_candidate, push_unique, CandidatePolicy};
use crate::pyramid::Pyramid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    /// Sweeps run, including the final no-change sweep.
    pub sweeps: usize,
    pub links: usize,
}

/// Run sweeps until a fixed point is reached.
pub fn link(pyramid: &mut Pyramid, policy: &dyn CandidatePolicy) -> Result<LinkSummary> {
    let cap = pyramid.orphan_count() + 1;
    let mut summary = LinkSummary::default();
    loop {
        if summary.sweeps == cap {
            return Err(PyramidError::NonConvergence { cap });
        }
        let changed = link_sweep(pyramid, policy);
        summary.sweeps += 1;
        summary.links += changed;
        log::debug!("link sweep {}: {changed} links", summary.sweeps);
        if changed == 0 {
            break;
        }
    }
    log::info!(
        "linking converged after {} sweeps with {} links",
        summary.sweeps,
        summary.links
    );
    Ok(summary)
}

/// One full apex → base sweep. Returns the number of links made.
///
/// Decisions for level `n` read only the validity and attributes of level
/// `n+1`. Linking writes neither, so a level's decisions are evaluated
/// together and applied afterwards, area credits last.
pub fn link_sweep(pyramid: &mut Pyramid, policy: &dyn CandidatePolicy) -> usize {
    let mut changed = 0;
    // The apex has nothing above it.
    for n in (0..pyramid.apex_level()).rev() {
        let decisions = {
            let view: &Pyramid = pyramid;
            let level = view.level(n);
            par::map_offsets(level.len(), |offset| {
                let cell = &level.cells[offset];
                if !cell.is_orphan() || !policy.is_linkable(cell) {
                    return None;
                }
                best_link(view, cell, policy)
            })
        };

        let mut credits = Vec::new();
        let level = &mut pyramid.levels_mut()[n];
        for (cell, decision) in level.cells.iter_mut().zip(decisions) {
            if let Some(parent) = decision {
                if cell.parent.is_none() {
                    cell.set_parent(parent);
                    credits.push((parent, cell.area.unwrap_or(0)));
                    changed += 1;
                }
            }
        }
        for (parent, area) in credits {
            credit_area(pyramid, parent, area);
        }
    }
    changed
}

/// Add `area` to `from` and every node up its parent chain.
fn credit_area(pyramid: &mut Pyramid, from: CellIndex, area: u64) {
    let mut cursor = Some(from);
    while let Some(idx) = cursor {
        let Some(cell) = pyramid.cell_mut(idx) else {
            break;
        };
        if let Some(total) = cell.area.as_mut() {
            *total += area;
        }
        cursor = cell.parent;
    }
}

/// Parent positions an orphan may link to.
pub fn link_candidates(pyramid: &Pyramid, cell: &Cell) -> Vec<CellIndex> {
    let idx = cell.index;
    let level = pyramid.level(idx.level);
    let mut out = vec![idx.quadrant_parent()];
    for nb in idx.neighbours(level.rows, level.cols) {
        push_unique(&mut out, nb.quadrant_parent());
    }
    out.retain(|&p| pyramid.cell(p).is_some_and(Cell::is_valid));
    out
}

fn best_link(pyramid: &Pyramid, cell: &Cell, policy: &dyn CandidatePolicy) -> Option<CellIndex> {
    let candidates = link_candidates(pyramid, cell);
    best_candidate(
        candidates.iter().filter_map(|&p| pyramid.cell(p)),
        |cand| policy.link_score(cell, cand),
    )
    .map(|(best, _)| best.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AttributeMatch};
    use crate::policy::{AttributeDistancePolicy, PolicyConfig};
    use crate::prune::{prune, verify_parent_links};
    use crate::pyramid::tests::loaded;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn linking(tolerance: f64) -> AttributeDistancePolicy {
        AttributeDistancePolicy::new(PolicyConfig {
            link_tolerance: Some(tolerance),
            ..Default::default()
        })
    }

    fn prepared(rows: usize, cols: usize, value: impl Fn(usize, usize) -> f64) -> Pyramid {
        let mut p = loaded(rows, cols, value);
        aggregate(&mut p, AttributeMatch::Exact);
        prune(&mut p);
        p
    }

    /// Accepts every candidate it is shown.
    struct AcceptAll;

    impl CandidatePolicy for AcceptAll {
        fn is_linkable(&self, _: &Cell) -> bool {
            true
        }
        fn link_score(&self, _: &Cell, _: &Cell) -> Option<f64> {
            Some(0.0)
        }
        fn is_fusible(&self, _: &Cell) -> bool {
            false
        }
        fn fusion_score(&self, _: &Cell, _: &Cell) -> Option<f64> {
            None
        }
    }

    #[test]
    fn disabled_policy_makes_one_empty_sweep() {
        let mut p = prepared(4, 4, |r, c| (r * 4 + c) as f64);
        let summary = link(&mut p, &AttributeDistancePolicy::default()).unwrap();
        assert_eq!(summary, LinkSummary { sweeps: 1, links: 0 });
    }

    /// Orphans next to the homogeneous top-left block link to it when close enough.
    #[test]
    fn orphans_link_to_adjacent_aggregate_within_tolerance() {
        // Top-left 2×2 block at 1.0; (0,2) and (2,0) are close to it, the rest far.
        let value = |r: usize, c: usize| match (r, c) {
            (r, c) if r < 2 && c < 2 => 1.0,
            (0, 2) => 1.05,
            (2, 0) => 0.97,
            _ => 10.0 + (r * 4 + c) as f64,
        };
        let mut p = prepared(4, 4, value);
        let block = CellIndex::new(1, 0, 0);
        let summary = link(&mut p, &linking(0.1)).unwrap();

        assert_eq!(summary.links, 2);
        assert_eq!(summary.sweeps, 2, "one linking sweep plus the confirming sweep");
        assert_eq!(p.level(0).get(0, 2).parent, Some(block));
        assert_eq!(p.level(0).get(2, 0).parent, Some(block));
        assert!(p.level(0).get(1, 2).parent.is_none(), "far cells stay orphans");
        assert_eq!(p.cell(block).unwrap().area, Some(6), "linked cells count toward the block");
        verify_parent_links(&p).unwrap();
    }

    /// Credits climb the whole parent chain of the link target.
    #[test]
    fn linked_area_reaches_every_ancestor() {
        // 8×8: top-left 4×4 block uniform, (0,4) close to it, the rest distinct.
        let value = |r: usize, c: usize| match (r, c) {
            (r, c) if r < 4 && c < 4 => 1.0,
            (0, 4) => 1.02,
            _ => 10.0 + (r * 8 + c) as f64,
        };
        let mut p = prepared(8, 8, value);
        link(&mut p, &linking(0.05)).unwrap();

        assert_eq!(p.level(0).get(0, 4).parent, Some(CellIndex::new(1, 0, 1)));
        assert_eq!(p.level(1).get(0, 1).area, Some(5));
        assert_eq!(p.level(2).get(0, 0).area, Some(17));
    }

    #[test]
    fn candidates_are_bounded_to_neighbouring_parents() {
        let p = prepared(8, 8, |r, c| if r < 4 && c < 4 { 0.0 } else { (r * 8 + c) as f64 });
        // (0,1,4) borders the uniform block through its left neighbour (0,1,3).
        let cell = p.level(0).get(1, 4).clone();
        let cands = link_candidates(&p, &cell);
        assert_eq!(cands, vec![CellIndex::new(1, 0, 1)]);
        let inner = p.level(0).get(7, 7).clone();
        assert!(link_candidates(&p, &inner).is_empty());
    }

    /// After convergence another sweep changes nothing.
    #[test]
    fn converged_pyramid_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid: Vec<f64> = (0..32 * 32).map(|_| rng.gen_range(0..3) as f64 * 0.1).collect();
        let mut p = prepared(32, 32, |r, c| grid[r * 32 + c]);
        let policy = linking(0.1);
        link(&mut p, &policy).unwrap();
        assert_eq!(link_sweep(&mut p, &policy), 0);
        verify_parent_links(&p).unwrap();
        for level in p.levels() {
            for cell in level.cells.iter().filter(|c| c.parent.is_some()) {
                assert_eq!(cell.parent.unwrap().level, cell.index.level + 1);
            }
        }
    }

    /// Even a policy that accepts everything converges: links are never undone.
    #[test]
    fn permissive_policy_converges_within_cap() {
        let mut p = prepared(8, 8, |r, c| if r < 4 && c < 4 { 0.0 } else { (r * 8 + c) as f64 });
        let orphans = p.orphan_count();
        let summary = link(&mut p, &AcceptAll).unwrap();
        assert_eq!(summary.sweeps, 2);
        assert!(summary.links > 0 && summary.links <= orphans);
        assert_eq!(p.orphan_count(), orphans - summary.links);
        verify_parent_links(&p).unwrap();
    }
}
