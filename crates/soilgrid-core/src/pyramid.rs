//! Quadtree pyramid storage: allocation, base-cell addressing, record loading.
//!
//! Level `n` has `⌈R/2ⁿ⌉ × ⌈C/2ⁿ⌉` cells and the pyramid has
//! `⌊log2(max(R, C))⌋ + 1` levels. Every level is a flat row-major array, so
//! `(level, row, col) → cell` is O(1).
use crate::cell::{Cell, CellIndex, ClassId};
use crate::error::{PyramidError, Result};
use crate::grid::Level;
use crate::loader::CellRecord;

#[derive(Debug, Clone)]
pub struct Pyramid {
    base_rows: usize,
    base_cols: usize,
    levels: Vec<Level>,
}

/// Outcome of populating the base level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Base cells with no record; they stay in the sentinel state.
    pub unpopulated: usize,
}

impl Pyramid {
    /// Allocate every level for an `rows × cols` base grid, all cells sentinel.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(PyramidError::InvalidDimensions { rows, cols });
        }
        let n_levels = level_count(rows, cols);
        let mut levels = Vec::with_capacity(n_levels);
        let mut next_id = 0u64;
        for n in 0..n_levels {
            let (r, c) = level_dims(rows, cols, n);
            levels.push(Level::new(n, r, c, next_id));
            next_id += (r * c) as u64;
        }
        log::debug!("allocated {n_levels} levels over a {rows}×{cols} base ({next_id} cells)");
        Ok(Self {
            base_rows: rows,
            base_cols: cols,
            levels,
        })
    }

    pub fn base_rows(&self) -> usize {
        self.base_rows
    }

    pub fn base_cols(&self) -> usize {
        self.base_cols
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Index of the coarsest level.
    pub fn apex_level(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn level(&self, n: usize) -> &Level {
        &self.levels[n]
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub(crate) fn levels_mut(&mut self) -> &mut [Level] {
        &mut self.levels
    }

    pub fn contains(&self, idx: CellIndex) -> bool {
        self.levels.get(idx.level).is_some_and(|l| l.contains(idx.row, idx.col))
    }

    /// Cell at `idx`, or `None` outside the pyramid.
    pub fn cell(&self, idx: CellIndex) -> Option<&Cell> {
        self.levels.get(idx.level)?.try_get(idx.row, idx.col)
    }

    pub fn cell_mut(&mut self, idx: CellIndex) -> Option<&mut Cell> {
        let level = self.levels.get_mut(idx.level)?;
        if level.contains(idx.row, idx.col) {
            Some(level.get_mut(idx.row, idx.col))
        } else {
            None
        }
    }

    /// Base-level coordinates of a loaded identifier: `(id / C, id % C)`.
    pub fn locate(&self, id: u64) -> Result<CellIndex> {
        let cells = (self.base_rows * self.base_cols) as u64;
        if id >= cells {
            return Err(PyramidError::IdOutOfRange { id, cells });
        }
        let cols = self.base_cols as u64;
        Ok(CellIndex::new(0, (id / cols) as usize, (id % cols) as usize))
    }

    /// Populate base cells from loaded records.
    pub fn load<I>(&mut self, records: I) -> Result<LoadSummary>
    where
        I: IntoIterator<Item = CellRecord>,
    {
        let mut loaded = 0usize;
        for record in records {
            let idx = self.locate(record.id)?;
            let cell = self.levels[0].get_mut(idx.row, idx.col);
            if cell.is_valid() {
                return Err(PyramidError::DuplicateRecord { id: record.id });
            }
            cell.populate(record.attributes);
            loaded += 1;
        }
        let unpopulated = self.levels[0].len() - loaded;
        if unpopulated > 0 {
            log::warn!("{unpopulated} base cells have no record and stay empty");
        }
        Ok(LoadSummary {
            loaded,
            unpopulated,
        })
    }

    /// All positions, apex level first, row-major within a level.
    pub fn top_down(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.levels.iter().rev().flat_map(|l| {
            (0..l.rows).flat_map(move |r| (0..l.cols).map(move |c| CellIndex::new(l.level, r, c)))
        })
    }

    pub fn valid_count(&self) -> usize {
        self.levels.iter().map(Level::valid_count).sum()
    }

    pub fn orphan_count(&self) -> usize {
        self.levels.iter().map(Level::orphan_count).sum()
    }

    /// Homogeneous node count per level, base first.
    pub fn homogeneous_per_level(&self) -> Vec<usize> {
        self.levels.iter().map(Level::homogeneous_count).collect()
    }

    /// Class of every base cell, row-major. `None` for unpopulated cells.
    pub fn base_classes(&self) -> Vec<Option<ClassId>> {
        self.levels[0].cells.iter().map(|c| c.class).collect()
    }
}

/// `⌊log2(max(rows, cols))⌋ + 1`.
pub fn level_count(rows: usize, cols: usize) -> usize {
    rows.max(cols).ilog2() as usize + 1
}

/// Dimensions of level `n`: `⌈rows/2ⁿ⌉ × ⌈cols/2ⁿ⌉`.
pub fn level_dims(rows: usize, cols: usize, n: usize) -> (usize, usize) {
    let scale = 1usize << n;
    (rows.div_ceil(scale), cols.div_ceil(scale))
}
