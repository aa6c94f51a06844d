use crate::cell::{Cell, CellIndex};

/// One pyramid level: a 2D grid of cells stored row-major.
#[derive(Debug, Clone)]
pub struct Level {
    /// Row-major cells, `rows * cols` long.
    pub cells: Vec<Cell>,
    pub rows: usize,
    pub cols: usize,
    pub level: usize,
}

impl Level {
    /// Allocate a level of sentinel cells, numbering them from `first_id`.
    pub fn new(level: usize, rows: usize, cols: usize, first_id: u64) -> Self {
        let cells = (0..rows * cols)
            .map(|offset| {
                let index = CellIndex::new(level, offset / cols, offset % cols);
                Cell::new(first_id + offset as u64, index)
            })
            .collect();
        Self {
            cells,
            rows,
            cols,
            level,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &Cell {
        &self.cells[self.offset(row, col)]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        let offset = self.offset(row, col);
        &mut self.cells[offset]
    }

    /// Cell at `(row, col)`, or `None` outside the level.
    pub fn try_get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.contains(row, col).then(|| self.get(row, col))
    }

    pub fn valid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_valid()).count()
    }

    pub fn homogeneous_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_homogeneous()).count()
    }

    pub fn orphan_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_orphan()).count()
    }
}
