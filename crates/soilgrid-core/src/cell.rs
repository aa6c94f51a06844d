//! Pyramid node types: coordinates, homogeneity state, class labels.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::SoilAttributes;

/// Address of a node: pyramid level (0 = base) plus row/column inside that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    pub level: usize,
    pub row: usize,
    pub col: usize,
}

impl CellIndex {
    pub fn new(level: usize, row: usize, col: usize) -> Self {
        Self { level, row, col }
    }

    /// The node one level up whose quadrant contains this one.
    #[inline]
    pub fn quadrant_parent(&self) -> CellIndex {
        CellIndex::new(self.level + 1, self.row / 2, self.col / 2)
    }

    /// The node at `level` (>= self.level) whose footprint covers this one.
    #[inline]
    pub fn covering(&self, level: usize) -> CellIndex {
        let shift = level - self.level;
        CellIndex::new(level, self.row >> shift, self.col >> shift)
    }

    /// Quadrant children one level down, in NW, NE, SW, SE order.
    /// Some may fall outside the lower level on the bottom/right edge.
    pub fn quadrant_children(&self) -> [CellIndex; 4] {
        let (r, c, l) = (self.row * 2, self.col * 2, self.level - 1);
        [
            CellIndex::new(l, r, c),
            CellIndex::new(l, r, c + 1),
            CellIndex::new(l, r + 1, c),
            CellIndex::new(l, r + 1, c + 1),
        ]
    }

    /// 4-connected neighbours on the same level, clipped to `rows × cols`.
    pub fn neighbours(&self, rows: usize, cols: usize) -> impl Iterator<Item = CellIndex> + '_ {
        const STEPS: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
        STEPS.iter().filter_map(move |&(dr, dc)| {
            let r = self.row.checked_add_signed(dr)?;
            let c = self.col.checked_add_signed(dc)?;
            (r < rows && c < cols).then(|| CellIndex::new(self.level, r, c))
        })
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}({},{})", self.level, self.row, self.col)
    }
}

/// Tri-state homogeneity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Homogeneity {
    /// Never evaluated, or cleared by the pruner.
    #[default]
    Unset,
    Homogeneous,
    Heterogeneous,
}

/// Final region label assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class-{}", self.0)
    }
}

/// One pyramid node.
///
/// `area == None` is the sentinel state: the position holds no aggregate and
/// every pass after pruning skips it. `parent` is a non-owning index into the
/// pyramid, never a pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: u64,
    pub index: CellIndex,
    pub attributes: Option<SoilAttributes>,
    pub homogeneity: Homogeneity,
    /// Number of base cells represented.
    pub area: Option<u64>,
    pub parent: Option<CellIndex>,
    pub class: Option<ClassId>,
}

impl Cell {
    /// A sentinel cell at `index`.
    pub fn new(id: u64, index: CellIndex) -> Self {
        Self {
            id,
            index,
            attributes: None,
            homogeneity: Homogeneity::Unset,
            area: None,
            parent: None,
            class: None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.area.is_some()
    }

    #[inline]
    pub fn is_homogeneous(&self) -> bool {
        self.homogeneity == Homogeneity::Homogeneous
    }

    /// Valid and without a parent link.
    #[inline]
    pub fn is_orphan(&self) -> bool {
        self.is_valid() && self.parent.is_none()
    }

    /// Populate a base cell from a loaded record.
    pub fn populate(&mut self, attributes: SoilAttributes) {
        self.attributes = Some(attributes);
        self.homogeneity = Homogeneity::Homogeneous;
        self.area = Some(1);
    }

    /// Return to the sentinel state, keeping identifier and coordinates.
    pub fn reset(&mut self) {
        *self = Cell::new(self.id, self.index);
    }

    pub fn set_parent(&mut self, parent: CellIndex) {
        debug_assert_eq!(parent.level, self.index.level + 1);
        self.parent = Some(parent);
    }

    pub fn clear_parent(&mut self) {
        self.parent = None;
    }
}
