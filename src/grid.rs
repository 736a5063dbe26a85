use crate::bbox::{BoundingBox, Coordinate, point_in_box};
use crate::config::{BoundaryPolicy, GridConfig};
use crate::error::TileError;

/// One fixed-size rectangle of the global grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub bounds: BoundingBox,
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell {}/{} {}", self.row, self.col, self.bounds)
    }
}

/// The fixed grid tiling [-90, 90) x [-180, 180).
///
/// Cells are derived from integer row/column indices, never by accumulating
/// floating-point steps, so repeated enumeration is bit-identical.
#[derive(Clone, Debug)]
pub struct Grid {
    cells_per_degree: u32,
    policy: BoundaryPolicy,
}

impl Grid {
    pub fn new(config: &GridConfig) -> Result<Self, TileError> {
        config.validate()?;
        Ok(Self {
            cells_per_degree: config.cells_per_degree,
            policy: config.boundary_policy,
        })
    }

    pub fn rows(&self) -> u32 {
        180 * self.cells_per_degree
    }

    pub fn cols(&self) -> u32 {
        360 * self.cells_per_degree
    }

    pub fn cell_count(&self) -> usize {
        self.rows() as usize * self.cols() as usize
    }

    pub fn cell_degrees(&self) -> f64 {
        1.0 / self.cells_per_degree as f64
    }

    fn edge(&self, index: u32, offset_degrees: i64) -> f64 {
        let n = self.cells_per_degree as i64;
        (index as i64 - offset_degrees * n) as f64 / n as f64
    }

    pub fn cell_at(&self, row: u32, col: u32) -> Option<Cell> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        Some(Cell {
            row,
            col,
            bounds: BoundingBox::new(
                self.edge(row, 90),
                self.edge(col, 180),
                self.edge(row + 1, 90),
                self.edge(col + 1, 180),
            ),
        })
    }

    /// All cells in row-major order (latitude outer, longitude inner).
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols();
        (0..self.rows()).flat_map(move |row| {
            (0..cols).filter_map(move |col| self.cell_at(row, col))
        })
    }

    /// Finds the cell holding `point` under the configured boundary policy.
    ///
    /// The candidate is computed arithmetically and then confirmed against the
    /// actual cell bounds, checking direct neighbours to absorb rounding.
    pub fn cell_containing(&self, point: Coordinate) -> Option<Cell> {
        if !(-90.0..=90.0).contains(&point.latitude)
            || !(-180.0..=180.0).contains(&point.longitude)
        {
            return None;
        }
        let n = self.cells_per_degree as f64;
        let row = ((point.latitude + 90.0) * n).floor() as i64;
        let col = ((point.longitude + 180.0) * n).floor() as i64;

        for r in row - 1..=row + 1 {
            for c in col - 1..=col + 1 {
                if r < 0 || c < 0 {
                    continue;
                }
                let Some(cell) = self.cell_at(r as u32, c as u32) else {
                    continue;
                };
                let contained = match self.policy {
                    BoundaryPolicy::HalfOpen => cell.bounds.contains_half_open(point),
                    BoundaryPolicy::Strict => point_in_box(point, &cell.bounds),
                };
                if contained {
                    return Some(cell);
                }
            }
        }
        None
    }
}
