use rstar::{AABB, RTree, RTreeObject};

use crate::bbox::{BoundingBox, overlaps};
use crate::config::{AssignStrategy, GenerationWindow};
use crate::grid::Cell;
use crate::indexer::WayIndex;
use crate::way::Way;

// Way bounds keyed by position in the index, so candidates can be restored to ingestion order
struct IndexedWay {
    position: usize,
    bounds: BoundingBox,
}

impl RTreeObject for IndexedWay {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds.envelope()
    }
}

/// Ways selected for one cell.
#[derive(Debug)]
pub struct CellAssignment<'a> {
    pub cell: Cell,
    pub ways: Vec<&'a Way>,
}

/// Outcome of the pre-checks for a single cell.
#[derive(Debug, PartialEq, Eq)]
pub enum CellPlan {
    /// Outside the generation window.
    OutsideWindow,
    /// No way can reach the cell and empty tiles were not requested.
    NoData,
    Build,
}

/// Selects, per cell, every way whose bounds overlap the margin-expanded cell.
pub struct TileAssigner<'a> {
    index: &'a WayIndex,
    margin: f64,
    window: Option<GenerationWindow>,
    generate_empty_files: bool,
    tree: Option<RTree<IndexedWay>>,
}

impl<'a> TileAssigner<'a> {
    pub fn new(
        index: &'a WayIndex,
        margin: f64,
        window: Option<GenerationWindow>,
        generate_empty_files: bool,
        strategy: AssignStrategy,
    ) -> Self {
        let tree = match strategy {
            AssignStrategy::Linear => None,
            AssignStrategy::RTree => Some(RTree::bulk_load(
                index
                    .ways()
                    .iter()
                    .enumerate()
                    .map(|(position, way)| IndexedWay {
                        position,
                        bounds: way.bounds,
                    })
                    .collect(),
            )),
        };

        Self {
            index,
            margin,
            window,
            generate_empty_files,
            tree,
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn plan(&self, cell: &Cell) -> CellPlan {
        if let Some(window) = &self.window {
            if !window.admits(&cell.bounds, self.margin) {
                return CellPlan::OutsideWindow;
            }
        }

        let expanded = cell.bounds.expand(self.margin);
        let reachable = self
            .index
            .bounds()
            .is_some_and(|global| overlaps(&global.expand(self.margin), &expanded));
        if !reachable && !self.generate_empty_files {
            return CellPlan::NoData;
        }

        CellPlan::Build
    }

    /// Ways overlapping the cell grown by the margin, in ingestion order.
    pub fn assign(&self, cell: &Cell) -> CellAssignment<'a> {
        let expanded = cell.bounds.expand(self.margin);
        let ways = self.index.ways();

        let selected: Vec<&'a Way> = match &self.tree {
            None => ways
                .iter()
                .filter(|way| overlaps(&way.bounds, &expanded))
                .collect(),
            Some(tree) => {
                let mut positions: Vec<usize> = tree
                    .locate_in_envelope_intersecting(&expanded.envelope())
                    .filter(|candidate| overlaps(&candidate.bounds, &expanded))
                    .map(|candidate| candidate.position)
                    .collect();
                positions.sort_unstable();
                positions.into_iter().map(|p| &ways[p]).collect()
            }
        };

        CellAssignment {
            cell: *cell,
            ways: selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::Coordinate;
    use crate::config::GridConfig;
    use crate::grid::Grid;
    use crate::way::{RawWay, SpeedOverrides};

    const MARGIN: f64 = 0.01;

    fn raw(id: i64, points: &[(f64, f64)]) -> RawWay {
        RawWay {
            id,
            coordinates: points
                .iter()
                .map(|&(lat, lon)| Coordinate::new(lat, lon))
                .collect(),
            ..RawWay::default()
        }
    }

    fn sample_ways() -> Vec<RawWay> {
        vec![
            // Well inside [0, 0.25] x [0, 0.25]
            raw(1, &[(0.1, 0.1), (0.15, 0.15)]),
            // Crosses the eastern edge of that cell by 0.005 degrees
            raw(2, &[(0.1, 0.245), (0.12, 0.255)]),
            // Within the margin of the northern edge, but not crossing it
            raw(3, &[(0.245, 0.1), (0.248, 0.12)]),
            raw(4, &[(45.0, 45.0), (45.1, 45.1)]),
        ]
    }

    fn sample_index() -> WayIndex {
        WayIndex::build(sample_ways(), &SpeedOverrides::default())
    }

    fn ids_per_cell(assigner: &TileAssigner, grid: &Grid) -> Vec<(u32, u32, Vec<i64>)> {
        let mut out = Vec::new();
        for row in 355..366 {
            for col in 715..726 {
                let cell = grid.cell_at(row, col).unwrap();
                let assignment = assigner.assign(&cell);
                if !assignment.ways.is_empty() {
                    out.push((
                        row,
                        col,
                        assignment.ways.iter().map(|w| w.id).collect(),
                    ));
                }
            }
        }
        out
    }

    #[test]
    fn test_margin_duplicates_near_boundary_ways() {
        let index = sample_index();
        let grid = Grid::new(&GridConfig::default()).unwrap();
        let assigner = TileAssigner::new(&index, MARGIN, None, false, AssignStrategy::Linear);

        let count = |id: i64| {
            ids_per_cell(&assigner, &grid)
                .iter()
                .filter(|(_, _, ids)| ids.contains(&id))
                .count()
        };

        // [0, 0.25] x [0, 0.25] is row 360, col 720
        let home = assigner.assign(&grid.cell_at(360, 720).unwrap());
        let ids: Vec<i64> = home.ways.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(count(1), 1);
        assert_eq!(count(2), 2);
        assert_eq!(count(3), 2);

        let east = assigner.assign(&grid.cell_at(360, 721).unwrap());
        assert_eq!(east.ways.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_rtree_matches_linear_scan() {
        let index = sample_index();
        let grid = Grid::new(&GridConfig::default()).unwrap();
        let linear = TileAssigner::new(&index, MARGIN, None, false, AssignStrategy::Linear);
        let indexed = TileAssigner::new(&index, MARGIN, None, false, AssignStrategy::RTree);

        assert_eq!(
            ids_per_cell(&linear, &grid),
            ids_per_cell(&indexed, &grid)
        );

        let far = grid.cell_containing(Coordinate::new(45.05, 45.05)).unwrap();
        assert_eq!(indexed.assign(&far).ways.len(), 1);
    }

    #[test]
    fn test_plan_skips_window_and_empty_cells() {
        let mut ways = sample_ways();
        ways.truncate(3);
        let index = WayIndex::build(ways, &SpeedOverrides::default());
        let grid = Grid::new(&GridConfig::default()).unwrap();
        let window = Some(GenerationWindow::new(0, 0, 1, 1));

        let assigner = TileAssigner::new(&index, MARGIN, window, false, AssignStrategy::RTree);
        let home = grid.cell_at(360, 720).unwrap();
        let outside = grid.cell_at(359, 720).unwrap();
        let empty = grid.cell_at(363, 723).unwrap();

        assert_eq!(assigner.plan(&home), CellPlan::Build);
        assert_eq!(assigner.plan(&outside), CellPlan::OutsideWindow);
        assert_eq!(assigner.plan(&empty), CellPlan::NoData);

        let with_empty = TileAssigner::new(&index, MARGIN, window, true, AssignStrategy::RTree);
        assert_eq!(with_empty.plan(&empty), CellPlan::Build);
        assert!(with_empty.assign(&empty).ways.is_empty());
    }

    #[test]
    fn test_plan_without_ways() {
        let index = WayIndex::default();
        let grid = Grid::new(&GridConfig::default()).unwrap();
        let cell = grid.cell_at(360, 720).unwrap();

        let assigner = TileAssigner::new(&index, MARGIN, None, false, AssignStrategy::Linear);
        assert_eq!(assigner.plan(&cell), CellPlan::NoData);

        let with_empty = TileAssigner::new(&index, MARGIN, None, true, AssignStrategy::Linear);
        assert_eq!(with_empty.plan(&cell), CellPlan::Build);
    }
}
