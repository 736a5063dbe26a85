use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::TileError;

/// How a query point lying exactly on a grid line is mapped to a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Minimum edges inclusive, maximum edges exclusive. Every point of
    /// [-90, 90) x [-180, 180) belongs to exactly one cell.
    #[default]
    HalfOpen,
    /// Strict containment on all four edges; points on grid lines match no cell.
    Strict,
}

/// Grid and tile layout settings. Persisted indirectly: the overlap is written
/// into every tile and the cell size is recoverable from the tile bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Cells per degree along each axis; a cell is `1 / cells_per_degree` degrees wide.
    pub cells_per_degree: u32,
    /// Size in whole degrees of the shard directories grouping tile files.
    pub group_degrees: u32,
    /// Margin in degrees used when assigning ways to cells.
    pub overlap_degrees: f64,
    pub boundary_policy: BoundaryPolicy,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cells_per_degree: 4,
            group_degrees: 2,
            overlap_degrees: 0.01,
            boundary_policy: BoundaryPolicy::HalfOpen,
        }
    }
}

impl GridConfig {
    pub fn cell_degrees(&self) -> f64 {
        1.0 / self.cells_per_degree as f64
    }

    pub fn validate(&self) -> Result<(), TileError> {
        if self.cells_per_degree == 0 {
            return Err(TileError::InvalidConfig(
                "cells_per_degree must be at least 1".to_string(),
            ));
        }
        if self.group_degrees == 0 {
            return Err(TileError::InvalidConfig(
                "group_degrees must be at least 1".to_string(),
            ));
        }
        if !self.overlap_degrees.is_finite() || self.overlap_degrees < 0.0 {
            return Err(TileError::InvalidConfig(format!(
                "overlap_degrees must be a non-negative number, got {}",
                self.overlap_degrees
            )));
        }
        Ok(())
    }
}

/// Integer degree rectangle restricting which cells a build writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationWindow {
    pub min_lat: i32,
    pub min_lon: i32,
    pub max_lat: i32,
    pub max_lon: i32,
}

impl GenerationWindow {
    pub fn new(min_lat: i32, min_lon: i32, max_lat: i32, max_lon: i32) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn world() -> Self {
        Self::new(-90, -180, 90, 180)
    }

    pub fn validate(&self) -> Result<(), TileError> {
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(TileError::InvalidConfig(format!(
                "generation window has min above max: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// A cell is admitted when it lies inside the window grown by `margin`.
    pub fn admits(&self, cell: &BoundingBox, margin: f64) -> bool {
        !(cell.min_lat < self.min_lat as f64 - margin
            || cell.min_lon < self.min_lon as f64 - margin
            || cell.max_lat > self.max_lat as f64 + margin
            || cell.max_lon > self.max_lon as f64 + margin)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignStrategy {
    /// Test every way against every cell.
    Linear,
    /// Pre-filter candidate ways with an R-tree over way bounds.
    #[default]
    RTree,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// `None` builds the whole planet.
    pub window: Option<GenerationWindow>,
    /// Write tiles for cells that provably contain no ways.
    pub generate_empty_files: bool,
    pub assign_strategy: AssignStrategy,
    /// Worker threads for the per-cell stage; `None` uses rayon's default.
    pub threads: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GridConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cell_degrees(), 0.25);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let zero_cells = GridConfig {
            cells_per_degree: 0,
            ..GridConfig::default()
        };
        assert!(matches!(
            zero_cells.validate(),
            Err(TileError::InvalidConfig(_))
        ));

        let negative_overlap = GridConfig {
            overlap_degrees: -0.5,
            ..GridConfig::default()
        };
        assert!(negative_overlap.validate().is_err());

        assert!(GenerationWindow::new(10, 0, 5, 1).validate().is_err());
    }

    #[test]
    fn test_window_admits_with_margin() {
        let window = GenerationWindow::new(50, 16, 51, 17);

        assert!(window.admits(&BoundingBox::new(50.0, 16.0, 50.25, 16.25), 0.01));
        assert!(window.admits(&BoundingBox::new(50.75, 16.75, 51.0, 17.0), 0.01));
        assert!(!window.admits(&BoundingBox::new(51.0, 16.0, 51.25, 16.25), 0.01));
        assert!(!window.admits(&BoundingBox::new(49.75, 16.0, 50.0, 16.25), 0.01));
        assert!(GenerationWindow::world().admits(&BoundingBox::new(-90.0, -180.0, -89.75, -179.75), 0.0));
    }
}
