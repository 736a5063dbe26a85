use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::assigner::{CellPlan, TileAssigner};
use crate::codec;
use crate::config::{BuildOptions, GridConfig};
use crate::grid::Cell;
use crate::indexer::WayIndex;
use crate::osm;
use crate::store::TileStore;
use crate::way::SpeedOverrides;

/// Counters reported at the end of a build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub ways_indexed: usize,
    pub ways_discarded: usize,
    pub cells_in_window: usize,
    pub tiles_written: usize,
    pub empty_tiles: usize,
    /// Sum of ways over all written tiles; exceeds `ways_indexed` when ways are duplicated.
    pub way_assignments: usize,
}

/// Runs a full rebuild of the offline tile set.
pub struct OfflineBuilder {
    config: GridConfig,
    options: BuildOptions,
}

impl OfflineBuilder {
    pub fn new(config: GridConfig, options: BuildOptions) -> Result<Self> {
        config.validate().context("invalid grid configuration")?;
        if let Some(window) = &options.window {
            window.validate().context("invalid generation window")?;
        }
        Ok(Self { config, options })
    }

    /// Reads `pbf_path`, indexes its ways and writes every tile under `output_dir`.
    pub fn build_from_pbf(
        &self,
        pbf_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        overrides: &SpeedOverrides,
    ) -> Result<BuildReport> {
        let store = TileStore::new(output_dir.as_ref(), &self.config)?;

        info!("Step 1: Scanning ways");
        let raw_ways = osm::read_ways(pbf_path)?;

        info!("Step 2: Indexing way bounds");
        let index = WayIndex::build(raw_ways, overrides);

        self.build(&index, &store)
    }

    /// Assigns indexed ways to cells and writes one tile per admitted cell.
    pub fn build(&self, index: &WayIndex, store: &TileStore) -> Result<BuildReport> {
        match self.options.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .context("could not create worker pool")?
                .install(|| self.build_tiles(index, store)),
            None => self.build_tiles(index, store),
        }
    }

    fn build_tiles(&self, index: &WayIndex, store: &TileStore) -> Result<BuildReport> {
        let start_time = Instant::now();
        store
            .ensure_root()
            .context("could not create offline tile directory")?;

        if index.is_empty() && !self.options.generate_empty_files {
            warn!("No ways to write; the tile set will be empty");
        }

        let assigner = TileAssigner::new(
            index,
            self.config.overlap_degrees,
            self.options.window,
            self.options.generate_empty_files,
            self.options.assign_strategy,
        );

        info!("Step 3: Selecting cells");
        let mut cells_in_window = 0usize;
        let cells: Vec<Cell> = store
            .grid()
            .cells()
            .filter(|cell| match assigner.plan(cell) {
                CellPlan::OutsideWindow => false,
                CellPlan::NoData => {
                    cells_in_window += 1;
                    false
                }
                CellPlan::Build => {
                    cells_in_window += 1;
                    true
                }
            })
            .collect();
        info!(
            "{} of {} cells in window need a tile",
            cells.len(),
            cells_in_window
        );

        info!("Step 4: Writing tiles");
        let pb = ProgressBar::new(cells.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) - Writing tiles",
                )?
                .progress_chars("##-"),
        );

        let tiles_written = AtomicUsize::new(0);
        let empty_tiles = AtomicUsize::new(0);
        let way_assignments = AtomicUsize::new(0);

        cells.par_iter().try_for_each(|cell| -> Result<()> {
            let assignment = assigner.assign(cell);
            let data = codec::encode(cell.bounds, assigner.margin(), &assignment.ways)
                .with_context(|| format!("could not encode tile for {}", cell))?;
            store
                .write_tile(&cell.bounds, &data)
                .with_context(|| format!("could not write tile for {}", cell))?;

            debug!("{}: {} ways", cell, assignment.ways.len());
            tiles_written.fetch_add(1, Ordering::Relaxed);
            way_assignments.fetch_add(assignment.ways.len(), Ordering::Relaxed);
            if assignment.ways.is_empty() {
                empty_tiles.fetch_add(1, Ordering::Relaxed);
            }
            pb.inc(1);
            Ok(())
        })?;

        pb.finish_with_message("Tile writing complete");

        store
            .sync_root()
            .context("could not fsync offline tile directory")?;

        let report = BuildReport {
            ways_indexed: index.len(),
            ways_discarded: index.discarded(),
            cells_in_window,
            tiles_written: tiles_written.into_inner(),
            empty_tiles: empty_tiles.into_inner(),
            way_assignments: way_assignments.into_inner(),
        };

        info!(
            "Generated {} tiles ({} empty) for {} ways in {:?}",
            report.tiles_written,
            report.empty_tiles,
            report.ways_indexed,
            start_time.elapsed()
        );

        Ok(report)
    }
}
